//! 자산 레지스트리 저장소와 구성종목 데이터 소스.
//!
//! - [`storage`]: SQLite 기반 자산 레지스트리, 스키마 초기화
//! - [`provider`]: 지수 구성종목 소스 (Wikipedia 표, 정적 목록, 파일), Rate Limiter, 재시도
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use market_data::{Database, DatabaseConfig, SqliteAssetRegistry};
//!
//! let db = Database::connect(&DatabaseConfig::for_cli("sqlite://market_data.db")).await?;
//! let registry = SqliteAssetRegistry::new(db.pool().clone());
//! let active = registry.read_active(&"sp500".parse()?).await?;
//! ```

pub mod database;
pub mod error;
pub mod provider;
pub mod storage;

pub use database::{Database, DatabaseConfig};
pub use error::{DataError, Result};
pub use provider::{
    FetchError, FileListSource, MembershipFetcher, MembershipSource, RateLimiter, RetryConfig,
    StaticListSource, WikipediaTableSource,
};
pub use storage::{
    backfill_memberships, init_schema, AddOutcome, AssetFilter, AssetRegistry, GroupCount,
    PurgeReport, SqliteAssetRegistry, UpsertOutcome,
};
