//! SQLite 연결 풀 설정.
//!
//! 연결 생명주기(open/close)는 호출자가 소유합니다. 레지스트리에는
//! 풀 핸들만 전달되며 전역 DB 경로는 두지 않습니다.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;

/// 연결 풀 설정
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 데이터베이스 URL (예: "sqlite://market_data.db", "sqlite::memory:")
    pub url: String,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃
    pub acquire_timeout: Duration,
    /// 파일이 없으면 생성
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// CLI 단발 실행용 설정
    pub fn for_cli(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(10),
            create_if_missing: true,
        }
    }

    /// 인메모리 DB (테스트용).
    ///
    /// SQLite 인메모리 DB는 연결마다 별개이므로 단일 연결로 고정합니다.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            create_if_missing: true,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// 데이터베이스 핸들
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 설정에 따라 연결 풀 생성
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true);
        if !config.is_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);
        if config.is_memory() {
            // 연결이 닫히면 인메모리 DB가 사라짐
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(
            max_connections = config.max_connections,
            "데이터베이스 연결 완료"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 풀 종료 (진행 중인 연결이 반환될 때까지 대기)
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
