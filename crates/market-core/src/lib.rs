//! 마켓 데이터 레지스트리 도메인 타입.
//!
//! 자산 레코드, 자산 그룹(지수), 구성종목 스냅샷과 심볼 정규화 규칙을 정의합니다.
//! 저장소와 데이터 소스는 `market-data`, 동기화 로직은 `market-collector`에 있습니다.

pub mod asset;
pub mod error;
pub mod group;
pub mod snapshot;
pub mod symbol;

pub use asset::{AssetRecord, AssetType, NewAsset};
pub use error::{CoreError, Result};
pub use group::AssetGroup;
pub use snapshot::MembershipSnapshot;
pub use symbol::SymbolNormalizer;
