//! 도메인 에러 타입.

use thiserror::Error;

/// 도메인 값 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("잘못된 그룹 ID: '{0}'")]
    InvalidGroup(String),

    #[error("잘못된 심볼: '{0}'")]
    InvalidSymbol(String),

    #[error("알 수 없는 자산 유형: '{0}'")]
    UnknownAssetType(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CoreError>;
