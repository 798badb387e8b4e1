//! 저장소 에러 타입.

use thiserror::Error;

/// 데이터 계층 에러
#[derive(Debug, Error)]
pub enum DataError {
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    #[error("자산을 찾을 수 없음: {0}")]
    NotFound(String),

    #[error("검증 실패: {0}")]
    Validation(String),

    #[error(transparent)]
    Core(#[from] market_core::CoreError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, DataError>;
