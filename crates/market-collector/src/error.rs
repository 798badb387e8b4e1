//! 에러 타입 정의.

use std::fmt;

use market_data::{DataError, FetchError};

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 레지스트리 저장소 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 데이터 소스 에러 (Wikipedia, 파일 등)
    DataSource(String),
    /// 파괴적 작업에 필요한 확인 누락
    Confirmation(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::DataSource(msg) => write!(f, "Data source error: {}", msg),
            Self::Confirmation(msg) => write!(f, "Confirmation required: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<FetchError> for CollectorError {
    fn from(err: FetchError) -> Self {
        Self::DataSource(err.to_string())
    }
}

impl From<market_core::CoreError> for CollectorError {
    fn from(err: market_core::CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
