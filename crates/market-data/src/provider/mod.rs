//! 지수 구성종목 데이터 소스.
//!
//! 각 소스는 심볼 정규화까지 책임지며, [`MembershipFetcher`]가 그룹별 소스를
//! 묶어 Rate Limit과 재시도를 적용합니다.

pub mod file_list;
pub mod rate_limit;
pub mod retry;
pub mod static_list;
pub mod wikipedia;

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use market_core::{AssetGroup, MembershipSnapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use file_list::FileListSource;
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, RetryConfig};
pub use static_list::StaticListSource;
pub use wikipedia::WikipediaTableSource;

/// 구성종목 조회 에러
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP 요청 실패: {0}")]
    Http(String),

    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    #[error("HTTP {status} 응답: {url}")]
    Status { status: u16, url: String },

    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    #[error("파일 읽기 실패: {0}")]
    Io(#[from] std::io::Error),

    #[error("구성종목 소스가 등록되지 않은 그룹: {0}")]
    UnknownGroup(String),
}

impl FetchError {
    /// 일시적인 오류인지 (네트워크, 타임아웃, 429, 5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(e.to_string());
        }
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::Http(e.to_string()),
        }
    }
}

/// 한 그룹의 권위 있는 구성종목 목록을 제공하는 소스
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// 로그/리포트용 소스 설명
    fn describe(&self) -> String;

    /// 네트워크를 사용하는 소스인지 (Rate Limit 적용 대상)
    fn is_remote(&self) -> bool {
        true
    }

    /// 정규화된 심볼 집합 조회
    async fn fetch(&self) -> Result<BTreeSet<String>, FetchError>;
}

/// 공통 HTTP 클라이언트 생성 (타임아웃 필수)
pub fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| FetchError::Http(e.to_string()))
}

/// 그룹 → 소스 매핑과 Rate Limit, 재시도 정책
pub struct MembershipFetcher {
    sources: HashMap<AssetGroup, Box<dyn MembershipSource>>,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl MembershipFetcher {
    pub fn new(limiter: RateLimiter, retry: RetryConfig) -> Self {
        Self {
            sources: HashMap::new(),
            limiter,
            retry,
        }
    }

    /// 그룹 소스 등록 (같은 그룹이면 교체)
    pub fn register(&mut self, group: AssetGroup, source: Box<dyn MembershipSource>) -> &mut Self {
        self.sources.insert(group, source);
        self
    }

    pub fn with_source(mut self, group: AssetGroup, source: Box<dyn MembershipSource>) -> Self {
        self.register(group, source);
        self
    }

    pub fn has_group(&self, group: &AssetGroup) -> bool {
        self.sources.contains_key(group)
    }

    /// 그룹의 현재 구성종목 스냅샷 조회
    pub async fn fetch_membership(
        &self,
        group: &AssetGroup,
    ) -> Result<MembershipSnapshot, FetchError> {
        let source = self
            .sources
            .get(group)
            .ok_or_else(|| FetchError::UnknownGroup(group.to_string()))?;
        let source: &dyn MembershipSource = source.as_ref();
        let description = source.describe();
        let limiter = &self.limiter;

        debug!(group = %group, source = %description, "구성종목 조회");

        let symbols = with_retry(&self.retry, || async move {
            if source.is_remote() {
                limiter.acquire().await;
            }
            source.fetch().await
        })
        .await?;

        // 빈 결과 거부는 동기화 단계의 check_plausibility에서 처리
        if symbols.is_empty() {
            warn!(group = %group, source = %description, "소스가 빈 구성종목을 반환");
        } else {
            info!(group = %group, count = symbols.len(), source = %description, "구성종목 조회 완료");
        }
        Ok(MembershipSnapshot::new(group.clone(), symbols, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Http("reset".into()).is_retryable());
        assert!(FetchError::Timeout("10s".into()).is_retryable());
        assert!(FetchError::Status {
            status: 503,
            url: String::new()
        }
        .is_retryable());
        assert!(FetchError::Status {
            status: 429,
            url: String::new()
        }
        .is_retryable());
        assert!(!FetchError::Status {
            status: 404,
            url: String::new()
        }
        .is_retryable());
        assert!(!FetchError::Parse("no table".into()).is_retryable());
        assert!(!FetchError::UnknownGroup("x".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_fetcher_unknown_group() {
        let fetcher = MembershipFetcher::new(RateLimiter::unlimited(), RetryConfig::no_retry());
        let err = fetcher
            .fetch_membership(&AssetGroup::new("ftse100").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownGroup(_)));
    }

    #[tokio::test]
    async fn test_fetcher_static_source() {
        let dax = AssetGroup::new("dax").unwrap();
        let fetcher = MembershipFetcher::new(RateLimiter::unlimited(), RetryConfig::no_retry())
            .with_source(dax.clone(), Box::new(StaticListSource::dax40()));

        let snapshot = fetcher.fetch_membership(&dax).await.unwrap();
        assert_eq!(snapshot.group, dax);
        assert_eq!(snapshot.len(), 40);
        assert!(snapshot.contains("SAP.DE"));
    }

    #[tokio::test]
    async fn test_fetcher_returns_empty_snapshot() {
        let g = AssetGroup::new("custom").unwrap();
        let fetcher = MembershipFetcher::new(RateLimiter::unlimited(), RetryConfig::no_retry())
            .with_source(
                g.clone(),
                Box::new(StaticListSource::new("static:custom", ["[1]", " * "])),
            );
        let snapshot = fetcher.fetch_membership(&g).await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.source, "static:custom");
    }
}
