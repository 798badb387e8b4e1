//! 환경변수 기반 설정 모듈.
//!
//! 지수 그룹 정의는 내장 테이블(sp500, nasdaq100, dax)을 기본으로 하며,
//! `INDEX_GROUPS_FILE`로 TOML 파일을 지정하면 그 정의로 대체합니다.
//!
//! ```toml
//! [[groups]]
//! id = "sp500"
//! name = "S&P 500"
//! expected_count = 503
//!
//! [groups.source]
//! kind = "wikipedia"
//! url = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies"
//! columns = ["Symbol"]
//! normalizer = { share_class_separator = "-" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use market_core::{AssetGroup, AssetType, SymbolNormalizer};
use serde::Deserialize;

use crate::error::CollectorError;
use crate::modules::reconcile::DEFAULT_MIN_SOURCE_RATIO;
use crate::Result;

const DEFAULT_DATABASE_URL: &str = "sqlite://market_data.db";
const DEFAULT_USER_AGENT: &str = "market-collector/0.3 (index constituent sync)";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 최대 DB 연결 수
    pub db_max_connections: u32,
    /// HTTP 수집 설정
    pub http: HttpConfig,
    /// 동기화 정책
    pub reconcile: ReconcileConfig,
    /// 지수 그룹 정의 (활성화된 것만)
    pub groups: Vec<IndexGroupConfig>,
}

/// HTTP 수집 설정
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// 요청 타임아웃 (초)
    /// 기본값: 10
    pub timeout_secs: u64,
    pub user_agent: String,
    /// 원격 소스 요청 간 최소 간격 (밀리초)
    /// 기본값: 1000
    pub fetch_interval_ms: u64,
    /// 일시적 오류 재시도 횟수
    /// 기본값: 2
    pub max_retries: u32,
}

/// 동기화 정책 설정
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// 예상 구성종목 수 대비 최소 비율
    pub min_source_ratio: f64,
    /// 그룹에 유형 지정이 없을 때 신규 자산 유형
    pub default_asset_type: AssetType,
}

/// 지수 그룹 하나의 정의
#[derive(Debug, Clone, Deserialize)]
pub struct IndexGroupConfig {
    pub id: AssetGroup,
    /// 표시용 이름
    #[serde(default)]
    pub name: Option<String>,
    /// 예상 구성종목 수 (비정상 소스 검증용)
    #[serde(default)]
    pub expected_count: Option<usize>,
    /// 신규 자산 유형 (없으면 기본값)
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    pub source: SourceConfig,
}

impl IndexGroupConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// 신규 자산 유형 (그룹 지정이 없으면 `default`)
    pub fn asset_type_or(&self, default: AssetType) -> AssetType {
        self.asset_type.unwrap_or(default)
    }
}

/// 내장 구성종목 목록
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinList {
    Dax40,
}

/// 구성종목 소스 정의
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Wikipedia HTML 표
    Wikipedia {
        url: String,
        columns: Vec<String>,
        #[serde(default)]
        table_index: Option<usize>,
        #[serde(default)]
        normalizer: SymbolNormalizer,
    },
    /// 설정 파일에 직접 나열한 목록
    Static {
        symbols: Vec<String>,
        #[serde(default)]
        normalizer: SymbolNormalizer,
    },
    /// 한 줄에 하나씩 심볼을 적은 로컬 파일
    File {
        path: PathBuf,
        #[serde(default)]
        normalizer: SymbolNormalizer,
    },
    /// 코드에 내장된 목록
    Builtin { list: BuiltinList },
}

#[derive(Debug, Deserialize)]
struct GroupsFile {
    groups: Vec<IndexGroupConfig>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let default_asset_type = match std::env::var("RECONCILE_DEFAULT_ASSET_TYPE") {
            Ok(v) => v.parse::<AssetType>()?,
            Err(_) => AssetType::Stock,
        };

        let groups = match std::env::var("INDEX_GROUPS_FILE") {
            Ok(path) => load_groups_file(Path::new(&path))?,
            Err(_) => default_groups(),
        };
        let groups = select_groups(groups, &env_var_list("INDEX_GROUPS"))?;

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: env_var_parse("DB_MAX_CONNECTIONS", 4),
            http: HttpConfig {
                timeout_secs: env_var_parse("HTTP_TIMEOUT_SECS", 10),
                user_agent: std::env::var("HTTP_USER_AGENT")
                    .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
                fetch_interval_ms: env_var_parse("FETCH_INTERVAL_MS", 1000),
                max_retries: env_var_parse("FETCH_MAX_RETRIES", 2),
            },
            reconcile: ReconcileConfig {
                min_source_ratio: env_var_parse(
                    "RECONCILE_MIN_SOURCE_RATIO",
                    DEFAULT_MIN_SOURCE_RATIO,
                ),
                default_asset_type,
            },
            groups,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        let ratio = self.reconcile.min_source_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(CollectorError::Config(format!(
                "RECONCILE_MIN_SOURCE_RATIO는 (0, 1] 범위여야 합니다: {}",
                ratio
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(CollectorError::Config(
                "HTTP_TIMEOUT_SECS는 0보다 커야 합니다".to_string(),
            ));
        }
        validate_groups(&self.groups)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }
}

/// 내장 지수 그룹 정의
pub fn default_groups() -> Vec<IndexGroupConfig> {
    let builtin = |id: &str, name: &str, expected: usize, source: SourceConfig| {
        AssetGroup::new(id).ok().map(|id| IndexGroupConfig {
            id,
            name: Some(name.to_string()),
            expected_count: Some(expected),
            asset_type: None,
            source,
        })
    };

    [
        builtin(
            "sp500",
            "S&P 500",
            503,
            SourceConfig::Wikipedia {
                url: "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies".to_string(),
                columns: vec!["Symbol".to_string()],
                table_index: None,
                normalizer: SymbolNormalizer::yahoo_us(),
            },
        ),
        builtin(
            "nasdaq100",
            "Nasdaq-100",
            101,
            SourceConfig::Wikipedia {
                url: "https://en.wikipedia.org/wiki/Nasdaq-100".to_string(),
                columns: vec!["Ticker".to_string(), "Symbol".to_string()],
                table_index: None,
                normalizer: SymbolNormalizer::yahoo_us(),
            },
        ),
        builtin(
            "dax",
            "DAX 40",
            40,
            SourceConfig::Builtin {
                list: BuiltinList::Dax40,
            },
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// TOML 그룹 정의 파싱
pub fn parse_groups_toml(content: &str) -> Result<Vec<IndexGroupConfig>> {
    let file: GroupsFile = toml::from_str(content)
        .map_err(|e| CollectorError::Config(format!("그룹 정의 파싱 실패: {}", e)))?;
    validate_groups(&file.groups)?;
    Ok(file.groups)
}

fn load_groups_file(path: &Path) -> Result<Vec<IndexGroupConfig>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CollectorError::Config(format!("그룹 정의 파일 읽기 실패 ({}): {}", path.display(), e))
    })?;
    parse_groups_toml(&content)
}

/// 활성화할 그룹만 남김. `enabled`가 비어 있으면 전체.
pub fn select_groups(
    groups: Vec<IndexGroupConfig>,
    enabled: &[String],
) -> Result<Vec<IndexGroupConfig>> {
    if enabled.is_empty() {
        return Ok(groups);
    }

    let wanted = enabled
        .iter()
        .map(AssetGroup::new)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(unknown) = wanted.iter().find(|w| !groups.iter().any(|g| &g.id == *w)) {
        return Err(CollectorError::Config(format!(
            "정의되지 않은 지수 그룹: {}",
            unknown
        )));
    }

    Ok(groups.into_iter().filter(|g| wanted.contains(&g.id)).collect())
}

fn validate_groups(groups: &[IndexGroupConfig]) -> Result<()> {
    for (i, group) in groups.iter().enumerate() {
        if groups[..i].iter().any(|g| g.id == group.id) {
            return Err(CollectorError::Config(format!(
                "중복된 지수 그룹: {}",
                group.id
            )));
        }
        match &group.source {
            SourceConfig::Wikipedia { url, columns, .. } => {
                if url.trim().is_empty() || columns.is_empty() {
                    return Err(CollectorError::Config(format!(
                        "[{}] Wikipedia 소스에는 url과 columns가 필요합니다",
                        group.id
                    )));
                }
            }
            SourceConfig::Static { symbols, .. } if symbols.is_empty() => {
                return Err(CollectorError::Config(format!(
                    "[{}] 정적 목록이 비어 있습니다",
                    group.id
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 쉼표로 구분된 리스트 파싱
fn env_var_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| parse_list(&v))
        .unwrap_or_default()
}

/// 쉼표로 구분된 그룹 목록 파싱 (소문자)
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(groups: Vec<IndexGroupConfig>, ratio: f64) -> CollectorConfig {
        CollectorConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            http: HttpConfig {
                timeout_secs: 10,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                fetch_interval_ms: 0,
                max_retries: 0,
            },
            reconcile: ReconcileConfig {
                min_source_ratio: ratio,
                default_asset_type: AssetType::Stock,
            },
            groups,
        }
    }

    #[test]
    fn test_default_groups() {
        let groups = default_groups();
        let ids: Vec<_> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["sp500", "nasdaq100", "dax"]);
        assert!(matches!(groups[0].source, SourceConfig::Wikipedia { .. }));
        assert!(validate_groups(&groups).is_ok());
    }

    #[test]
    fn test_parse_groups_toml() {
        let content = r#"
            [[groups]]
            id = "SP500"
            expected_count = 503
            [groups.source]
            kind = "wikipedia"
            url = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies"
            columns = ["Symbol"]
            normalizer = { share_class_separator = "-" }

            [[groups]]
            id = "commodity"
            asset_type = "commodity"
            [groups.source]
            kind = "static"
            symbols = ["GC=F", "CL=F"]

            [[groups]]
            id = "dax"
            [groups.source]
            kind = "builtin"
            list = "dax40"
        "#;

        let groups = parse_groups_toml(content).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].id.as_str(), "sp500");
        assert_eq!(groups[0].expected_count, Some(503));
        match &groups[0].source {
            SourceConfig::Wikipedia { normalizer, .. } => {
                assert_eq!(normalizer.share_class_separator, Some('-'));
            }
            other => panic!("unexpected source: {:?}", other),
        }
        assert_eq!(groups[1].asset_type, Some(AssetType::Commodity));
        assert!(matches!(
            groups[2].source,
            SourceConfig::Builtin {
                list: BuiltinList::Dax40
            }
        ));
    }

    #[test]
    fn test_parse_groups_rejects_invalid() {
        let duplicate = r#"
            [[groups]]
            id = "dax"
            source = { kind = "builtin", list = "dax40" }
            [[groups]]
            id = "DAX"
            source = { kind = "builtin", list = "dax40" }
        "#;
        assert!(parse_groups_toml(duplicate).is_err());

        let empty_static = r#"
            [[groups]]
            id = "custom"
            source = { kind = "static", symbols = [] }
        "#;
        assert!(parse_groups_toml(empty_static).is_err());

        let bad_id = r#"
            [[groups]]
            id = "s&p 500"
            source = { kind = "builtin", list = "dax40" }
        "#;
        assert!(parse_groups_toml(bad_id).is_err());
    }

    #[test]
    fn test_select_groups() {
        let selected = select_groups(default_groups(), &parse_list("DAX, sp500")).unwrap();
        let ids: Vec<_> = selected.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["sp500", "dax"]);

        assert_eq!(select_groups(default_groups(), &[]).unwrap().len(), 3);
        assert!(select_groups(default_groups(), &parse_list("ftse100")).is_err());
    }

    #[test]
    fn test_validate_ratio() {
        assert!(config_with(default_groups(), 0.5).validate().is_ok());
        assert!(config_with(default_groups(), 1.0).validate().is_ok());
        assert!(config_with(default_groups(), 0.0).validate().is_err());
        assert!(config_with(default_groups(), 1.5).validate().is_err());
    }

    #[test]
    fn test_group_asset_type_falls_back_to_default() {
        let mut groups = default_groups();
        groups[2].asset_type = Some(AssetType::Etf);
        let config = config_with(groups, 0.5);
        let default = config.reconcile.default_asset_type;
        assert_eq!(config.groups[0].asset_type_or(default), AssetType::Stock);
        assert_eq!(config.groups[2].asset_type_or(default), AssetType::Etf);
        assert_eq!(config.groups[0].asset_type_or(AssetType::Index), AssetType::Index);
    }
}
