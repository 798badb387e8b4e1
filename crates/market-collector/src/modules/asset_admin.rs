//! 자산 수동 관리 (등록, 해제, 영구 삭제, 조회).

use market_core::{AssetGroup, AssetRecord, NewAsset};
use market_data::{AddOutcome, AssetFilter, GroupCount, PurgeReport, SqliteAssetRegistry};
use serde::Serialize;
use tracing::info;

use crate::config::IndexGroupConfig;
use crate::error::CollectorError;
use crate::Result;

/// 수동 등록
pub async fn add_asset(registry: &SqliteAssetRegistry, asset: &NewAsset) -> Result<AddOutcome> {
    let outcome = registry.add_asset(asset).await?;
    info!(
        symbol = %asset.symbol,
        asset_type = %asset.asset_type,
        group = asset.group.as_ref().map(AssetGroup::as_str).unwrap_or("-"),
        ?outcome,
        "자산 등록"
    );
    Ok(outcome)
}

/// 해제 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// 비활성화 (가격 데이터 유지)
    Deactivated { symbol: String, memberships: u64 },
    /// 영구 삭제
    Purged(PurgeReport),
}

/// 자산 해제.
///
/// 기본은 비활성화이며, `purge`는 가격 데이터까지 지우므로 `confirmed`가
/// 없으면 아무것도 하지 않고 `CollectorError::Confirmation`을 반환합니다.
pub async fn remove_asset(
    registry: &SqliteAssetRegistry,
    symbol: &str,
    purge: bool,
    confirmed: bool,
) -> Result<RemoveOutcome> {
    if !purge {
        let memberships = registry.deactivate_asset(symbol).await?;
        info!(symbol, memberships, "자산 비활성화");
        return Ok(RemoveOutcome::Deactivated {
            symbol: symbol.to_string(),
            memberships,
        });
    }

    if !confirmed {
        let price_rows = registry.price_row_count(symbol).await?;
        return Err(CollectorError::Confirmation(format!(
            "{} 영구 삭제 시 가격 데이터 {}행이 함께 삭제됩니다. --yes로 확인하세요",
            symbol, price_rows
        )));
    }

    Ok(RemoveOutcome::Purged(registry.purge_asset(symbol).await?))
}

/// 자산 목록
pub async fn list_assets(
    registry: &SqliteAssetRegistry,
    group: Option<AssetGroup>,
    include_inactive: bool,
) -> Result<Vec<AssetRecord>> {
    let filter = AssetFilter {
        group,
        active_only: !include_inactive,
    };
    Ok(registry.list_assets(&filter).await?)
}

/// 그룹별 현황 (설정과 DB 집계 병합)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOverview {
    pub group: String,
    pub name: Option<String>,
    pub configured: bool,
    pub expected: Option<usize>,
    pub active: i64,
    pub total: i64,
}

/// 설정된 그룹 순서대로, 그 다음 DB에만 있는 그룹을 이름순으로 나열
pub async fn group_overview(
    registry: &SqliteAssetRegistry,
    groups: &[IndexGroupConfig],
) -> Result<Vec<GroupOverview>> {
    let mut counts = registry.group_counts().await?;

    let mut overview: Vec<GroupOverview> = groups
        .iter()
        .map(|g| {
            let count = counts
                .iter()
                .position(|c| c.asset_group == g.id.as_str())
                .map(|i| counts.remove(i));
            let (active, total) = count.map(|c| (c.active, c.total)).unwrap_or((0, 0));
            GroupOverview {
                group: g.id.to_string(),
                name: g.name.clone(),
                configured: true,
                expected: g.expected_count,
                active,
                total,
            }
        })
        .collect();

    overview.extend(counts.into_iter().map(|c: GroupCount| GroupOverview {
        group: c.asset_group,
        name: None,
        configured: false,
        expected: None,
        active: c.active,
        total: c.total,
    }));

    Ok(overview)
}

/// 멤버십 테이블 도입 이전 DB 마이그레이션
pub async fn migrate_memberships(registry: &SqliteAssetRegistry) -> Result<u64> {
    let inserted = registry.backfill_memberships().await?;
    info!(inserted, "멤버십 마이그레이션 완료");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_groups;
    use market_core::AssetType;
    use market_data::{init_schema, AssetRegistry, Database, DatabaseConfig};

    async fn registry() -> SqliteAssetRegistry {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        init_schema(db.pool()).await.unwrap();
        SqliteAssetRegistry::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_purge_requires_confirmation() {
        let reg = registry().await;
        let asset = NewAsset {
            symbol: "^VIX".to_string(),
            asset_type: AssetType::Index,
            ..Default::default()
        };
        add_asset(&reg, &asset).await.unwrap();

        let err = remove_asset(&reg, "^VIX", true, false).await.unwrap_err();
        assert!(matches!(err, CollectorError::Confirmation(_)));
        assert!(reg.get_asset("^VIX").await.unwrap().is_some());

        let outcome = remove_asset(&reg, "^VIX", true, true).await.unwrap();
        assert!(matches!(outcome, RemoveOutcome::Purged(_)));
        assert!(reg.get_asset("^VIX").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_deactivates_by_default() {
        let reg = registry().await;
        let sp = AssetGroup::new("sp500").unwrap();
        reg.upsert_active("MMM", &sp, AssetType::Stock).await.unwrap();

        let outcome = remove_asset(&reg, "MMM", false, false).await.unwrap();
        assert_eq!(
            outcome,
            RemoveOutcome::Deactivated {
                symbol: "MMM".to_string(),
                memberships: 1,
            }
        );
        assert!(list_assets(&reg, None, false).await.unwrap().is_empty());
        assert_eq!(list_assets(&reg, None, true).await.unwrap().len(), 1);

        assert!(remove_asset(&reg, "NOPE", false, false).await.is_err());
    }

    #[tokio::test]
    async fn test_group_overview_merges_config() {
        let reg = registry().await;
        let sp = AssetGroup::new("sp500").unwrap();
        let legacy = AssetGroup::new("index").unwrap();
        reg.upsert_active("AAPL", &sp, AssetType::Stock).await.unwrap();
        reg.upsert_active("^GSPC", &legacy, AssetType::Index).await.unwrap();

        let overview = group_overview(&reg, &default_groups()).await.unwrap();
        let ids: Vec<_> = overview.iter().map(|o| o.group.as_str()).collect();
        assert_eq!(ids, vec!["sp500", "nasdaq100", "dax", "index"]);

        assert_eq!(overview[0].active, 1);
        assert_eq!(overview[0].expected, Some(503));
        assert_eq!(overview[1].total, 0);
        assert!(!overview[3].configured);
    }
}
