//! 구성종목 동기화 (Reconciliation).
//!
//! 권위 있는 소스의 구성종목과 레지스트리의 그룹 소속을 비교해
//! 세 집합을 계산하고 적용합니다.
//!
//! - `to_create`     = 소스 − 레지스트리 전체 (이 그룹에서 처음 보는 심볼)
//! - `to_reactivate` = (소스 − 레지스트리 활성) − to_create
//! - `to_deactivate` = 레지스트리 활성 − 소스
//!
//! 같은 소스로 두 번 연속 실행하면 두 번째 실행의 세 집합은 모두 비어 있습니다.
//! 비활성화는 가격 데이터를 삭제하지 않습니다.

use std::collections::BTreeSet;
use std::time::Instant;

use market_core::{AssetGroup, AssetType, MembershipSnapshot};
use market_data::{AssetRegistry, DataError, UpsertOutcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::stats::{ReconcileSummary, SyncPhase};

/// 소스가 비정상일 때 그룹 동기화를 중단하는 비율 기본값
pub const DEFAULT_MIN_SOURCE_RATIO: f64 = 0.5;

/// 그룹 동기화 중단 사유
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("[{group}] 소스가 빈 구성종목을 반환")]
    EmptySource { group: AssetGroup },

    #[error("[{group}] 소스 구성종목 수가 비정상: {fetched}개 (예상 ~{expected}, 최소 비율 {min_ratio})")]
    ImplausibleSource {
        group: AssetGroup,
        fetched: usize,
        expected: usize,
        min_ratio: f64,
    },

    #[error("레지스트리 조회 실패: {0}")]
    Storage(#[from] DataError),
}

/// 동기화 옵션
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// 예상 구성종목 수 대비 최소 비율 (0 < ratio <= 1)
    pub min_source_ratio: f64,
    /// 신규 생성 자산의 유형
    pub asset_type: AssetType,
    /// 계산만 하고 적용하지 않음
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            min_source_ratio: DEFAULT_MIN_SOURCE_RATIO,
            asset_type: AssetType::Stock,
            dry_run: false,
        }
    }
}

/// 세 방향 차이 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: BTreeSet<String>,
    pub to_reactivate: BTreeSet<String>,
    pub to_deactivate: BTreeSet<String>,
    /// 이미 활성 상태로 일치하는 심볼 수
    pub unchanged: usize,
}

impl ReconciliationPlan {
    /// 소스와 레지스트리 스냅샷으로 계획 계산
    pub fn compute(
        authoritative: &BTreeSet<String>,
        persisted_active: &BTreeSet<String>,
        persisted_all: &BTreeSet<String>,
    ) -> Self {
        let to_create: BTreeSet<String> =
            authoritative.difference(persisted_all).cloned().collect();
        let to_reactivate: BTreeSet<String> = authoritative
            .difference(persisted_active)
            .filter(|s| !to_create.contains(*s))
            .cloned()
            .collect();
        let to_deactivate: BTreeSet<String> =
            persisted_active.difference(authoritative).cloned().collect();
        let unchanged = authoritative.intersection(persisted_active).count();

        Self {
            to_create,
            to_reactivate,
            to_deactivate,
            unchanged,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_reactivate.is_empty() && self.to_deactivate.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.to_create.len() + self.to_reactivate.len() + self.to_deactivate.len()
    }
}

/// 소스 구성종목 수 검증.
///
/// 비어 있거나 예상 수의 `min_ratio` 미만이면 부분/깨진 수집으로 보고 거부합니다.
pub fn check_plausibility(
    group: &AssetGroup,
    fetched: usize,
    expected: Option<usize>,
    min_ratio: f64,
) -> Result<(), ReconcileError> {
    if fetched == 0 {
        return Err(ReconcileError::EmptySource {
            group: group.clone(),
        });
    }
    if let Some(expected) = expected.filter(|e| *e > 0) {
        if (fetched as f64) < expected as f64 * min_ratio {
            return Err(ReconcileError::ImplausibleSource {
                group: group.clone(),
                fetched,
                expected,
                min_ratio,
            });
        }
    }
    Ok(())
}

/// 동기화 결과 (계획 + 적용 통계)
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub group: AssetGroup,
    pub plan: ReconciliationPlan,
    pub summary: ReconcileSummary,
    pub dry_run: bool,
}

/// 한 그룹씩 구성종목을 동기화하는 컴포넌트.
///
/// 레지스트리 핸들은 생성 시 주입되며 생명주기는 호출자가 관리합니다.
pub struct ConstituencyReconciler<'a, R: AssetRegistry + ?Sized> {
    registry: &'a R,
    options: ReconcileOptions,
}

impl<'a, R: AssetRegistry + ?Sized> ConstituencyReconciler<'a, R> {
    pub fn new(registry: &'a R, options: ReconcileOptions) -> Self {
        Self { registry, options }
    }

    /// 레지스트리를 읽어 계획만 계산 (변경 없음)
    pub async fn plan(
        &self,
        group: &AssetGroup,
        authoritative: &BTreeSet<String>,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        let persisted_active = self.registry.read_active(group).await?;
        let persisted_all = self.registry.read_all(group).await?;

        debug!(
            group = %group,
            authoritative = authoritative.len(),
            active = persisted_active.len(),
            all = persisted_all.len(),
            "레지스트리 상태 조회"
        );

        Ok(ReconciliationPlan::compute(
            authoritative,
            &persisted_active,
            &persisted_all,
        ))
    }

    /// 스냅샷 검증 → 계획 → 적용.
    ///
    /// 검증 실패나 레지스트리 조회 실패 시 아무것도 변경하지 않고 에러를 반환합니다.
    /// 심볼 단위 저장 실패는 기록만 하고 나머지 심볼을 계속 처리합니다.
    pub async fn reconcile(
        &self,
        snapshot: &MembershipSnapshot,
        expected_count: Option<usize>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let start = Instant::now();
        let group = &snapshot.group;

        check_plausibility(
            group,
            snapshot.len(),
            expected_count,
            self.options.min_source_ratio,
        )?;

        let plan = self.plan(group, &snapshot.symbols).await?;

        info!(
            group = %group,
            source = snapshot.len(),
            create = plan.to_create.len(),
            reactivate = plan.to_reactivate.len(),
            deactivate = plan.to_deactivate.len(),
            unchanged = plan.unchanged,
            "동기화 계획"
        );

        let mut summary = if self.options.dry_run || plan.is_empty() {
            ReconcileSummary {
                unchanged: plan.unchanged,
                ..Default::default()
            }
        } else {
            self.apply(group, &plan).await
        };
        summary.elapsed = start.elapsed();

        Ok(ReconcileOutcome {
            group: group.clone(),
            plan,
            summary,
            dry_run: self.options.dry_run,
        })
    }

    /// 계획 적용. 심볼마다 독립 트랜잭션이며 실패해도 배치를 계속합니다.
    pub async fn apply(&self, group: &AssetGroup, plan: &ReconciliationPlan) -> ReconcileSummary {
        let mut summary = ReconcileSummary {
            unchanged: plan.unchanged,
            ..Default::default()
        };
        let asset_type = self.options.asset_type;

        for symbol in &plan.to_create {
            match self.registry.upsert_active(symbol, group, asset_type).await {
                Ok(UpsertOutcome::Unchanged) => {
                    debug!(group = %group, symbol = %symbol, "이미 활성 상태");
                }
                Ok(outcome) => {
                    summary.added += 1;
                    debug!(group = %group, symbol = %symbol, ?outcome, "구성종목 추가");
                }
                Err(e) => {
                    warn!(group = %group, symbol = %symbol, error = %e, "구성종목 추가 실패");
                    summary.record_failure(symbol, SyncPhase::Create, e.to_string());
                }
            }
        }

        for symbol in &plan.to_reactivate {
            match self.registry.upsert_active(symbol, group, asset_type).await {
                Ok(UpsertOutcome::Unchanged) => {
                    debug!(group = %group, symbol = %symbol, "이미 활성 상태");
                }
                Ok(_) => {
                    summary.reactivated += 1;
                    debug!(group = %group, symbol = %symbol, "구성종목 재활성화");
                }
                Err(e) => {
                    warn!(group = %group, symbol = %symbol, error = %e, "재활성화 실패");
                    summary.record_failure(symbol, SyncPhase::Reactivate, e.to_string());
                }
            }
        }

        for symbol in &plan.to_deactivate {
            match self.registry.deactivate(symbol, group).await {
                Ok(true) => {
                    summary.deactivated += 1;
                    debug!(group = %group, symbol = %symbol, "구성종목 비활성화");
                }
                Ok(false) => {
                    debug!(group = %group, symbol = %symbol, "이미 비활성 상태");
                }
                Err(e) => {
                    warn!(group = %group, symbol = %symbol, error = %e, "비활성화 실패");
                    summary.record_failure(symbol, SyncPhase::Deactivate, e.to_string());
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(symbols: &[&str]) -> BTreeSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn group() -> AssetGroup {
        AssetGroup::new("sp500").unwrap()
    }

    #[test]
    fn test_plan_worked_example() {
        let plan = ReconciliationPlan::compute(
            &set(&["B", "C", "D"]),
            &set(&["A", "B"]),
            &set(&["A", "B", "C"]),
        );
        assert_eq!(plan.to_create, set(&["D"]));
        assert_eq!(plan.to_reactivate, set(&["C"]));
        assert_eq!(plan.to_deactivate, set(&["A"]));
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.total_changes(), 3);
    }

    #[test]
    fn test_plan_converged_is_empty() {
        let plan = ReconciliationPlan::compute(
            &set(&["B", "C", "D"]),
            &set(&["B", "C", "D"]),
            &set(&["A", "B", "C", "D"]),
        );
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 3);
    }

    #[test]
    fn test_plan_partition_is_disjoint() {
        let authoritative = set(&["A", "B", "E", "F", "G"]);
        let active = set(&["A", "C", "D"]);
        let all = set(&["A", "B", "C", "D", "X"]);
        let plan = ReconciliationPlan::compute(&authoritative, &active, &all);

        assert!(plan.to_create.is_disjoint(&plan.to_reactivate));
        assert!(plan.to_create.is_disjoint(&plan.to_deactivate));
        assert!(plan.to_reactivate.is_disjoint(&plan.to_deactivate));
        assert!(plan.to_create.is_subset(&authoritative));
        assert!(plan.to_reactivate.is_subset(&authoritative));
        assert!(plan.to_deactivate.is_disjoint(&authoritative));

        assert_eq!(plan.to_create, set(&["E", "F", "G"]));
        assert_eq!(plan.to_reactivate, set(&["B"]));
        assert_eq!(plan.to_deactivate, set(&["C", "D"]));
    }

    #[test]
    fn test_plausibility_guard() {
        let g = group();
        assert!(matches!(
            check_plausibility(&g, 50, Some(500), 0.5),
            Err(ReconcileError::ImplausibleSource {
                fetched: 50,
                expected: 500,
                ..
            })
        ));
        assert!(matches!(
            check_plausibility(&g, 0, None, 0.5),
            Err(ReconcileError::EmptySource { .. })
        ));
        assert!(check_plausibility(&g, 250, Some(500), 0.5).is_ok());
        assert!(check_plausibility(&g, 399, Some(500), 0.8).is_err());
        assert!(check_plausibility(&g, 3, None, 0.5).is_ok());
    }
}
