//! 여러 지수 그룹을 순서대로 동기화.
//!
//! 그룹 하나의 수집 실패나 비정상 소스는 그 그룹만 건너뛰고 나머지를 계속
//! 처리합니다. 결과는 [`SyncRunReport`]로 모아 종료 코드와 요약 출력에 씁니다.

use std::time::{Duration, Instant};

use market_core::{AssetGroup, AssetType};
use market_data::provider::http_client;
use market_data::{
    AssetRegistry, FileListSource, MembershipFetcher, MembershipSource, RateLimiter, RetryConfig,
    StaticListSource, WikipediaTableSource,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{BuiltinList, CollectorConfig, IndexGroupConfig, ReconcileConfig, SourceConfig};
use crate::modules::reconcile::{
    ConstituencyReconciler, ReconcileError, ReconcileOptions, ReconciliationPlan,
};
use crate::stats::ReconcileSummary;
use crate::Result;

/// 다중 그룹 실행 옵션
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 계획만 계산
    pub dry_run: bool,
    /// 예상 구성종목 수 검증 생략 (빈 소스는 여전히 거부)
    pub allow_partial: bool,
    pub min_source_ratio: f64,
    pub default_asset_type: AssetType,
}

impl SyncOptions {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            dry_run: false,
            allow_partial: false,
            min_source_ratio: config.min_source_ratio,
            default_asset_type: config.default_asset_type,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }
}

/// 그룹 하나의 처리 결과
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// 변경 적용 완료
    Applied {
        plan: ReconciliationPlan,
        summary: ReconcileSummary,
    },
    /// dry run 계획
    Planned { plan: ReconciliationPlan },
    /// 비정상 소스로 건너뜀 (변경 없음)
    Skipped { reason: String },
    /// 구성종목 수집 실패
    FetchFailed { error: String },
    /// 레지스트리 조회 실패
    StorageFailed { error: String },
}

/// 그룹 리포트
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: AssetGroup,
    pub name: String,
    /// 소스가 반환한 심볼 수
    pub fetched: usize,
    #[serde(flatten)]
    pub outcome: GroupOutcome,
}

impl GroupReport {
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            GroupOutcome::FetchFailed { .. } | GroupOutcome::StorageFailed { .. } => true,
            GroupOutcome::Applied { summary, .. } => summary.error_count() > 0,
            _ => false,
        }
    }

    pub fn plan(&self) -> Option<&ReconciliationPlan> {
        match &self.outcome {
            GroupOutcome::Applied { plan, .. } | GroupOutcome::Planned { plan } => Some(plan),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&ReconcileSummary> {
        match &self.outcome {
            GroupOutcome::Applied { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// 전체 실행 합계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub added: usize,
    pub reactivated: usize,
    pub deactivated: usize,
    pub errors: usize,
    pub failed_groups: usize,
    pub skipped_groups: usize,
}

/// 다중 그룹 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunReport {
    pub dry_run: bool,
    pub groups: Vec<GroupReport>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncRunReport {
    pub fn totals(&self) -> SyncTotals {
        let mut totals = SyncTotals::default();
        for report in &self.groups {
            match &report.outcome {
                GroupOutcome::Applied { summary, .. } => {
                    totals.added += summary.added;
                    totals.reactivated += summary.reactivated;
                    totals.deactivated += summary.deactivated;
                    totals.errors += summary.error_count();
                }
                GroupOutcome::Skipped { .. } => totals.skipped_groups += 1,
                GroupOutcome::FetchFailed { .. } | GroupOutcome::StorageFailed { .. } => {
                    totals.failed_groups += 1
                }
                GroupOutcome::Planned { .. } => {}
            }
        }
        totals
    }

    /// 수집 실패 그룹이나 심볼 단위 실패가 없으면 `true`.
    /// 비정상 소스로 건너뛴 그룹은 경고로만 취급합니다.
    pub fn exit_ok(&self) -> bool {
        !self.groups.iter().any(GroupReport::is_failure)
    }

    pub fn log_summary(&self) {
        let totals = self.totals();
        info!(
            groups = self.groups.len(),
            added = totals.added,
            reactivated = totals.reactivated,
            deactivated = totals.deactivated,
            errors = totals.errors,
            failed_groups = totals.failed_groups,
            skipped_groups = totals.skipped_groups,
            dry_run = self.dry_run,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "지수 구성종목 동기화 종료"
        );
    }
}

/// 설정된 그룹 소스로 fetcher 구성
pub fn build_fetcher(config: &CollectorConfig) -> Result<MembershipFetcher> {
    let client = http_client(config.http.timeout(), &config.http.user_agent)?;
    let mut fetcher = MembershipFetcher::new(
        RateLimiter::new(config.http.fetch_interval()),
        RetryConfig::with_max_retries(config.http.max_retries),
    );

    for group in &config.groups {
        let source: Box<dyn MembershipSource> = match &group.source {
            SourceConfig::Wikipedia {
                url,
                columns,
                table_index,
                normalizer,
            } => Box::new(
                WikipediaTableSource::new(
                    client.clone(),
                    url.clone(),
                    columns.clone(),
                    normalizer.clone(),
                )
                .with_table_index(*table_index),
            ),
            SourceConfig::Static {
                symbols,
                normalizer,
            } => Box::new(
                StaticListSource::new(format!("static:{}", group.id), symbols.iter().cloned())
                    .with_normalizer(normalizer.clone()),
            ),
            SourceConfig::File { path, normalizer } => {
                Box::new(FileListSource::new(path.clone(), normalizer.clone()))
            }
            SourceConfig::Builtin {
                list: BuiltinList::Dax40,
            } => Box::new(StaticListSource::dax40()),
        };
        fetcher.register(group.id.clone(), source);
    }

    Ok(fetcher)
}

/// 그룹을 순서대로 동기화
pub async fn sync_indices<R>(
    registry: &R,
    fetcher: &MembershipFetcher,
    groups: &[IndexGroupConfig],
    options: &SyncOptions,
) -> SyncRunReport
where
    R: AssetRegistry + ?Sized,
{
    let start = Instant::now();
    let mut reports = Vec::with_capacity(groups.len());

    info!(
        groups = groups.len(),
        dry_run = options.dry_run,
        "지수 구성종목 동기화 시작"
    );

    for group in groups {
        let report = sync_group(registry, fetcher, group, options).await;
        reports.push(report);
    }

    let report = SyncRunReport {
        dry_run: options.dry_run,
        groups: reports,
        elapsed: start.elapsed(),
    };
    report.log_summary();
    report
}

async fn sync_group<R>(
    registry: &R,
    fetcher: &MembershipFetcher,
    group: &IndexGroupConfig,
    options: &SyncOptions,
) -> GroupReport
where
    R: AssetRegistry + ?Sized,
{
    let name = group.display_name().to_string();
    let report = |fetched: usize, outcome: GroupOutcome| GroupReport {
        group: group.id.clone(),
        name: name.clone(),
        fetched,
        outcome,
    };

    let snapshot = match fetcher.fetch_membership(&group.id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(group = %group.id, error = %e, "구성종목 수집 실패");
            return report(
                0,
                GroupOutcome::FetchFailed {
                    error: e.to_string(),
                },
            );
        }
    };
    let fetched = snapshot.len();

    let reconciler = ConstituencyReconciler::new(
        registry,
        ReconcileOptions {
            min_source_ratio: options.min_source_ratio,
            asset_type: group.asset_type_or(options.default_asset_type),
            dry_run: options.dry_run,
        },
    );
    let expected = if options.allow_partial {
        None
    } else {
        group.expected_count
    };

    match reconciler.reconcile(&snapshot, expected).await {
        Ok(outcome) if outcome.dry_run => report(fetched, GroupOutcome::Planned { plan: outcome.plan }),
        Ok(outcome) => {
            outcome.summary.log_summary(group.id.as_str());
            report(
                fetched,
                GroupOutcome::Applied {
                    plan: outcome.plan,
                    summary: outcome.summary,
                },
            )
        }
        Err(ReconcileError::Storage(e)) => {
            error!(group = %group.id, error = %e, "레지스트리 조회 실패");
            report(
                fetched,
                GroupOutcome::StorageFailed {
                    error: e.to_string(),
                },
            )
        }
        Err(e) => {
            warn!(group = %group.id, error = %e, "비정상 소스, 그룹 동기화 건너뜀");
            report(
                fetched,
                GroupOutcome::Skipped {
                    reason: e.to_string(),
                },
            )
        }
    }
}
