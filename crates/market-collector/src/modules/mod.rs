//! Collector 작업 모듈.

pub mod asset_admin;
pub mod index_sync;
pub mod reconcile;

pub use asset_admin::{
    add_asset, group_overview, list_assets, migrate_memberships, remove_asset, GroupOverview,
    RemoveOutcome,
};
pub use index_sync::{
    build_fetcher, sync_indices, GroupOutcome, GroupReport, SyncOptions, SyncRunReport, SyncTotals,
};
pub use reconcile::{
    check_plausibility, ConstituencyReconciler, ReconcileError, ReconcileOptions,
    ReconcileOutcome, ReconciliationPlan,
};
