//! 영속 저장소.

pub mod asset_registry;
pub mod schema;

pub use asset_registry::{
    AddOutcome, AssetFilter, AssetRegistry, GroupCount, PurgeReport, SqliteAssetRegistry,
    UpsertOutcome,
};
pub use schema::{backfill_memberships, init_schema};
