//! 자산 레지스트리.
//!
//! 그룹 소속은 `index_memberships`의 (symbol, asset_group) 엣지로 관리합니다.
//! 한 심볼이 여러 지수에 동시에 속할 수 있으며 (예: AAPL은 S&P 500과 Nasdaq 100),
//! `asset_metadata.asset_group`은 화면 표시용 대표 그룹으로만 유지됩니다.
//!
//! 모든 변경은 심볼 단위 트랜잭션이며, `price_data`는 `purge_asset` 외에는
//! 절대 건드리지 않습니다.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{AssetGroup, AssetRecord, AssetType, NewAsset};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::error::{DataError, Result};
use crate::storage::schema;

/// `upsert_active` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 자산 레코드 신규 생성
    Created,
    /// 기존 자산에 이 그룹 엣지를 새로 연결
    Linked,
    /// 비활성 엣지(또는 비활성 자산)를 다시 활성화
    Reactivated,
    /// 이미 활성 상태
    Unchanged,
}

/// 그룹 소속 읽기/쓰기 인터페이스.
///
/// 단일 동기화 실행 동안 최소 read-committed 일관성을 제공해야 합니다.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// 그룹에 활성 상태로 속한 심볼
    async fn read_active(&self, group: &AssetGroup) -> Result<BTreeSet<String>>;

    /// 그룹에 한 번이라도 속했던 심볼 (활성/비활성 포함)
    async fn read_all(&self, group: &AssetGroup) -> Result<BTreeSet<String>>;

    /// 심볼을 그룹의 활성 구성종목으로 만듦 (없으면 생성)
    async fn upsert_active(
        &self,
        symbol: &str,
        group: &AssetGroup,
        asset_type: AssetType,
    ) -> Result<UpsertOutcome>;

    /// 심볼의 그룹 소속을 비활성화. 엣지가 바뀌었으면 `true`.
    async fn deactivate(&self, symbol: &str, group: &AssetGroup) -> Result<bool>;
}

/// 자산 목록 필터
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    /// 이 그룹의 구성종목만
    pub group: Option<AssetGroup>,
    /// 활성 자산만 (그룹 지정 시 활성 엣지만)
    pub active_only: bool,
}

/// 수동 등록 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    Reactivated,
    AlreadyActive,
}

/// 영구 삭제 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub symbol: String,
    pub price_rows: u64,
    pub memberships: u64,
}

/// 그룹별 구성종목 수
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct GroupCount {
    pub asset_group: String,
    pub active: i64,
    pub total: i64,
}

/// asset_metadata DB 레코드
#[derive(Debug, Clone, FromRow)]
struct AssetRow {
    symbol: String,
    name: Option<String>,
    asset_type: Option<String>,
    asset_group: Option<String>,
    exchange: Option<String>,
    sector: Option<String>,
    is_active: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl AssetRow {
    fn into_record(self) -> AssetRecord {
        let asset_type = match self.asset_type.as_deref().map(str::parse::<AssetType>) {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                debug!(symbol = %self.symbol, error = %e, "알 수 없는 자산 유형, stock으로 처리");
                AssetType::Stock
            }
            None => AssetType::Stock,
        };
        AssetRecord {
            asset_group: self
                .asset_group
                .as_deref()
                .and_then(|g| AssetGroup::new(g).ok()),
            symbol: self.symbol,
            name: self.name,
            asset_type,
            exchange: self.exchange,
            sector: self.sector,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ASSET_COLUMNS: &str =
    "symbol, name, asset_type, asset_group, exchange, sector, is_active, created_at, updated_at";

/// SQLite 기반 자산 레지스트리
#[derive(Debug, Clone)]
pub struct SqliteAssetRegistry {
    pool: SqlitePool,
}

impl SqliteAssetRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 심볼로 자산 조회
    pub async fn get_asset(&self, symbol: &str) -> Result<Option<AssetRecord>> {
        let sql = format!("SELECT {} FROM asset_metadata WHERE symbol = ?", ASSET_COLUMNS);
        let row: Option<AssetRow> = sqlx::query_as(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AssetRow::into_record))
    }

    /// 필터 조건으로 자산 목록 조회 (심볼 순)
    pub async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<AssetRecord>> {
        let sql = format!(
            "SELECT {} FROM asset_metadata a \
             WHERE (?1 IS NULL OR EXISTS ( \
                 SELECT 1 FROM index_memberships m \
                 WHERE m.symbol = a.symbol AND m.asset_group = ?1 \
                   AND (m.is_active = 1 OR ?2 = 0))) \
               AND (?2 = 0 OR a.is_active = 1) \
             ORDER BY a.symbol",
            ASSET_COLUMNS
        );
        let rows: Vec<AssetRow> = sqlx::query_as(&sql)
            .bind(filter.group.as_ref().map(AssetGroup::as_str))
            .bind(filter.active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AssetRow::into_record).collect())
    }

    /// 자산 수동 등록. 비활성 자산이면 다시 활성화합니다.
    pub async fn add_asset(&self, asset: &NewAsset) -> Result<AddOutcome> {
        if asset.symbol.trim().is_empty() {
            return Err(DataError::Validation("심볼이 비어 있습니다".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let existing = fetch_state(&mut tx, &asset.symbol).await?;

        let outcome = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO asset_metadata \
                     (symbol, asset_type, name, sector, exchange, asset_group, timeframe, is_active) \
                     VALUES (?, ?, ?, ?, ?, ?, '1d', 1)",
                )
                .bind(&asset.symbol)
                .bind(asset.asset_type.as_str())
                .bind(asset.name.as_deref())
                .bind(asset.sector.as_deref())
                .bind(asset.exchange.as_deref())
                .bind(asset.group.as_ref().map(AssetGroup::as_str))
                .execute(&mut *tx)
                .await?;
                AddOutcome::Created
            }
            Some(state) if !state.is_active => {
                sqlx::query(
                    "UPDATE asset_metadata SET is_active = 1, updated_at = CURRENT_TIMESTAMP \
                     WHERE symbol = ?",
                )
                .bind(&asset.symbol)
                .execute(&mut *tx)
                .await?;
                AddOutcome::Reactivated
            }
            Some(_) => AddOutcome::AlreadyActive,
        };

        if let Some(group) = &asset.group {
            activate_edge(&mut tx, &asset.symbol, group).await?;
            sqlx::query(
                "UPDATE asset_metadata SET asset_group = ? \
                 WHERE symbol = ? AND (asset_group IS NULL OR asset_group = '')",
            )
            .bind(group.as_str())
            .bind(&asset.symbol)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// 자산의 모든 그룹 소속과 활성 상태를 해제. 가격 데이터는 유지됩니다.
    pub async fn deactivate_asset(&self, symbol: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        if fetch_state(&mut tx, symbol).await?.is_none() {
            return Err(DataError::NotFound(symbol.to_string()));
        }

        let edges = sqlx::query(
            "UPDATE index_memberships SET is_active = 0, updated_at = CURRENT_TIMESTAMP \
             WHERE symbol = ? AND is_active = 1",
        )
        .bind(symbol)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "UPDATE asset_metadata SET is_active = 0, updated_at = CURRENT_TIMESTAMP \
             WHERE symbol = ?",
        )
        .bind(symbol)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(edges)
    }

    /// 자산과 관련 가격 데이터, 그룹 소속을 영구 삭제.
    ///
    /// 되돌릴 수 없으므로 호출자가 명시적 확인을 받은 뒤에만 호출해야 합니다.
    pub async fn purge_asset(&self, symbol: &str) -> Result<PurgeReport> {
        let mut tx = self.pool.begin().await?;
        if fetch_state(&mut tx, symbol).await?.is_none() {
            return Err(DataError::NotFound(symbol.to_string()));
        }

        let price_rows = sqlx::query("DELETE FROM price_data WHERE symbol = ?")
            .bind(symbol)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let memberships = sqlx::query("DELETE FROM index_memberships WHERE symbol = ?")
            .bind(symbol)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM asset_metadata WHERE symbol = ?")
            .bind(symbol)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        warn!(symbol, price_rows, memberships, "자산 영구 삭제");
        Ok(PurgeReport {
            symbol: symbol.to_string(),
            price_rows,
            memberships,
        })
    }

    /// 심볼의 가격 데이터 행 수
    pub async fn price_row_count(&self, symbol: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM price_data WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 그룹별 활성/전체 구성종목 수
    pub async fn group_counts(&self) -> Result<Vec<GroupCount>> {
        let counts = sqlx::query_as(
            "SELECT asset_group, \
                    CAST(COALESCE(SUM(is_active), 0) AS INTEGER) AS active, \
                    COUNT(*) AS total \
             FROM index_memberships GROUP BY asset_group ORDER BY asset_group",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// 멤버십 테이블 도입 이전 DB의 `asset_group` 값으로 엣지를 채움.
    ///
    /// `init_schema`도 매번 호출하며, 이미 있는 엣지는 건드리지 않습니다.
    pub async fn backfill_memberships(&self) -> Result<u64> {
        schema::backfill_memberships(&self.pool).await
    }
}

#[async_trait]
impl AssetRegistry for SqliteAssetRegistry {
    async fn read_active(&self, group: &AssetGroup) -> Result<BTreeSet<String>> {
        let symbols: Vec<String> = sqlx::query_scalar(
            "SELECT symbol FROM index_memberships WHERE asset_group = ? AND is_active = 1",
        )
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(symbols.into_iter().collect())
    }

    async fn read_all(&self, group: &AssetGroup) -> Result<BTreeSet<String>> {
        let symbols: Vec<String> =
            sqlx::query_scalar("SELECT symbol FROM index_memberships WHERE asset_group = ?")
                .bind(group.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(symbols.into_iter().collect())
    }

    async fn upsert_active(
        &self,
        symbol: &str,
        group: &AssetGroup,
        asset_type: AssetType,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let asset = fetch_state(&mut tx, symbol).await?;
        let edge_active: Option<bool> = sqlx::query_scalar(
            "SELECT is_active FROM index_memberships WHERE symbol = ? AND asset_group = ?",
        )
        .bind(symbol)
        .bind(group.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match &asset {
            None => {
                sqlx::query(
                    "INSERT INTO asset_metadata (symbol, asset_type, asset_group, timeframe, is_active) \
                     VALUES (?, ?, ?, '1d', 1)",
                )
                .bind(symbol)
                .bind(asset_type.as_str())
                .bind(group.as_str())
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Created
            }
            Some(state) => {
                let keep_primary = match state.asset_group.as_deref() {
                    Some(current) if state.is_active && current != group.as_str() => {
                        primary_edge_active(&mut tx, symbol, current).await?
                    }
                    _ => false,
                };

                if keep_primary {
                    debug!(
                        symbol,
                        group = %group,
                        primary = state.asset_group.as_deref().unwrap_or_default(),
                        "보조 그룹 소속 추가, 대표 그룹 유지"
                    );
                } else if !state.is_active || state.asset_group.as_deref() != Some(group.as_str())
                {
                    if let Some(previous) = state
                        .asset_group
                        .as_deref()
                        .filter(|g| !g.is_empty() && *g != group.as_str())
                    {
                        warn!(symbol, from = previous, to = %group, "대표 그룹 변경");
                    }
                    sqlx::query(
                        "UPDATE asset_metadata \
                         SET is_active = 1, asset_group = ?, updated_at = CURRENT_TIMESTAMP \
                         WHERE symbol = ?",
                    )
                    .bind(group.as_str())
                    .bind(symbol)
                    .execute(&mut *tx)
                    .await?;
                }

                match edge_active {
                    None => UpsertOutcome::Linked,
                    Some(false) => UpsertOutcome::Reactivated,
                    Some(true) if !state.is_active => UpsertOutcome::Reactivated,
                    Some(true) => UpsertOutcome::Unchanged,
                }
            }
        };

        if edge_active != Some(true) {
            activate_edge(&mut tx, symbol, group).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn deactivate(&self, symbol: &str, group: &AssetGroup) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let changed = sqlx::query(
            "UPDATE index_memberships SET is_active = 0, updated_at = CURRENT_TIMESTAMP \
             WHERE symbol = ? AND asset_group = ? AND is_active = 1",
        )
        .bind(symbol)
        .bind(group.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if changed {
            let remaining: Option<String> = sqlx::query_scalar(
                "SELECT asset_group FROM index_memberships \
                 WHERE symbol = ? AND is_active = 1 \
                 ORDER BY updated_at DESC, asset_group ASC LIMIT 1",
            )
            .bind(symbol)
            .fetch_optional(&mut *tx)
            .await?;

            match remaining {
                None => {
                    sqlx::query(
                        "UPDATE asset_metadata SET is_active = 0, updated_at = CURRENT_TIMESTAMP \
                         WHERE symbol = ?",
                    )
                    .bind(symbol)
                    .execute(&mut *tx)
                    .await?;
                }
                Some(other) => {
                    // 다른 지수에 남아 있으면 활성 유지, 대표 그룹만 이동
                    sqlx::query(
                        "UPDATE asset_metadata SET asset_group = ?, updated_at = CURRENT_TIMESTAMP \
                         WHERE symbol = ? AND asset_group = ?",
                    )
                    .bind(&other)
                    .bind(symbol)
                    .bind(group.as_str())
                    .execute(&mut *tx)
                    .await?;
                    debug!(symbol, group = %group, remaining = %other, "다른 그룹 소속 유지");
                }
            }
        }

        tx.commit().await?;
        Ok(changed)
    }
}

/// 트랜잭션 안에서 읽은 자산 상태
struct AssetState {
    is_active: bool,
    asset_group: Option<String>,
}

async fn fetch_state(tx: &mut Transaction<'_, Sqlite>, symbol: &str) -> Result<Option<AssetState>> {
    let row: Option<(bool, Option<String>)> =
        sqlx::query_as("SELECT is_active, asset_group FROM asset_metadata WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(row.map(|(is_active, asset_group)| AssetState {
        is_active,
        asset_group,
    }))
}

async fn primary_edge_active(
    tx: &mut Transaction<'_, Sqlite>,
    symbol: &str,
    group: &str,
) -> Result<bool> {
    let active: Option<bool> = sqlx::query_scalar(
        "SELECT is_active FROM index_memberships WHERE symbol = ? AND asset_group = ?",
    )
    .bind(symbol)
    .bind(group)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(active.unwrap_or(false))
}

async fn activate_edge(
    tx: &mut Transaction<'_, Sqlite>,
    symbol: &str,
    group: &AssetGroup,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO index_memberships (symbol, asset_group, is_active) VALUES (?, ?, 1) \
         ON CONFLICT (symbol, asset_group) DO UPDATE \
         SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE is_active = 0",
    )
    .bind(symbol)
    .bind(group.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
