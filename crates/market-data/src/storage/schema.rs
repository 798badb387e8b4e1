//! 레지스트리 스키마 초기화.
//!
//! 모든 문장은 `IF NOT EXISTS`로 작성되어 여러 번 실행해도 안전합니다.
//! `asset_group` 컬럼이 없는 이전 버전 DB는 컬럼을 추가해 엽니다.
//! 멤버십 테이블 도입 이전 DB는 `asset_group` 값으로 엣지를 채운 뒤 엽니다.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::Result;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS asset_metadata (
        symbol TEXT PRIMARY KEY,
        name TEXT,
        asset_type TEXT NOT NULL DEFAULT 'stock',
        asset_group TEXT,
        exchange TEXT,
        sector TEXT,
        industry TEXT,
        currency TEXT DEFAULT 'USD',
        timeframe TEXT DEFAULT '1d',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_asset_type ON asset_metadata(asset_type)",
    "CREATE INDEX IF NOT EXISTS idx_asset_active ON asset_metadata(is_active)",
    r#"
    CREATE TABLE IF NOT EXISTS price_data (
        symbol TEXT NOT NULL,
        date DATE NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        adj_close REAL NOT NULL,
        volume INTEGER NOT NULL,
        source TEXT DEFAULT 'yfinance',
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (symbol, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_price_symbol ON price_data(symbol)",
    r#"
    CREATE TABLE IF NOT EXISTS index_memberships (
        symbol TEXT NOT NULL,
        asset_group TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (symbol, asset_group),
        FOREIGN KEY (symbol) REFERENCES asset_metadata(symbol)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_memberships_group ON index_memberships(asset_group, is_active)",
];

/// 이전 버전 asset_metadata에 없을 수 있는 컬럼
const UPGRADE_COLUMNS: &[(&str, &str)] = &[
    ("asset_group", "TEXT"),
    ("exchange", "TEXT"),
    ("sector", "TEXT"),
    ("timeframe", "TEXT DEFAULT '1d'"),
];

/// 스키마 생성 및 업그레이드
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for stmt in CREATE_STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }

    for (column, definition) in UPGRADE_COLUMNS {
        if !has_column(pool, "asset_metadata", column).await? {
            info!(column, "asset_metadata 컬럼 추가");
            let stmt = format!("ALTER TABLE asset_metadata ADD COLUMN {} {}", column, definition);
            sqlx::query(&stmt).execute(pool).await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_asset_group ON asset_metadata(asset_group)")
        .execute(pool)
        .await?;

    backfill_memberships(pool).await?;

    debug!("스키마 초기화 완료");
    Ok(())
}

/// `asset_metadata.asset_group` 값으로 누락된 그룹 멤버십 엣지를 채움.
///
/// 이미 있는 엣지는 건드리지 않으므로 반복 실행해도 기존 상태가 바뀌지 않습니다.
pub async fn backfill_memberships(pool: &SqlitePool) -> Result<u64> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO index_memberships (symbol, asset_group, is_active) \
         SELECT symbol, lower(trim(asset_group)), is_active FROM asset_metadata \
         WHERE asset_group IS NOT NULL AND trim(asset_group) <> ''",
    )
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!(inserted, "그룹 멤버십 백필 완료");
    }
    Ok(inserted)
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DatabaseConfig};

    #[tokio::test]
    async fn test_init_schema_idempotent() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        init_schema(db.pool()).await.unwrap();
        init_schema(db.pool()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, vec!["asset_metadata", "index_memberships", "price_data"]);
    }

    #[tokio::test]
    async fn test_upgrades_legacy_asset_table() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        sqlx::query(
            "CREATE TABLE asset_metadata (symbol TEXT PRIMARY KEY, name TEXT, asset_type TEXT, \
             is_active INTEGER DEFAULT 1, created_at TIMESTAMP, updated_at TIMESTAMP)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        init_schema(db.pool()).await.unwrap();

        for (column, _) in UPGRADE_COLUMNS {
            assert!(has_column(db.pool(), "asset_metadata", column).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_memberships_from_legacy_rows() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        sqlx::query(
            "CREATE TABLE asset_metadata (symbol TEXT PRIMARY KEY, name TEXT, asset_type TEXT, \
             asset_group TEXT, is_active INTEGER DEFAULT 1, created_at TIMESTAMP, updated_at TIMESTAMP)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO asset_metadata (symbol, asset_type, asset_group, is_active) VALUES \
             ('AAPL', 'stock', 'sp500', 1), ('GONE', 'stock', 'sp500', 1), \
             ('ADS.DE', 'stock', ' DAX ', 0), ('GC=F', 'commodity', NULL, 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        init_schema(db.pool()).await.unwrap();

        let edges: Vec<(String, String, bool)> = sqlx::query_as(
            "SELECT symbol, asset_group, is_active FROM index_memberships ORDER BY symbol",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(
            edges,
            vec![
                ("AAPL".to_string(), "sp500".to_string(), true),
                ("ADS.DE".to_string(), "dax".to_string(), false),
                ("GONE".to_string(), "sp500".to_string(), true),
            ]
        );

        // 이후 엣지 변경은 다시 부트스트랩해도 유지
        sqlx::query("UPDATE index_memberships SET is_active = 0 WHERE symbol = 'GONE'")
            .execute(db.pool())
            .await
            .unwrap();
        init_schema(db.pool()).await.unwrap();
        let gone: bool = sqlx::query_scalar(
            "SELECT is_active FROM index_memberships WHERE symbol = 'GONE'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert!(!gone);
    }
}
