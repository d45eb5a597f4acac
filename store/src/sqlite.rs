//! SqliteStore
//! -----------
//! SQLite-backed implementation of [`PriceStore`]. Each gateway primitive gets
//! its own table so the Redis-style key contract maps onto plain rows:
//!
//!  - `scalars`     one row per key (prices)
//!  - `list_items`  append-only rows ordered by `seq` (price history)
//!  - `set_members` one row per (key, member) (observer mirror, investor ids)
//!  - `hash_fields` one row per (key, field) (investor records)
use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{info, instrument};

use crate::keys::resolve_range;
use crate::{GatewayResult, PriceStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. Call [`SqliteStore::migrate`] before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and ensure the schema exists.
    #[instrument(target = "store")]
    pub async fn connect(url: &str) -> GatewayResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        info!("sqlite store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> GatewayResult<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS scalars (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS list_items (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  key TEXT NOT NULL,
  value TEXT NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS set_members (
  key TEXT NOT NULL,
  member TEXT NOT NULL,
  PRIMARY KEY (key, member)
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS hash_fields (
  key TEXT NOT NULL,
  field TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (key, field)
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_list_items_key ON list_items(key, seq);"#)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn get_scalar(&self, key: &str) -> GatewayResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM scalars WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_scalar(&self, key: &str, value: &str) -> GatewayResult<()> {
        sqlx::query(
            r#"
INSERT INTO scalars (key, value) VALUES (?, ?)
ON CONFLICT(key) DO UPDATE SET value = excluded.value;
"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_to_list(&self, key: &str, value: &str) -> GatewayResult<()> {
        sqlx::query("INSERT INTO list_items (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn range_list(&self, key: &str, start: i64, end: i64) -> GatewayResult<Vec<String>> {
        let rows = sqlx::query("SELECT value FROM list_items WHERE key = ? ORDER BY seq ASC")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        let values: Vec<String> = rows.iter().map(|r| r.get("value")).collect();

        Ok(resolve_range(values.len(), start, end)
            .map(|r| values[r].to_vec())
            .unwrap_or_default())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> GatewayResult<bool> {
        let res = sqlx::query("INSERT OR IGNORE INTO set_members (key, member) VALUES (?, ?)")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> GatewayResult<bool> {
        let res = sqlx::query("DELETE FROM set_members WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn list_set_members(&self, key: &str) -> GatewayResult<Vec<String>> {
        let rows = sqlx::query("SELECT member FROM set_members WHERE key = ? ORDER BY member ASC")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("member")).collect())
    }

    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> GatewayResult<()> {
        let mut tx = self.pool.begin().await?;

        for (field, value) in fields {
            sqlx::query(
                r#"
INSERT INTO hash_fields (key, field, value) VALUES (?, ?, ?)
ON CONFLICT(key, field) DO UPDATE SET value = excluded.value;
"#,
            )
            .bind(key)
            .bind(*field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> GatewayResult<HashMap<String, String>> {
        let rows = sqlx::query("SELECT field, value FROM hash_fields WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("field"), r.get::<String, _>("value")))
            .collect())
    }
}
