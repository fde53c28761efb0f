// SQLite-backed policy document store.
//
// One row per guild: the key is the guild id as a string, the value is the
// encoded policy document. The core layer owns the document format; this
// store only moves strings in and out.

use crate::core::policy::{PolicyStore, PolicyStoreError};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqlitePolicyStore {
    pool: Pool<Sqlite>,
}

impl SqlitePolicyStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), PolicyStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_policies (
                guild_id TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> PolicyStoreError {
    PolicyStoreError::Unavailable(err.to_string())
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn load(&self, guild_id: u64) -> Result<Option<String>, PolicyStoreError> {
        let row = sqlx::query("SELECT record FROM guild_policies WHERE guild_id = ?")
            .bind(guild_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(row.map(|r| r.get("record")))
    }

    async fn save(&self, guild_id: u64, document: &str) -> Result<(), PolicyStoreError> {
        sqlx::query(
            r#"
            INSERT INTO guild_policies (guild_id, record)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                record = excluded.record
            "#,
        )
        .bind(guild_id.to_string())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}
