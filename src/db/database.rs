use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::KvRow;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (\
                scope TEXT NOT NULL,\
                key TEXT NOT NULL,\
                value TEXT NOT NULL,\
                updated_at TEXT NOT NULL,\
                PRIMARY KEY(scope, key)\
            );",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get_value(&self, scope: &str, key: &str) -> Result<Option<KvRow>> {
        let row = sqlx::query_as::<_, KvRow>(
            "SELECT scope, key, value, updated_at FROM kv_store WHERE scope = ? AND key = ?",
        )
        .bind(scope)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_value(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (scope, key, value, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn temp_database() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("forge.db").display());
    let db = Database::init(&url).await.unwrap();
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_are_scoped_and_upserted() {
        let (_dir, db) = temp_database().await;
        db.health_check().await.unwrap();

        db.set_value("chat:1", "forge_roster", "[]").await.unwrap();
        db.set_value("chat:2", "forge_roster", "[1]").await.unwrap();
        db.set_value("chat:1", "forge_roster", "[2]").await.unwrap();

        let row = db.get_value("chat:1", "forge_roster").await.unwrap().unwrap();
        assert_eq!(row.value, "[2]");
        assert_eq!(row.scope, "chat:1");
        let other = db.get_value("chat:2", "forge_roster").await.unwrap().unwrap();
        assert_eq!(other.value, "[1]");
        assert!(db.get_value("chat:3", "forge_roster").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creates_the_database_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.db");
        let url = format!("sqlite://{}", path.display());
        Database::init(&url).await.unwrap();
        assert!(path.exists());
    }
}
