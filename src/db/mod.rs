//! Postgres connection pool and schema bootstrap for the pgmq backend.

pub mod files;
pub mod pgmq;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Make sure the pgmq extension and the attachment table exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pgmq")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS workitem_files (
                id BIGSERIAL PRIMARY KEY,
                workitem_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
