//! PostgreSQL document store.
//!
//! All collections share one table with a JSONB payload column.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use super::{Document, DocumentStore, merge_json};

/// Document store over a `flamelink_document` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: Value,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document::new(row.id, row.data)
    }
}

impl PgDocumentStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        info!(max_connections, "document store connected");
        Ok(Self::new(pool))
    }

    /// Create the document table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flamelink_document (
                collection VARCHAR(64) NOT NULL,
                id VARCHAR(255) NOT NULL,
                data JSONB NOT NULL,
                created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                changed TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create flamelink_document table")?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT data FROM flamelink_document WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to get document")
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM flamelink_document WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .context("failed to list documents")?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, data FROM flamelink_document
            WHERE collection = $1 AND data -> $2 = $3
            ORDER BY id
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .context("failed to query documents")?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flamelink_document (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = $3, changed = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to set document")?;

        debug!(collection = %collection, id = %id, "document written");
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let mut doc = sqlx::query_scalar::<_, Value>(
            "SELECT data FROM flamelink_document WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to lock document")?
        .unwrap_or_else(|| Value::Object(Default::default()));

        merge_json(&mut doc, patch);

        sqlx::query(
            r#"
            INSERT INTO flamelink_document (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = $3, changed = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&doc)
        .execute(&mut *tx)
        .await
        .context("failed to write merged document")?;

        tx.commit().await.context("failed to commit merge")?;

        debug!(collection = %collection, id = %id, "document merged");
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM flamelink_document WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete document")?;

        debug!(collection = %collection, id = %id, "document deleted");
        Ok(result.rows_affected() > 0)
    }
}

impl std::fmt::Debug for PgDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDocumentStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}
