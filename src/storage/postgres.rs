//! Postgres storage backend
//!
//! Documents live in a single JSONB table keyed by (collection, id).
//! Schema is created lazily on first use; the atomic `update` takes a
//! row lock so concurrent appends to one conversation serialize.

use super::{assign_id, StorageClient, UpdateFn};
use crate::error::ServiceError;
use crate::Result;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;
use tracing::info;

pub struct PostgresStorage {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresStorage {
    /// Build a lazily-connecting pool. The first query connects.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| ServiceError::Storage(format!("Failed to build postgres pool: {}", e)))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS documents (
                      collection TEXT NOT NULL,
                      id TEXT NOT NULL,
                      doc JSONB NOT NULL,
                      PRIMARY KEY (collection, id)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_documents_conversation
                    ON documents (collection, (doc->>'conversation_id'));
                    "#,
                )
                .execute(&self.pool)
                .await?;

                info!("Document storage schema ready");
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                ServiceError::Storage(format!("Failed to initialize storage schema: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageClient for PostgresStorage {
    async fn insert(&self, collection: &str, mut doc: Value) -> Result<String> {
        self.ensure_schema().await?;
        let id = assign_id(&mut doc);

        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(format!("Failed to insert document: {}", e)))?;

        Ok(id)
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT doc FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(format!("Failed to load document: {}", e)))?;

        Ok(row.map(|r| r.get::<Value, _>("doc")))
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>> {
        self.ensure_schema().await?;

        let rows =
            sqlx::query("SELECT doc FROM documents WHERE collection = $1 AND doc->>$2 = $3")
                .bind(collection)
                .bind(field)
                .bind(value)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ServiceError::Storage(format!("Failed to query documents: {}", e)))?;

        Ok(rows.into_iter().map(|r| r.get::<Value, _>("doc")).collect())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        self.ensure_schema().await?;

        let rows = sqlx::query("SELECT doc FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(format!("Failed to list documents: {}", e)))?;

        Ok(rows.into_iter().map(|r| r.get::<Value, _>("doc")).collect())
    }

    async fn save(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET doc = EXCLUDED.doc
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::Storage(format!("Failed to save document: {}", e)))?;

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: UpdateFn,
    ) -> Result<Option<Value>> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            ServiceError::Storage(format!("Failed to begin update transaction: {}", e))
        })?;

        let row = sqlx::query(
            "SELECT doc FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ServiceError::Storage(format!("Failed to lock document: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut doc = row.get::<Value, _>("doc");
        mutate(&mut doc)?;

        sqlx::query("UPDATE documents SET doc = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| ServiceError::Storage(format!("Failed to write document: {}", e)))?;

        tx.commit().await.map_err(|e| {
            ServiceError::Storage(format!("Failed to commit update transaction: {}", e))
        })?;

        Ok(Some(doc))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(format!("Failed to delete document: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<u64> {
        self.ensure_schema().await?;

        let result =
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc->>$2 = $3")
                .bind(collection)
                .bind(field)
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    ServiceError::Storage(format!("Failed to delete documents: {}", e))
                })?;

        Ok(result.rows_affected())
    }
}
