use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    QueryBuilder, Row,
};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    Direction, Document, DocumentStore, Fields, Filter, Query, WriteOp,
};

/// SQLite-backed document store. Every document is one row holding its fields as JSON;
/// filters and ordering go through `json_extract`.
pub struct SqliteStore {
    pool: SqlitePool,
    max_in_values: usize,
}

/// JSON path for a top-level field. Field names are restricted so they can be
/// embedded in a path without quoting.
fn json_path(field: &str) -> AppResult<String> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(format!("$.{}", field))
    } else {
        Err(AppError::BadRequest(format!("invalid field name {:?}", field)))
    }
}

fn parse_data(collection: &str, id: &str, raw: &str) -> AppResult<Fields> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::DatabaseError(format!(
            "{}/{} does not hold a JSON object",
            collection, id
        ))),
        Err(e) => Err(AppError::DatabaseError(format!(
            "{}/{} holds invalid JSON: {}",
            collection, id, e
        ))),
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Bool(b) => {
            qb.push_bind(*b as i64);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else {
                qb.push_bind(n.as_f64().unwrap_or(0.0));
            }
        }
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

impl SqliteStore {
    pub async fn connect(url: &str, max_in_values: usize) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid sqlite url {}: {}", url, e)))?
            .create_if_missing(true);

        // Each in-memory connection is its own database, so keep exactly one alive.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e))
        })?;

        let store = Self {
            pool,
            max_in_values: max_in_values.max(1),
        };
        store.initialize().await?;
        info!(url, "sqlite document store ready");
        Ok(store)
    }

    pub async fn new_in_memory(max_in_values: usize) -> AppResult<Self> {
        Self::connect("sqlite::memory:", max_in_values).await
    }

    /// Create the documents table if it does not exist yet.
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create documents table: {}", e)))?;

        Ok(())
    }

    fn build_select(query: &Query) -> AppResult<QueryBuilder<'_, Sqlite>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, data FROM documents WHERE collection = ");
        qb.push_bind(query.collection.clone());

        for filter in &query.filters {
            let path = json_path(filter.field())?;
            match filter {
                Filter::Eq(_, Value::Null) => {
                    qb.push(" AND json_extract(data, ");
                    qb.push_bind(path);
                    qb.push(") IS NULL");
                }
                Filter::Eq(_, value) => {
                    qb.push(" AND json_extract(data, ");
                    qb.push_bind(path);
                    qb.push(") = ");
                    push_value(&mut qb, value);
                }
                Filter::In(_, values) if values.is_empty() => {
                    qb.push(" AND 0");
                }
                Filter::In(_, values) => {
                    qb.push(" AND json_extract(data, ");
                    qb.push_bind(path);
                    qb.push(") IN (");
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            qb.push(", ");
                        }
                        push_value(&mut qb, value);
                    }
                    qb.push(")");
                }
            }
        }

        if let Some(order) = &query.order_by {
            let dir = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            qb.push(" ORDER BY json_extract(data, ");
            qb.push_bind(json_path(&order.field)?);
            qb.push(format!(") {}, id {}", dir, dir));
        }

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        Ok(qb)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to get {}/{}: {}", collection, id, e))
            })?;

        match row {
            Some(row) => {
                let raw: String = row.get("data");
                Ok(Some(Document::new(id, parse_data(collection, id, &raw)?)))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> AppResult<()> {
        let raw = Value::Object(data).to_string();
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?) \
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
        )
        .bind(collection)
        .bind(id)
        .bind(raw)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::WriteFailed(format!("Failed to set {}/{}: {}", collection, id, e)))?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::WriteFailed(format!("Failed to begin transaction: {}", e))
        })?;

        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::WriteFailed(format!("Failed to read {}/{}: {}", collection, id, e))
            })?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
        };
        let raw: String = row.get("data");
        let mut data = parse_data(collection, id, &raw)?;
        for (key, value) in fields {
            data.insert(key, value);
        }

        sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
            .bind(Value::Object(data).to_string())
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::WriteFailed(format!("Failed to update {}/{}: {}", collection, id, e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::WriteFailed(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::WriteFailed(format!("Failed to delete {}/{}: {}", collection, id, e))
            })?;
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
        let path = json_path(field)?;
        // Single statement, so concurrent increments serialize inside SQLite.
        let result = sqlx::query(
            "UPDATE documents \
             SET data = json_set(data, ?, COALESCE(json_extract(data, ?), 0) + ?) \
             WHERE collection = ? AND id = ?",
        )
        .bind(&path)
        .bind(&path)
        .bind(delta)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::WriteFailed(format!(
                "Failed to increment {} on {}/{}: {}",
                field, collection, id, e
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
        }
        debug!(collection, id, field, delta, "sqlite increment");
        Ok(())
    }

    async fn query(&self, query: Query) -> AppResult<Vec<Document>> {
        query.check_in_limit(self.max_in_values)?;

        let mut qb = Self::build_select(&query)?;
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to query {}: {}", query.collection, e))
            })?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.get("id");
                let raw: String = row.get("data");
                let data = parse_data(&query.collection, &id, &raw)?;
                Ok(Document::new(id, data))
            })
            .collect()
    }

    async fn list_ids(&self, collection: &str) -> AppResult<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list {}: {}", collection, e)))?;
        Ok(rows.into_iter().map(|row| row.get::<String, _>("id")).collect())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::WriteFailed(format!("Failed to begin transaction: {}", e))
        })?;

        for op in writes {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?) \
                         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
                    )
                    .bind(&collection)
                    .bind(&id)
                    .bind(Value::Object(data).to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::WriteFailed(format!("Failed to set {}/{}: {}", collection, id, e))
                    })?;
                }
                WriteOp::Delete { collection, id } => {
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(&collection)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| {
                            AppError::WriteFailed(format!(
                                "Failed to delete {}/{}: {}",
                                collection, id, e
                            ))
                        })?;
                }
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::WriteFailed(format!("Failed to commit transaction: {}", e))
        })
    }

    fn max_in_values(&self) -> usize {
        self.max_in_values
    }
}
