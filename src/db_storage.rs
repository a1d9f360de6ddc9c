use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::record_store::{Record, RecordStore};

/// Columns owned by the table rather than the jsonb document.
const SERVER_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Record {
        let mut record = match self.data {
            Value::Object(map) => map,
            other => {
                tracing::warn!("Record {} holds non-object data: {}", self.id, other);
                Record::new()
            }
        };
        record.insert("id".to_string(), json!(self.id));
        record.insert("created_at".to_string(), json!(self.created_at));
        record.insert("updated_at".to_string(), json!(self.updated_at));
        record
    }
}

fn document(mut record: Record) -> Value {
    for field in SERVER_FIELDS {
        record.remove(field);
    }
    Value::Object(record)
}

/// Record store over a Postgres jsonb document table (`core.records`).
///
/// Partial updates are jsonb merges, so fields absent from an update keep
/// their stored value and fields sent as `null` are cleared.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, data, created_at, updated_at
            FROM core.records
            WHERE collection = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to select records from '{}'", collection))?;

        Ok(rows.into_iter().map(RecordRow::into_record).collect())
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO core.records (collection, data)
            VALUES ($1, $2)
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(collection)
        .bind(document(record))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert record into '{}'", collection))?;

        tracing::debug!("Inserted record {} into '{}'", row.id, collection);
        Ok(row.into_record())
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            UPDATE core.records
            SET data = data || $3,
                updated_at = now()
            WHERE collection = $1 AND id = $2
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(document(fields))
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update record {} in '{}'", id, collection))?
        .ok_or_else(|| AppError::NotFound(format!("Record {} not found in {}", id, collection)))?;

        Ok(row.into_record())
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM core.records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete record {} from '{}'", id, collection))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Record {} not found in {}",
                id, collection
            )));
        }

        Ok(())
    }
}
