//! The persistence collaborator consumed by [`CompanyStore`](crate::company_store::CompanyStore).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::AppError;

/// A single stored record: a JSON object of field name to value.
pub type Record = Map<String, Value>;

/// Generic "create/read/update/delete records" interface of a remote store.
///
/// Implementations return records with their server-assigned fields (`id`,
/// `created_at`, `updated_at`) filled in. Transport failures are reported as
/// [`AppError::RemoteUnavailable`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches every record of a collection.
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError>;

    /// Inserts a record and returns the canonical stored version.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, AppError>;

    /// Merges `fields` into the record with `id` and returns the updated record.
    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError>;

    /// Deletes the record with `id`.
    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError>;
}

/// In-process record store.
///
/// Used as the `memory` backend for local runs and as the store behind tests.
/// Records keep insertion order within a collection.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn record_id(record: &Record) -> Option<Uuid> {
    record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, AppError> {
        let now = json!(Utc::now());
        record.insert("id".to_string(), json!(Uuid::new_v4()));
        record.insert("created_at".to_string(), now.clone());
        record.insert("updated_at".to_string(), now);

        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());

        Ok(record)
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError> {
        let mut collections = self.collections.write();
        let stored = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found in {}", id, collection)))?;

        for (key, value) in fields {
            if key != "id" && key != "created_at" {
                stored.insert(key, value);
            }
        }
        stored.insert("updated_at".to_string(), json!(Utc::now()));

        Ok(stored.clone())
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found in {}", id, collection)))?;

        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Err(AppError::NotFound(format!(
                "Record {} not found in {}",
                id, collection
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("name".to_string(), json!(name));
        r
    }

    #[tokio::test]
    async fn test_insert_assigns_server_fields() {
        let store = MemoryRecordStore::new();
        let created = store.insert("companies", record("Acme")).await.unwrap();

        assert!(record_id(&created).is_some());
        assert!(created.contains_key("created_at"));
        assert_eq!(store.count("companies"), 1);
        assert_eq!(store.count("other"), 0);
    }

    #[tokio::test]
    async fn test_update_partial_merges_fields() {
        let store = MemoryRecordStore::new();
        let created = store.insert("companies", record("Acme")).await.unwrap();
        let id = record_id(&created).unwrap();

        let mut fields = Record::new();
        fields.insert("sector".to_string(), json!("Agro"));
        let updated = store.update_partial("companies", id, fields).await.unwrap();

        assert_eq!(updated.get("name"), Some(&json!("Acme")));
        assert_eq!(updated.get("sector"), Some(&json!("Agro")));
        assert_eq!(record_id(&updated), Some(id));
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let store = MemoryRecordStore::new();
        store.insert("companies", record("Acme")).await.unwrap();

        let err = store
            .update_partial("companies", Uuid::new_v4(), Record::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store.remove("companies", Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.count("companies"), 1);
    }
}
