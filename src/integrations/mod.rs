//! Record store integrations.

use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::BreakerRecordStore;
use crate::config::{Config, StoreBackend};
use crate::db::Database;
use crate::db_storage::PgRecordStore;
use crate::record_store::{MemoryRecordStore, RecordStore};
use crate::rest_store::RestRecordStore;

pub mod record_store {
    pub use crate::record_store::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod rest_store {
    pub use crate::rest_store::*;
}

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}

/// Builds the record store selected by the configuration.
///
/// Remote backends are wrapped in a circuit breaker.
pub async fn connect_record_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match &config.backend {
        StoreBackend::Postgres { database_url } => {
            let db = Database::new(database_url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(BreakerRecordStore::new(PgRecordStore::new(db.pool)))
        }
        StoreBackend::Rest { base_url, api_key } => {
            let client = RestRecordStore::new(
                base_url.clone(),
                api_key.clone(),
                Duration::from_secs(config.store_timeout_secs),
            )?;
            tracing::info!("✓ REST record store initialized: {}", base_url);
            Arc::new(BreakerRecordStore::new(client))
        }
        StoreBackend::Memory => Arc::new(MemoryRecordStore::new()),
    };
    Ok(store)
}
