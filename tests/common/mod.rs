//! Shared test doubles.
#![allow(dead_code)]

use async_trait::async_trait;
use rust_pipeline_api::errors::AppError;
use rust_pipeline_api::models::NewCompany;
use rust_pipeline_api::record_store::{MemoryRecordStore, Record, RecordStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Record store over [`MemoryRecordStore`] that counts calls and can be told
/// to fail or to stall.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryRecordStore,
    pub select_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    pub fail_select: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_remove: AtomicBool,
    /// Milliseconds `select_all` sleeps between taking its snapshot and answering.
    pub select_delay_ms: AtomicUsize,
    /// Fields of the last `update_partial` call.
    pub last_update: parking_lot::Mutex<Option<Record>>,
}

fn unavailable() -> AppError {
    AppError::RemoteUnavailable("simulated outage".to_string())
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selects(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_select(&self, fail: bool) {
        self.fail_select.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub fn set_select_delay(&self, delay: Duration) {
        self.select_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        // Snapshot first, so writes during the delay are missing from it.
        let snapshot = self.inner.select_all(collection).await;
        let delay = self.select_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        snapshot
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, AppError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.insert(collection, record).await
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock() = Some(fields.clone());
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.update_partial(collection, id, fields).await
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.remove(collection, id).await
    }
}

/// A candidate with every metric filled in and a perfect score.
pub fn strong_company(name: &str) -> NewCompany {
    let mut input = NewCompany {
        name: name.to_string(),
        sector: "Tecnologia".to_string(),
        cnpj: "12345678000190".to_string(),
        ..Default::default()
    };
    input.metrics.ebitda_2023 = Some(18.0);
    input.metrics.ebitda_2024 = Some(20.0);
    input.metrics.ebitda_2025 = Some(22.0);
    input.metrics.yoy_growth_21_22 = Some(17.0);
    input.metrics.yoy_growth_22_23 = Some(18.0);
    input.metrics.yoy_growth_23_24 = Some(19.0);
    input.metrics.annual_revenue_2024 = Some(120_000_000.0);
    input.metrics.leverage = Some(40.0);
    input
}

/// A candidate with only the required fields.
pub fn bare_company(name: &str) -> NewCompany {
    NewCompany {
        name: name.to_string(),
        sector: "Varejo".to_string(),
        cnpj: "98765432000110".to_string(),
        ..Default::default()
    }
}
