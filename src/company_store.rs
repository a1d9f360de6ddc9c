//! Session cache of companies, kept in sync with the remote record store.
//!
//! The cache only ever changes in response to a confirmed remote call: a
//! successful `select_all` replaces it, a successful `insert` appends to it,
//! a successful `update_partial` is merged into it and a successful `remove`
//! drops from it. The one exception is [`CompanyStore::get_by_id`], which may
//! schedule a background load when the cache is cold.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{Company, CompanyPatch, NewCompany};
use crate::record_store::RecordStore;
use crate::scoring::ScoringEngine;

/// Synchronization state of the cache, as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing has been loaded yet.
    Cold,
    /// A load is in flight.
    Loading,
    /// The last load succeeded.
    Ready,
    /// The last load failed; the cache was emptied. Sticky until a load succeeds.
    Failed(String),
}

/// Result of a [`CompanyStore::load`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { count: usize },
    /// Another load was already running; this call did nothing.
    AlreadyInFlight,
    Failed { error: String },
}

/// Result of a [`CompanyStore::get_by_id`] lookup.
#[derive(Debug)]
pub enum Lookup {
    Found(Company),
    /// The cache is cold and being populated. Holds the handle of the load
    /// this lookup scheduled, or `None` if a load was already running.
    Loading(Option<JoinHandle<LoadOutcome>>),
    Missing,
}

/// A confirmed write, replayed over the snapshot of a load that was in
/// flight when the write landed.
#[derive(Debug, Clone)]
enum CacheWrite {
    Upsert(Company),
    Remove(Uuid),
}

impl CacheWrite {
    fn apply(self, companies: &mut Vec<Company>) {
        match self {
            CacheWrite::Upsert(company) => {
                match companies.iter_mut().find(|c| c.id == company.id) {
                    Some(existing) => *existing = company,
                    None => companies.push(company),
                }
            }
            CacheWrite::Remove(id) => companies.retain(|c| c.id != id),
        }
    }
}

struct Inner {
    records: Arc<dyn RecordStore>,
    collection: String,
    cache: RwLock<Vec<Company>>,
    load_in_flight: AtomicBool,
    /// Set once any load has finished, successfully or not.
    primed: AtomicBool,
    load_error: RwLock<Option<String>>,
    /// Open while a load is running. Always locked after `cache`.
    writes_during_load: Mutex<Option<Vec<CacheWrite>>>,
    status: watch::Sender<SyncStatus>,
}

/// Releases the load slot when dropped, including on cancellation.
struct LoadGuard {
    inner: Arc<Inner>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        *self.inner.writes_during_load.lock() = None;
        self.inner.load_in_flight.store(false, Ordering::Release);
    }
}

/// Single source of truth for the company collection within a session.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct CompanyStore {
    inner: Arc<Inner>,
}

impl CompanyStore {
    pub fn new(records: Arc<dyn RecordStore>, collection: impl Into<String>) -> Self {
        let (status, _) = watch::channel(SyncStatus::Cold);
        Self {
            inner: Arc::new(Inner {
                records,
                collection: collection.into(),
                cache: RwLock::new(Vec::new()),
                load_in_flight: AtomicBool::new(false),
                primed: AtomicBool::new(false),
                load_error: RwLock::new(None),
                writes_during_load: Mutex::new(None),
                status,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Snapshot of the cached collection.
    pub fn companies(&self) -> Vec<Company> {
        self.inner.cache.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cache.read().is_empty()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Error of the last failed load, cleared by the next successful one.
    pub fn load_error(&self) -> Option<String> {
        self.inner.load_error.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.load_in_flight.load(Ordering::Acquire)
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    fn cached(&self, id: Uuid) -> Option<Company> {
        self.inner.cache.read().iter().find(|c| c.id == id).cloned()
    }

    fn is_cold(&self) -> bool {
        !self.inner.primed.load(Ordering::Acquire) && self.is_empty()
    }

    /// Records a confirmed write for the load in flight, if any. Callers hold
    /// the cache write lock.
    fn journal(&self, write: CacheWrite) {
        if let Some(writes) = self.inner.writes_during_load.lock().as_mut() {
            writes.push(write);
        }
    }

    fn try_claim_load(&self) -> Option<LoadGuard> {
        self.inner
            .load_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(LoadGuard {
            inner: self.inner.clone(),
        })
    }

    /// Replaces the cache with the full collection from the store.
    ///
    /// Does nothing if a load is already running. Failures are absorbed: the
    /// cache is emptied and the sticky load error is set.
    pub async fn load(&self) -> LoadOutcome {
        let Some(guard) = self.try_claim_load() else {
            tracing::debug!("Load of '{}' already in flight, skipping", self.collection());
            return LoadOutcome::AlreadyInFlight;
        };
        self.inner.status.send_replace(SyncStatus::Loading);
        self.run_load(guard).await
    }

    async fn run_load(&self, guard: LoadGuard) -> LoadOutcome {
        let collection = self.collection();
        tracing::info!("Loading collection '{}'", collection);
        *self.inner.writes_during_load.lock() = Some(Vec::new());

        let outcome = match self.inner.records.select_all(collection).await {
            Ok(records) => {
                let mut companies = Vec::with_capacity(records.len());
                for record in records {
                    match Company::from_record(record) {
                        Ok(company) => companies.push(company),
                        Err(e) => tracing::warn!("Skipping undecodable record in '{}': {}", collection, e),
                    }
                }
                let count = {
                    let mut cache = self.inner.cache.write();
                    let writes = self.inner.writes_during_load.lock().take();
                    for write in writes.unwrap_or_default() {
                        write.apply(&mut companies);
                    }
                    *cache = companies;
                    cache.len()
                };
                *self.inner.load_error.write() = None;
                self.inner.status.send_replace(SyncStatus::Ready);

                tracing::info!("Loaded {} companies from '{}'", count, collection);
                LoadOutcome::Loaded { count }
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!("Failed to load '{}': {}", collection, error);

                {
                    let mut cache = self.inner.cache.write();
                    self.inner.writes_during_load.lock().take();
                    cache.clear();
                }
                *self.inner.load_error.write() = Some(error.clone());
                self.inner.status.send_replace(SyncStatus::Failed(error.clone()));

                LoadOutcome::Failed { error }
            }
        };

        self.inner.primed.store(true, Ordering::Release);
        drop(guard);
        outcome
    }

    /// Looks up a cached company without waiting on the store.
    ///
    /// On a miss against a cold cache, schedules one background load and
    /// returns its handle. Must be called from within a tokio runtime for the
    /// load to be scheduled.
    pub fn get_by_id(&self, id: Uuid) -> Lookup {
        if let Some(company) = self.cached(id) {
            return Lookup::Found(company);
        }
        if !self.is_cold() {
            return Lookup::Missing;
        }

        let Some(guard) = self.try_claim_load() else {
            return Lookup::Loading(None);
        };
        self.schedule_cold_load(id, guard)
    }

    fn schedule_cold_load(&self, id: Uuid, guard: LoadGuard) -> Lookup {
        // A load may have finished between the cold check and the claim.
        if self.inner.primed.load(Ordering::Acquire) {
            drop(guard);
            return match self.cached(id) {
                Some(company) => Lookup::Found(company),
                None => Lookup::Missing,
            };
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!("Cache miss for {} on cold cache, scheduling load", id);
                self.inner.status.send_replace(SyncStatus::Loading);
                let store = self.clone();
                Lookup::Loading(Some(
                    runtime.spawn(async move { store.run_load(guard).await }),
                ))
            }
            Err(_) => {
                tracing::warn!("No runtime available to load '{}'", self.collection());
                drop(guard);
                Lookup::Missing
            }
        }
    }

    /// Scores and persists a new company, then caches the stored record.
    pub async fn create(&self, input: NewCompany) -> Result<Company, AppError> {
        let score = ScoringEngine::score_inputs(&input.metrics);
        let record = input.to_record(&score)?;

        let stored = self
            .inner
            .records
            .insert(self.collection(), record)
            .await
            .with_context(|| format!("Failed to create company '{}'", input.name))?;
        let company = Company::from_record(stored).context("Store returned an invalid company")?;

        {
            let mut cache = self.inner.cache.write();
            cache.push(company.clone());
            self.journal(CacheWrite::Upsert(company.clone()));
        }

        tracing::info!(
            "✓ Created company {} ({}) score {:.2} {}",
            company.id,
            company.name,
            company.final_score,
            company.score_color
        );
        Ok(company)
    }

    /// Applies a partial update, rescoring only if a scoring input changed.
    ///
    /// The cache is left untouched unless the store confirms the write.
    pub async fn update(&self, id: Uuid, patch: CompanyPatch) -> Result<Company, AppError> {
        let current = self
            .cached(id)
            .ok_or_else(|| AppError::NotFound(format!("Company {} not found", id)))?;

        let mut working = current.clone();
        patch.apply_to(&mut working);

        let score = if patch.changes_scoring_inputs(&current.metrics) {
            let score = ScoringEngine::score(&working);
            tracing::debug!(
                "Rescored company {}: {:.2} {} -> {:.2} {}",
                id,
                current.final_score,
                current.score_color,
                score.final_score,
                score.score_color
            );
            score
        } else {
            current.score()
        };

        let fields = patch.to_record(&score)?;
        let response = self
            .inner
            .records
            .update_partial(self.collection(), id, fields)
            .await
            .with_context(|| format!("Failed to update company {}", id))?;

        let mut cache = self.inner.cache.write();
        match cache.iter_mut().find(|c| c.id == id) {
            Some(cached) => {
                let merged = cached.merged_with(&response)?;
                *cached = merged.clone();
                self.journal(CacheWrite::Upsert(merged.clone()));
                tracing::info!("✓ Updated company {}", id);
                Ok(merged)
            }
            None => {
                tracing::warn!("Company {} left the cache while its update was in flight", id);
                working.merged_with(&response)
            }
        }
    }

    /// Deletes a company remotely, then drops it from the cache.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.cached(id).is_none() {
            return Err(AppError::NotFound(format!("Company {} not found", id)));
        }

        self.inner
            .records
            .remove(self.collection(), id)
            .await
            .with_context(|| format!("Failed to delete company {}", id))?;

        {
            let mut cache = self.inner.cache.write();
            cache.retain(|c| c.id != id);
            self.journal(CacheWrite::Remove(id));
        }

        tracing::info!("✓ Deleted company {}", id);
        Ok(())
    }
}
