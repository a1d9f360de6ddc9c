use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as _;
use failsafe::{backoff, failure_policy, Config, Error, StateMachine};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;
use crate::record_store::{Record, RecordStore};

pub type StoreCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for record store calls to prevent cascading failures.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if service recovered.
pub fn create_store_circuit_breaker() -> StoreCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Only transport failures count against the breaker; a missing record is a
/// healthy answer.
fn is_store_failure(err: &AppError) -> bool {
    err.is_remote_unavailable()
}

fn unwrap_breaker_error(err: Error<AppError>) -> AppError {
    match err {
        Error::Inner(e) => e,
        Error::Rejected => {
            tracing::warn!("Record store circuit is open, rejecting call");
            AppError::RemoteUnavailable("Record store circuit open".to_string())
        }
    }
}

/// Wraps a record store so that repeated transport failures fail fast.
///
/// Calls are never retried.
pub struct BreakerRecordStore<S> {
    inner: S,
    breaker: StoreCircuitBreaker,
}

impl<S: RecordStore> BreakerRecordStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            breaker: create_store_circuit_breaker(),
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for BreakerRecordStore<S> {
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        self.breaker
            .call_with(is_store_failure, self.inner.select_all(collection))
            .await
            .map_err(unwrap_breaker_error)
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, AppError> {
        self.breaker
            .call_with(is_store_failure, self.inner.insert(collection, record))
            .await
            .map_err(unwrap_breaker_error)
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError> {
        self.breaker
            .call_with(
                is_store_failure,
                self.inner.update_partial(collection, id, fields),
            )
            .await
            .map_err(unwrap_breaker_error)
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        self.breaker
            .call_with(is_store_failure, self.inner.remove(collection, id))
            .await
            .map_err(unwrap_breaker_error)
    }
}
