//! Company Pipeline Scoring Library
//!
//! This library provides the core functionality for the company pipeline
//! service: the scoring engine that rates investment candidates from sparse
//! financial metrics, the company store that keeps a session cache in sync
//! with a remote record store, the record store adapters, and the HTTP
//! handlers exposing them.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: Record store adapters.
//! - `circuit_breaker`: Circuit breaker around record store calls.
//! - `company_store`: Session cache and CRUD orchestration.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `db_storage`: Postgres record store.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `record_store`: Record store interface and in-memory implementation.
//! - `rescore`: Repair of persisted score fields.
//! - `rest_store`: PostgREST record store.
//! - `scoring`: Weighted fitness scoring.
//! - `validation`: HTTP input validation.

pub mod api;
pub mod core;
pub mod integrations;

pub mod circuit_breaker;
pub mod company_store;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod record_store;
pub mod rescore;
pub mod rest_store;
pub mod scoring;
pub mod validation;
