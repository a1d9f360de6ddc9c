use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::company_store::{CompanyStore, LoadOutcome, Lookup, SyncStatus};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Company, CompanyPatch, NewCompany, ScoringInputs};
use crate::scoring::{ScoreBreakdown, ScoringEngine};
use crate::validation::{validate_new_company, validate_patch};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session cache of companies, synchronized with the record store.
    pub store: CompanyStore,
    /// Application configuration.
    pub config: Config,
}

/// Routes of the company API, without middleware.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/companies",
            get(list_companies).post(create_company),
        )
        .route("/api/v1/companies/load", post(load_companies))
        .route(
            "/api/v1/companies/:id",
            get(get_company)
                .patch(update_company)
                .delete(delete_company),
        )
        .route("/api/v1/companies/:id/score", get(company_score))
        .route("/api/v1/score", post(preview_score))
}

/// Cached collection together with its synchronization state.
#[derive(Debug, Serialize)]
pub struct CompanyListResponse {
    pub companies: Vec<Company>,
    pub status: SyncStatus,
    /// Set while the last load failed, so clients can offer a retry.
    pub load_error: Option<String>,
}

/// Health check endpoint.
///
/// Returns the service status, version and the cache synchronization state.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-pipeline-api",
            "version": env!("CARGO_PKG_VERSION"),
            "store": state.config.backend.name(),
            "sync": state.store.status(),
        })),
    )
}

/// GET /api/v1/companies
pub async fn list_companies(State(state): State<Arc<AppState>>) -> Json<CompanyListResponse> {
    Json(CompanyListResponse {
        companies: state.store.companies(),
        status: state.store.status(),
        load_error: state.store.load_error(),
    })
}

/// POST /api/v1/companies/load
///
/// Reloads the cache from the record store. Load failures are reported in the
/// body, not as an error status.
pub async fn load_companies(State(state): State<Arc<AppState>>) -> Json<LoadOutcome> {
    tracing::info!("POST /companies/load");
    Json(state.store.load().await)
}

/// POST /api/v1/companies
pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    let input = validate_new_company(input)?;
    tracing::info!("POST /companies - {} ({})", input.name, input.cnpj);

    let company = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/v1/companies/:id
///
/// Answers from the cache. A miss against a cold cache starts a load and
/// returns 202 so the client can poll.
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.store.get_by_id(id) {
        Lookup::Found(company) => Ok(Json(company).into_response()),
        Lookup::Loading(_) => Ok(loading_response()),
        Lookup::Missing => Err(AppError::NotFound(format!("Company {} not found", id))),
    }
}

/// PATCH /api/v1/companies/:id
pub async fn update_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CompanyPatch>,
) -> Result<Json<Company>, AppError> {
    let patch = validate_patch(patch)?;
    tracing::info!("PATCH /companies/{}", id);

    let company = state.store.update(id, patch).await?;
    Ok(Json(company))
}

/// DELETE /api/v1/companies/:id
pub async fn delete_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /companies/{}", id);

    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/companies/:id/score
///
/// Explains the score of a cached company criterion by criterion.
pub async fn company_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.store.get_by_id(id) {
        Lookup::Found(company) => {
            Ok(Json(ScoringEngine::breakdown(&company.metrics)).into_response())
        }
        Lookup::Loading(_) => Ok(loading_response()),
        Lookup::Missing => Err(AppError::NotFound(format!("Company {} not found", id))),
    }
}

/// POST /api/v1/score
///
/// Scores metrics that have not been saved, for live feedback in forms.
pub async fn preview_score(Json(inputs): Json<ScoringInputs>) -> Json<ScoreBreakdown> {
    Json(ScoringEngine::breakdown(&inputs))
}

fn loading_response() -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "loading",
            "message": "Company cache is being loaded, retry shortly",
        })),
    )
        .into_response()
}
