use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;
use crate::record_store::{Record, RecordStore};

/// Record store speaking the PostgREST dialect (Supabase and friends).
///
/// Collections map to tables under `{base_url}/rest/v1/`.
#[derive(Clone)]
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    /// Creates a new `RestRecordStore`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL of the PostgREST deployment, without `/rest/v1`.
    /// * `api_key` - Key sent as both `apikey` and bearer token.
    /// * `timeout` - Per-request timeout; an expired request is reported as
    ///   [`AppError::RemoteUnavailable`].
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Failed to create REST store client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn table_url(&self, collection: &str, params: &[(&str, String)]) -> Result<reqwest::Url, AppError> {
        let base = format!("{}/rest/v1/{}", self.base_url, collection);
        let url = if params.is_empty() {
            reqwest::Url::parse(&base)
        } else {
            reqwest::Url::parse_with_params(&base, params.iter().map(|(k, v)| (*k, v.as_str())))
        };
        url.map_err(|e| AppError::RemoteUnavailable(format!("Failed to build URL: {}", e)))
    }

    fn request(&self, method: Method, url: reqwest::Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Sends a request and decodes the JSON array PostgREST answers with.
    async fn send_for_rows(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Vec<Record>, AppError> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("{} request failed: {}", action, e)))?;

        let response = ensure_success(response, action).await?;

        let rows: Vec<Value> = response.json().await.map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to parse {} response: {}", action, e))
        })?;

        rows.into_iter()
            .map(|row| match row {
                Value::Object(record) => Ok(record),
                other => Err(AppError::InternalError(format!(
                    "{} returned a non-object row: {}",
                    action, other
                ))),
            })
            .collect()
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!("REST store {} returned {}: {}", action, status, error_text);

    Err(AppError::RemoteUnavailable(format!(
        "{} returned {}: {}",
        action, status, error_text
    )))
}

fn single_row(mut rows: Vec<Record>, not_found: impl FnOnce() -> String) -> Result<Record, AppError> {
    if rows.is_empty() {
        return Err(AppError::NotFound(not_found()));
    }
    Ok(rows.swap_remove(0))
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn select_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        let url = self.table_url(collection, &[("select", "*".to_string())])?;
        tracing::debug!("Selecting all rows from {}", collection);

        self.send_for_rows(self.request(Method::GET, url), "select").await
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, AppError> {
        record.remove("id");
        let url = self.table_url(collection, &[])?;
        tracing::debug!("Inserting row into {}", collection);

        let rows = self
            .send_for_rows(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(&record),
                "insert",
            )
            .await?;

        single_row(rows, || format!("Insert into {} returned no row", collection))
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: Uuid,
        fields: Record,
    ) -> Result<Record, AppError> {
        let url = self.table_url(collection, &[("id", format!("eq.{}", id))])?;
        tracing::debug!("Patching row {} in {}", id, collection);

        let rows = self
            .send_for_rows(
                self.request(Method::PATCH, url)
                    .header("Prefer", "return=representation")
                    .json(&fields),
                "update",
            )
            .await?;

        single_row(rows, || format!("Record {} not found in {}", id, collection))
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        let url = self.table_url(collection, &[("id", format!("eq.{}", id))])?;
        tracing::debug!("Deleting row {} from {}", id, collection);

        let rows = self
            .send_for_rows(
                self.request(Method::DELETE, url)
                    .header("Prefer", "return=representation"),
                "delete",
            )
            .await?;

        single_row(rows, || format!("Record {} not found in {}", id, collection)).map(|_| ())
    }
}
