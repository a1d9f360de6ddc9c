/// Tests of the PostgREST record store against a mocked server.
/// Covers the request shapes and the mapping of remote answers onto AppError.
use rust_pipeline_api::company_store::{CompanyStore, LoadOutcome};
use rust_pipeline_api::record_store::{Record, RecordStore};
use rust_pipeline_api::rest_store::RestRecordStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE_PATH: &str = "/rest/v1/companies";

fn create_test_store(base_url: String) -> RestRecordStore {
    RestRecordStore::new(base_url, "test_key".to_string(), Duration::from_secs(2))
        .expect("client should build")
}

fn stored_row(id: Uuid, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "sector": "Tecnologia",
        "cnpj": "12345678000190",
        "ebitda_2024": 14.0,
        "final_score": 10.0,
        "score_color": "green",
        "created_at": "2024-05-01T12:00:00Z",
        "updated_at": "2024-05-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_select_all_sends_credentials() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .and(query_param("select", "*"))
        .and(header("apikey", "test_key"))
        .and(header("Authorization", "Bearer test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_row(id, "Acme")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let rows = store.select_all("companies").await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("Acme")));
}

#[tokio::test]
async fn test_insert_asks_for_representation() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(TABLE_PATH))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({"name": "Acme", "final_score": 10.0})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored_row(id, "Acme")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let mut record = Record::new();
    record.insert("name".to_string(), json!("Acme"));
    record.insert("final_score".to_string(), json!(10.0));

    let stored = store.insert("companies", record).await.unwrap();

    assert_eq!(stored.get("id"), Some(&json!(id)));
}

#[tokio::test]
async fn test_update_filters_by_id() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();
    let mut row = stored_row(id, "Renamed");
    row["final_score"] = json!(5.0);

    Mock::given(method("PATCH"))
        .and(path(TABLE_PATH))
        .and(query_param("id", format!("eq.{}", id)))
        .and(body_partial_json(json!({"name": "Renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let mut fields = Record::new();
    fields.insert("name".to_string(), json!("Renamed"));

    let updated = store.update_partial("companies", id, fields).await.unwrap();

    assert_eq!(updated.get("name"), Some(&json!("Renamed")));
    assert_eq!(updated.get("final_score"), Some(&json!(5.0)));
}

#[tokio::test]
async fn test_update_matching_no_row_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let err = store
        .update_partial("companies", Uuid::new_v4(), Record::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_filters_by_id() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path(TABLE_PATH))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_row(id, "Acme")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());

    assert!(store.remove("companies", id).await.is_ok());
}

#[tokio::test]
async fn test_server_error_is_remote_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is down"))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let err = store.select_all("companies").await.unwrap_err();

    assert!(err.is_remote_unavailable());
    assert!(err.to_string().contains("database is down"));
}

#[tokio::test]
async fn test_slow_server_times_out_as_remote_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let store = RestRecordStore::new(
        mock_server.uri(),
        "test_key".to_string(),
        Duration::from_millis(50),
    )
    .unwrap();
    let err = store.select_all("companies").await.unwrap_err();

    assert!(err.is_remote_unavailable());
}

#[tokio::test]
async fn test_company_store_loads_through_rest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            stored_row(Uuid::new_v4(), "Acme"),
            stored_row(Uuid::new_v4(), "Globex"),
        ])))
        .mount(&mock_server)
        .await;

    let records = Arc::new(create_test_store(mock_server.uri()));
    let store = CompanyStore::new(records, "companies");

    assert_eq!(store.load().await, LoadOutcome::Loaded { count: 2 });
    assert_eq!(store.companies()[1].name, "Globex");
}
