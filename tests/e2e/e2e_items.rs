use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use items_client::{ApiErrorKind, CapturingReport, ItemsClient};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

#[derive(Debug, serde::Deserialize)]
struct CreateParams {
    name: String,
}

#[derive(Clone, Default)]
struct AppState {
    next_id: Arc<AtomicU64>,
}

#[tokio::test]
async fn e2e_create_item_roundtrip() {
    let server = TestServer::start(items_app()).await;
    let client = ItemsClient::new().base_url(server.base());

    let payload = client
        .create_item("hello")
        .await
        .expect("creation should succeed against a live server");

    assert_eq!(payload, json!({"id": 1, "name": "hello"}));
}

#[tokio::test]
async fn e2e_trigger_reports_created_payload() {
    let server = TestServer::start(items_app()).await;
    let report = CapturingReport::new();
    let client = ItemsClient::new()
        .base_url(server.base())
        .report(report.clone());

    client
        .trigger_default()
        .await
        .expect("trigger task should not panic");

    let created = report.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["name"], "hello");
    assert!(report.failures().is_empty());
}

#[tokio::test]
async fn e2e_server_error_is_reported_as_status_failure() {
    let server = TestServer::start(failing_app()).await;
    let report = CapturingReport::new();
    let client = ItemsClient::new()
        .base_url(server.base())
        .report(report.clone());

    client
        .trigger_default()
        .await
        .expect("trigger task should not panic");

    assert!(report.created().is_empty());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), ApiErrorKind::Status);
    assert_eq!(failures[0].status_code(), Some(500));
}

#[tokio::test]
async fn e2e_connection_refused_is_reported_as_connect_failure() {
    // Bind to grab a free port, then drop the listener so nothing answers.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let base = Url::parse(&format!("http://{addr}")).expect("probe url");
    let report = CapturingReport::new();
    let client = ItemsClient::new().base_url(base).report(report.clone());

    client
        .trigger_default()
        .await
        .expect("trigger task should not panic");

    assert!(report.created().is_empty());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), ApiErrorKind::Connect);
}

fn items_app() -> Router {
    Router::new()
        .route("/items", post(create_item_handler))
        .with_state(AppState::default())
}

fn failing_app() -> Router {
    Router::new().route(
        "/items",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "item store offline") }),
    )
}

async fn create_item_handler(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
) -> Json<Value> {
    let id = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({"id": id, "name": params.name}))
}

struct TestServer {
    base_url: String,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, task }
    }

    fn base(&self) -> Url {
        Url::parse(&self.base_url).expect("test server url")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
