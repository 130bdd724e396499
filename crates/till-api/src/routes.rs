use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use till_core::models::{
    DeadLetter, NewSyncOperation, Product, Purchase, PurchaseEntry, Sale, SaleEntry, SyncOperation,
    User,
};
use till_core::{DrainReport, PushResponse, SyncService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::rate_limit::{device_fingerprint, PushRateLimiter, RateLimitMetricsSnapshot};

const DEVICE_ID_HEADER: &str = "x-device-id";
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    sync: SyncService,
    push_limiter: Arc<PushRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, sync: SyncService) -> Self {
        Self {
            push_limiter: Arc::new(PushRateLimiter::from_config(config.as_ref())),
            sync,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let sync_routes = Router::new()
        .route("/push", post(push))
        .route("/drain", post(drain))
        .route("/queue", get(list_queue))
        .route("/dead-letters", get(list_dead_letters))
        .route("/operations/{id}/requeue", post(requeue));

    let read_routes = Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/sales", get(list_sales))
        .route("/sales/{id}", get(get_sale))
        .route("/purchases", get(list_purchases))
        .route("/purchases/{id}", get(get_purchase));

    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/sync", sync_routes)
        .merge(read_routes)
        .layer(timeout_layer(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

/// Requests running past `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    queue_depth: usize,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let queue_depth = state.sync.database().queue_len().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        queue_depth,
        rate_limit: state.push_limiter.metrics_snapshot(),
    }))
}

/// Device id used for rate limiting: the header when sent, otherwise the
/// first envelope's device id.
fn push_device_id(headers: &HeaderMap, operations: &[NewSyncOperation]) -> String {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            operations
                .iter()
                .map(|operation| operation.device_id.trim())
                .find(|device_id| !device_id.is_empty())
        })
        .unwrap_or("anonymous")
        .to_string()
}

async fn push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Vec<NewSyncOperation>>, JsonRejection>,
) -> Result<Json<PushResponse>, AppError> {
    let Json(operations) =
        body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let device_id = push_device_id(&headers, &operations);
    state.push_limiter.check(&device_id).await?;

    let batch_size = operations.len();
    // The push runs detached so a client timeout can't abandon a drain midway
    let sync = state.sync.clone();
    let response = tokio::spawn(async move { sync.push(operations).await })
        .await
        .map_err(|error| AppError::internal(error.to_string()))??;

    tracing::info!(
        endpoint = "sync_push",
        device = device_fingerprint(&device_id),
        batch_size,
        failed = response.failed_operations.len(),
        "Processed device push"
    );
    Ok(Json(response))
}

async fn drain(State(state): State<AppState>) -> Result<Json<DrainReport>, AppError> {
    Ok(Json(state.sync.drain().await?))
}

async fn list_queue(State(state): State<AppState>) -> Result<Json<Vec<SyncOperation>>, AppError> {
    Ok(Json(state.sync.database().list_queue().await?))
}

async fn list_dead_letters(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeadLetter>>, AppError> {
    Ok(Json(state.sync.database().list_dead_letters().await?))
}

async fn requeue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncOperation>, AppError> {
    Ok(Json(state.sync.requeue(&id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Page {
    fn bounds(&self) -> (usize, usize) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or_default())
    }
}

fn found<T>(value: Option<T>, entity: &str, id: &str) -> Result<Json<T>, AppError> {
    value
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("{entity} {id}")))
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.sync.database().list_products().await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    found(state.sync.database().get_product(&id).await?, "product", &id)
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.sync.database().list_users().await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    found(state.sync.database().get_user(&id).await?, "user", &id)
}

async fn list_sales(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Sale>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.sync.database().list_sales(limit, offset).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleEntry>, AppError> {
    found(state.sync.database().get_sale(&id).await?, "sale", &id)
}

async fn list_purchases(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.sync.database().list_purchases(limit, offset).await?))
}

async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PurchaseEntry>, AppError> {
    found(state.sync.database().get_purchase(&id).await?, "purchase", &id)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use till_core::{DatabaseService, SyncSettings};
    use tower::ServiceExt;

    use super::*;

    fn test_config(push_limit: u32) -> Arc<AppConfig> {
        Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: PathBuf::from(":memory:"),
            request_timeout: Duration::from_secs(15),
            rate_limit_window: Duration::from_secs(60),
            push_rate_limit_per_window: push_limit,
            sync: SyncSettings::default(),
        })
    }

    async fn test_app(push_limit: u32) -> Router {
        let database = DatabaseService::open_in_memory().await.unwrap();
        let sync = SyncService::new(database, SyncSettings::default());
        app_router(AppState::new(test_config(push_limit), sync))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn product_push(version: i64, stock: i64) -> String {
        json!([{
            "id": format!("op-p1-{version}"),
            "entity_type": "product",
            "entity_id": "p1",
            "operation": "update",
            "payload": {"id": "p1", "name": "Rice", "price": 1.2, "stock": stock, "version": version},
            "device_id": "till-1"
        }])
        .to_string()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_queue_depth() {
        let app = test_app(10).await;
        let (status, body) = send(app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue_depth"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_applies_and_reports_ok() {
        let app = test_app(10).await;

        let (status, body) = send(app.clone(), "POST", "/sync/push", Some(&product_push(1, 5))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (status, body) = send(app, "GET", "/products/p1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"], 5);
        assert_eq!(body["version"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_reports_partial_fail() {
        let app = test_app(10).await;
        let batch = json!([{
            "id": "op-1",
            "entity_type": "sale",
            "payload": {"sale": {"id": "s1"}, "items": [{"product_id": "ghost", "quantity": 1, "price": 1.0}]},
            "device_id": "till-1"
        }])
        .to_string();

        let (status, body) = send(app.clone(), "POST", "/sync/push", Some(&batch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "partial_fail");
        assert_eq!(body["message"], "failed to process operations: [op-1]");
        assert_eq!(body["failed_operations"], json!(["op-1"]));

        let (_, queue) = send(app, "GET", "/sync/queue", None).await;
        assert_eq!(queue[0]["retry_count"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_push_is_bad_request() {
        let app = test_app(10).await;
        let (status, body) = send(app, "POST", "/sync/push", Some("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_is_rate_limited_per_device() {
        let app = test_app(1).await;

        let (status, _) = send(app.clone(), "POST", "/sync/push", Some(&product_push(1, 5))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(app, "POST", "/sync/push", Some(&product_push(2, 6))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].is_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_records_are_not_found() {
        let app = test_app(10).await;
        for uri in ["/products/nope", "/sales/nope", "/purchases/nope", "/users/nope"] {
            let (status, _) = send(app.clone(), "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (status, _) = send(app, "POST", "/sync/operations/nope/requeue", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_endpoint_returns_report() {
        let app = test_app(10).await;
        let (status, body) = send(app, "POST", "/sync/drain", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"applied": [], "deferred": [], "exhausted": []}));
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(timeout_layer(Duration::from_millis(20)));

        let (status, _) = send(app, "GET", "/slow", None).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn device_id_prefers_header() {
        let operations: Vec<NewSyncOperation> = serde_json::from_value(json!([
            {"id": "a", "entity_type": "product", "device_id": ""},
            {"id": "b", "entity_type": "product", "device_id": "till-9"}
        ]))
        .unwrap();

        assert_eq!(push_device_id(&HeaderMap::new(), &operations), "till-9");

        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, "till-2".parse().unwrap());
        assert_eq!(push_device_id(&headers, &operations), "till-2");
        assert_eq!(push_device_id(&HeaderMap::new(), &[]), "anonymous");
    }
}
