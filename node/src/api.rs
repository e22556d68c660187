//! # REST API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/`                    | Welcome banner                       |
//! | GET    | `/health`              | Liveness probe                       |
//! | GET    | `/status`              | Node status summary                  |
//! | GET    | `/transactions`        | Pending pool, in selection order     |
//! | GET    | `/transactions/:hash`  | Pending transaction by hash          |
//! | POST   | `/transactions`        | Submit a signed transaction          |
//! | POST   | `/canonicalize`        | Canonical body and hash of a payload |
//!
//! Responses to writes carry a numeric `code`: `0` on success, non-zero
//! with an `error` message otherwise.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use afan_protocol::network::{PoolError, TransactionPool};
use afan_protocol::transaction::{envelope_body, Transaction, TransactionError, TxEngine};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Identity address reported by `/status`.
    pub node_address: String,
    pub engine: TxEngine,
    pub pool: Arc<TransactionPool>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route(
            "/transactions",
            get(list_transactions_handler).post(submit_transaction_handler),
        )
        .route("/transactions/:hash", get(transaction_by_hash_handler))
        .route("/canonicalize", post(canonicalize_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub signing_algorithm: String,
    pub node_address: String,
    pub pool_size: usize,
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub code: u8,
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub hash: String,
    pub body: Value,
}

/// Generic error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u8,
    pub error: String,
}

/// Everything a handler can refuse a request with.
#[derive(Debug)]
enum ApiError {
    Structural(TransactionError),
    Pool(PoolError),
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Structural(_) => StatusCode::BAD_REQUEST,
            Self::Pool(PoolError::VerificationFailed { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Pool(PoolError::Duplicate { .. }) => StatusCode::CONFLICT,
            Self::Pool(PoolError::AddressLimitExceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Self::Pool(PoolError::PoolFull { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Structural(_) => 1,
            Self::Pool(PoolError::VerificationFailed { .. }) => 2,
            Self::Pool(PoolError::Duplicate { .. }) => 3,
            Self::Pool(_) => 4,
            Self::NotFound(_) => 5,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Structural(e) => e.to_string(),
            Self::Pool(e) => e.to_string(),
            Self::NotFound(hash) => format!("transaction not found: {}", hash),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn welcome_handler() -> &'static str {
    "Welcome to the AFAN ledger node!"
}

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        signing_algorithm: afan_protocol::config::SIGNING_ALGORITHM.to_string(),
        node_address: state.node_address.clone(),
        pool_size: state.pool.size(),
        submitted: state.metrics.transactions_submitted_total.get(),
        accepted: state.metrics.transactions_accepted_total.get(),
        rejected: state.metrics.transactions_rejected_total.get(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /transactions` — every pending transaction in wire form.
async fn list_transactions_handler(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.pool.transactions())
}

/// `GET /transactions/:hash`
async fn transaction_by_hash_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Transaction>, ApiError> {
    state
        .pool
        .get(&hash)
        .map(Json)
        .ok_or(ApiError::NotFound(hash))
}

/// `POST /transactions` — assembles, verifies and pools a signed transaction.
///
/// Structural problems are `400`; a transaction that fails verification is
/// `422`; one already pending is `409`.
async fn submit_transaction_handler(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let started = Instant::now();
    state.metrics.transactions_submitted_total.inc();

    let result = admit(&state, &raw);

    state
        .metrics
        .admission_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    state.metrics.transactions_in_pool.set(state.pool.size() as i64);

    match result {
        Ok(hash) => {
            state.metrics.transactions_accepted_total.inc();
            tracing::info!(%hash, "transaction accepted");
            Ok(Json(SubmitResponse { code: 0, hash }))
        }
        Err(e) => {
            state.metrics.transactions_rejected_total.inc();
            tracing::info!(error = %e.message(), "transaction rejected");
            Err(e)
        }
    }
}

fn admit(state: &AppState, raw: &Value) -> Result<String, ApiError> {
    let tx = state.engine.from_signed(raw).map_err(ApiError::Structural)?;
    let hash = tx.hash().to_string();
    state.pool.add(tx).map_err(ApiError::Pool)?;
    Ok(hash)
}

/// `POST /canonicalize` — accepts a bare body or a `{signature, transaction}`
/// envelope and returns what the hash is computed over.
async fn canonicalize_handler(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<CanonicalResponse>, ApiError> {
    let body = state
        .engine
        .canonicalize(envelope_body(&raw))
        .map_err(ApiError::Structural)?;
    Ok(Json(CanonicalResponse {
        hash: body.hash(),
        body: body.to_value(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use afan_protocol::crypto::LedgerKeypair;
    use afan_protocol::network::PoolConfig;
    use afan_protocol::transaction::{canonicalize, BodyBuilder, Operation};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app_state() -> AppState {
        let engine = TxEngine::default();
        AppState {
            version: "0.1.0-test".into(),
            node_address: LedgerKeypair::generate().address().to_string(),
            pool: Arc::new(TransactionPool::with_engine(
                PoolConfig::default(),
                engine.clone(),
            )),
            engine,
            metrics: Arc::new(crate::metrics::NodeMetrics::new().unwrap()),
        }
    }

    fn signed_tx(nonce: i64) -> Transaction {
        let body = BodyBuilder::new()
            .nonce(nonce)
            .operation(Operation::set_value("/a/b", json!(5)))
            .build();
        Transaction::create_at(&LedgerKeypair::generate(), &body, 1000).unwrap()
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, json).
    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn welcome_and_health() {
        let router = create_router(test_app_state());

        let (status, body) = get(&router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("Welcome"));

        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn submit_then_fetch() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let tx = signed_tx(0);

        let (status, body) = post_json(&router, "/transactions", tx.to_wire()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "code": 0, "hash": tx.hash() }));

        let (status, body) = get(&router, &format!("/transactions/{}", tx.hash())).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched, tx.to_wire());

        let (status, body) = get(&router, "/transactions").await;
        assert_eq!(status, StatusCode::OK);
        let all: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(all, json!([tx.to_wire()]));

        assert_eq!(state.metrics.transactions_accepted_total.get(), 1);
        assert_eq!(state.metrics.transactions_in_pool.get(), 1);
    }

    #[tokio::test]
    async fn duplicate_submission_conflicts() {
        let router = create_router(test_app_state());
        let tx = signed_tx(0);

        let (status, _) = post_json(&router, "/transactions", tx.to_wire()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(&router, "/transactions", tx.to_wire()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!(3));
    }

    #[tokio::test]
    async fn structural_error_is_bad_request() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let raw = json!({ "signature": "", "transaction": { "nonce": 0, "operation": {} } });

        let (status, body) = post_json(&router, "/transactions", raw).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!(1));
        assert!(body["error"].as_str().unwrap().contains("timestamp"));
        assert_eq!(state.metrics.transactions_rejected_total.get(), 1);
    }

    #[tokio::test]
    async fn tampered_transaction_is_unprocessable() {
        let router = create_router(test_app_state());
        let mut wire = signed_tx(0).to_wire();
        wire["operation"]["value"] = json!(6);

        let (status, body) = post_json(&router, "/transactions", wire).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!(2));
    }

    #[tokio::test]
    async fn wire_cannot_engage_skip_verif() {
        let router = create_router(test_app_state());
        let raw = json!({
            "signature": "",
            "transaction": {
                "nonce": 0,
                "timestamp": 0,
                "operation": { "type": "SET_OWNER", "ref": "/", "value": {} },
                "address": "0x09A0d53FDf1c36A131938eb379b98910e55EEfe1",
                "skip_verif": true
            }
        });
        let (status, _) = post_json(&router, "/transactions", raw).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/transactions/deadbeef").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], json!(5));
    }

    #[tokio::test]
    async fn canonicalize_strips_unknown_fields() {
        let router = create_router(test_app_state());
        let tx = signed_tx(4);
        let raw = json!({
            "signature": tx.signature(),
            "transaction": {
                "nonce": 4,
                "timestamp": 1000,
                "operation": { "type": "SET_VALUE", "ref": "/a/b", "value": 5, "extra": 1 },
                "note": "dropped"
            }
        });

        let (status, body) = post_json(&router, "/canonicalize", raw).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hash"], json!(tx.hash()));
        assert_eq!(body["body"], tx.body().to_value());
    }

    #[tokio::test]
    async fn canonicalize_and_submit_unwrap_envelopes_alike() {
        let router = create_router(test_app_state());
        let bare = json!({
            "nonce": 0,
            "timestamp": 1000,
            "operation": { "type": "GET_VALUE", "ref": "/" }
        });

        // A non-object `transaction` is still the body: both paths reject it.
        let mut listed = bare.clone();
        listed["transaction"] = json!([bare.clone()]);
        let (status, body) = post_json(&router, "/canonicalize", listed.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!(1));
        let (status, body) = post_json(&router, "/transactions", listed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!(1));

        // A falsy `transaction` means the payload itself is the body.
        let mut falsy = bare.clone();
        falsy["transaction"] = json!(0);
        let (status, body) = post_json(&router, "/canonicalize", falsy).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], canonicalize(&bare).unwrap().to_value());
    }

    #[tokio::test]
    async fn status_reports_counters() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let _ = post_json(&router, "/transactions", signed_tx(0).to_wire()).await;

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(status.pool_size, 1);
        assert_eq!(status.submitted, 1);
        assert_eq!(status.accepted, 1);
        assert_eq!(status.rejected, 0);
        assert_eq!(status.node_address, state.node_address);
    }
}
