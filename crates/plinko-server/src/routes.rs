//! HTTP routes for the query protocol
//!
//! Handlers never log a queried index, the indices of a SetParity request or
//! a full PRF key. No request tracing layer is installed for the same reason.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use plinko_core::{Error as CoreError, PRF_KEY_SIZE};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::metrics::{record_query, KIND_FULLSET, KIND_PLAINTEXT, KIND_SETPARITY};
use crate::state::ServerContext;

const SERVICE_NAME: &str = "plinko-pir-server";

/// Plaintext request (POST body)
#[derive(Debug, Deserialize)]
pub struct PlaintextRequest {
    pub index: u64,
}

/// Plaintext request (GET query string)
#[derive(Debug, Deserialize)]
pub struct PlaintextParams {
    pub index: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaintextResponse {
    pub value: u64,
    pub server_time_nanos: u64,
}

/// PRF key as sent by clients
///
/// A JSON array of byte values, or a string: `0x`-prefixed or 32-digit hex,
/// otherwise standard padded base64 (the encoding Go uses for `[]byte`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PrfKeyField {
    Bytes(Vec<u64>),
    Encoded(String),
}

impl PrfKeyField {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            PrfKeyField::Bytes(values) => values
                .iter()
                .map(|&v| {
                    u8::try_from(v).map_err(|_| {
                        ServerError::InvalidPrfKey(format!("byte value {v} out of range"))
                    })
                })
                .collect(),
            PrfKeyField::Encoded(s) => decode_key_string(s),
        }
    }
}

fn decode_key_string(s: &str) -> Result<Vec<u8>> {
    let invalid = |e: &dyn std::fmt::Display| ServerError::InvalidPrfKey(e.to_string());

    if let Some(digits) = s.strip_prefix("0x") {
        return hex::decode(digits).map_err(|e| invalid(&e));
    }
    if s.len() == 2 * PRF_KEY_SIZE && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(s).map_err(|e| invalid(&e));
    }
    B64.decode(s).map_err(|e| invalid(&e))
}

#[derive(Debug, Deserialize)]
pub struct FullSetRequest {
    pub prf_key: PrfKeyField,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FullSetResponse {
    pub value: u64,
    pub server_time_nanos: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetParityRequest {
    pub indices: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetParityResponse {
    pub parity: u64,
    pub server_time_nanos: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub db_size: u64,
    pub chunk_size: u64,
    pub set_size: u64,
}

/// Create the router
pub fn create_router(context: Arc<ServerContext>) -> Router {
    base_router()
        .with_state(context)
        .layer(cors_layer())
}

/// Create the router with a `/metrics` endpoint
pub fn create_router_with_metrics(context: Arc<ServerContext>, handle: PrometheusHandle) -> Router {
    base_router()
        .route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
        .with_state(context)
        .layer(cors_layer())
}

fn base_router() -> Router<Arc<ServerContext>> {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/query/plaintext",
            get(plaintext_get_handler).post(plaintext_post_handler),
        )
        .route("/query/fullset", post(fullset_handler))
        .route("/query/setparity", post(setparity_handler))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

async fn health_handler(State(ctx): State<Arc<ServerContext>>) -> Json<HealthResponse> {
    let params = ctx.params();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        db_size: params.db_size,
        chunk_size: params.chunk_size,
        set_size: params.set_size,
    })
}

async fn plaintext_get_handler(
    State(ctx): State<Arc<ServerContext>>,
    params: std::result::Result<Query<PlaintextParams>, QueryRejection>,
) -> Result<Json<PlaintextResponse>> {
    let Query(params) = params.map_err(|_| ServerError::InvalidQuery("invalid index".into()))?;
    let index = params
        .index
        .ok_or_else(|| ServerError::InvalidQuery("missing index parameter".into()))?;
    Ok(Json(plaintext(&ctx, index)))
}

async fn plaintext_post_handler(
    State(ctx): State<Arc<ServerContext>>,
    request: std::result::Result<Json<PlaintextRequest>, JsonRejection>,
) -> Result<Json<PlaintextResponse>> {
    let Json(request) = request.map_err(invalid_body)?;
    Ok(Json(plaintext(&ctx, request.index)))
}

fn plaintext(ctx: &ServerContext, index: u64) -> PlaintextResponse {
    let result = ctx.engine().plaintext_query(index);
    record_query(KIND_PLAINTEXT, result.elapsed);
    debug!(elapsed_ns = result.elapsed_nanos(), "Plaintext query");

    PlaintextResponse {
        value: result.value,
        server_time_nanos: result.elapsed_nanos(),
    }
}

async fn fullset_handler(
    State(ctx): State<Arc<ServerContext>>,
    request: std::result::Result<Json<FullSetRequest>, JsonRejection>,
) -> Result<Json<FullSetResponse>> {
    let Json(request) = request.map_err(invalid_body)?;
    let key = request.prf_key.to_bytes()?;

    let result = ctx.engine().full_set_query(&key).map_err(|e| match e {
        CoreError::InvalidKeyLength { .. } => ServerError::InvalidPrfKey(e.to_string()),
        other => ServerError::Internal(other.to_string()),
    })?;

    record_query(KIND_FULLSET, result.elapsed);
    debug!(
        key_prefix = %hex::encode(&key[..8]),
        elapsed_ns = result.elapsed_nanos(),
        "FullSet query"
    );

    Ok(Json(FullSetResponse {
        value: result.value,
        server_time_nanos: result.elapsed_nanos(),
    }))
}

async fn setparity_handler(
    State(ctx): State<Arc<ServerContext>>,
    request: std::result::Result<Json<SetParityRequest>, JsonRejection>,
) -> Result<Json<SetParityResponse>> {
    let Json(request) = request.map_err(invalid_body)?;

    let result = ctx.engine().set_parity_query(&request.indices);
    record_query(KIND_SETPARITY, result.elapsed);
    debug!(
        count = request.indices.len(),
        elapsed_ns = result.elapsed_nanos(),
        "SetParity query"
    );

    Ok(Json(SetParityResponse {
        parity: result.value,
        server_time_nanos: result.elapsed_nanos(),
    }))
}

fn invalid_body(rejection: JsonRejection) -> ServerError {
    ServerError::InvalidQuery(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use plinko_core::{Database, PlinkoParams, PrSet};
    use tower::ServiceExt;

    fn test_context() -> Arc<ServerContext> {
        let db = Arc::new(Database::new((0..16).collect(), 16));
        Arc::new(ServerContext::new(db, PlinkoParams::from_parts(16, 4, 4)))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(
            create_router(test_context()),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "plinko-pir-server");
        assert_eq!(json["db_size"], 16);
        assert_eq!(json["chunk_size"], 4);
        assert_eq!(json["set_size"], 4);
    }

    #[tokio::test]
    async fn test_plaintext_get_and_post() {
        let router = create_router(test_context());

        let (status, json) = send(
            router.clone(),
            Request::get("/query/plaintext?index=7").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], 7);
        assert!(json["server_time_nanos"].is_u64());

        let (status, json) =
            send(router, post_json("/query/plaintext", serde_json::json!({"index": 1016}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], 0);
    }

    #[tokio::test]
    async fn test_plaintext_get_missing_index() {
        let (status, json) = send(
            create_router(test_context()),
            Request::get("/query/plaintext").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_QUERY");

        let (status, _) = send(
            create_router(test_context()),
            Request::get("/query/plaintext?index=abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_setparity() {
        let (status, json) = send(
            create_router(test_context()),
            post_json("/query/setparity", serde_json::json!({"indices": [0, 1, 2, 3]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["parity"], 0);

        let (_, json) = send(
            create_router(test_context()),
            post_json("/query/setparity", serde_json::json!({"indices": [5, 9, 9]})),
        )
        .await;
        assert_eq!(json["parity"], 5);
    }

    #[tokio::test]
    async fn test_setparity_undecodable() {
        let (status, json) = send(
            create_router(test_context()),
            post_json("/query/setparity", serde_json::json!({"indices": "all"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_fullset_array_and_hex_keys_agree() {
        let key = [0x2Au8; 16];
        let expected = PrSet::new(key)
            .expand(4, 4)
            .iter()
            .fold(0u64, |acc, &i| acc ^ i);

        let (status, json) = send(
            create_router(test_context()),
            post_json("/query/fullset", serde_json::json!({"prf_key": key.to_vec()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], expected);

        let (status, json) = send(
            create_router(test_context()),
            post_json("/query/fullset", serde_json::json!({"prf_key": hex::encode(key)})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], expected);
    }

    #[tokio::test]
    async fn test_fullset_bad_keys() {
        for body in [
            serde_json::json!({"prf_key": [1, 2, 3]}),
            serde_json::json!({"prf_key": "zz"}),
            serde_json::json!({"prf_key": vec![300u64; 16]}),
            serde_json::json!({"prf_key": hex::encode([0u8; 32])}),
        ] {
            let (status, json) =
                send(create_router(test_context()), post_json("/query/fullset", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["code"], "INVALID_PRF_KEY");
        }
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/query/fullset")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = create_router(test_context()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let router = create_router_with_metrics(test_context(), recorder.handle());
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_prf_key_string_encodings() {
        let field = PrfKeyField::Encoded(format!("0x{}", "ab".repeat(16)));
        assert_eq!(field.to_bytes().unwrap(), vec![0xAB; 16]);

        let field = PrfKeyField::Encoded("ab".repeat(16));
        assert_eq!(field.to_bytes().unwrap(), vec![0xAB; 16]);

        let field = PrfKeyField::Encoded("AAECAwQFBgcICQoLDA0ODw==".to_string());
        assert_eq!(field.to_bytes().unwrap(), (0u8..16).collect::<Vec<_>>());

        assert!(PrfKeyField::Encoded("not base64!".to_string()).to_bytes().is_err());
    }

    #[tokio::test]
    async fn test_fullset_base64_key() {
        let key: Vec<u8> = (0..16).collect();
        let expected = PrSet::new([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
            .expand(4, 4)
            .iter()
            .fold(0u64, |acc, &i| acc ^ i);

        let (status, json) = send(
            create_router(test_context()),
            post_json("/query/fullset", serde_json::json!({"prf_key": "AAECAwQFBgcICQoLDA0ODw=="})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], expected);

        let (_, json) = send(
            create_router(test_context()),
            post_json("/query/fullset", serde_json::json!({"prf_key": key})),
        )
        .await;
        assert_eq!(json["value"], expected);
    }
}
