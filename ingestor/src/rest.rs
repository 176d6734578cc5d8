use crate::analytics::compute_analytics;
use crate::metrics::{
    ANALYTICS_LATENCY_SECONDS, ANALYTICS_REQUESTS_TOTAL, VITALS_RECEIVED_TOTAL,
    VITALS_REJECTED_TOTAL, VITALS_STORED_TOTAL,
};
use crate::model::{Analytics, VitalsResponse};
use crate::store::SampleStore;
use crate::validate::{to_sample, validate_now, Candidate};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;
const SERVICE_NAME: &str = "device-vital-monitor-api";

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SampleStore>,
}

#[derive(Debug, Deserialize)]
pub struct VitalsQuery {
    device_id: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    device_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyticsResponse {
    success: bool,
    #[serde(flatten)]
    analytics: Analytics,
}

pub fn create_router(store: Arc<dyn SampleStore>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/vitals", get(get_vitals).post(log_vitals))
        .route("/api/vitals/analytics", get(get_analytics))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn log_vitals(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    VITALS_RECEIVED_TOTAL.inc();

    let candidate = parse_candidate(&headers, &body);

    let errors = validate_now(&candidate);
    if !errors.is_empty() {
        VITALS_REJECTED_TOTAL.inc();
        debug!("Rejected vitals: {}", errors.join("; "));
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "errors": errors })),
        )
            .into_response());
    }

    let sample = to_sample(&candidate)
        .ok_or_else(|| anyhow::anyhow!("validated vitals could not be converted"))?;
    let id = state.store.append(&sample).await?;
    VITALS_STORED_TOTAL.inc();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Vitals logged successfully",
            "id": id,
        })),
    )
        .into_response())
}

async fn get_vitals(
    State(state): State<AppState>,
    Query(params): Query<VitalsQuery>,
) -> Result<Json<VitalsResponse>, AppError> {
    let limit = parse_limit(params.limit.as_deref());
    let device_id = params.device_id.as_deref().filter(|d| !d.is_empty());

    let logs = state.store.list(device_id, limit).await?;

    Ok(Json(VitalsResponse {
        success: true,
        count: logs.len(),
        logs,
    }))
}

async fn get_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Response, AppError> {
    let Some(device_id) = params.device_id.filter(|d| !d.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "device_id query parameter is required",
            })),
        )
            .into_response());
    };

    ANALYTICS_REQUESTS_TOTAL.inc();
    let timer = ANALYTICS_LATENCY_SECONDS.start_timer();
    let analytics = compute_analytics(state.store.as_ref(), &device_id, Utc::now()).await?;
    timer.observe_duration();

    Ok(Json(AnalyticsResponse {
        success: true,
        analytics,
    })
    .into_response())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "service": SERVICE_NAME,
    }))
}

/// Reads the request body as a field map. Anything that is not a JSON
/// object sent as JSON has none of the required fields.
fn parse_candidate(headers: &HeaderMap, body: &[u8]) -> Candidate {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        });

    if !is_json {
        return Candidate::new();
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Candidate::new(),
        Err(e) => {
            debug!("Malformed JSON body: {}", e);
            Candidate::new()
        }
    }
}

/// Non-positive or unparseable limits fall back to the default.
fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&n| n > 0)
        .map_or(DEFAULT_LIMIT, |n| (n as usize).min(MAX_LIMIT))
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Internal server error" })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
