use crate::cache::policy::{supported_intervals, ttl_table, Interval};
use crate::error::{AppError, AppResult, LoggedJson, NO_STORE};
use crate::prediction::service::{PredictionQuery, PredictionService};
use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue, CACHE_CONTROL};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_AGE: HeaderName = HeaderName::from_static("x-cache-age");
pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

pub struct PredictionState {
    pub service: Arc<PredictionService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub bypass_cache: bool,
}

/// Validate a request before it touches the cache or the workflow.
fn validate_request(req: PredictionRequest) -> AppResult<PredictionQuery> {
    let symbol = req
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::Validation("Invalid symbol: must be a non-empty string".to_string())
        })?;

    let interval: Interval = req
        .interval
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Validation)?;

    Ok(PredictionQuery {
        symbol: symbol.to_string(),
        interval,
        bypass_cache: req.bypass_cache,
    })
}

/// POST /v1/predictions - Serve a prediction, from cache when possible.
pub async fn predict(
    State(state): State<Arc<PredictionState>>,
    LoggedJson(req): LoggedJson<PredictionRequest>,
) -> AppResult<Response> {
    let started = Instant::now();
    let query = validate_request(req)?;

    let served = state.service.serve(&query).await?;
    let hit = served.is_hit();
    let cache_age = served.cache_age_secs();

    let mut response = Json(served.into_body()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    headers.insert(
        X_CACHE,
        HeaderValue::from_static(if hit { "HIT" } else { "MISS" }),
    );
    if let Some(age) = cache_age {
        headers.insert(X_CACHE_AGE, HeaderValue::from(age));
    }
    let elapsed = format!("{}ms", started.elapsed().as_millis());
    headers.insert(
        X_RESPONSE_TIME,
        HeaderValue::from_str(&elapsed).map_err(|e| AppError::Internal(e.to_string()))?,
    );

    Ok(response)
}

/// GET /v1/predictions - Static description of the prediction endpoint.
pub async fn capabilities() -> Json<Value> {
    let ttls: Map<String, Value> = ttl_table()
        .map(|(interval, ttl)| (interval.to_string(), Value::from(ttl)))
        .collect();

    Json(json!({
        "status": "operational",
        "service": "prediction-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "supportedIntervals": supported_intervals(),
        "cacheTtlSecs": ttls,
        "options": {
            "bypassCache": "skip the cache read; the fresh result is still stored",
        },
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
