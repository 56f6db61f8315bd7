use crate::metrics::monitor::PerformanceMonitor;
use crate::prediction::PredictionCache;
use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::System;

pub struct AdminState {
    pub cache: Arc<PredictionCache>,
    pub monitor: Arc<PerformanceMonitor>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(cache: Arc<PredictionCache>, monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            cache,
            monitor,
            started_at: Instant::now(),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Resident and virtual memory of this process. `None` when the platform
/// does not expose process info.
fn memory_usage() -> Option<Value> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    sys.refresh_process(pid);
    let process = sys.process(pid)?;

    Some(json!({
        "rss": format_mb(process.memory()),
        "virtual": format_mb(process.virtual_memory()),
    }))
}

/// GET /v1/admin/performance - Latency stats, cache utilization and process info.
pub async fn get_performance(State(state): State<Arc<AdminState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "timestamp": now_rfc3339(),
        "performance": state.monitor.all_stats(),
        "cache": state.cache.stats(),
        "system": {
            "version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "pid": std::process::id(),
            "uptimeSecs": state.started_at.elapsed().as_secs(),
            "memoryUsage": memory_usage(),
        },
    }))
}

/// DELETE /v1/admin/performance - Clear latency history and the prediction cache.
pub async fn reset_performance(State(state): State<Arc<AdminState>>) -> Json<Value> {
    let cleared = state.cache.len();
    state.monitor.reset();
    state.cache.clear();
    tracing::info!(cleared_entries = cleared, "performance metrics and cache cleared");

    Json(json!({
        "success": true,
        "message": "Performance metrics and cache cleared",
        "timestamp": now_rfc3339(),
    }))
}

/// GET /health - Liveness probe.
pub async fn health(State(state): State<Arc<AdminState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "cache": state.cache.stats(),
    }))
}
