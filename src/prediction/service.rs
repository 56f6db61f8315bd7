use crate::cache::policy::{make_key, Interval};
use crate::cache::TtlCache;
use crate::metrics::monitor::PerformanceMonitor;
use crate::prediction::workflow::{PredictionResult, PredictionWorkflow, WorkflowError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Cache of workflow results, shared behind `Arc` so hits are cheap.
pub type PredictionCache = TtlCache<Arc<PredictionResult>>;

pub const SERVE_OPERATION: &str = "prediction.serve";
pub const WORKFLOW_OPERATION: &str = "prediction.workflow";

/// A validated prediction request.
#[derive(Debug, Clone)]
pub struct PredictionQuery {
    pub symbol: String,
    pub interval: Interval,
    pub bypass_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit { age: Duration },
    Miss,
}

/// A prediction plus where it came from.
#[derive(Debug, Clone)]
pub struct ServedPrediction {
    pub result: Arc<PredictionResult>,
    pub cache: CacheStatus,
}

impl ServedPrediction {
    pub fn is_hit(&self) -> bool {
        matches!(self.cache, CacheStatus::Hit { .. })
    }

    /// Whole seconds since the entry was stored, on a hit.
    pub fn cache_age_secs(&self) -> Option<u64> {
        match self.cache {
            CacheStatus::Hit { age } => Some(age.as_secs()),
            CacheStatus::Miss => None,
        }
    }

    /// The prediction object merged with `cached` and, on a hit, `cacheAge`.
    pub fn into_body(self) -> Value {
        let cache_age = self.cache_age_secs();
        let mut body = Arc::unwrap_or_clone(self.result);
        body.insert("cached".to_string(), Value::Bool(cache_age.is_some()));
        if let Some(age) = cache_age {
            body.insert("cacheAge".to_string(), Value::from(age));
        }
        Value::Object(body)
    }
}

/// Read-through serving of predictions: cache first, workflow on a miss.
///
/// Concurrent misses for the same key each invoke the workflow; there is no
/// in-flight deduplication.
pub struct PredictionService {
    cache: Arc<PredictionCache>,
    workflow: Arc<dyn PredictionWorkflow>,
    monitor: Arc<PerformanceMonitor>,
}

impl PredictionService {
    pub fn new(
        cache: Arc<PredictionCache>,
        workflow: Arc<dyn PredictionWorkflow>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            cache,
            workflow,
            monitor,
        }
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub async fn serve(&self, query: &PredictionQuery) -> Result<ServedPrediction, WorkflowError> {
        let _timer = self.monitor.start(SERVE_OPERATION);
        let key = make_key(&query.symbol, query.interval);

        if !query.bypass_cache {
            if let Some(hit) = self.cache.get_entry(&key) {
                tracing::debug!(key = %key, age_secs = hit.age.as_secs(), "prediction cache hit");
                return Ok(ServedPrediction {
                    result: hit.value,
                    cache: CacheStatus::Hit { age: hit.age },
                });
            }
        }

        tracing::info!(
            symbol = %query.symbol,
            interval = %query.interval,
            bypass = query.bypass_cache,
            "prediction cache miss, running workflow"
        );

        let timer = self.monitor.start(WORKFLOW_OPERATION);
        let outcome = self.workflow.predict(&query.symbol, query.interval).await;
        let workflow_ms = timer.finish().as_millis() as u64;

        let result = match outcome {
            Ok(result) => Arc::new(result),
            Err(e) => {
                tracing::warn!(
                    symbol = %query.symbol,
                    interval = %query.interval,
                    fatal = e.is_fatal(),
                    workflow_ms,
                    error = %e,
                    "prediction workflow failed"
                );
                return Err(e);
            }
        };

        tracing::debug!(key = %key, workflow_ms, "storing prediction");
        self.cache.set(key, result.clone(), query.interval.ttl_secs());

        Ok(ServedPrediction {
            result,
            cache: CacheStatus::Miss,
        })
    }
}
