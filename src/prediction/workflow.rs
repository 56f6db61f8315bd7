use crate::cache::policy::Interval;
use crate::config::WorkflowConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// Opaque prediction payload returned by the workflow.
pub type PredictionResult = serde_json::Map<String, Value>;

/// Upstream statuses that mean the input itself cannot be processed.
const FATAL_STATUSES: [StatusCode; 5] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
    StatusCode::UNPROCESSABLE_ENTITY,
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// The request is invalid or unprocessable; retrying will not help.
    #[error("{0}")]
    Fatal(String),

    /// Any other failure (network, timeout, upstream fault).
    #[error("{0}")]
    Transient(String),
}

impl WorkflowError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::Fatal(_))
    }
}

/// Computes a prediction for `(symbol, interval)`.
///
/// Implementations own their retry and timeout policy; callers invoke
/// exactly once per request.
#[async_trait]
pub trait PredictionWorkflow: Send + Sync {
    async fn predict(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<PredictionResult, WorkflowError>;
}

/// Workflow backed by an upstream HTTP prediction service.
pub struct HttpWorkflow {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflow {
    pub fn new(config: &WorkflowConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl PredictionWorkflow for HttpWorkflow {
    async fn predict(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<PredictionResult, WorkflowError> {
        let request = json!({
            "symbol": symbol.to_uppercase(),
            "interval": interval,
        });

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkflowError::Transient(format!("upstream request failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkflowError::Transient(format!("failed to read upstream body: {e}")))?;

        classify_response(status, serde_json::from_slice(&body).ok())
    }
}

/// Turn an upstream status and (optional) JSON body into a result or a
/// classified error.
pub fn classify_response(
    status: StatusCode,
    body: Option<Value>,
) -> Result<PredictionResult, WorkflowError> {
    if status.is_success() {
        return match body {
            Some(Value::Object(result)) => Ok(result),
            _ => Err(WorkflowError::Transient(
                "upstream returned a non-object prediction body".to_string(),
            )),
        };
    }

    let flagged_fatal = body
        .as_ref()
        .and_then(|b| b.get("code"))
        .and_then(Value::as_str)
        == Some(crate::error::FATAL_ERROR);

    let message = body
        .as_ref()
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("upstream returned {status}"));

    if flagged_fatal || FATAL_STATUSES.contains(&status) {
        Err(WorkflowError::Fatal(message))
    } else {
        Err(WorkflowError::Transient(message))
    }
}
