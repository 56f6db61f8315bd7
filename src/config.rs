use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Exact CORS origin for the dashboard. Any origin when unset.
    #[serde(default)]
    pub allowed_origin: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_body_bytes() -> usize {
    16 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_cache_max_size() -> usize {
    1000
}
fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_url")]
    pub base_url: String,
    #[serde(default = "default_workflow_timeout")]
    pub timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: default_workflow_url(),
            timeout_secs: default_workflow_timeout(),
        }
    }
}

fn default_workflow_url() -> String {
    "http://127.0.0.1:8000/predict".to_string()
}
fn default_workflow_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
        }
    }
}

fn default_history_size() -> usize {
    crate::metrics::monitor::DEFAULT_HISTORY_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_second")]
    pub per_second: u64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

fn default_per_second() -> u64 {
    2
}
fn default_burst_size() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// Bearer token for `/v1/admin/*`. Admin routes are open when unset.
    #[serde(default)]
    pub token: Option<String>,
}

impl AppConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_size == 0 {
            return Err("cache.max_size must be greater than 0".to_string());
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err("cache.sweep_interval_secs must be greater than 0".to_string());
        }
        if self.metrics.history_size == 0 {
            return Err("metrics.history_size must be greater than 0".to_string());
        }
        if self.rate_limit.per_second == 0 || self.rate_limit.burst_size == 0 {
            return Err(
                "rate_limit.per_second and rate_limit.burst_size must be greater than 0"
                    .to_string(),
            );
        }
        match url::Url::parse(&self.workflow.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!(
                    "workflow.base_url must use http or https, got {}",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("workflow.base_url is not a valid URL: {e}")),
        }
        if matches!(self.admin.token.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err("admin.token must not be blank when set".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // Load from config file
        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (PREDICT__SERVER__PORT=3001, etc.)
        builder = builder.add_source(
            Environment::with_prefix("PREDICT")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
