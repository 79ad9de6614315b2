//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

/// Main configuration for the Turnstile gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream users-service configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Rate limiting policy
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,

    /// Query analysis limits
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Interval between counter-store sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:4000".parse().unwrap()
}

fn default_sweep_interval() -> u64 {
    60
}

/// Upstream users-service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the users service
    #[serde(default = "default_users_service_url")]
    pub users_service_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            users_service_url: default_users_service_url(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

fn default_users_service_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

/// Rate limiting policy applied per client identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum requests allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Refund the window counter for requests that complete without errors
    #[serde(default)]
    pub skip_successful: bool,

    /// Refund the window counter for requests that complete with errors
    #[serde(default)]
    pub skip_failed: bool,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            skip_successful: false,
            skip_failed: false,
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u64 {
    100
}

/// Limits applied to the shape of an operation before execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum field-nesting depth
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Field cost weights and the complexity ceiling
    #[serde(flatten)]
    pub budget: CostBudget,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            budget: CostBudget::default(),
        }
    }
}

fn default_max_depth() -> u32 {
    10
}

/// Per-field cost weights used by the cost estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostBudget {
    /// Cost of a leaf (scalar) field
    #[serde(default = "default_scalar_cost")]
    pub scalar_cost: u64,

    /// Cost of a non-list object field
    #[serde(default = "default_object_cost")]
    pub object_cost: u64,

    /// Fan-out multiplier for list fields without a statically-known size
    #[serde(default = "default_list_factor")]
    pub list_factor: u64,

    /// Flat cost of a schema-introspection field
    #[serde(default = "default_introspection_cost")]
    pub introspection_cost: u64,

    /// Maximum total cost an operation may reach
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u64,
}

impl Default for CostBudget {
    fn default() -> Self {
        Self {
            scalar_cost: default_scalar_cost(),
            object_cost: default_object_cost(),
            list_factor: default_list_factor(),
            introspection_cost: default_introspection_cost(),
            max_complexity: default_max_complexity(),
        }
    }
}

fn default_scalar_cost() -> u64 {
    1
}

fn default_object_cost() -> u64 {
    1
}

fn default_list_factor() -> u64 {
    10
}

fn default_introspection_cost() -> u64 {
    1000
}

fn default_max_complexity() -> u64 {
    1000
}

impl GatewayConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::GatewayError::Config(e.to_string()))
    }

    /// Apply environment variable overrides on top of the loaded values.
    ///
    /// Unparseable values are logged and ignored, never fatal.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.listen_addr.set_port(port);
        }
        if let Ok(url) = std::env::var("USERS_SERVICE_URL") {
            self.upstream.users_service_url = url;
        }
        if let Some(v) = env_parse("RATE_LIMIT_WINDOW_MS") {
            self.rate_limit.window_ms = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_SKIP_SUCCESSFUL") {
            self.rate_limit.skip_successful = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_SKIP_FAILED") {
            self.rate_limit.skip_failed = v;
        }
        if let Some(v) = env_parse("MAX_QUERY_DEPTH") {
            self.analysis.max_depth = v;
        }
        if let Some(v) = env_parse("MAX_QUERY_COMPLEXITY") {
            self.analysis.budget.max_complexity = v;
        }
        if let Some(v) = env_parse("SCALAR_COST") {
            self.analysis.budget.scalar_cost = v;
        }
        if let Some(v) = env_parse("OBJECT_COST") {
            self.analysis.budget.object_cost = v;
        }
        if let Some(v) = env_parse("LIST_FACTOR") {
            self.analysis.budget.list_factor = v;
        }
        if let Some(v) = env_parse("INTROSPECTION_COST") {
            self.analysis.budget.introspection_cost = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
