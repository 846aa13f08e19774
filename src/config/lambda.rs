use crate::config::{validate_runtime_limits, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_MS};
use crate::core::ConfigProvider;
use crate::utils::error::{DispatchError, Result};
use crate::utils::validation::Validate;
use std::env;
use std::time::Duration;

/// 留給回應序列化與回傳的時間，避免被 Lambda 直接中斷
pub const DEADLINE_MARGIN: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub region: Option<String>,
    /// Overrides the DynamoDB endpoint, e.g. for DynamoDB Local.
    pub dynamodb_endpoint: Option<String>,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_concurrency: parse_env("MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?,
            timeout_ms: parse_env("TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            region: env::var("AWS_REGION").ok().filter(|r| !r.is_empty()),
            dynamodb_endpoint: env::var("DYNAMODB_ENDPOINT").ok().filter(|e| !e.is_empty()),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DispatchError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Value must be a positive integer".to_string(),
            }),
        Err(_) => Ok(default),
    }
}

impl ConfigProvider for LambdaConfig {
    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_runtime_limits(self.max_concurrency, self.timeout_ms)?;
        if let Some(endpoint) = &self.dynamodb_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(DispatchError::InvalidConfigValueError {
                    field: "DYNAMODB_ENDPOINT".to_string(),
                    value: endpoint.clone(),
                    reason: "Endpoint must be an http(s) URL".to_string(),
                });
            }
        }

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

/// Time left before the Lambda deadline (epoch milliseconds), minus
/// [`DEADLINE_MARGIN`]. `None` when the deadline is unknown.
pub fn remaining_budget(deadline_ms: u64, now_ms: u64) -> Option<Duration> {
    if deadline_ms == 0 {
        return None;
    }
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now_ms));
    Some(remaining.saturating_sub(DEADLINE_MARGIN))
}
