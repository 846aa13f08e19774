#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_key_schema, validate_positive_number, validate_range, validate_table_name, Validate,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
/// 與 Lambda 預設逾時相同
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// A table served by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    #[serde(default = "default_key")]
    pub key: Vec<String>,
}

fn default_key() -> Vec<String> {
    vec!["id".to_string()]
}

impl FromStr for TableSpec {
    type Err = String;

    /// `Users` or `Users:id` or `Events:pk+sk`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, key) = match s.split_once(':') {
            Some((name, key)) => (
                name.trim(),
                key.split('+').map(|k| k.trim().to_string()).collect(),
            ),
            None => (s.trim(), default_key()),
        };
        if name.is_empty() {
            return Err(format!("invalid table spec '{}': missing table name", s));
        }
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }
}

impl Validate for TableSpec {
    fn validate(&self) -> Result<()> {
        validate_table_name("tables.name", &self.name)?;
        validate_key_schema("tables.key", &self.key)
    }
}

/// Resolved settings for the local server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub tables: Vec<TableSpec>,
}

impl ConfigProvider for ServerSettings {
    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Validate for ServerSettings {
    fn validate(&self) -> Result<()> {
        validate_runtime_limits(self.max_concurrency, self.timeout_ms)?;
        for table in &self.tables {
            table.validate()?;
        }
        tracing::debug!("✅ Server configuration validation passed");
        Ok(())
    }
}

pub(crate) fn validate_runtime_limits(max_concurrency: usize, timeout_ms: u64) -> Result<()> {
    validate_positive_number("max_concurrency", max_concurrency, 1)?;
    validate_range("max_concurrency", max_concurrency, 1, 10_000)?;
    validate_range("timeout_ms", timeout_ms, 1, 900_000)
}
