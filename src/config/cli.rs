use crate::config::toml_config::TomlConfig;
use crate::config::{
    ServerSettings, TableSpec, DEFAULT_BIND, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_MS,
};
use crate::utils::error::Result;
use crate::utils::validation::{validate_socket_addr, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "crud-dispatch")]
#[command(about = "Local HTTP gateway for the table operation dispatcher")]
pub struct CliConfig {
    #[arg(long, help = "Address to listen on [default: 127.0.0.1:3000]")]
    pub bind: Option<String>,

    #[arg(
        long = "table",
        value_delimiter = ',',
        help = "In-memory table as NAME or NAME:KEY[+SORT_KEY]"
    )]
    pub tables: Vec<TableSpec>,

    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Maximum simultaneous invocations [default: 10]")]
    pub max_concurrency: Option<usize>,

    #[arg(long, help = "Per-invocation time budget in milliseconds [default: 3000]")]
    pub timeout_ms: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// 合併命令列與設定檔：命令列優先，其次設定檔，最後預設值
    pub fn resolve(&self) -> Result<ServerSettings> {
        let file = match &self.config {
            Some(path) => {
                tracing::info!("📄 Loading configuration from {}", path.display());
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                file
            }
            None => TomlConfig::default(),
        };

        let bind = self
            .bind
            .as_deref()
            .or(file.bind())
            .unwrap_or(DEFAULT_BIND);

        let mut tables = file.tables.clone();
        for table in &self.tables {
            if let Some(existing) = tables.iter_mut().find(|t| t.name == table.name) {
                *existing = table.clone();
            } else {
                tables.push(table.clone());
            }
        }

        let settings = ServerSettings {
            bind: validate_socket_addr("bind", bind)?,
            max_concurrency: self
                .max_concurrency
                .or(file.max_concurrency())
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            timeout_ms: self
                .timeout_ms
                .or(file.timeout_ms())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            tables,
        };
        settings.validate()?;
        Ok(settings)
    }
}
