use clap::Parser;
use crud_dispatch::adapters::http;
use crud_dispatch::utils::logger;
use crud_dispatch::{CliConfig, DispatchService, InvocationLimiter, MemoryStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting crud-dispatch local gateway");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    // 建立記憶體後端與資料表
    let store = MemoryStore::new();
    for table in &settings.tables {
        store.create_table(&table.name, table.key.clone());
        tracing::info!("📦 Table '{}' keyed by {}", table.name, table.key.join("+"));
    }
    if settings.tables.is_empty() {
        tracing::warn!("No tables configured; only echo and ping will succeed");
    }

    let limiter = InvocationLimiter::from_config(&settings);
    tracing::info!(
        "⚙️ Concurrency ceiling {}, time budget {:?}",
        limiter.max_concurrency(),
        limiter.timeout()
    );

    let service = Arc::new(DispatchService::new(store, limiter));
    http::serve(service, settings.bind).await?;

    Ok(())
}
