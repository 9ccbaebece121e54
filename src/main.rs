use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pricewatch::application::{LogSink, Orchestrator};
use pricewatch::infrastructure::config::AppConfig;
use pricewatch::infrastructure::logging::init_logging;
use pricewatch::infrastructure::url_store::UrlStore;
use pricewatch::infrastructure::vendors::build_registry;

const CONFIG_PATH: &str = "config.json";
const URL_PATH: &str = "url.json";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(Path::new(CONFIG_PATH)).await?;
    let _log_guard = init_logging(&config.logging)?;

    let registry = build_registry(&config);

    let mut store = UrlStore::load(Path::new(URL_PATH)).await?;
    for adapter in &registry {
        store.ensure_vendor(adapter.meta().id);
    }
    info!(
        vendors = registry.len(),
        tracked = store.tracked().total(),
        "pricewatch starting"
    );

    let orchestrator = Orchestrator::new(
        registry,
        store,
        Arc::new(LogSink),
        Duration::from_secs(config.interval_secs),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    orchestrator.run(cancel).await;
    info!("pricewatch stopped");
    Ok(())
}
