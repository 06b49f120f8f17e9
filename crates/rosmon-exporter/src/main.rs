use anyhow::Result;
use rosmon_collector::{CollectorRegistry, HealthCollector};
use rosmon_exporter::app::{self, AppState};
use rosmon_exporter::config::ExporterConfig;
use rosmon_exporter::connector::TcpConnector;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rosmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/exporter.toml".to_string());

    let config = ExporterConfig::load(&config_path)?;
    tracing::info!(
        devices = config.devices.len(),
        listen = %config.listen_addr,
        "rosmon-exporter starting"
    );

    let connector = Arc::new(TcpConnector::new(&config.devices, config.timeout()));
    let mut registry = CollectorRegistry::new(connector)
        .with_concurrency(config.concurrency)
        .with_timeout(config.timeout());
    registry.register(Arc::new(HealthCollector::new()));

    let state = AppState {
        registry: Arc::new(registry),
        devices: Arc::new(config.devices()),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Serving metrics");

    axum::serve(listener, app::build_router(state))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    Ok(())
}
