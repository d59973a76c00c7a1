use sahayak_config::AppConfig;
use tracing::info;

pub async fn run(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.gateway.port = port;
    }

    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        engine = %config.engine.backend,
        "Starting Sahayak gateway"
    );

    sahayak_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway error: {e}"))
}
