pub mod ask;
pub mod config_cmd;
pub mod deployment;
pub mod serve;
pub mod session;

use sahayak_config::AppConfig;
use sahayak_runtime::AppContext;
use serde::Serialize;

/// Build the context without touching the deployment.
pub fn context(config: AppConfig) -> anyhow::Result<AppContext> {
    AppContext::from_config(config).map_err(|e| anyhow::anyhow!("Failed to build context: {e}"))
}

/// Build the context and resolve the deployment every command talks to.
pub async fn started_context(config: AppConfig) -> anyhow::Result<AppContext> {
    let ctx = context(config)?;
    ctx.start()
        .await
        .map_err(|e| anyhow::anyhow!("No usable deployment: {e}"))?;
    Ok(ctx)
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
