use clap::Subcommand;
use sahayak_config::AppConfig;
use serde_json::json;

use super::print_json;

#[derive(Subcommand)]
pub enum Action {
    /// Adopt the first existing deployment, or create one
    Ensure,
    /// Always create a new deployment
    Create,
    /// Show the deployments the registry knows
    Get,
    /// Force-delete the first deployment
    Delete,
}

pub async fn run(config: AppConfig, action: Action) -> anyhow::Result<()> {
    let ctx = super::context(config)?;

    match action {
        Action::Ensure => {
            let id = ctx.start().await?;
            print_json(&json!({ "message": "Deployment available", "resource_id": id }))?;
        }
        Action::Create => {
            let status = ctx.deployments.create().await?;
            print_json(&status)?;
        }
        Action::Get => {
            let records = ctx.deployments.list().await?;
            if records.is_empty() {
                println!("No deployment available.");
            } else {
                print_json(&records)?;
            }
        }
        Action::Delete => {
            // A fresh process tracks nothing yet, so adopt the first one before deleting.
            if ctx.deployments.list().await?.is_empty() {
                println!("No deployment available.");
                return Ok(());
            }
            ctx.start().await?;
            let status = ctx.deployments.delete().await?;
            print_json(&status)?;
        }
    }

    Ok(())
}
