use clap::Subcommand;
use sahayak_config::AppConfig;
use sahayak_core::{SessionId, UserId};
use serde_json::json;

use super::print_json;

#[derive(Subcommand)]
pub enum Action {
    /// Create a session for a user
    Create {
        #[arg(short, long)]
        user: String,
    },
    /// List a user's sessions with the latest one's messages
    List {
        #[arg(short, long)]
        user: String,
    },
    /// Print the messages of one session
    Messages {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        session: String,
    },
    /// Delete one session
    Delete {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        session: String,
    },
}

pub async fn run(config: AppConfig, action: Action) -> anyhow::Result<()> {
    let ctx = super::started_context(config).await?;
    let sessions = &ctx.sessions;

    match action {
        Action::Create { user } => {
            let id = sessions.create(&UserId::from(user)).await?;
            print_json(&json!({ "session_id": id }))?;
        }
        Action::List { user } => {
            let overview = sessions.list_with_latest_messages(&UserId::from(user)).await?;
            print_json(&overview)?;
        }
        Action::Messages { user, session } => {
            let messages = sessions
                .get_messages(&UserId::from(user), &SessionId::from(session))
                .await?;
            print_json(&json!({ "messages": messages }))?;
        }
        Action::Delete { user, session } => {
            let outcome = sessions.delete(&UserId::from(user), &SessionId::from(session)).await;
            print_json(&json!({ "message": outcome.message() }))?;
        }
    }

    Ok(())
}
