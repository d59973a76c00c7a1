use clap::Args;
use sahayak_config::AppConfig;
use sahayak_core::content::QueryHints;
use sahayak_core::UserId;
use sahayak_runtime::{AttachmentSource, QueryRequest};
use std::path::PathBuf;
use tracing::debug;

use super::print_json;

#[derive(Args)]
pub struct AskArgs {
    /// User identity
    #[arg(short, long)]
    pub user: String,

    /// Session to continue; empty means the most recent one
    #[arg(short, long, default_value = "")]
    pub session: String,

    /// The question or instruction
    #[arg(short, long)]
    pub message: Option<String>,

    /// Name of a file already uploaded for this user
    #[arg(long, conflicts_with = "file")]
    pub attachment: Option<String>,

    /// Local file to upload and attach
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Target audience, repeatable (e.g. --audience "Grade 3")
    #[arg(long = "audience")]
    pub audience: Vec<String>,

    #[arg(long)]
    pub tone: Option<String>,

    #[arg(long)]
    pub complexity: Option<String>,
}

impl AskArgs {
    fn hints(&self) -> QueryHints {
        QueryHints {
            target_audience: self.audience.clone(),
            response_tone: self.tone.clone(),
            complexity_level: self.complexity.clone(),
        }
    }
}

pub async fn run(config: AppConfig, args: AskArgs) -> anyhow::Result<()> {
    let ctx = super::started_context(config).await?;
    let user = UserId::from(args.user.clone());

    let attachment = match (&args.file, &args.attachment) {
        (Some(path), _) => {
            let bytes = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?
                .to_string();
            let stored = ctx.assistant.upload_attachment(&user, &filename, bytes).await?;
            debug!(uri = %stored.uri, "Attachment uploaded");
            Some(AttachmentSource::Stored(filename))
        }
        (None, Some(name)) => Some(AttachmentSource::Stored(name.clone())),
        (None, None) => None,
    };

    let request = QueryRequest {
        user_id: user,
        session_id: args.session.clone().into(),
        message: args.message.clone(),
        attachment,
        hints: args.hints(),
    };

    let reply = ctx.assistant.send_query(request).await?;
    print_json(&reply)?;
    Ok(())
}
