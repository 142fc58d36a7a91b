use std::path::{Path, PathBuf};

use {anyhow::Result, clap::Subcommand, serde_json::Value};

use slackline_slack::{
    Envelope,
    delivery::{self, DeliveryRequest},
};

use crate::Cli;

#[derive(Subcommand)]
pub enum FileAction {
    /// Deliver a local file to a channel using the cheapest fitting path.
    Upload {
        path: PathBuf,
        #[arg(short, long)]
        channel: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Create the file with this content first when it does not exist.
        #[arg(long)]
        create_with: Option<String>,
        /// Include a local preview in the result.
        #[arg(long)]
        preview: bool,
    },
    /// Show file metadata and the first lines of text files.
    Preview {
        path: PathBuf,
        #[arg(long, default_value_t = 20)]
        lines: usize,
    },
    /// Report on a file, creating it with `--content` when missing.
    Verify {
        path: PathBuf,
        #[arg(long)]
        content: Option<String>,
    },
}

fn local(result: slackline_slack::Result<impl serde::Serialize>, path: &Path) -> Envelope {
    match result {
        Ok(payload) => Envelope::ok(payload),
        Err(err) => Envelope::from_error(&err)
            .with("file_path", Value::from(path.display().to_string())),
    }
}

/// Preview and verify stay local and need no credentials.
pub async fn handle_files(cli: &Cli, action: &FileAction) -> Result<Envelope> {
    Ok(match action {
        FileAction::Upload {
            path,
            channel,
            title,
            comment,
            create_with,
            preview,
        } => {
            let tools = crate::tools(cli)?;
            let request = DeliveryRequest {
                path: path.clone(),
                channel: channel.clone(),
                title: title.clone(),
                comment: comment.clone(),
                create_with: create_with.clone(),
                preview_first: *preview,
            };
            tools.upload_file(&request).await
        },
        FileAction::Preview { path, lines } => local(delivery::preview(path, *lines), path),
        FileAction::Verify { path, content } => {
            local(delivery::verify_or_create(path, content.as_deref()), path)
        },
    })
}
