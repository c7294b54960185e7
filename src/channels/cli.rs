//! CLI channel — stdin/stdout REPL for local testing.
//!
//! `/attach <path>` submits a local file as if it were uploaded.

use std::path::Path;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Attachment, Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate,
};
use crate::error::ChannelError;

const ATTACH_COMMAND: &str = "/attach";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Debug, Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Build the inbound message for one line of input. Blank lines yield `None`.
fn parse_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let msg = IncomingMessage::new("cli", "local-user", line);
    let Some(rest) = line.strip_prefix(ATTACH_COMMAND) else {
        return Some(msg);
    };
    let path = rest.trim();
    if path.is_empty() || !rest.starts_with(char::is_whitespace) {
        return Some(msg);
    }

    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    Some(
        IncomingMessage::new("cli", "local-user", "")
            .with_attachment(Attachment::new(file_name, path)),
    )
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        match &response.file {
            Some(path) if response.content.is_empty() => {
                println!("\n[file: {}]\n", path.display())
            }
            Some(path) => println!("\n{}\n[file: {}]\n", response.content, path.display()),
            None => println!("\n{}\n", response.content),
        }
        eprint!("> ");
        Ok(())
    }

    async fn save_attachment(
        &self,
        attachment: &Attachment,
        dest: &Path,
    ) -> Result<(), ChannelError> {
        tokio::fs::copy(&attachment.source, dest)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::AttachmentFailed {
                name: "cli".into(),
                file_name: attachment.file_name.clone(),
                reason: e.to_string(),
            })
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        match status {
            StatusUpdate::Thinking(msg) => eprintln!("⏳ {}", msg),
            StatusUpdate::UploadingDocument => eprintln!("📄 Sending document..."),
            StatusUpdate::Status(msg) => eprintln!("ℹ️  {}", msg),
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
