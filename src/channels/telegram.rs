//! Telegram channel — long-polls the Bot API for updates.
//!
//! Text messages become plain inbound messages. Document messages carry the
//! document as an attachment, with the caption as content. Attachments are
//! fetched lazily through `getFile` when the conversation asks for them.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{
    Attachment, Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.bot_token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{API_BASE}/file/bot{}/{file_path}", self.bot_token.expose_secret())
    }

    /// Check if a username is in the allowed list.
    pub fn is_user_allowed(&self, username: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == username)
    }

    /// Send a text message, trying Markdown first with plain text fallback.
    /// Splits long messages that exceed Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let send_failed = |e: reqwest::Error| ChannelError::SendFailed {
            name: "telegram".into(),
            reason: e.to_string(),
        };

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown"
            }))
            .send()
            .await
            .map_err(send_failed)?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(send_failed)?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }

    /// Send a document from disk to a Telegram chat.
    pub async fn send_document(
        &self,
        chat_id: &str,
        file_path: &Path,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        let file_bytes = tokio::fs::read(file_path).await?;
        let form = document_form(chat_id, file_bytes, file_name, caption);

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = resp.text().await?;
            anyhow::bail!("Telegram sendDocument failed: {err}");
        }

        tracing::info!("Telegram document sent to {chat_id}: {file_name}");
        Ok(())
    }

    /// Resolve a file id with `getFile` and download it to `dest`.
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> anyhow::Result<u64> {
        let data: Value = self
            .client
            .post(self.api_url("getFile"))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await?
            .json()
            .await?;

        let Some(file_path) = data
            .get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(Value::as_str)
        else {
            anyhow::bail!("Telegram getFile returned no file_path: {data}");
        };

        let resp = self.client.get(self.file_url(file_path)).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("Telegram file download failed: {}", resp.status());
        }

        let bytes = resp.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = chat_id(msg)?;

        match &response.file {
            Some(path) => {
                let caption = Some(response.content.as_str()).filter(|c| !c.is_empty());
                self.send_document(chat_id, path, caption)
                    .await
                    .map_err(|e| ChannelError::SendFailed {
                        name: "telegram".into(),
                        reason: e.to_string(),
                    })
            }
            None => self.send_message(chat_id, &response.content).await,
        }
    }

    async fn save_attachment(
        &self,
        attachment: &Attachment,
        dest: &Path,
    ) -> Result<(), ChannelError> {
        let size = self
            .download_file(&attachment.source, dest)
            .await
            .map_err(|e| ChannelError::AttachmentFailed {
                name: "telegram".into(),
                file_name: attachment.file_name.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(file = %attachment.file_name, bytes = size, "Telegram attachment saved");
        Ok(())
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &Value,
    ) -> Result<(), ChannelError> {
        let Some(chat_id) = metadata.get("chat_id").and_then(Value::as_str) else {
            return Ok(());
        };

        let action = match status {
            StatusUpdate::Thinking(_) => "typing",
            StatusUpdate::UploadingDocument => "upload_document",
            StatusUpdate::Status(ref msg) if !msg.is_empty() => {
                let _ = self.send_message(chat_id, &format!("ℹ️ {msg}")).await;
                return Ok(());
            }
            StatusUpdate::Status(_) => return Ok(()),
        };

        let _ = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "action": action
            }))
            .send()
            .await;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|_| ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            tracing::warn!(status = %resp.status(), "Telegram getMe failed");
            Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn chat_id(msg: &IncomingMessage) -> Result<&str, ChannelError> {
    msg.metadata
        .get("chat_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::SendFailed {
            name: "telegram".into(),
            reason: "No chat_id in message metadata".into(),
        })
}

fn document_form(chat_id: &str, bytes: Vec<u8>, file_name: &str, caption: Option<&str>) -> Form {
    let part = Part::bytes(bytes).file_name(file_name.to_string());
    let form = Form::new()
        .text("chat_id", chat_id.to_string())
        .part("document", part);
    match caption {
        Some(cap) => form.text("caption", cap.to_string()),
        None => form,
    }
}

/// Turn one `getUpdates` entry into an inbound message.
///
/// Returns `None` for non-message updates, messages with neither text nor a
/// document, and senders outside the allowlist.
fn parse_update(update: &Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.get("message")?;

    let document = message.get("document");
    let text = message
        .get("text")
        .or_else(|| message.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() && document.is_none() {
        return None;
    }

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string());

    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let mut incoming =
        IncomingMessage::new("telegram", user_id.as_deref().unwrap_or(username), text)
            .with_metadata(serde_json::json!({
                "chat_id": chat_id,
                "username": username,
            }));

    // Telegram's display name: first and last name when present.
    let first = from.and_then(|f| f.get("first_name")).and_then(Value::as_str);
    let last = from.and_then(|f| f.get("last_name")).and_then(Value::as_str);
    incoming = match (first, last) {
        (Some(first), Some(last)) => incoming.with_user_name(format!("{first} {last}")),
        (Some(first), None) => incoming.with_user_name(first),
        _ => incoming.with_user_name(username),
    };

    if let Some(doc) = document {
        let file_id = doc.get("file_id").and_then(Value::as_str)?;
        let file_name = doc
            .get("file_name")
            .and_then(Value::as_str)
            .unwrap_or("document");
        let mut attachment = Attachment::new(file_name, file_id);
        if let Some(size) = doc.get("file_size").and_then(Value::as_u64) {
            attachment = attachment.with_size(size);
        }
        incoming = incoming.with_attachment(attachment);
    }

    Some(incoming)
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
