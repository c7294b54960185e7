//! Channel trait and the message types that flow through it.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    /// Channel-specific locator: a local path for the CLI, a file id for Telegram.
    pub source: String,
    pub size: Option<u64>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel it arrived on.
    pub channel: String,
    /// Channel-native sender identifier.
    pub user_id: String,
    /// Human-readable sender name, when the channel knows one.
    pub user_name: Option<String>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub thread_id: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (e.g. Telegram chat id).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            attachments: Vec::new(),
            thread_id: None,
            received_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Name to propose when confirming identity.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// A reply to send back through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingResponse {
    pub content: String,
    /// File to send as a document alongside (or instead of) the text.
    pub file: Option<PathBuf>,
    pub thread_id: Option<String>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file: None,
            thread_id: None,
        }
    }

    /// A document with an optional caption.
    pub fn file(path: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self {
            content: caption.into(),
            file: Some(path.into()),
            thread_id: None,
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

/// Transient progress indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The bot is working on something that takes a moment.
    Thinking(String),
    /// A document upload is in progress.
    UploadingDocument,
    Status(String),
}

/// A bidirectional message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to a message.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Download an attachment of an inbound message to `dest`.
    async fn save_attachment(
        &self,
        attachment: &Attachment,
        dest: &Path,
    ) -> Result<(), ChannelError>;

    /// Show a progress indicator. Channels without one ignore it.
    async fn send_status(
        &self,
        _status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
