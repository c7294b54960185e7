//! ChannelManager — owns the registered channels and routes replies back to
//! the channel a message came from.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own name, replacing any previous one.
    pub fn add(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        tracing::info!(channel = %name, "Channel registered");
        self.channels.insert(name, channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Channel>, ChannelError> {
        self.channels
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Start every channel and merge their message streams.
    ///
    /// A channel that fails to start is logged and skipped; it is an error
    /// only when none start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::new();
        for (name, channel) in &self.channels {
            match channel.start().await {
                Ok(s) => {
                    tracing::info!(channel = %name, "Channel started");
                    streams.push(s);
                }
                Err(e) => tracing::error!(channel = %name, "Failed to start channel: {}", e),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".to_string(),
                reason: "no channel started".to_string(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    pub async fn send_status(
        &self,
        msg: &IncomingMessage,
        status: StatusUpdate,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?
            .send_status(status, &msg.metadata)
            .await
    }

    /// Health of every channel, keyed by name.
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), ChannelError>> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            results.insert(name.clone(), channel.health_check().await);
        }
        results
    }

    pub async fn shutdown_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = %name, "Channel shutdown failed: {}", e);
            }
        }
    }
}
