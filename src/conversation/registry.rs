//! Per-applicant sessions.
//!
//! Each applicant (channel + user id) has at most one conversation. The record
//! sits behind its own async mutex so one applicant's messages are handled in
//! order while other applicants proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::applicant::ApplicantRecord;

/// Identifies an applicant across messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicantKey {
    pub channel: String,
    pub user_id: String,
}

impl ApplicantKey {
    pub fn new(channel: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user_id: user_id.into(),
        }
    }
}

impl std::fmt::Display for ApplicantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.user_id)
    }
}

pub type Session = Arc<Mutex<ApplicantRecord>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ApplicantKey, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &ApplicantKey) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Install `record` as the applicant's conversation, replacing any
    /// previous one.
    pub async fn replace(&self, key: ApplicantKey, record: ApplicantRecord) -> Session {
        let session = Arc::new(Mutex::new(record));
        if self
            .sessions
            .write()
            .await
            .insert(key.clone(), Arc::clone(&session))
            .is_some()
        {
            tracing::debug!(applicant = %key, "Previous conversation replaced");
        }
        session
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
