//! ConversationController — drives one applicant through the staged
//! application, one inbound message at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::applicant::ApplicantRecord;
use crate::channels::{Attachment, Channel, IncomingMessage, OutgoingResponse};
use crate::error::ConversationError;
use crate::extract::{DocumentParser, FieldExtractor};
use crate::scoring::{Assessment, RiskPricer};
use crate::store::Database;

use super::prompts;
use super::state::Stage;
use super::validate::{self, IdentityReply};

/// How many times to try saving an attachment before giving up.
const ATTACHMENT_ATTEMPTS: usize = 2;

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    /// Replies to send, in order.
    pub replies: Vec<OutgoingResponse>,
    /// Stage reached, if the message advanced the conversation.
    pub advanced_to: Option<Stage>,
    /// Whether the completed record was persisted. `None` when no write was
    /// attempted.
    pub saved: Option<bool>,
}

impl Turn {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            replies: vec![OutgoingResponse::text(text)],
            ..Self::default()
        }
    }

    /// No reply and no state change.
    fn silent() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.replies.is_empty() && self.advanced_to.is_none()
    }
}

/// Collaborators the controller needs.
pub struct ConversationController {
    store: Arc<dyn Database>,
    parser: Arc<dyn DocumentParser>,
    extractor: Arc<FieldExtractor>,
    pricer: RiskPricer,
    apps_dir: PathBuf,
    template: Option<PathBuf>,
}

impl ConversationController {
    pub fn new(
        store: Arc<dyn Database>,
        parser: Arc<dyn DocumentParser>,
        pricer: RiskPricer,
        apps_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            parser,
            extractor: Arc::new(FieldExtractor::new()),
            pricer,
            apps_dir: apps_dir.into(),
            template: None,
        }
    }

    /// Blank application form sent after the loan amount is accepted.
    pub fn with_template(mut self, template: Option<PathBuf>) -> Self {
        self.template = template;
        self
    }

    /// Open a new application for the sender of `msg` and greet them.
    pub fn start(&self, msg: &IncomingMessage) -> (ApplicantRecord, Turn) {
        let record = ApplicantRecord::new(&msg.channel, &msg.user_id);
        tracing::info!(
            record_id = %record.id,
            channel = %msg.channel,
            user = %msg.user_id,
            "Application started"
        );
        (record, Turn::reply(prompts::welcome(msg.display_name())))
    }

    /// Handle one message for an application in progress.
    ///
    /// `channel` is the channel the message arrived on; it is used to fetch
    /// attachments.
    pub async fn handle(
        &self,
        record: &mut ApplicantRecord,
        msg: &IncomingMessage,
        channel: &dyn Channel,
    ) -> Result<Turn, ConversationError> {
        let stage = record.stage();
        tracing::debug!(record_id = %record.id, stage = %stage, "Handling message");

        let mut turn = match stage {
            Stage::AwaitIdentity => self.identity(record, msg)?,
            Stage::AwaitLoanAmount => self.loan_amount(record, &msg.content)?,
            Stage::AwaitDocument => self.document(record, msg, channel).await?,
            Stage::AwaitAge => self.age(record, &msg.content).await?,
            Stage::Complete => Turn::silent(),
        };

        if let Some(thread) = &msg.thread_id {
            turn.replies = turn
                .replies
                .into_iter()
                .map(|r| r.in_thread(thread.clone()))
                .collect();
        }
        if let Some(next) = turn.advanced_to {
            tracing::info!(record_id = %record.id, from = %stage, to = %next, "Stage advanced");
        }
        Ok(turn)
    }

    fn identity(
        &self,
        record: &mut ApplicantRecord,
        msg: &IncomingMessage,
    ) -> Result<Turn, ConversationError> {
        let name = match validate::classify_identity(&msg.content) {
            IdentityReply::Decline => return Ok(Turn::reply(prompts::ASK_NAME)),
            IdentityReply::Unrecognized => return Ok(Turn::reply(prompts::IDENTITY_REPROMPT)),
            IdentityReply::Confirm => msg.display_name().to_string(),
            IdentityReply::Name(name) => name,
        };

        let mut turn = Turn::reply(prompts::identity_confirmed(&name));
        record.name = Some(name);
        turn.advanced_to = Some(record.advance()?);
        Ok(turn)
    }

    fn loan_amount(
        &self,
        record: &mut ApplicantRecord,
        text: &str,
    ) -> Result<Turn, ConversationError> {
        let Some(amount) = validate::parse_loan_amount(text) else {
            return Ok(Turn::reply(prompts::INVALID_LOAN_AMOUNT));
        };

        let mut turn = Turn::reply(prompts::loan_amount_accepted(amount));
        turn.replies.push(match &self.template {
            Some(path) => OutgoingResponse::file(path, ""),
            None => OutgoingResponse::text(prompts::TEMPLATE_UNAVAILABLE),
        });

        record.loan_amount = Some(amount);
        turn.advanced_to = Some(record.advance()?);
        Ok(turn)
    }

    async fn document(
        &self,
        record: &mut ApplicantRecord,
        msg: &IncomingMessage,
        channel: &dyn Channel,
    ) -> Result<Turn, ConversationError> {
        let attachment = match msg.attachments.as_slice() {
            [one] if validate::is_pdf_name(&one.file_name) => one,
            _ => {
                tracing::debug!(
                    record_id = %record.id,
                    attachments = msg.attachments.len(),
                    "Ignoring message without a single PDF attachment"
                );
                return Ok(Turn::silent());
            }
        };

        let path = self.apps_dir.join(format!("{}.pdf", record.id));
        if !self.save_with_retry(channel, attachment, &path).await {
            return Ok(Turn::reply(prompts::ATTACHMENT_FAILED));
        }

        let text = self.read_document(&path).await;
        remove_transient(&path).await;

        let Some(text) = text else {
            return Ok(Turn::reply(prompts::UNREADABLE_APPLICATION));
        };

        let answers = match self.extractor.extract(&text) {
            Ok(answers) => answers,
            Err(e) => {
                tracing::info!(record_id = %record.id, "Malformed application: {}", e);
                return Ok(Turn::reply(prompts::MALFORMED_APPLICATION));
            }
        };

        record.merge_answers(&answers);
        let mut turn = Turn::reply(prompts::application_summary(record, &answers));
        turn.advanced_to = Some(record.advance()?);
        Ok(turn)
    }

    async fn save_with_retry(&self, channel: &dyn Channel, attachment: &Attachment, path: &Path) -> bool {
        if let Err(e) = tokio::fs::create_dir_all(&self.apps_dir).await {
            tracing::error!(dir = %self.apps_dir.display(), "Cannot create applications directory: {}", e);
            return false;
        }

        for attempt in 1..=ATTACHMENT_ATTEMPTS {
            match channel.save_attachment(attachment, path).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(
                        file = %attachment.file_name,
                        attempt,
                        "Failed to save attachment: {}",
                        e
                    );
                    remove_transient(path).await;
                }
            }
        }
        false
    }

    async fn read_document(&self, path: &Path) -> Option<String> {
        let parser = Arc::clone(&self.parser);
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || parser.extract_text(&owned)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(path = %path.display(), "Document parser task failed: {}", e);
                None
            }
        }
    }

    async fn age(&self, record: &mut ApplicantRecord, text: &str) -> Result<Turn, ConversationError> {
        let Some(age) = validate::parse_age(text) else {
            return Ok(Turn::reply(prompts::INVALID_AGE));
        };

        let mut candidate = record.clone();
        candidate.age = Some(age);

        let assessment = match self.assess(candidate.clone()).await {
            Ok(a) => a,
            Err(reason) => {
                tracing::warn!(record_id = %record.id, "Pricing failed: {}", reason);
                return Ok(Turn {
                    replies: vec![
                        OutgoingResponse::text(prompts::CALCULATING),
                        OutgoingResponse::text(prompts::PRICING_FAILED),
                    ],
                    ..Turn::default()
                });
            }
        };

        candidate.income = Some(assessment.income);
        candidate.default_probability = Some(assessment.default_probability);
        candidate.interest_rate = Some(assessment.quote.rate_percent);
        let next = candidate.advance()?;
        *record = candidate;

        let saved = match self.store.upsert_record(record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(record_id = %record.id, "Failed to persist completed record: {}", e);
                false
            }
        };

        tracing::info!(
            record_id = %record.id,
            rate = assessment.quote.rate_percent,
            saved,
            "Application complete"
        );

        Ok(Turn {
            replies: vec![
                OutgoingResponse::text(prompts::CALCULATING),
                OutgoingResponse::text(prompts::quote(assessment.quote.rate_percent)),
            ],
            advanced_to: Some(next),
            saved: Some(saved),
        })
    }

    async fn assess(&self, record: ApplicantRecord) -> Result<Assessment, String> {
        let pricer = self.pricer.clone();
        match tokio::task::spawn_blocking(move || pricer.assess(&record)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("pricing task failed: {e}")),
        }
    }
}

async fn remove_transient(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove transient file: {}", e),
    }
}
