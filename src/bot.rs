//! Bot loop — routes inbound messages to applicant conversations.
//!
//! Each applicant gets a worker task with its own inbox. The run loop
//! forwards messages into inboxes in arrival order, so one applicant's
//! messages (commands included) are handled and answered strictly in order
//! while different applicants proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};
use crate::conversation::{
    prompts, ApplicantKey, ConversationController, SessionRegistry, Stage,
};
use crate::error::Error;

const INTERNAL_ERROR: &str = "Sorry, something went wrong on our side. Send /apply to start over.";

/// Bot-level commands. Everything else is conversation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Apply,
    Status,
    Help,
}

impl Command {
    pub fn parse(content: &str) -> Option<Self> {
        match content.trim().to_lowercase().as_str() {
            "/apply" | "/start" => Some(Self::Apply),
            "/status" => Some(Self::Status),
            "/help" | "/?" => Some(Self::Help),
            _ => None,
        }
    }
}

/// The running bot.
#[derive(Clone)]
pub struct LoanBot {
    channels: Arc<ChannelManager>,
    controller: Arc<ConversationController>,
    sessions: Arc<SessionRegistry>,
}

impl LoanBot {
    pub fn new(channels: ChannelManager, controller: ConversationController) -> Self {
        Self {
            channels: Arc::new(channels),
            controller: Arc::new(controller),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run until every channel stream ends or Ctrl+C.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;
        let mut inboxes = HashMap::new();
        let mut workers = JoinSet::new();

        tracing::info!(
            channels = ?self.channels.names(),
            "Loan bot ready and listening"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.dispatch(message, &mut inboxes, &mut workers);
        }

        // Closing the inboxes lets each worker finish what it has queued.
        drop(inboxes);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Applicant worker failed: {}", e);
            }
        }

        tracing::info!("Loan bot shutting down...");
        self.channels.shutdown_all().await;
        Ok(())
    }

    /// Queue a message on its applicant's inbox, starting a worker on first use.
    fn dispatch(
        &self,
        message: IncomingMessage,
        inboxes: &mut HashMap<ApplicantKey, mpsc::UnboundedSender<IncomingMessage>>,
        workers: &mut JoinSet<()>,
    ) {
        let key = ApplicantKey::new(&message.channel, &message.user_id);
        let message = match inboxes.get(&key) {
            Some(inbox) => match inbox.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        // `rx` is still held here, so the send cannot fail.
        let _ = tx.send(message);
        tracing::debug!(applicant = %key, "Starting applicant worker");
        inboxes.insert(key, tx);

        let bot = self.clone();
        workers.spawn(async move {
            while let Some(message) = rx.recv().await {
                bot.process(message).await;
            }
        });
    }

    /// Handle one message and deliver the replies.
    async fn process(&self, message: IncomingMessage) {
        let replies = match self.handle_message(&message).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::error!(
                    channel = %message.channel,
                    user = %message.user_id,
                    "Error handling message: {}",
                    e
                );
                vec![OutgoingResponse::text(INTERNAL_ERROR)]
            }
        };

        for reply in replies {
            if let Err(e) = self.channels.respond(&message, reply).await {
                tracing::warn!(channel = %message.channel, "Failed to send reply: {}", e);
            }
        }
    }

    /// Work out the replies to one inbound message.
    pub async fn handle_message(
        &self,
        message: &IncomingMessage,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        let key = ApplicantKey::new(&message.channel, &message.user_id);
        tracing::debug!(
            applicant = %key,
            attachments = message.attachments.len(),
            "Received message ({} chars)",
            message.content.len()
        );

        if let Some(command) = Command::parse(&message.content) {
            return Ok(self.command(command, key, message).await);
        }

        let Some(session) = self.sessions.get(&key).await else {
            return Ok(vec![OutgoingResponse::text(prompts::NO_ACTIVE_APPLICATION)]);
        };
        let mut record = session.lock().await;

        match record.stage() {
            Stage::Complete => {
                return Ok(vec![OutgoingResponse::text(prompts::ALREADY_COMPLETE)]);
            }
            Stage::AwaitDocument if !message.attachments.is_empty() => {
                self.status(message, StatusUpdate::Thinking("Reading your application".into()))
                    .await;
            }
            Stage::AwaitAge => {
                self.status(message, StatusUpdate::Thinking("Calculating".into()))
                    .await;
            }
            Stage::AwaitIdentity | Stage::AwaitLoanAmount | Stage::AwaitDocument => {}
        }

        let channel = self.channels.get(&message.channel)?;
        let turn = self
            .controller
            .handle(&mut record, message, channel.as_ref())
            .await?;

        if turn.saved == Some(false) {
            tracing::warn!(record_id = %record.id, "Completed application was not persisted");
        }
        if turn.replies.iter().any(|r| r.file.is_some()) {
            self.status(message, StatusUpdate::UploadingDocument).await;
        }
        Ok(turn.replies)
    }

    async fn command(
        &self,
        command: Command,
        key: ApplicantKey,
        message: &IncomingMessage,
    ) -> Vec<OutgoingResponse> {
        let text = match command {
            Command::Help => prompts::HELP.to_string(),
            Command::Status => match self.sessions.get(&key).await {
                Some(session) => prompts::status(&*session.lock().await),
                None => prompts::NO_ACTIVE_APPLICATION.to_string(),
            },
            Command::Apply => {
                let (record, turn) = self.controller.start(message);
                self.sessions.replace(key, record).await;
                return turn.replies;
            }
        };
        vec![OutgoingResponse::text(text)]
    }

    async fn status(&self, message: &IncomingMessage, status: StatusUpdate) {
        if let Err(e) = self.channels.send_status(message, status).await {
            tracing::debug!("Status update failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::applicant::IncomeBracket;
    use crate::channels::{Attachment, Channel, MessageStream};
    use crate::error::{ChannelError, ModelError};
    use crate::extract::PlainTextParser;
    use crate::scoring::{
        CountryIndex, DefaultRiskClassifier, IncomeClassifier, IncomeFeatures, PricingPolicy,
        RiskFeatures, RiskPricer,
    };
    use crate::store::{Database, LibSqlBackend};

    /// Replays a fixed script of inbound messages and records everything sent back.
    #[derive(Default)]
    struct Recorder {
        script: Mutex<Vec<IncomingMessage>>,
        statuses: Mutex<Vec<StatusUpdate>>,
        replies: Mutex<Vec<(String, String)>>,
    }

    impl Recorder {
        fn scripted(script: Vec<IncomingMessage>) -> Self {
            Self {
                script: Mutex::new(script),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Channel for Recorder {
        fn name(&self) -> &str {
            "test"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let script = std::mem::take(&mut *self.script.lock().await);
            Ok(Box::pin(futures::stream::iter(script)))
        }

        async fn respond(
            &self,
            msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.replies
                .lock()
                .await
                .push((msg.user_id.clone(), response.content));
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
                    name: "test".into(),
                    file_name: attachment.file_name.clone(),
                    reason: e.to_string(),
                })
        }

        async fn send_status(
            &self,
            status: StatusUpdate,
            _metadata: &serde_json::Value,
        ) -> Result<(), ChannelError> {
            self.statuses.lock().await.push(status);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    struct FixedIncome;

    impl IncomeClassifier for FixedIncome {
        fn predict(&self, _input: &IncomeFeatures) -> Result<IncomeBracket, ModelError> {
            Ok(IncomeBracket::Above50K)
        }
    }

    struct FixedRisk;

    impl DefaultRiskClassifier for FixedRisk {
        fn predict_default(&self, _input: &RiskFeatures) -> Result<f64, ModelError> {
            Ok(0.5)
        }
    }

    async fn bot() -> (LoanBot, Arc<Recorder>, tempfile::TempDir) {
        bot_on(Recorder::default()).await
    }

    async fn bot_on(recorder: Recorder) -> (LoanBot, Arc<Recorder>, tempfile::TempDir) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        store.run_migrations().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let pricer = RiskPricer::new(
            CountryIndex::default(),
            Arc::new(FixedIncome),
            Arc::new(FixedRisk),
            PricingPolicy::default(),
        );
        let controller = ConversationController::new(
            store,
            Arc::new(PlainTextParser),
            pricer,
            dir.path().join("apps"),
        );

        let recorder = Arc::new(recorder);
        let mut channels = ChannelManager::new();
        channels.add(recorder.clone());
        (LoanBot::new(channels, controller), recorder, dir)
    }

    fn msg(content: &str) -> IncomingMessage {
        IncomingMessage::new("test", "u1", content).with_user_name("Ada")
    }

    fn contents(replies: &[OutgoingResponse]) -> Vec<&str> {
        replies.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Command::parse("/apply"), Some(Command::Apply));
        assert_eq!(Command::parse("  /APPLY "), Some(Command::Apply));
        assert_eq!(Command::parse("/start"), Some(Command::Apply));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/apply now"), None);
        assert_eq!(Command::parse("yes"), None);
    }

    #[tokio::test]
    async fn message_without_session_gets_hint() {
        let (bot, _, _dir) = bot().await;
        let replies = bot.handle_message(&msg("hello")).await.unwrap();
        assert_eq!(contents(&replies), vec![prompts::NO_ACTIVE_APPLICATION]);
        assert!(bot.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn apply_opens_a_session_and_greets() {
        let (bot, _, _dir) = bot().await;
        let replies = bot.handle_message(&msg("/apply")).await.unwrap();
        assert!(replies[0].content.contains("full name is Ada?"));
        assert_eq!(bot.sessions().len().await, 1);

        let replies = bot.handle_message(&msg("/status")).await.unwrap();
        assert!(replies[0].content.contains("confirm your name"));
    }

    #[tokio::test]
    async fn apply_restarts_an_existing_application() {
        let (bot, _, _dir) = bot().await;
        bot.handle_message(&msg("/apply")).await.unwrap();
        bot.handle_message(&msg("yes")).await.unwrap();

        let key = ApplicantKey::new("test", "u1");
        let first = bot.sessions().get(&key).await.unwrap().lock().await.id;
        assert_eq!(
            bot.sessions().get(&key).await.unwrap().lock().await.stage(),
            Stage::AwaitLoanAmount
        );

        bot.handle_message(&msg("/apply")).await.unwrap();
        let session = bot.sessions().get(&key).await.unwrap();
        let record = session.lock().await;
        assert_ne!(record.id, first);
        assert_eq!(record.stage(), Stage::AwaitIdentity);
    }

    #[tokio::test]
    async fn applicants_are_kept_apart() {
        let (bot, _, _dir) = bot().await;
        bot.handle_message(&msg("/apply")).await.unwrap();

        let other = IncomingMessage::new("test", "u2", "yes");
        let replies = bot.handle_message(&other).await.unwrap();
        assert_eq!(contents(&replies), vec![prompts::NO_ACTIVE_APPLICATION]);
    }

    #[tokio::test]
    async fn full_conversation_then_already_complete() {
        let (bot, recorder, dir) = bot().await;
        let upload = dir.path().join("filled.pdf");
        std::fs::write(
            &upload,
            "Race: White\nSex: Female\nAnswer: Yes\nAnswer: Private, Sales, 40\n\
             Answer: No\nAnswer: RENT\nAnswer: Bachelors\nAnswer: Canada\n\
             Answer: B\nAnswer: N\n",
        )
        .unwrap();

        bot.handle_message(&msg("/apply")).await.unwrap();
        bot.handle_message(&msg("yes")).await.unwrap();
        bot.handle_message(&msg("1000")).await.unwrap();

        let document = msg("").with_attachment(Attachment::new(
            "filled.pdf",
            upload.to_string_lossy(),
        ));
        let replies = bot.handle_message(&document).await.unwrap();
        assert!(replies[0].content.contains("Private"));

        let replies = bot.handle_message(&msg("30")).await.unwrap();
        assert_eq!(
            contents(&replies),
            vec![prompts::CALCULATING, "Your expected interest is: 12%"]
        );
        let statuses = recorder.statuses.lock().await.clone();
        assert!(statuses.contains(&StatusUpdate::Thinking("Reading your application".into())));
        assert!(statuses.contains(&StatusUpdate::Thinking("Calculating".into())));

        let replies = bot.handle_message(&msg("31")).await.unwrap();
        assert_eq!(contents(&replies), vec![prompts::ALREADY_COMPLETE]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_answers_each_applicant_in_order() {
        let users: Vec<String> = (0..200).map(|i| format!("u{i}")).collect();
        let script = users
            .iter()
            .flat_map(|user| {
                ["/apply", "yes", "1000"]
                    .into_iter()
                    .map(move |line| IncomingMessage::new("test", user, line).with_user_name("Ada"))
            })
            .collect();

        let (bot, recorder, _dir) = bot_on(Recorder::scripted(script)).await;
        let running = bot.clone();
        tokio::time::timeout(std::time::Duration::from_secs(30), running.run())
            .await
            .expect("bot did not drain its inboxes")
            .unwrap();

        let replies = recorder.replies.lock().await.clone();
        let expected = vec![
            prompts::welcome("Ada"),
            prompts::identity_confirmed("Ada"),
            prompts::loan_amount_accepted(1000),
            prompts::TEMPLATE_UNAVAILABLE.to_string(),
        ];

        let mut out_of_order = 0;
        for user in &users {
            let session = bot
                .sessions()
                .get(&ApplicantKey::new("test", user))
                .await
                .unwrap();
            let stage = session.lock().await.stage();

            let received: Vec<String> = replies
                .iter()
                .filter(|(to, _)| to == user)
                .map(|(_, content)| content.clone())
                .collect();

            if stage != Stage::AwaitDocument || received != expected {
                out_of_order += 1;
            }
        }
        assert_eq!(out_of_order, 0);
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let (bot, _, _dir) = bot().await;
        let stray = IncomingMessage::new("nowhere", "u1", "/apply");
        bot.handle_message(&stray).await.unwrap();

        let err = bot
            .handle_message(&IncomingMessage::new("nowhere", "u1", "yes"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Channel(ChannelError::UnknownChannel(_))
        ));
    }
}
