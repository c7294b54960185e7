//! Error types for Loan Assist.

use std::path::PathBuf;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to fetch attachment {file_name} on channel {name}: {reason}")]
    AttachmentFailed {
        name: String,
        file_name: String,
        reason: String,
    },

    #[error("No channel registered under {0}")]
    UnknownChannel(String),

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

/// Application-document extraction errors.
///
/// An unreadable file is not an error here: the document parser reports it
/// as an empty result and the controller answers it separately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Malformed application: missing \"{label}\" line")]
    MissingLabel { label: &'static str },

    #[error("Malformed application: expected {expected} answers, found {found}")]
    NotEnoughAnswers { expected: usize, found: usize },

    #[error("Malformed application: joint answer \"{answer}\" must have {expected} comma-separated parts")]
    JointAnswerSplit { answer: String, expected: usize },
}

/// Model artifact loading and inference errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model artifact {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Model {model} is inconsistent: {reason}")]
    Shape { model: String, reason: String },

    #[error("Missing input {field} for model {model}")]
    MissingInput { model: String, field: String },
}

/// Interest-rate pricing errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Default probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),

    #[error("Loan amount must be positive")]
    ZeroLoanAmount,

    #[error("Weighted default probability {0} leaves no positive denominator")]
    DegenerateProbability(f64),

    #[error("Record is incomplete: missing {0}")]
    IncompleteRecord(&'static str),

    #[error("Model inference failed: {0}")]
    Inference(String),
}

/// Conversation state-machine errors.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Unknown conversation stage: {0}")]
    UnknownStage(u8),

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Already at terminal stage")]
    AlreadyComplete,
}
