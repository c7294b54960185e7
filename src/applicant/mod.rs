//! Applicant data — the record built up over a conversation and the answer
//! schema of the application document.

pub mod fields;
pub mod record;

pub use fields::{ApplicationField, ExtractedAnswers, IncomeBracket};
pub use record::ApplicantRecord;
