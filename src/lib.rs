//! Loan Assist — conversational loan-application bot with model-based pricing.

pub mod applicant;
pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod scoring;
pub mod store;
