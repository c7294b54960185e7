//! Staged application conversation: identity, loan amount, application
//! document, age, then a quoted rate.

pub mod controller;
pub mod prompts;
pub mod registry;
pub mod state;
pub mod validate;

pub use controller::{ConversationController, Turn};
pub use registry::{ApplicantKey, Session, SessionRegistry};
pub use state::Stage;
