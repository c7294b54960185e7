//! Conversation stage machine — tracks which question the applicant is on.

use serde::{Deserialize, Serialize};

use crate::error::ConversationError;

/// The stages of a loan application conversation.
///
/// Progresses linearly: AwaitIdentity → AwaitLoanAmount → AwaitDocument →
/// AwaitAge → Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitIdentity,
    AwaitLoanAmount,
    AwaitDocument,
    AwaitAge,
    Complete,
}

impl Stage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            (AwaitIdentity, AwaitLoanAmount)
                | (AwaitLoanAmount, AwaitDocument)
                | (AwaitDocument, AwaitAge)
                | (AwaitAge, Complete)
        )
    }

    /// Whether this stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<Stage> {
        use Stage::*;
        match self {
            AwaitIdentity => Some(AwaitLoanAmount),
            AwaitLoanAmount => Some(AwaitDocument),
            AwaitDocument => Some(AwaitAge),
            AwaitAge => Some(Complete),
            Complete => None,
        }
    }

    /// Numeric progress marker (0 = identity … 4 = complete).
    pub fn index(&self) -> u8 {
        match self {
            Self::AwaitIdentity => 0,
            Self::AwaitLoanAmount => 1,
            Self::AwaitDocument => 2,
            Self::AwaitAge => 3,
            Self::Complete => 4,
        }
    }

    /// Advance `self` by exactly one stage.
    pub fn advance(&mut self) -> Result<Stage, ConversationError> {
        let next = self.next().ok_or(ConversationError::AlreadyComplete)?;
        if !self.can_transition_to(next) {
            return Err(ConversationError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(next)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::AwaitIdentity
    }
}

impl TryFrom<u8> for Stage {
    type Error = ConversationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AwaitIdentity),
            1 => Ok(Self::AwaitLoanAmount),
            2 => Ok(Self::AwaitDocument),
            3 => Ok(Self::AwaitAge),
            4 => Ok(Self::Complete),
            other => Err(ConversationError::UnknownStage(other)),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitIdentity => "await_identity",
            Self::AwaitLoanAmount => "await_loan_amount",
            Self::AwaitDocument => "await_document",
            Self::AwaitAge => "await_age",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
