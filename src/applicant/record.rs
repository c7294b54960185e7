//! The applicant record accumulated over one loan conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fields::{ApplicationField, ExtractedAnswers, IncomeBracket};
use crate::conversation::Stage;
use crate::error::ConversationError;

/// Everything collected from, and derived for, one applicant.
///
/// Created empty when a conversation starts. Only the conversation controller
/// mutates it, and it is persisted once the conversation reaches
/// [`Stage::Complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub id: Uuid,
    /// Channel the conversation runs on (e.g. "telegram").
    pub channel: String,
    /// Channel-native user identifier.
    pub user_handle: String,
    pub name: Option<String>,
    pub loan_amount: Option<u64>,
    pub sex: Option<String>,
    pub race: Option<String>,
    pub employed: Option<String>,
    pub workclass: Option<String>,
    pub occupation: Option<String>,
    pub hours_per_week: Option<String>,
    pub marital_status: Option<String>,
    pub home_ownership: Option<String>,
    pub education: Option<String>,
    pub native_country: Option<String>,
    pub loan_grade: Option<String>,
    pub prior_default: Option<String>,
    pub age: Option<u8>,
    pub income: Option<IncomeBracket>,
    pub default_probability: Option<f64>,
    pub interest_rate: Option<u32>,
    stage: Stage,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApplicantRecord {
    /// Start an empty record with a freshly generated identifier.
    pub fn new(channel: impl Into<String>, user_handle: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), channel, user_handle)
    }

    pub fn with_id(id: Uuid, channel: impl Into<String>, user_handle: impl Into<String>) -> Self {
        Self {
            id,
            channel: channel.into(),
            user_handle: user_handle.into(),
            name: None,
            loan_amount: None,
            sex: None,
            race: None,
            employed: None,
            workclass: None,
            occupation: None,
            hours_per_week: None,
            marital_status: None,
            home_ownership: None,
            education: None,
            native_country: None,
            loan_grade: None,
            prior_default: None,
            age: None,
            income: None,
            default_probability: None,
            interest_rate: None,
            stage: Stage::default(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Advance the record by exactly one stage.
    pub fn advance(&mut self) -> Result<Stage, ConversationError> {
        let next = self.stage.advance()?;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(next)
    }

    /// Restore a stage read back from storage.
    pub(crate) fn restore_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Read one application field.
    pub fn field(&self, field: ApplicationField) -> Option<&str> {
        self.field_slot(field).as_deref()
    }

    /// Assign one application field.
    pub fn set_field(&mut self, field: ApplicationField, value: impl Into<String>) {
        *self.field_slot_mut(field) = Some(value.into());
    }

    /// Merge a whole extracted answer set, replacing any previous values.
    pub fn merge_answers(&mut self, answers: &ExtractedAnswers) {
        for (field, value) in answers.iter() {
            self.set_field(field, value);
        }
    }

    fn field_slot(&self, field: ApplicationField) -> &Option<String> {
        match field {
            ApplicationField::Sex => &self.sex,
            ApplicationField::Race => &self.race,
            ApplicationField::Employed => &self.employed,
            ApplicationField::Workclass => &self.workclass,
            ApplicationField::Occupation => &self.occupation,
            ApplicationField::HoursPerWeek => &self.hours_per_week,
            ApplicationField::MaritalStatus => &self.marital_status,
            ApplicationField::HomeOwnership => &self.home_ownership,
            ApplicationField::Education => &self.education,
            ApplicationField::NativeCountry => &self.native_country,
            ApplicationField::LoanGrade => &self.loan_grade,
            ApplicationField::PriorDefault => &self.prior_default,
        }
    }

    fn field_slot_mut(&mut self, field: ApplicationField) -> &mut Option<String> {
        match field {
            ApplicationField::Sex => &mut self.sex,
            ApplicationField::Race => &mut self.race,
            ApplicationField::Employed => &mut self.employed,
            ApplicationField::Workclass => &mut self.workclass,
            ApplicationField::Occupation => &mut self.occupation,
            ApplicationField::HoursPerWeek => &mut self.hours_per_week,
            ApplicationField::MaritalStatus => &mut self.marital_status,
            ApplicationField::HomeOwnership => &mut self.home_ownership,
            ApplicationField::Education => &mut self.education,
            ApplicationField::NativeCountry => &mut self.native_country,
            ApplicationField::LoanGrade => &mut self.loan_grade,
            ApplicationField::PriorDefault => &mut self.prior_default,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage.is_terminal()
    }
}
