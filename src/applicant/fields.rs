//! Application fields and the answer set extracted from one document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The twelve fields recognized on a loan application.
///
/// Declaration order is the canonical order: it drives `Ord`, the iteration
/// order of [`ExtractedAnswers`], and the order of the summary shown back to
/// the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationField {
    Sex,
    Race,
    Employed,
    Workclass,
    Occupation,
    HoursPerWeek,
    MaritalStatus,
    HomeOwnership,
    Education,
    NativeCountry,
    LoanGrade,
    PriorDefault,
}

impl ApplicationField {
    pub const ALL: [ApplicationField; 12] = [
        Self::Sex,
        Self::Race,
        Self::Employed,
        Self::Workclass,
        Self::Occupation,
        Self::HoursPerWeek,
        Self::MaritalStatus,
        Self::HomeOwnership,
        Self::Education,
        Self::NativeCountry,
        Self::LoanGrade,
        Self::PriorDefault,
    ];

    /// Fields asked together as one joint question, in answer order.
    pub const JOINT: [ApplicationField; 3] = [Self::Workclass, Self::Occupation, Self::HoursPerWeek];

    /// Stable snake_case key used for storage and logs.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sex => "sex",
            Self::Race => "race",
            Self::Employed => "employed",
            Self::Workclass => "workclass",
            Self::Occupation => "occupation",
            Self::HoursPerWeek => "hours_per_week",
            Self::MaritalStatus => "marital_status",
            Self::HomeOwnership => "home_ownership",
            Self::Education => "education",
            Self::NativeCountry => "native_country",
            Self::LoanGrade => "loan_grade",
            Self::PriorDefault => "prior_default",
        }
    }

    /// Human-readable label for the extraction summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sex => "Gender",
            Self::Race => "Race",
            Self::Employed => "Employed",
            Self::Workclass => "Workclass",
            Self::Occupation => "Occupation",
            Self::HoursPerWeek => "Hours Worked Per Week",
            Self::MaritalStatus => "Married",
            Self::HomeOwnership => "Owns a House",
            Self::Education => "Education",
            Self::NativeCountry => "Native Country",
            Self::LoanGrade => "Loan Grade",
            Self::PriorDefault => "Previously Defaulted",
        }
    }
}

impl std::fmt::Display for ApplicationField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Predicted income bracket from the salary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeBracket {
    #[serde(rename = "<=50K")]
    AtMost50K,
    #[serde(rename = ">50K")]
    Above50K,
}

impl IncomeBracket {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AtMost50K => "<=50K",
            Self::Above50K => ">50K",
        }
    }

    /// Parse a model or database label. Whitespace is ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "<=50K" => Some(Self::AtMost50K),
            ">50K" => Some(Self::Above50K),
            _ => None,
        }
    }

    /// Binary encoding used as a risk-model input.
    pub fn as_indicator(&self) -> f64 {
        match self {
            Self::AtMost50K => 0.0,
            Self::Above50K => 1.0,
        }
    }
}

impl std::fmt::Display for IncomeBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Answers pulled from one application document, ordered canonically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedAnswers {
    values: BTreeMap<ApplicationField, String>,
}

impl ExtractedAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: ApplicationField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn get(&self, field: ApplicationField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every recognized field has a value.
    pub fn is_complete(&self) -> bool {
        ApplicationField::ALL.iter().all(|f| self.values.contains_key(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApplicationField, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Render the answers as `Label: value` lines.
    pub fn summary(&self) -> String {
        self.iter()
            .map(|(field, value)| format!("{}: {}\n", field.label(), value))
            .collect()
    }
}
