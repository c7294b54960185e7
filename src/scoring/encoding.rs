//! Feature views over an applicant record and the ordinal category encoding
//! shipped with each trained model.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

static SCHOOL_GRADE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+th").unwrap());

/// A single raw feature value before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Number(f64),
    Category(&'a str),
}

/// Anything that can hand out named model inputs.
pub trait FeatureSource {
    fn feature(&self, name: &str) -> Option<FeatureValue<'_>>;
}

/// Ordinal category tables: feature name → categories in encoder order.
///
/// A category encodes as its position in the table. Values missing from the
/// table encode as `-1`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTables {
    tables: HashMap<String, Vec<String>>,
}

impl CategoryTables {
    pub fn new(tables: HashMap<String, Vec<String>>) -> Self {
        Self { tables }
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.tables.contains_key(feature)
    }

    /// Ordinal code for `value` under `feature`, matched case-insensitively.
    pub fn encode(&self, feature: &str, value: &str) -> f64 {
        let value = value.trim();
        let position = self
            .tables
            .get(feature)
            .and_then(|cats| cats.iter().position(|c| c.eq_ignore_ascii_case(value)));

        match position {
            Some(idx) => idx as f64,
            None => {
                tracing::debug!(feature, value, "Unknown category, encoding as -1");
                -1.0
            }
        }
    }

    /// Encode `features` from `source` into a row in the given order.
    pub fn encode_row(
        &self,
        model: &str,
        features: &[String],
        source: &dyn FeatureSource,
    ) -> Result<Vec<f64>, ModelError> {
        features
            .iter()
            .map(|name| match source.feature(name) {
                Some(FeatureValue::Number(n)) => Ok(n),
                Some(FeatureValue::Category(c)) => Ok(self.encode(name, c)),
                None => Err(ModelError::MissingInput {
                    model: model.to_string(),
                    field: name.clone(),
                }),
            })
            .collect()
    }
}

/// Native-country development status by the HDI ≥ 0.8 cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Development {
    Developed,
    Developing,
}

impl Development {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Developed => "developed",
            Self::Developing => "developing",
        }
    }
}

/// Marital status as the salary model saw it: 0 for not married, 1 otherwise.
pub fn married_indicator(answer: &str) -> f64 {
    const NOT_MARRIED: [&str; 7] = [
        "no",
        "n",
        "single",
        "divorced",
        "never-married",
        "never married",
        "widowed",
    ];
    let answer = answer.trim().to_ascii_lowercase();
    if NOT_MARRIED.contains(&answer.as_str()) {
        0.0
    } else {
        1.0
    }
}

/// Hours per week as a number; "N/A" and unparseable answers count as zero.
pub fn hours_value(answer: &str) -> f64 {
    answer
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|h| h.is_finite() && *h >= 0.0)
        .unwrap_or(0.0)
}

/// Collapse grade-numbered schooling ("9th", "7th-8th") to "Some-HS".
pub fn normalize_education(answer: &str) -> String {
    SCHOOL_GRADE.replace_all(answer.trim(), "Some-HS").into_owned()
}
