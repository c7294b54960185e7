//! Default-risk classifier: z-scored, PCA-projected logistic regression.

use std::path::Path;

use serde::Deserialize;

use super::artifact::load_json;
use super::encoding::{CategoryTables, FeatureSource, FeatureValue};
use crate::applicant::{ApplicantRecord, IncomeBracket};
use crate::error::{ModelError, PricingError};

/// Inputs to the default-risk model.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskFeatures {
    pub age: f64,
    pub income: IncomeBracket,
    pub home_ownership: String,
    pub employed: String,
    pub loan_grade: String,
    pub loan_amount: f64,
    pub prior_default: String,
}

impl RiskFeatures {
    pub fn from_record(record: &ApplicantRecord, income: IncomeBracket) -> Result<Self, PricingError> {
        let text = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or(PricingError::IncompleteRecord(name))
        };

        Ok(Self {
            age: f64::from(record.age.ok_or(PricingError::IncompleteRecord("age"))?),
            income,
            home_ownership: text(&record.home_ownership, "home_ownership")?,
            employed: text(&record.employed, "employed")?,
            loan_grade: text(&record.loan_grade, "loan_grade")?,
            loan_amount: record
                .loan_amount
                .ok_or(PricingError::IncompleteRecord("loan_amount"))? as f64,
            prior_default: text(&record.prior_default, "prior_default")?,
        })
    }
}

impl FeatureSource for RiskFeatures {
    fn feature(&self, name: &str) -> Option<FeatureValue<'_>> {
        let value = match name {
            "age" => FeatureValue::Number(self.age),
            "income" => FeatureValue::Number(self.income.as_indicator()),
            "home_ownership" => FeatureValue::Category(&self.home_ownership),
            "employed" => FeatureValue::Category(&self.employed),
            "loan_grade" => FeatureValue::Category(&self.loan_grade),
            "loan_amount" => FeatureValue::Number(self.loan_amount),
            "prior_default" => FeatureValue::Category(&self.prior_default),
            _ => return None,
        };
        Some(value)
    }
}

/// Predicts the probability that an applicant defaults.
pub trait DefaultRiskClassifier: Send + Sync {
    /// Probability of default in `[0, 1]`.
    fn predict_default(&self, input: &RiskFeatures) -> Result<f64, ModelError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Fixed linear projection: `components · (x - mean)`.
#[derive(Debug, Clone, Deserialize)]
pub struct Projection {
    pub mean: Vec<f64>,
    pub components: Vec<Vec<f64>>,
}

/// Serialized risk model.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticArtifact {
    pub version: String,
    pub features: Vec<String>,
    pub categories: CategoryTables,
    pub scaler: Scaler,
    pub projection: Projection,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

#[derive(Debug, Clone)]
pub struct LogisticRiskModel {
    artifact: LogisticArtifact,
    digest: String,
}

impl LogisticRiskModel {
    pub fn load(path: &Path, pinned: Option<&str>) -> Result<Self, ModelError> {
        let loaded = load_json::<LogisticArtifact>(path, pinned)?;
        let mut model = Self::from_artifact(loaded.value)?;
        model.digest = loaded.digest;
        Ok(model)
    }

    /// Validate dimensions and build the model.
    pub fn from_artifact(artifact: LogisticArtifact) -> Result<Self, ModelError> {
        let shape = |reason: String| ModelError::Shape {
            model: "risk".to_string(),
            reason,
        };

        let n = artifact.features.len();
        if n == 0 {
            return Err(shape("no features".into()));
        }
        if artifact.scaler.mean.len() != n || artifact.scaler.scale.len() != n {
            return Err(shape(format!("scaler must have {n} entries")));
        }
        if artifact.projection.mean.len() != n {
            return Err(shape(format!("projection mean must have {n} entries")));
        }
        if artifact.projection.components.iter().any(|c| c.len() != n) {
            return Err(shape(format!("every component must have {n} entries")));
        }
        if artifact.coefficients.len() != artifact.projection.components.len() {
            return Err(shape(format!(
                "{} coefficients for {} components",
                artifact.coefficients.len(),
                artifact.projection.components.len()
            )));
        }

        Ok(Self {
            artifact,
            digest: String::new(),
        })
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl DefaultRiskClassifier for LogisticRiskModel {
    fn predict_default(&self, input: &RiskFeatures) -> Result<f64, ModelError> {
        let a = &self.artifact;
        let row = a.categories.encode_row("risk", &a.features, input)?;

        let scaled: Vec<f64> = row
            .iter()
            .zip(a.scaler.mean.iter().zip(&a.scaler.scale))
            .map(|(x, (mean, scale))| {
                // A constant training column has zero scale.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect();

        let logit = a
            .projection
            .components
            .iter()
            .zip(&a.coefficients)
            .map(|(component, coef)| {
                let projected: f64 = component
                    .iter()
                    .zip(scaled.iter().zip(&a.projection.mean))
                    .map(|(w, (z, m))| w * (z - m))
                    .sum();
                coef * projected
            })
            .sum::<f64>()
            + a.intercept;

        Ok(sigmoid(logit))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
