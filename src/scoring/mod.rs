//! Risk and pricing: country normalization, the two trained classifiers, and
//! the interest formula that turns their output into a quoted rate.

pub mod artifact;
pub mod country;
pub mod encoding;
pub mod income;
pub mod pricing;
pub mod risk;

use std::path::Path;
use std::sync::Arc;

pub use country::CountryIndex;
pub use encoding::{CategoryTables, Development};
pub use income::{ForestIncomeModel, IncomeClassifier, IncomeFeatures};
pub use pricing::{BASELINE_DEFAULT_PROBABILITY, PricingPolicy, RateQuote};
pub use risk::{DefaultRiskClassifier, LogisticRiskModel, RiskFeatures};

use crate::applicant::{ApplicantRecord, IncomeBracket};
use crate::error::{ModelError, PricingError};

pub const INCOME_MODEL_FILE: &str = "income_model.json";
pub const RISK_MODEL_FILE: &str = "risk_model.json";
pub const HDI_TABLE_FILE: &str = "hdi.csv";

/// Optional SHA-256 pins for the model artifacts.
#[derive(Debug, Clone, Default)]
pub struct ModelPins {
    pub income: Option<String>,
    pub risk: Option<String>,
}

/// Everything derived for a completed record.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub income: IncomeBracket,
    pub default_probability: f64,
    pub quote: RateQuote,
}

/// Prices a completed applicant record.
#[derive(Clone)]
pub struct RiskPricer {
    countries: Arc<CountryIndex>,
    income: Arc<dyn IncomeClassifier>,
    risk: Arc<dyn DefaultRiskClassifier>,
    policy: PricingPolicy,
}

impl RiskPricer {
    pub fn new(
        countries: CountryIndex,
        income: Arc<dyn IncomeClassifier>,
        risk: Arc<dyn DefaultRiskClassifier>,
        policy: PricingPolicy,
    ) -> Self {
        Self {
            countries: Arc::new(countries),
            income,
            risk,
            policy,
        }
    }

    /// Load both model artifacts and the HDI table from `dir`.
    pub fn from_dir(dir: &Path, pins: &ModelPins, policy: PricingPolicy) -> Result<Self, ModelError> {
        let income = ForestIncomeModel::load(&dir.join(INCOME_MODEL_FILE), pins.income.as_deref())?;
        let risk = LogisticRiskModel::load(&dir.join(RISK_MODEL_FILE), pins.risk.as_deref())?;
        let countries = CountryIndex::from_path(&dir.join(HDI_TABLE_FILE))?;

        tracing::info!(
            income_version = income.version(),
            income_sha256 = income.digest(),
            risk_version = risk.version(),
            risk_sha256 = risk.digest(),
            "Pricing models ready"
        );

        Ok(Self::new(countries, Arc::new(income), Arc::new(risk), policy))
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Run both classifiers and price the loan.
    ///
    /// Blocking; async callers should run it under `spawn_blocking`.
    pub fn assess(&self, record: &ApplicantRecord) -> Result<Assessment, PricingError> {
        let country = record
            .native_country
            .as_deref()
            .ok_or(PricingError::IncompleteRecord("native_country"))?;
        let development = self.countries.classify(country);

        let income_input = IncomeFeatures::from_record(record, development)?;
        let income = self
            .income
            .predict(&income_input)
            .map_err(|e| PricingError::Inference(e.to_string()))?;

        let risk_input = RiskFeatures::from_record(record, income)?;
        let default_probability = self
            .risk
            .predict_default(&risk_input)
            .map_err(|e| PricingError::Inference(e.to_string()))?;

        let loan_amount = record
            .loan_amount
            .ok_or(PricingError::IncompleteRecord("loan_amount"))?;
        let quote = self.policy.quote(loan_amount, default_probability)?;

        tracing::debug!(
            record_id = %record.id,
            income = income.label(),
            default_probability,
            rate = quote.rate_percent,
            "Applicant priced"
        );

        Ok(Assessment {
            income,
            default_probability,
            quote,
        })
    }
}

impl std::fmt::Debug for RiskPricer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskPricer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
