//! Configuration types.
//!
//! Everything is read from the environment (after loading `.env` if present).

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::scoring::{ModelPins, PricingPolicy};

/// Telegram channel settings. Present only when a bot token is configured.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Allowed user ids or usernames; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Where submitted applications are saved while being parsed.
    pub apps_dir: PathBuf,
    /// Blank application form sent to applicants.
    pub template: Option<PathBuf>,
    /// Directory holding the model artifacts and the HDI table.
    pub models_dir: PathBuf,
    pub model_pins: ModelPins,
    pub normalization_weight: f64,
    pub min_profit: f64,
    pub telegram: Option<TelegramConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/loan-assist.db"),
            apps_dir: PathBuf::from("./data/apps"),
            template: None,
            models_dir: PathBuf::from("./models"),
            model_pins: ModelPins::default(),
            normalization_weight: 0.0,
            min_profit: 0.0,
            telegram: None,
        }
    }
}

impl BotConfig {
    /// Load from the process environment, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let normalization_weight = match get("LOAN_ASSIST_NORMALIZATION") {
            Some(raw) => {
                let weight = parse_f64("LOAN_ASSIST_NORMALIZATION", &raw)?;
                if !(0.0..=1.0).contains(&weight) {
                    return Err(ConfigError::InvalidValue {
                        key: "LOAN_ASSIST_NORMALIZATION".to_string(),
                        message: format!("{weight} is outside [0, 1]"),
                    });
                }
                weight
            }
            None => defaults.normalization_weight,
        };

        // Out-of-range values fall back to 0 in the pricing policy.
        let min_profit = match get("LOAN_ASSIST_MIN_PROFIT") {
            Some(raw) => parse_f64("LOAN_ASSIST_MIN_PROFIT", &raw)?,
            None => defaults.min_profit,
        };

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|token| TelegramConfig {
            bot_token: SecretString::from(token),
            allowed_users: get("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        });

        Ok(Self {
            db_path: get("LOAN_ASSIST_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            apps_dir: get("LOAN_ASSIST_APPS_DIR").map(PathBuf::from).unwrap_or(defaults.apps_dir),
            template: get("LOAN_ASSIST_TEMPLATE").map(PathBuf::from),
            models_dir: get("LOAN_ASSIST_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            model_pins: ModelPins {
                income: get("LOAN_ASSIST_INCOME_MODEL_SHA256"),
                risk: get("LOAN_ASSIST_RISK_MODEL_SHA256"),
            },
            normalization_weight,
            min_profit,
            telegram,
        })
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy::new(self.normalization_weight, self.min_profit)
    }
}

fn parse_f64(key: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a number"),
        })
}
