//! Closed-form interest pricing from a default probability.

use serde::{Deserialize, Serialize};

use crate::error::PricingError;

/// Population-average default probability observed in training data.
pub const BASELINE_DEFAULT_PROBABILITY: f64 = 0.2181;

/// Pricing knobs: how much to discount the population baseline and the
/// minimum profit margin θ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    normalization_weight: f64,
    min_profit: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            normalization_weight: 0.0,
            min_profit: 0.0,
        }
    }
}

impl PricingPolicy {
    /// Weight is clamped to `[0, 1]`; a θ outside `[0, 1]` falls back to 0.
    pub fn new(normalization_weight: f64, min_profit: f64) -> Self {
        let normalization_weight = if normalization_weight.is_finite() {
            normalization_weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let min_profit = if (0.0..=1.0).contains(&min_profit) {
            min_profit
        } else {
            tracing::warn!(min_profit, "Minimum profit outside [0, 1], using 0");
            0.0
        };
        Self {
            normalization_weight,
            min_profit,
        }
    }

    pub fn normalization_weight(&self) -> f64 {
        self.normalization_weight
    }

    pub fn min_profit(&self) -> f64 {
        self.min_profit
    }

    /// Baseline scaled down by the normalization weight.
    pub fn average_probability(&self) -> f64 {
        BASELINE_DEFAULT_PROBABILITY * (1.0 - self.normalization_weight)
    }

    /// Price a loan for an applicant with the given default probability.
    pub fn quote(&self, loan_amount: u64, probability: f64) -> Result<RateQuote, PricingError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PricingError::ProbabilityOutOfRange(probability));
        }
        if loan_amount == 0 {
            return Err(PricingError::ZeroLoanAmount);
        }

        let average_probability = self.average_probability();
        let weighted_probability = probability * average_probability;
        if weighted_probability >= 1.0 {
            return Err(PricingError::DegenerateProbability(weighted_probability));
        }

        let amount = loan_amount as f64;
        let interest_amount =
            (self.min_profit * amount + amount * weighted_probability) / (1.0 - weighted_probability);
        let rate_percent = (100.0 * interest_amount / amount).floor() as u32;

        Ok(RateQuote {
            average_probability,
            weighted_probability,
            interest_amount,
            rate_percent,
        })
    }
}

/// Result of pricing one loan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub average_probability: f64,
    pub weighted_probability: f64,
    pub interest_amount: f64,
    pub rate_percent: u32,
}
