//! Native-country lookup by Human Development Index.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::encoding::Development;
use crate::error::ModelError;

/// HDI at or above this value counts as "developed".
pub const DEVELOPED_HDI_CUTOFF: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct HdiRow {
    country: String,
    hdi2019: Option<f64>,
}

/// Set of developed countries loaded from an HDI table.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    developed: HashSet<String>,
}

impl CountryIndex {
    /// Load a `country,hdi2019` CSV file.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let file = std::fs::File::open(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(file).map_err(|reason| ModelError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        tracing::info!(
            path = %path.display(),
            developed = index.developed.len(),
            "HDI table loaded"
        );
        Ok(index)
    }

    /// Parse an HDI CSV from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, String> {
        let mut csv = csv::Reader::from_reader(reader);
        let mut developed = HashSet::new();

        for row in csv.deserialize::<HdiRow>() {
            let row = row.map_err(|e| e.to_string())?;
            if row.hdi2019.is_some_and(|hdi| hdi >= DEVELOPED_HDI_CUTOFF) {
                developed.insert(normalize(&row.country));
            }
        }

        Ok(Self { developed })
    }

    pub fn classify(&self, country: &str) -> Development {
        if self.developed.contains(&normalize(country)) {
            Development::Developed
        } else {
            Development::Developing
        }
    }
}

/// Lowercase, trimmed, with hyphens and spaces treated alike.
fn normalize(country: &str) -> String {
    country
        .trim()
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
