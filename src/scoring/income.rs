//! Income-bracket classifier. Holds the salary model's input view and a
//! decision-forest implementation loaded from a JSON artifact.

use std::path::Path;

use serde::Deserialize;

use super::artifact::load_json;
use super::encoding::{
    CategoryTables, Development, FeatureSource, FeatureValue, hours_value, married_indicator,
    normalize_education,
};
use crate::applicant::{ApplicantRecord, IncomeBracket};
use crate::error::{ModelError, PricingError};

/// Inputs to the salary model, taken from a completed record.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeFeatures {
    pub age: f64,
    pub workclass: String,
    pub education: String,
    pub married: f64,
    pub occupation: String,
    pub race: String,
    pub sex: String,
    pub hours_per_week: f64,
    pub native_country: Development,
}

impl IncomeFeatures {
    pub fn from_record(
        record: &ApplicantRecord,
        native_country: Development,
    ) -> Result<Self, PricingError> {
        let text = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or(PricingError::IncompleteRecord(name))
        };

        Ok(Self {
            age: f64::from(record.age.ok_or(PricingError::IncompleteRecord("age"))?),
            workclass: text(&record.workclass, "workclass")?,
            education: normalize_education(&text(&record.education, "education")?),
            married: married_indicator(&text(&record.marital_status, "marital_status")?),
            occupation: text(&record.occupation, "occupation")?,
            race: text(&record.race, "race")?,
            sex: text(&record.sex, "sex")?,
            hours_per_week: hours_value(&text(&record.hours_per_week, "hours_per_week")?),
            native_country,
        })
    }
}

impl FeatureSource for IncomeFeatures {
    fn feature(&self, name: &str) -> Option<FeatureValue<'_>> {
        let value = match name {
            "age" => FeatureValue::Number(self.age),
            "workclass" => FeatureValue::Category(&self.workclass),
            "education" => FeatureValue::Category(&self.education),
            "marital_status" => FeatureValue::Number(self.married),
            "occupation" => FeatureValue::Category(&self.occupation),
            "race" => FeatureValue::Category(&self.race),
            "sex" => FeatureValue::Category(&self.sex),
            "hours_per_week" => FeatureValue::Number(self.hours_per_week),
            "native_country" => FeatureValue::Category(self.native_country.label()),
            _ => return None,
        };
        Some(value)
    }
}

/// Predicts whether an applicant earns above 50K.
pub trait IncomeClassifier: Send + Sync {
    fn predict(&self, input: &IncomeFeatures) -> Result<IncomeBracket, ModelError>;
}

/// One node of a binary decision tree.
///
/// Splits send `x[feature] <= threshold` left. Leaves hold per-class scores.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Serialized salary model.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestArtifact {
    pub version: String,
    pub features: Vec<String>,
    pub categories: CategoryTables,
    pub classes: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

/// Random-forest salary model: averages per-class leaf scores across trees.
#[derive(Debug, Clone)]
pub struct ForestIncomeModel {
    artifact: ForestArtifact,
    classes: Vec<IncomeBracket>,
    digest: String,
}

impl ForestIncomeModel {
    pub fn load(path: &Path, pinned: Option<&str>) -> Result<Self, ModelError> {
        let loaded = load_json::<ForestArtifact>(path, pinned)?;
        let mut model = Self::from_artifact(loaded.value)?;
        model.digest = loaded.digest;
        Ok(model)
    }

    /// Validate an artifact's shape and build the model.
    pub fn from_artifact(artifact: ForestArtifact) -> Result<Self, ModelError> {
        let shape = |reason: String| ModelError::Shape {
            model: "income".to_string(),
            reason,
        };

        let classes = artifact
            .classes
            .iter()
            .map(|c| IncomeBracket::from_label(c).ok_or_else(|| shape(format!("unknown class {c:?}"))))
            .collect::<Result<Vec<_>, _>>()?;
        if classes.is_empty() {
            return Err(shape("no classes".into()));
        }
        if artifact.trees.is_empty() {
            return Err(shape("no trees".into()));
        }

        let n_features = artifact.features.len();
        for (t, tree) in artifact.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(shape(format!("tree {t} is empty")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= n_features {
                            return Err(shape(format!("tree {t} node {i}: feature {feature} out of range")));
                        }
                        // Children always follow their parent, so traversal terminates.
                        let in_range = |c: usize| c > i && c < tree.nodes.len();
                        if !in_range(*left) || !in_range(*right) {
                            return Err(shape(format!("tree {t} node {i}: bad child index")));
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.len() != classes.len() {
                            return Err(shape(format!(
                                "tree {t} node {i}: {} scores for {} classes",
                                value.len(),
                                classes.len()
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            artifact,
            classes,
            digest: String::new(),
        })
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    fn leaf<'a>(tree: &'a DecisionTree, row: &[f64]) -> &'a [f64] {
        let mut idx = 0;
        loop {
            match &tree.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

impl IncomeClassifier for ForestIncomeModel {
    fn predict(&self, input: &IncomeFeatures) -> Result<IncomeBracket, ModelError> {
        let row = self
            .artifact
            .categories
            .encode_row("income", &self.artifact.features, input)?;

        let mut scores = vec![0.0; self.classes.len()];
        for tree in &self.artifact.trees {
            let leaf = Self::leaf(tree, &row);
            let total: f64 = leaf.iter().sum();
            for (score, v) in scores.iter_mut().zip(leaf) {
                *score += if total > 0.0 { v / total } else { 0.0 };
            }
        }

        // First class wins ties, matching argmax.
        let best = scores
            .iter()
            .enumerate()
            .fold(0, |best, (i, s)| if *s > scores[best] { i } else { best });
        Ok(self.classes[best])
    }
}
