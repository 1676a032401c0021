//! Expected-current scoring.
//!
//! The scoring function is trained offline and shipped as a JSON artifact.
//! The loop only sees the [`Predictor`] trait: deterministic, synchronous,
//! side-effect free, no I/O. Anything satisfying that contract, including a
//! plain closure, can stand in for the bundled evaluators.
//!
//! # Artifact format
//!
//! ```json
//! {"kind": "linear", "intercept": 180.0, "weights": [0.05, 0.0002, 4.0, 0.3, 0.6]}
//! ```
//!
//! ```json
//! {"kind": "tree_ensemble", "base_score": 500.0, "trees": [
//!   {"nodes": [
//!     {"feature": 2, "threshold": 40.0, "left": 1, "right": 2},
//!     {"leaf": -20.0},
//!     {"leaf": 310.0}
//!   ]}
//! ]}
//! ```
//!
//! A file written by XGBoost's `save_model` (the native JSON format, with a
//! top-level `learner` object) is also accepted and loaded as a tree ensemble.
//!
//! Tree splits send a row left when `x[feature] < threshold`; a NaN feature
//! follows the split's `default_left` direction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::delta::FeatureVector;

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("failed to read model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Maps a feature vector to a predicted current draw in mA.
pub trait Predictor {
    fn predict(&self, features: &FeatureVector) -> f64;
}

impl<F> Predictor for F
where
    F: Fn(&FeatureVector) -> f64,
{
    fn predict(&self, features: &FeatureVector) -> f64 {
        self(features)
    }
}

// ---------------------------------------------------------------------------
// Linear model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    intercept: f64,
    weights: [f64; FeatureVector::LEN],
}

impl LinearModel {
    pub fn new(intercept: f64, weights: [f64; FeatureVector::LEN]) -> Result<Self, PredictorError> {
        let model = Self { intercept, weights };
        model.validate()?;
        Ok(model)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weights(&self) -> &[f64; FeatureVector::LEN] {
        &self.weights
    }

    fn validate(&self) -> Result<(), PredictorError> {
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(PredictorError::Invalid(
                "linear model has non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let x = features.to_array();
        self.intercept + (0..FeatureVector::LEN).map(|i| self.weights[i] * x[i]).sum::<f64>()
    }
}

// ---------------------------------------------------------------------------
// Tree ensemble
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Direction taken when the feature value is NaN.
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, PredictorError> {
        check_nodes(&nodes).map_err(PredictorError::Invalid)?;
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Walks from the root. A well-formed tree reaches a leaf within
    /// `nodes.len()` steps; anything else contributes 0.
    fn evaluate(&self, x: &[f64; FeatureVector::LEN]) -> f64 {
        let mut i = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(i) {
                Some(TreeNode::Leaf { leaf }) => return *leaf,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                }) => {
                    let value = x.get(*feature).copied().unwrap_or(f64::NAN);
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    i = if go_left { *left } else { *right };
                }
                None => break,
            }
        }
        0.0
    }
}

fn check_nodes(nodes: &[TreeNode]) -> Result<(), String> {
    if nodes.is_empty() {
        return Err("no nodes".to_string());
    }
    for (i, node) in nodes.iter().enumerate() {
        match *node {
            TreeNode::Leaf { leaf } => {
                if !leaf.is_finite() {
                    return Err(format!("node {i}: non-finite leaf"));
                }
            }
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if feature >= FeatureVector::LEN {
                    return Err(format!("node {i}: feature {feature} out of range"));
                }
                if threshold.is_nan() {
                    return Err(format!("node {i}: NaN threshold"));
                }
                // Children must point forward so evaluation always terminates.
                for child in [left, right] {
                    if child <= i || child >= nodes.len() {
                        return Err(format!("node {i}: bad child index {child}"));
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    pub fn new(base_score: f64, trees: Vec<RegressionTree>) -> Result<Self, PredictorError> {
        let model = Self { base_score, trees };
        model.validate()?;
        Ok(model)
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    fn validate(&self) -> Result<(), PredictorError> {
        if !self.base_score.is_finite() {
            return Err(PredictorError::Invalid("non-finite base_score".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            check_nodes(&tree.nodes)
                .map_err(|reason| PredictorError::Invalid(format!("tree {i} {reason}")))?;
        }
        Ok(())
    }
}

impl Predictor for TreeEnsemble {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let x = features.to_array();
        self.base_score + self.trees.iter().map(|t| t.evaluate(&x)).sum::<f64>()
    }
}

// ---------------------------------------------------------------------------
// XGBoost native JSON
// ---------------------------------------------------------------------------

/// Objectives whose prediction is the raw margin (identity link).
const IDENTITY_OBJECTIVES: &[&str] = &[
    "reg:squarederror",
    "reg:linear",
    "reg:absoluteerror",
    "reg:pseudohubererror",
];

const XGB_NO_CHILD: i64 = -1;

#[derive(Deserialize)]
struct XgbDocument {
    learner: XgbLearner,
}

#[derive(Deserialize)]
struct XgbLearner {
    learner_model_param: XgbModelParam,
    gradient_booster: XgbBooster,
    #[serde(default)]
    objective: Option<XgbObjective>,
}

#[derive(Deserialize)]
struct XgbModelParam {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Deserialize)]
struct XgbObjective {
    name: String,
}

#[derive(Deserialize)]
struct XgbBooster {
    #[serde(default)]
    name: Option<String>,
    model: XgbForest,
}

#[derive(Deserialize)]
struct XgbForest {
    trees: Vec<XgbTree>,
}

#[derive(Deserialize)]
struct XgbTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    /// Threshold on split nodes, leaf value (learning rate applied) on leaves.
    split_conditions: Vec<f64>,
    #[serde(default)]
    default_left: Vec<XgbFlag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older releases write `default_left` as 0/1, newer ones as booleans.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum XgbFlag {
    Bool(bool),
    Int(u8),
}

impl XgbFlag {
    fn is_set(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(n) => n != 0,
        }
    }
}

/// `"5E-1"`, or `"[5E-1]"` as written by 3.x.
fn parse_xgb_number(raw: &str, field: &str) -> Result<f64, PredictorError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse::<f64>()
        .map_err(|_| PredictorError::Invalid(format!("{field}: cannot parse {raw:?}")))
}

impl XgbTree {
    fn into_tree(self, index: usize) -> Result<RegressionTree, PredictorError> {
        let n = self.left_children.len();
        let invalid =
            |reason: String| PredictorError::Invalid(format!("xgboost tree {index}: {reason}"));
        if self.right_children.len() != n
            || self.split_indices.len() != n
            || self.split_conditions.len() != n
            || (!self.default_left.is_empty() && self.default_left.len() != n)
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }
        if self.split_type.iter().any(|&t| t != 0) {
            return Err(invalid("categorical splits are not supported".to_string()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = self.left_children[i];
            let right = self.right_children[i];
            if left == XGB_NO_CHILD {
                nodes.push(TreeNode::Leaf {
                    leaf: self.split_conditions[i],
                });
                continue;
            }
            let child = |c: i64| {
                usize::try_from(c).map_err(|_| invalid(format!("node {i}: bad child {c}")))
            };
            let feature = usize::try_from(self.split_indices[i])
                .map_err(|_| invalid(format!("node {i}: bad split index")))?;
            nodes.push(TreeNode::Split {
                feature,
                threshold: self.split_conditions[i],
                left: child(left)?,
                right: child(right)?,
                default_left: self.default_left.get(i).is_some_and(|f| f.is_set()),
            });
        }
        check_nodes(&nodes).map_err(invalid)?;
        Ok(RegressionTree { nodes })
    }
}

impl TreeEnsemble {
    fn from_xgboost(doc: XgbDocument) -> Result<Self, PredictorError> {
        let learner = doc.learner;
        if let Some(objective) = &learner.objective {
            if !IDENTITY_OBJECTIVES.contains(&objective.name.as_str()) {
                return Err(PredictorError::Invalid(format!(
                    "xgboost objective {} is not a plain regression",
                    objective.name
                )));
            }
        }
        if let Some(name) = &learner.gradient_booster.name {
            if name != "gbtree" {
                return Err(PredictorError::Invalid(format!(
                    "xgboost booster {name} is not supported"
                )));
            }
        }
        if let Some(raw) = &learner.learner_model_param.num_feature {
            let count = parse_xgb_number(raw, "num_feature")?;
            if count != FeatureVector::LEN as f64 {
                return Err(PredictorError::Invalid(format!(
                    "xgboost model expects {raw} features, need {}",
                    FeatureVector::LEN
                )));
            }
        }
        let base_score = parse_xgb_number(&learner.learner_model_param.base_score, "base_score")?;
        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_tree(i))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(base_score, trees)
    }
}

// ---------------------------------------------------------------------------
// Artifact loading
// ---------------------------------------------------------------------------

/// A validated model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    /// Loaded from XGBoost's own JSON; never written back in that format.
    #[serde(skip)]
    Xgboost(TreeEnsemble),
}

impl ModelArtifact {
    pub fn from_json(raw: &str) -> Result<Self, PredictorError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let model = if value.get("learner").is_some() {
            let doc: XgbDocument = serde_json::from_value(value)?;
            Self::Xgboost(TreeEnsemble::from_xgboost(doc)?)
        } else {
            serde_json::from_value(value)?
        };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, PredictorError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PredictorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), PredictorError> {
        match self {
            Self::Linear(m) => m.validate(),
            Self::TreeEnsemble(m) | Self::Xgboost(m) => m.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::TreeEnsemble(_) => "tree_ensemble",
            Self::Xgboost(_) => "xgboost",
        }
    }
}

impl Predictor for ModelArtifact {
    fn predict(&self, features: &FeatureVector) -> f64 {
        match self {
            Self::Linear(m) => m.predict(features),
            Self::TreeEnsemble(m) | Self::Xgboost(m) => m.predict(features),
        }
    }
}
