//! CatBoost JSON model export.
//!
//! Foreign types used only for parsing `model.save_model(path, format="json")`
//! output. Fields this crate has no use for are ignored by serde.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostModel {
    #[serde(default)]
    pub model_info: CatBoostModelInfo,
    pub features_info: CatBoostFeaturesInfo,
    pub oblivious_trees: Vec<CatBoostTree>,
    #[serde(default)]
    pub scale_and_bias: Option<CatBoostScaleAndBias>,
    /// Present when the model was exported together with its training pool.
    #[serde(default)]
    pub cat_features_hash: Vec<CatBoostCatHash>,
}

// =============================================================================
// Model info
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatBoostModelInfo {
    #[serde(default)]
    pub params: Option<CatBoostParams>,
    #[serde(default)]
    pub class_params: Option<CatBoostClassParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatBoostParams {
    #[serde(default)]
    pub loss_function: Option<CatBoostLossFunction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostLossFunction {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatBoostClassParams {
    /// Labels are strings or integers depending on the training target.
    #[serde(default)]
    pub class_names: Vec<Value>,
}

// =============================================================================
// Features
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatBoostFeaturesInfo {
    #[serde(default)]
    pub float_features: Vec<CatBoostFloatFeature>,
    #[serde(default)]
    pub categorical_features: Vec<CatBoostCategoricalFeature>,
    #[serde(default)]
    pub ctrs: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum NanValueTreatment {
    #[default]
    AsIs,
    AsFalse,
    AsTrue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostFloatFeature {
    #[serde(default)]
    pub flat_feature_index: Option<usize>,
    #[serde(default)]
    pub has_nans: bool,
    #[serde(default)]
    pub nan_value_treatment: NanValueTreatment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostCategoricalFeature {
    #[serde(default)]
    pub flat_feature_index: Option<usize>,
}

/// One entry of the exported hash-to-token map.
#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostCatHash {
    pub hash: i64,
    pub value: String,
}

// =============================================================================
// Trees
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostTree {
    /// `2^depth * dimension` values, leaf-major.
    pub leaf_values: Vec<f64>,
    #[serde(default)]
    pub splits: Vec<CatBoostSplit>,
}

/// One tree level. Which optional fields are set depends on `split_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostSplit {
    pub split_type: String,
    #[serde(default)]
    pub float_feature_index: Option<usize>,
    #[serde(default)]
    pub border: Option<f64>,
    #[serde(default)]
    pub cat_feature_index: Option<usize>,
    /// CatBoost's hash of the category for one-hot splits.
    #[serde(default)]
    pub value: Option<i64>,
}

// =============================================================================
// Scale and bias
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CatBoostBias {
    Scalar(f64),
    PerOutput(Vec<f64>),
}

/// `[scale, bias]`, where bias is a number or one number per output.
#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostScaleAndBias(pub f64, pub CatBoostBias);
