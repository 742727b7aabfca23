//! CatBoost JSON import.
//!
//! Reads the JSON produced by `model.save_model(path, format="json")` and
//! converts it into a native [`Model`](crate::Model). Float splits and one-hot
//! categorical splits are supported; CTR-based splits are rejected with
//! [`Error::Unsupported`](crate::Error::Unsupported).
//!
//! One-hot splits name categories by CatBoost's own hash. The export must
//! include `cat_features_hash` (saved with the training pool) so those hashes
//! can be mapped back to tokens.

mod convert;
mod json;

pub use convert::load_json;
pub use json::{
    CatBoostBias, CatBoostCatHash, CatBoostCategoricalFeature, CatBoostClassParams,
    CatBoostFeaturesInfo, CatBoostFloatFeature, CatBoostLossFunction, CatBoostModel,
    CatBoostModelInfo, CatBoostParams, CatBoostScaleAndBias, CatBoostSplit, CatBoostTree,
    NanValueTreatment,
};
