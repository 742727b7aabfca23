//! Conversion from CatBoost JSON to native models.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::categories::{CategoricalEncoder, HashBucketTable};
use crate::error::{Error, Result};
use crate::model::{Model, ModelMeta};
use crate::repr::{BucketId, Ensemble, NanMode, ObliviousTree, Split, MAX_DEPTH};

use super::json::{
    CatBoostBias, CatBoostModel, CatBoostScaleAndBias, CatBoostSplit, CatBoostTree,
    NanValueTreatment,
};

fn json_error(err: serde_json::Error) -> Error {
    if err.is_io() {
        Error::Io(err.into())
    } else {
        Error::corrupt(format!("invalid CatBoost JSON: {err}"))
    }
}

/// Smallest `f32` strictly greater than `x`, so that `v > x` becomes `v >= next_up(x)`.
fn next_up(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        x
    } else if x == 0.0 {
        f32::from_bits(1)
    } else if x > 0.0 {
        f32::from_bits(x.to_bits() + 1)
    } else {
        f32::from_bits(x.to_bits() - 1)
    }
}

/// Tokens seen in one-hot splits of one categorical feature, in bucket order.
#[derive(Debug, Default)]
struct TokenDictionary {
    tokens: Vec<String>,
    buckets: HashMap<u32, BucketId>,
}

impl TokenDictionary {
    fn bucket_for(&mut self, catboost_hash: u32, token: &str) -> BucketId {
        *self.buckets.entry(catboost_hash).or_insert_with(|| {
            self.tokens.push(token.to_owned());
            (self.tokens.len() - 1) as BucketId
        })
    }
}

struct Converter<'a> {
    hash_to_token: HashMap<u32, &'a str>,
    dictionaries: Vec<TokenDictionary>,
}

impl<'a> Converter<'a> {
    fn new(source: &'a CatBoostModel) -> Self {
        let hash_to_token = source
            .cat_features_hash
            .iter()
            .map(|entry| (entry.hash as u32, entry.value.as_str()))
            .collect();
        let dictionaries = (0..source.features_info.categorical_features.len())
            .map(|_| TokenDictionary::default())
            .collect();
        Self {
            hash_to_token,
            dictionaries,
        }
    }

    fn convert_split(&mut self, tree_idx: usize, split: &CatBoostSplit) -> Result<Split> {
        match split.split_type.as_str() {
            "FloatFeature" => {
                let (Some(feature), Some(border)) = (split.float_feature_index, split.border) else {
                    return Err(Error::corrupt(format!(
                        "tree {tree_idx}: float split without feature index or border"
                    )));
                };
                Ok(Split::numeric(feature as u32, next_up(border as f32)))
            }
            "OneHotFeature" => {
                let (Some(feature), Some(value)) = (split.cat_feature_index, split.value) else {
                    return Err(Error::corrupt(format!(
                        "tree {tree_idx}: one-hot split without feature index or value"
                    )));
                };
                let hash = value as u32;
                let token = self.hash_to_token.get(&hash).copied().ok_or_else(|| {
                    Error::Unsupported(format!(
                        "tree {tree_idx}: one-hot value {value} has no token; \
                         export the model with its training pool"
                    ))
                })?;
                let dictionary = self.dictionaries.get_mut(feature).ok_or_else(|| {
                    Error::corrupt(format!(
                        "tree {tree_idx}: categorical feature {feature} out of range"
                    ))
                })?;
                let bucket = dictionary.bucket_for(hash, token);
                Ok(Split::categorical(feature as u32, [bucket]))
            }
            other => Err(Error::Unsupported(format!(
                "tree {tree_idx}: split type {other:?}"
            ))),
        }
    }

    /// One-hot splits set their bit on a match, while native categorical splits
    /// send members to bit 0. The leaves of such levels are mirrored to match.
    fn convert_tree(&mut self, tree_idx: usize, tree: &CatBoostTree, dim: usize) -> Result<ObliviousTree> {
        let mut splits = Vec::with_capacity(tree.splits.len());
        let mut flip = 0usize;
        for (level, split) in tree.splits.iter().enumerate() {
            let converted = self.convert_split(tree_idx, split)?;
            if converted.is_categorical() {
                flip |= 1 << level;
            }
            splits.push(converted);
        }

        let n_leaves = 1usize << splits.len();
        let mut leaves = Vec::with_capacity(n_leaves * dim);
        for leaf in 0..n_leaves {
            let source = (leaf ^ flip) * dim;
            leaves.extend_from_slice(&tree.leaf_values[source..source + dim]);
        }

        ObliviousTree::new(splits, leaves, dim)
            .map_err(|e| Error::corrupt(format!("tree {tree_idx}: {e}")))
    }
}

/// Values per leaf, checked to be the same for every tree.
fn leaf_dimension(trees: &[CatBoostTree]) -> Result<usize> {
    let mut dim = None;
    for (tree_idx, tree) in trees.iter().enumerate() {
        let depth = tree.splits.len();
        if depth > MAX_DEPTH {
            return Err(Error::corrupt(format!(
                "tree {tree_idx}: depth {depth} exceeds {MAX_DEPTH}"
            )));
        }
        let n_leaves = 1usize << depth;
        let len = tree.leaf_values.len();
        if len == 0 || len % n_leaves != 0 {
            return Err(Error::corrupt(format!(
                "tree {tree_idx}: {len} leaf values for depth {depth}"
            )));
        }
        let tree_dim = len / n_leaves;
        match dim {
            None => dim = Some(tree_dim),
            Some(d) if d != tree_dim => {
                return Err(Error::corrupt(format!(
                    "tree {tree_idx}: leaf dimension {tree_dim}, earlier trees use {d}"
                )))
            }
            Some(_) => {}
        }
    }
    dim.ok_or_else(|| Error::corrupt("model has no trees"))
}

fn class_name(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CatBoostModel {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(json_error)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(json_error)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Flat column indices of the categorical features, when the export has them.
    pub fn cat_feature_indices(&self) -> Option<Vec<usize>> {
        self.features_info
            .categorical_features
            .iter()
            .map(|f| f.flat_feature_index)
            .collect()
    }

    fn meta(&self, n_outputs: usize) -> ModelMeta {
        let loss = self
            .model_info
            .params
            .as_ref()
            .and_then(|p| p.loss_function.as_ref())
            .map(|l| l.kind.as_str());

        let mut meta = match loss {
            Some("Logloss" | "CrossEntropy") if n_outputs == 1 => {
                ModelMeta::for_binary_classification()
            }
            Some("MultiClass" | "MultiClassOneVsAll") => ModelMeta::for_multiclass(n_outputs),
            Some(_) | None if n_outputs > 1 => ModelMeta::for_multiclass(n_outputs),
            Some(_) | None => ModelMeta::for_regression(),
        };
        if let Some(loss) = loss {
            meta = meta.with_objective(loss);
        }

        if let Some(params) = &self.model_info.class_params {
            let names: Vec<String> = params.class_names.iter().map(class_name).collect();
            match meta.task.n_classes() {
                Some(n) if n == names.len() => meta = meta.with_class_names(names),
                _ if names.is_empty() => {}
                _ => log::warn!(
                    "ignoring {} class names for task {:?}",
                    names.len(),
                    meta.task
                ),
            }
        }
        meta
    }

    /// Build a native model.
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] for CTR and other non-float, non-one-hot splits,
    ///   and for one-hot values whose token is missing from `cat_features_hash`
    /// - [`Error::CorruptModel`] for inconsistent trees or feature references
    pub fn to_model(&self) -> Result<Model> {
        let dim = leaf_dimension(&self.oblivious_trees)?;
        if !self.features_info.ctrs.is_empty() {
            log::warn!(
                "ignoring {} CTR descriptions; CTR splits are rejected",
                self.features_info.ctrs.len()
            );
        }

        let mut converter = Converter::new(self);
        let mut ensemble = Ensemble::new(dim);
        for (tree_idx, tree) in self.oblivious_trees.iter().enumerate() {
            ensemble.push_tree(converter.convert_tree(tree_idx, tree, dim)?, 0);
        }

        if let Some(CatBoostScaleAndBias(scale, bias)) = &self.scale_and_bias {
            let bias = match bias {
                CatBoostBias::Scalar(b) => vec![*b; dim],
                CatBoostBias::PerOutput(b) if b.is_empty() => vec![0.0; dim],
                CatBoostBias::PerOutput(b) => b.clone(),
            };
            ensemble = ensemble.with_scale(*scale).with_bias(bias);
        }

        let tables = converter
            .dictionaries
            .into_iter()
            .enumerate()
            .map(|(feature, dict)| {
                HashBucketTable::from_tokens(feature as u32, &dict.tokens)
                    .map_err(|e| Error::corrupt(format!("categorical feature {feature}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let nan_modes = self
            .features_info
            .float_features
            .iter()
            .map(|f| match f.nan_value_treatment {
                NanValueTreatment::AsTrue => NanMode::Max,
                NanValueTreatment::AsIs | NanValueTreatment::AsFalse => NanMode::Min,
            })
            .collect::<Vec<_>>();

        let model = Model::builder()
            .ensemble(ensemble)
            .n_numeric_features(nan_modes.len())
            .encoder(CategoricalEncoder::new(tables))
            .nan_modes(nan_modes)
            .meta(self.meta(dim))
            .build()?;

        log::debug!(
            "imported CatBoost model: {} trees, {} numeric + {} categorical features, {} outputs",
            model.n_trees(),
            model.n_numeric_features(),
            model.n_categorical_features(),
            model.n_outputs()
        );
        Ok(model)
    }
}

/// Load a CatBoost JSON export as a native model.
pub fn load_json(path: impl AsRef<Path>) -> Result<Model> {
    CatBoostModel::load(path)?.to_model()
}
