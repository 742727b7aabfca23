//! Conversion between runtime models and native payloads.
//!
//! Decoding goes through [`Model::from_parts`], so every payload is held to the
//! same structural checks as a model built in code.

use crate::categories::{CategoricalEncoder, HashBucketTable};
use crate::error::{Error, Result};
use crate::model::{Model, ModelMeta, TaskKind};
use crate::repr::{BucketSet, Ensemble, NanMode, ObliviousTree, Split};

use super::native::{FormatFlags, FormatHeader, ModelKind};
use super::payload::{
    DictionaryPayload, EnsemblePayload, FeaturesPayload, MetadataPayload, NanModeCode, PayloadV1,
    SplitPayload, TaskPayload, TreePayload,
};

// =============================================================================
// Header
// =============================================================================

/// Header describing `model`; size and checksum are filled in by the codec.
pub fn header_for(model: &Model) -> FormatHeader {
    let mut header = FormatHeader::new(
        ModelKind::Oblivious,
        model.n_numeric_features() as u32,
        model.n_categorical_features() as u32,
        model.n_outputs() as u32,
    );
    if model.ensemble().trees().iter().any(ObliviousTree::has_categorical) {
        header.flags.set(FormatFlags::HAS_CATEGORICAL);
    }
    if model.n_outputs() > 1 {
        header.flags.set(FormatFlags::MULTI_OUTPUT);
    }
    header
}

/// Reject files whose header disagrees with the decoded payload.
pub fn check_header(header: &FormatHeader, model: &Model) -> Result<()> {
    let expected = header_for(model);
    let counts = (
        header.num_numeric_features,
        header.num_categorical_features,
        header.num_outputs,
    );
    let actual = (
        expected.num_numeric_features,
        expected.num_categorical_features,
        expected.num_outputs,
    );
    if counts != actual {
        return Err(Error::corrupt(format!(
            "header declares {counts:?} (numeric, categorical, outputs) but payload has {actual:?}"
        )));
    }
    Ok(())
}

// =============================================================================
// Runtime -> payload
// =============================================================================

fn nan_mode_code(mode: NanMode) -> NanModeCode {
    match mode {
        NanMode::Min => 0,
        NanMode::Max => 1,
    }
}

fn task_payload(task: TaskKind) -> TaskPayload {
    match task {
        TaskKind::Regression => TaskPayload::Regression,
        TaskKind::BinaryClassification => TaskPayload::BinaryClassification,
        TaskKind::MulticlassClassification { n_classes } => TaskPayload::MulticlassClassification {
            n_classes: n_classes as u32,
        },
    }
}

fn split_payload(split: &Split) -> SplitPayload {
    match split {
        Split::Numeric { feature, threshold } => SplitPayload::Numeric {
            feature: *feature,
            threshold: *threshold,
        },
        Split::Categorical { feature, left } => SplitPayload::Categorical {
            feature: *feature,
            left_words: left.words().to_vec(),
        },
    }
}

impl From<&ObliviousTree> for TreePayload {
    fn from(tree: &ObliviousTree) -> Self {
        Self {
            leaf_dim: tree.leaf_dim() as u32,
            splits: tree.splits().iter().map(split_payload).collect(),
            leaf_values: tree.leaf_values().to_vec(),
        }
    }
}

impl From<&HashBucketTable> for DictionaryPayload {
    fn from(table: &HashBucketTable) -> Self {
        Self {
            salt: table.salt(),
            hashes: table.hashes().to_vec(),
        }
    }
}

/// Build the V1 payload of a model.
pub fn payload_from_model(model: &Model) -> PayloadV1 {
    let meta = model.meta();
    let ensemble = model.ensemble();

    PayloadV1 {
        metadata: MetadataPayload {
            task: task_payload(meta.task),
            objective: meta.objective.clone(),
            class_names: meta.class_names.clone(),
            attributes: meta.attributes.clone(),
        },
        features: FeaturesPayload {
            nan_modes: model.nan_modes().iter().copied().map(nan_mode_code).collect(),
            categorical: model.encoder().tables().iter().map(Into::into).collect(),
        },
        ensemble: EnsemblePayload {
            num_outputs: ensemble.n_outputs() as u32,
            scale: ensemble.scale(),
            bias: ensemble.bias().to_vec(),
            tree_groups: ensemble.tree_groups().to_vec(),
            trees: ensemble.trees().iter().map(Into::into).collect(),
        },
    }
}

// =============================================================================
// Payload -> runtime
// =============================================================================

fn nan_mode_from_code(code: NanModeCode) -> Result<NanMode> {
    match code {
        0 => Ok(NanMode::Min),
        1 => Ok(NanMode::Max),
        other => Err(Error::corrupt(format!("invalid nan mode code {other}"))),
    }
}

fn task_from_payload(task: TaskPayload) -> TaskKind {
    match task {
        TaskPayload::Regression => TaskKind::Regression,
        TaskPayload::BinaryClassification => TaskKind::BinaryClassification,
        TaskPayload::MulticlassClassification { n_classes } => TaskKind::MulticlassClassification {
            n_classes: n_classes as usize,
        },
    }
}

fn split_from_payload(split: SplitPayload) -> Split {
    match split {
        SplitPayload::Numeric { feature, threshold } => Split::Numeric { feature, threshold },
        SplitPayload::Categorical {
            feature,
            left_words,
        } => Split::Categorical {
            feature,
            left: BucketSet::from_words(left_words),
        },
    }
}

fn tree_from_payload(tree_idx: usize, tree: TreePayload) -> Result<ObliviousTree> {
    let splits = tree.splits.into_iter().map(split_from_payload).collect();
    ObliviousTree::new(splits, tree.leaf_values, tree.leaf_dim as usize)
        .map_err(|e| Error::corrupt(format!("tree {tree_idx}: {e}")))
}

/// Decode and validate a V1 payload.
pub fn model_from_payload(payload: PayloadV1) -> Result<Model> {
    let PayloadV1 {
        metadata,
        features,
        ensemble: ensemble_payload,
    } = payload;

    let nan_modes = features
        .nan_modes
        .into_iter()
        .map(nan_mode_from_code)
        .collect::<Result<Vec<_>>>()?;

    let tables = features
        .categorical
        .into_iter()
        .enumerate()
        .map(|(idx, dict)| {
            HashBucketTable::new(dict.salt, dict.hashes)
                .map_err(|e| Error::corrupt(format!("categorical feature {idx}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    if ensemble_payload.tree_groups.len() != ensemble_payload.trees.len() {
        return Err(Error::corrupt(format!(
            "{} tree groups for {} trees",
            ensemble_payload.tree_groups.len(),
            ensemble_payload.trees.len()
        )));
    }

    let n_outputs = ensemble_payload.num_outputs as usize;
    if ensemble_payload.bias.len() != n_outputs {
        return Err(Error::corrupt(format!(
            "bias has {} entries for {n_outputs} outputs",
            ensemble_payload.bias.len()
        )));
    }
    let mut ensemble =
        Ensemble::from_parts(n_outputs, ensemble_payload.scale, ensemble_payload.bias);
    for (tree_idx, (tree, group)) in ensemble_payload
        .trees
        .into_iter()
        .zip(ensemble_payload.tree_groups)
        .enumerate()
    {
        ensemble.push_tree(tree_from_payload(tree_idx, tree)?, group);
    }

    let meta = ModelMeta {
        task: task_from_payload(metadata.task),
        objective: metadata.objective,
        class_names: metadata.class_names,
        attributes: metadata.attributes,
    };

    Model::from_parts(ensemble, CategoricalEncoder::new(tables), nan_modes, meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> PayloadV1 {
        PayloadV1 {
            metadata: MetadataPayload {
                task: TaskPayload::Regression,
                objective: None,
                class_names: None,
                attributes: vec![("source".into(), "unit-test".into())],
            },
            features: FeaturesPayload {
                nan_modes: vec![0, 1],
                categorical: vec![DictionaryPayload {
                    salt: 3,
                    hashes: vec![10, 20, 30],
                }],
            },
            ensemble: EnsemblePayload {
                num_outputs: 1,
                scale: 0.5,
                bias: vec![2.0],
                tree_groups: vec![0],
                trees: vec![TreePayload {
                    leaf_dim: 1,
                    splits: vec![
                        SplitPayload::Numeric {
                            feature: 1,
                            threshold: 0.0,
                        },
                        SplitPayload::Categorical {
                            feature: 0,
                            left_words: vec![0b101],
                        },
                    ],
                    leaf_values: vec![1.0, 2.0, 3.0, 4.0],
                }],
            },
        }
    }

    #[test]
    fn payload_roundtrip_through_model() {
        let payload = sample_payload();
        let model = model_from_payload(payload.clone()).unwrap();
        assert_eq!(model.n_numeric_features(), 2);
        assert_eq!(model.nan_modes(), &[NanMode::Min, NanMode::Max]);
        assert_eq!(model.encoder().tables()[0].lookup_hash(30), 2);
        assert_eq!(payload_from_model(&model), payload);
    }

    #[test]
    fn invalid_nan_mode_rejected() {
        let mut payload = sample_payload();
        payload.features.nan_modes[0] = 7;
        assert!(matches!(model_from_payload(payload), Err(Error::CorruptModel(_))));
    }

    #[test]
    fn duplicate_dictionary_hash_rejected() {
        let mut payload = sample_payload();
        payload.features.categorical[0].hashes = vec![10, 10];
        assert!(matches!(model_from_payload(payload), Err(Error::CorruptModel(_))));
    }

    #[test]
    fn bucket_beyond_dictionary_rejected() {
        let mut payload = sample_payload();
        payload.ensemble.trees[0].splits[1] = SplitPayload::Categorical {
            feature: 0,
            left_words: vec![1 << 3],
        };
        assert!(matches!(model_from_payload(payload), Err(Error::CorruptModel(_))));
    }

    #[test]
    fn leaf_count_mismatch_rejected() {
        let mut payload = sample_payload();
        payload.ensemble.trees[0].leaf_values.pop();
        assert!(matches!(model_from_payload(payload), Err(Error::CorruptModel(_))));
    }

    #[test]
    fn header_flags_reflect_model() {
        let model = model_from_payload(sample_payload()).unwrap();
        let header = header_for(&model);
        assert!(header.flags.contains(FormatFlags::HAS_CATEGORICAL));
        assert!(!header.flags.contains(FormatFlags::MULTI_OUTPUT));
        assert_eq!(header.num_numeric_features, 2);
        assert_eq!(header.num_categorical_features, 1);

        let mut lying = header;
        lying.num_numeric_features = 5;
        assert!(check_header(&lying, &model).is_err());
    }
}
