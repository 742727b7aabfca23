//! Evaluation of loaded models.
//!
//! # Module Structure
//!
//! - [`traversal`]: leaf index of one symmetric tree, per row or per block
//! - [`predictor`]: block-based batch [`Predictor`] with optional parallelism
//! - [`output`]: the [`PredictionMatrix`] result and its transforms
//!
//! The free functions here are sequential shortcuts over [`Predictor`].

pub mod output;
pub mod predictor;
pub mod traversal;

pub use output::PredictionMatrix;
pub use predictor::{Predictor, DEFAULT_BLOCK_SIZE};
pub use traversal::{evaluate_tree, leaf_index, traverse_block, EncodedRow};

use ndarray::ArrayView2;

use crate::data::FeatureRow;
use crate::error::{FeatureShapeError, Result};
use crate::model::Model;
use crate::repr::UNKNOWN_BUCKET;
use crate::Parallelism;

/// Raw scores for every row: `bias[k] + scale * Σ contribution_k`.
///
/// `numeric` is `n_rows x n_numeric_features`, `categorical` is
/// `n_rows x n_categorical_features` of raw tokens. Either may have zero
/// columns when the model has no features of that kind.
pub fn evaluate_batch<S>(
    model: &Model,
    numeric: ArrayView2<'_, f32>,
    categorical: ArrayView2<'_, S>,
) -> Result<PredictionMatrix>
where
    S: AsRef<str> + Sync,
{
    Predictor::new(model).predict(numeric, categorical, Parallelism::Sequential)
}

/// Like [`evaluate_batch`] but only the first `n_trees` trees contribute.
pub fn evaluate_batch_range<S>(
    model: &Model,
    numeric: ArrayView2<'_, f32>,
    categorical: ArrayView2<'_, S>,
    n_trees: usize,
) -> Result<PredictionMatrix>
where
    S: AsRef<str> + Sync,
{
    Predictor::new(model)
        .with_tree_limit(n_trees)
        .predict(numeric, categorical, Parallelism::Sequential)
}

/// Raw scores of a single row, one per output.
pub fn evaluate_row<S: AsRef<str>>(model: &Model, row: FeatureRow<'_, S>) -> Result<Vec<f64>> {
    if row.numeric.len() != model.n_numeric_features() {
        return Err(FeatureShapeError::NumericColumns {
            expected: model.n_numeric_features(),
            actual: row.numeric.len(),
        }
        .into());
    }
    if row.categorical.len() != model.n_categorical_features() {
        return Err(FeatureShapeError::CategoricalColumns {
            expected: model.n_categorical_features(),
            actual: row.categorical.len(),
        }
        .into());
    }

    let numeric: Vec<f32> = row
        .numeric
        .iter()
        .zip(model.nan_modes())
        .map(|(&value, mode)| mode.sanitize(value))
        .collect();
    let mut buckets = vec![UNKNOWN_BUCKET; row.categorical.len()];
    model.encoder().encode_row_into(row.categorical, &mut buckets);

    let encoded = EncodedRow::new(&numeric, &buckets);
    let ensemble = model.ensemble();
    let mut sums = vec![0.0f64; model.n_outputs()];
    for (tree, group) in ensemble.trees_with_groups() {
        let leaf = evaluate_tree(tree, encoded);
        if tree.leaf_dim() == 1 {
            sums[group as usize] += leaf[0];
        } else {
            for (acc, &value) in sums.iter_mut().zip(leaf) {
                *acc += value;
            }
        }
    }

    Ok(sums
        .into_iter()
        .zip(ensemble.bias())
        .map(|(sum, &bias)| bias + ensemble.scale() * sum)
        .collect())
}
