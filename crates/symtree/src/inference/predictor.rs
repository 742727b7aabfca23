//! Block-based batch predictor.
//!
//! Rows are scored in blocks of [`DEFAULT_BLOCK_SIZE`] (configurable). For
//! each block the numeric values are copied into a scratch buffer with NaN
//! handling applied, the tokens are encoded into buckets once, and then every
//! tree computes leaf indices for the whole block level by level.
//!
//! Each row's sum runs over trees in ensemble order no matter how blocks are
//! scheduled, so sequential and parallel runs give bit-identical scores.

use ndarray::{ArrayView2, ArrayViewMut2, Axis};

use crate::error::{FeatureShapeError, Result};
use crate::model::Model;
use crate::repr::BucketId;
use crate::Parallelism;

use super::output::PredictionMatrix;
use super::traversal::traverse_block;

/// Default block size for batch processing.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Per-worker buffers reused across blocks.
#[derive(Debug, Default)]
struct BlockScratch {
    numeric: Vec<f32>,
    buckets: Vec<BucketId>,
    indices: Vec<u32>,
}

impl BlockScratch {
    fn prepare(&mut self, n_rows: usize, n_numeric: usize, n_categorical: usize) {
        self.numeric.resize(n_rows * n_numeric, 0.0);
        self.buckets.resize(n_rows * n_categorical, 0);
        self.indices.resize(n_rows, 0);
    }
}

/// Batch predictor over a borrowed model.
///
/// ```ignore
/// use symtree::inference::Predictor;
/// use symtree::Parallelism;
///
/// let scores = Predictor::new(&model)
///     .with_block_size(128)
///     .predict(numeric.view(), tokens.view(), Parallelism::Parallel)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'m> {
    model: &'m Model,
    block_size: usize,
    n_trees: usize,
}

impl<'m> Predictor<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            block_size: DEFAULT_BLOCK_SIZE,
            n_trees: model.n_trees(),
        }
    }

    /// Rows per block (at least 1).
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Only use the first `n_trees` trees. Larger values use all trees.
    pub fn with_tree_limit(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.min(self.model.n_trees());
        self
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[inline]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Check that the two matrices fit the model.
    pub fn check_shapes<S>(
        &self,
        numeric: &ArrayView2<'_, f32>,
        categorical: &ArrayView2<'_, S>,
    ) -> Result<(), FeatureShapeError> {
        if numeric.nrows() != categorical.nrows() {
            return Err(FeatureShapeError::RowCountMismatch {
                numeric: numeric.nrows(),
                categorical: categorical.nrows(),
            });
        }
        if numeric.ncols() != self.model.n_numeric_features() {
            return Err(FeatureShapeError::NumericColumns {
                expected: self.model.n_numeric_features(),
                actual: numeric.ncols(),
            });
        }
        if categorical.ncols() != self.model.n_categorical_features() {
            return Err(FeatureShapeError::CategoricalColumns {
                expected: self.model.n_categorical_features(),
                actual: categorical.ncols(),
            });
        }
        Ok(())
    }

    /// Score every row. The result has one row per input row.
    pub fn predict<S>(
        &self,
        numeric: ArrayView2<'_, f32>,
        categorical: ArrayView2<'_, S>,
        parallelism: Parallelism,
    ) -> Result<PredictionMatrix>
    where
        S: AsRef<str> + Sync,
    {
        self.check_shapes(&numeric, &categorical)?;

        let n_rows = numeric.nrows();
        let mut output = PredictionMatrix::zeros(n_rows, self.model.n_outputs());
        if n_rows == 0 {
            return Ok(output);
        }

        log::trace!(
            "scoring {} rows in {} blocks ({:?})",
            n_rows,
            n_rows.div_ceil(self.block_size),
            parallelism
        );

        let chunks = numeric
            .axis_chunks_iter(Axis(0), self.block_size)
            .zip(categorical.axis_chunks_iter(Axis(0), self.block_size))
            .zip(output.scores_mut().axis_chunks_iter_mut(Axis(0), self.block_size));

        parallelism.maybe_par_bridge_for_each_init(
            chunks,
            BlockScratch::default,
            |scratch, ((numeric_block, categorical_block), output_block)| {
                self.predict_block_into(numeric_block, categorical_block, scratch, output_block);
            },
        );

        Ok(output)
    }

    fn predict_block_into<S: AsRef<str>>(
        &self,
        numeric: ArrayView2<'_, f32>,
        categorical: ArrayView2<'_, S>,
        scratch: &mut BlockScratch,
        mut output: ArrayViewMut2<'_, f64>,
    ) {
        let model = self.model;
        let n_rows = numeric.nrows();
        let n_numeric = numeric.ncols();
        let n_categorical = categorical.ncols();
        scratch.prepare(n_rows, n_numeric, n_categorical);

        // Step 1: contiguous numeric block with NaN handling applied
        if n_numeric > 0 {
            for (values, dst) in numeric
                .axis_iter(Axis(0))
                .zip(scratch.numeric.chunks_exact_mut(n_numeric))
            {
                for ((slot, &value), mode) in dst.iter_mut().zip(values.iter()).zip(model.nan_modes()) {
                    *slot = mode.sanitize(value);
                }
            }
        }

        // Step 2: encode tokens once per block
        if n_categorical > 0 {
            for (tokens, dst) in categorical
                .axis_iter(Axis(0))
                .zip(scratch.buckets.chunks_exact_mut(n_categorical))
            {
                model.encoder().encode_row_into(tokens.iter(), dst);
            }
        }

        // Step 3: accumulate tree contributions
        let ensemble = model.ensemble();
        for (tree, group) in ensemble.trees_with_groups().take(self.n_trees) {
            traverse_block(
                tree,
                &scratch.numeric,
                n_numeric,
                &scratch.buckets,
                n_categorical,
                &mut scratch.indices,
            );

            if tree.leaf_dim() == 1 {
                let leaves = tree.leaf_values();
                let mut lane = output.column_mut(group as usize);
                for (acc, &index) in lane.iter_mut().zip(&scratch.indices) {
                    *acc += leaves[index as usize];
                }
            } else {
                for (mut row, &index) in output.axis_iter_mut(Axis(0)).zip(&scratch.indices) {
                    for (acc, &value) in row.iter_mut().zip(tree.leaf(index as usize)) {
                        *acc += value;
                    }
                }
            }
        }

        // Step 4: scale and bias
        let scale = ensemble.scale();
        for mut row in output.axis_iter_mut(Axis(0)) {
            for (acc, &bias) in row.iter_mut().zip(ensemble.bias()) {
                *acc = bias + scale * *acc;
            }
        }
    }
}
