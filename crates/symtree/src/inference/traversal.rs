//! Symmetric tree traversal.
//!
//! Every level of an oblivious tree tests the same split, so traversal is a
//! fixed sequence of `depth` comparisons whose outcomes are packed into the
//! leaf index: bit `d` is the outcome of level `d`. No node pointers are
//! followed.

use crate::repr::{BucketId, ObliviousTree, Split};

/// One row after categorical encoding.
///
/// Numeric values are used as-is: a NaN compares false against every
/// threshold and so behaves like [`crate::repr::NanMode::Min`]. Callers that
/// need per-feature NaN handling sanitize first (the predictor does).
#[derive(Debug, Clone, Copy)]
pub struct EncodedRow<'a> {
    pub numeric: &'a [f32],
    pub buckets: &'a [BucketId],
}

impl<'a> EncodedRow<'a> {
    pub fn new(numeric: &'a [f32], buckets: &'a [BucketId]) -> Self {
        Self { numeric, buckets }
    }
}

/// Leaf index reached by `row`.
///
/// Shapes are not checked here; [`crate::evaluate_row`] validates them.
///
/// # Panics
///
/// If a split names a feature past the end of `row.numeric` or `row.buckets`.
#[inline]
pub fn leaf_index(tree: &ObliviousTree, row: EncodedRow<'_>) -> usize {
    tree.splits()
        .iter()
        .enumerate()
        .fold(0usize, |index, (level, split)| {
            index | (usize::from(split.goes_right(row.numeric, row.buckets)) << level)
        })
}

/// Leaf values (`leaf_dim` of them) reached by `row`.
///
/// A depth-0 tree always yields its single leaf.
///
/// # Panics
///
/// Same as [`leaf_index`].
#[inline]
pub fn evaluate_tree<'t>(tree: &'t ObliviousTree, row: EncodedRow<'_>) -> &'t [f64] {
    tree.leaf(leaf_index(tree, row))
}

/// Leaf indices for a block of rows, computed one level at a time.
///
/// `numeric` and `buckets` are row-major with `n_numeric` and
/// `n_categorical` values per row. `indices` receives one index per row and
/// decides how many rows are processed.
///
/// Every split feature must be below `n_numeric` / `n_categorical`.
///
/// # Panics
///
/// If `numeric` or `buckets` is shorter than `indices.len()` rows.
pub fn traverse_block(
    tree: &ObliviousTree,
    numeric: &[f32],
    n_numeric: usize,
    buckets: &[BucketId],
    n_categorical: usize,
    indices: &mut [u32],
) {
    indices.fill(0);

    for (level, split) in tree.splits().iter().enumerate() {
        let bit = 1u32 << level;
        match split {
            Split::Numeric { feature, threshold } => {
                let f = *feature as usize;
                for (row, index) in indices.iter_mut().enumerate() {
                    if numeric[row * n_numeric + f] >= *threshold {
                        *index |= bit;
                    }
                }
            }
            Split::Categorical { feature, left } => {
                let f = *feature as usize;
                for (row, index) in indices.iter_mut().enumerate() {
                    if !left.contains(buckets[row * n_categorical + f]) {
                        *index |= bit;
                    }
                }
            }
        }
    }
}
