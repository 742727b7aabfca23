//! Symmetric (oblivious) decision tree.
//!
//! Every node at a given depth shares one [`Split`], so a tree of depth `D` is
//! just `D` conditions and `2^D` leaves. Bit `d` of a leaf index is the outcome
//! of `splits[d]`; no node graph is stored.

use thiserror::Error;

use super::split::Split;

/// Deepest tree the engine accepts (65536 leaves).
pub const MAX_DEPTH: usize = 16;

/// Structural validation errors for [`ObliviousTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeValidationError {
    #[error("depth {depth} exceeds maximum of {max}", max = MAX_DEPTH)]
    TooDeep { depth: usize },
    #[error("leaf dimension must be at least 1")]
    ZeroLeafDim,
    #[error("expected {expected} leaf values for depth {depth}, got {actual}")]
    LeafCountMismatch {
        depth: usize,
        expected: usize,
        actual: usize,
    },
    #[error("split at depth {depth} has a NaN threshold")]
    NanThreshold { depth: usize },
    #[error("leaf value {index} is not finite")]
    NonFiniteLeaf { index: usize },
}

/// One symmetric tree: a fixed array of per-depth splits plus the leaf table.
///
/// Leaves are stored row-major as `[n_leaves, leaf_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObliviousTree {
    splits: Box<[Split]>,
    leaf_values: Box<[f64]>,
    leaf_dim: usize,
}

impl ObliviousTree {
    /// Build and validate a tree.
    pub fn new(
        splits: Vec<Split>,
        leaf_values: Vec<f64>,
        leaf_dim: usize,
    ) -> Result<Self, TreeValidationError> {
        let tree = Self {
            splits: splits.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            leaf_dim,
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Tree with a single scalar leaf and no splits.
    pub fn constant(value: f64) -> Self {
        Self {
            splits: Box::new([]),
            leaf_values: Box::new([value]),
            leaf_dim: 1,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        1 << self.splits.len()
    }

    /// Number of values per leaf (1 for scalar trees).
    #[inline]
    pub fn leaf_dim(&self) -> usize {
        self.leaf_dim
    }

    #[inline]
    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Flat leaf table, `n_leaves * leaf_dim` long.
    #[inline]
    pub fn leaf_values(&self) -> &[f64] {
        &self.leaf_values
    }

    /// Values of one leaf.
    #[inline]
    pub fn leaf(&self, index: usize) -> &[f64] {
        let start = index * self.leaf_dim;
        &self.leaf_values[start..start + self.leaf_dim]
    }

    /// Whether any level splits on a categorical feature.
    pub fn has_categorical(&self) -> bool {
        self.splits.iter().any(Split::is_categorical)
    }

    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            return Err(TreeValidationError::TooDeep { depth });
        }
        if self.leaf_dim == 0 {
            return Err(TreeValidationError::ZeroLeafDim);
        }
        let expected = self.n_leaves() * self.leaf_dim;
        if self.leaf_values.len() != expected {
            return Err(TreeValidationError::LeafCountMismatch {
                depth,
                expected,
                actual: self.leaf_values.len(),
            });
        }
        for (d, split) in self.splits.iter().enumerate() {
            if let Split::Numeric { threshold, .. } = split {
                if threshold.is_nan() {
                    return Err(TreeValidationError::NanThreshold { depth: d });
                }
            }
        }
        if let Some(index) = self.leaf_values.iter().position(|v| !v.is_finite()) {
            return Err(TreeValidationError::NonFiniteLeaf { index });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_count_must_match_depth() {
        let err = ObliviousTree::new(vec![Split::numeric(0, 0.5)], vec![1.0, 2.0, 3.0], 1)
            .unwrap_err();
        assert_eq!(
            err,
            TreeValidationError::LeafCountMismatch {
                depth: 1,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn vector_leaves() {
        let tree = ObliviousTree::new(
            vec![Split::numeric(0, 0.5)],
            vec![0.1, 0.2, 0.3, 1.1, 1.2, 1.3],
            3,
        )
        .unwrap();
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.leaf(1), &[1.1, 1.2, 1.3]);
    }

    #[test]
    fn constant_tree() {
        let tree = ObliviousTree::constant(4.2);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.leaf(0), &[4.2]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn rejects_nan_threshold_and_zero_dim() {
        let err = ObliviousTree::new(vec![Split::numeric(0, f32::NAN)], vec![0.0, 1.0], 1)
            .unwrap_err();
        assert_eq!(err, TreeValidationError::NanThreshold { depth: 0 });

        let err = ObliviousTree::new(vec![], vec![], 0).unwrap_err();
        assert_eq!(err, TreeValidationError::ZeroLeafDim);
    }

    #[test]
    fn rejects_non_finite_leaves() {
        let err = ObliviousTree::new(vec![Split::numeric(0, 0.5)], vec![0.5, f64::NAN], 1)
            .unwrap_err();
        assert_eq!(err, TreeValidationError::NonFiniteLeaf { index: 1 });

        let err = ObliviousTree::new(vec![], vec![f64::NEG_INFINITY], 1).unwrap_err();
        assert_eq!(err, TreeValidationError::NonFiniteLeaf { index: 0 });
    }

    #[test]
    fn rejects_excessive_depth() {
        let splits = vec![Split::numeric(0, 0.0); MAX_DEPTH + 1];
        let err = ObliviousTree::new(splits, vec![], 1).unwrap_err();
        assert_eq!(err, TreeValidationError::TooDeep { depth: MAX_DEPTH + 1 });
    }
}
