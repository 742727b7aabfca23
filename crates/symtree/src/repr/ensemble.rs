//! Ordered collection of oblivious trees with their output routing.

use thiserror::Error;

use super::split::Split;
use super::tree::{ObliviousTree, TreeValidationError};

/// Structural validation errors for [`Ensemble`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnsembleValidationError {
    #[error("ensemble has no trees")]
    Empty,
    #[error("ensemble must have at least one output")]
    ZeroOutputs,
    #[error("bias has {len} entries for {n_outputs} outputs")]
    BiasLenMismatch { n_outputs: usize, len: usize },
    #[error("{len} tree groups for {n_trees} trees")]
    TreeGroupsLenMismatch { n_trees: usize, len: usize },
    #[error("tree {tree_idx}: group {group} out of range for {n_outputs} outputs")]
    TreeGroupOutOfRange {
        tree_idx: usize,
        group: u32,
        n_outputs: usize,
    },
    #[error("tree {tree_idx}: leaf dimension {leaf_dim} must be 1 or {n_outputs}")]
    LeafDimMismatch {
        tree_idx: usize,
        leaf_dim: usize,
        n_outputs: usize,
    },
    #[error("tree {tree_idx}, depth {depth}: numeric feature {feature} out of range ({count} numeric features)")]
    NumericFeatureOutOfRange {
        tree_idx: usize,
        depth: usize,
        feature: u32,
        count: usize,
    },
    #[error("tree {tree_idx}, depth {depth}: categorical feature {feature} out of range ({count} categorical features)")]
    CategoricalFeatureOutOfRange {
        tree_idx: usize,
        depth: usize,
        feature: u32,
        count: usize,
    },
    #[error("tree {tree_idx}, depth {depth}: bucket {bucket} not in dictionary of {known} tokens")]
    BucketOutOfRange {
        tree_idx: usize,
        depth: usize,
        bucket: u32,
        known: usize,
    },
    #[error("non-finite scale or bias")]
    NonFiniteScaleOrBias,
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Ensemble of oblivious trees.
///
/// Each row's raw score for output `k` is
/// `bias[k] + scale * Σ contribution_k(tree)`, where a scalar tree contributes
/// to the single lane named by its group and a vector tree (leaf dimension
/// equal to the number of outputs) contributes to every lane.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    trees: Vec<ObliviousTree>,
    tree_groups: Vec<u32>,
    n_outputs: usize,
    scale: f64,
    bias: Vec<f64>,
}

impl Ensemble {
    /// Empty ensemble with the given number of outputs, unit scale and zero bias.
    pub fn new(n_outputs: usize) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_outputs,
            scale: 1.0,
            bias: vec![0.0; n_outputs],
        }
    }

    /// Empty ensemble from decoded parts. Nothing is sized by `n_outputs`
    /// until [`validate`](Self::validate) has matched it against `bias`.
    pub fn from_parts(n_outputs: usize, scale: f64, bias: Vec<f64>) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_outputs,
            scale,
            bias,
        }
    }

    /// Single-output ensemble (regression or binary classification).
    pub fn single_output() -> Self {
        Self::new(1)
    }

    pub fn with_bias(mut self, bias: Vec<f64>) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Append a tree routed to output `group`. Vector trees use group 0.
    pub fn push_tree(&mut self, tree: ObliviousTree, group: u32) {
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    /// Append scalar trees round-robin over outputs, the usual one-tree-per-class layout.
    pub fn push_round_robin<I: IntoIterator<Item = ObliviousTree>>(&mut self, trees: I) {
        for tree in trees {
            let group = (self.trees.len() % self.n_outputs.max(1)) as u32;
            self.push_tree(tree, group);
        }
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &ObliviousTree {
        &self.trees[idx]
    }

    #[inline]
    pub fn trees(&self) -> &[ObliviousTree] {
        &self.trees
    }

    #[inline]
    pub fn tree_groups(&self) -> &[u32] {
        &self.tree_groups
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&ObliviousTree, u32)> {
        self.trees.iter().zip(self.tree_groups.iter().copied())
    }

    /// Largest depth over all trees.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(ObliviousTree::depth).max().unwrap_or(0)
    }

    /// Validate structure and feature references.
    ///
    /// `bucket_counts[f]` is the dictionary size of categorical feature `f`;
    /// its length is the declared categorical feature count.
    pub fn validate(
        &self,
        n_numeric: usize,
        bucket_counts: &[usize],
    ) -> Result<(), EnsembleValidationError> {
        if self.trees.is_empty() {
            return Err(EnsembleValidationError::Empty);
        }
        if self.n_outputs == 0 {
            return Err(EnsembleValidationError::ZeroOutputs);
        }
        if self.bias.len() != self.n_outputs {
            return Err(EnsembleValidationError::BiasLenMismatch {
                n_outputs: self.n_outputs,
                len: self.bias.len(),
            });
        }
        if !self.scale.is_finite() || self.bias.iter().any(|b| !b.is_finite()) {
            return Err(EnsembleValidationError::NonFiniteScaleOrBias);
        }
        if self.tree_groups.len() != self.trees.len() {
            return Err(EnsembleValidationError::TreeGroupsLenMismatch {
                n_trees: self.trees.len(),
                len: self.tree_groups.len(),
            });
        }

        for (tree_idx, (tree, group)) in self.trees_with_groups().enumerate() {
            tree.validate()
                .map_err(|error| EnsembleValidationError::InvalidTree { tree_idx, error })?;

            let leaf_dim = tree.leaf_dim();
            let routed = if leaf_dim == 1 {
                (group as usize) < self.n_outputs
            } else if leaf_dim == self.n_outputs {
                group == 0
            } else {
                return Err(EnsembleValidationError::LeafDimMismatch {
                    tree_idx,
                    leaf_dim,
                    n_outputs: self.n_outputs,
                });
            };
            if !routed {
                return Err(EnsembleValidationError::TreeGroupOutOfRange {
                    tree_idx,
                    group,
                    n_outputs: self.n_outputs,
                });
            }

            for (depth, split) in tree.splits().iter().enumerate() {
                match split {
                    Split::Numeric { feature, .. } => {
                        if *feature as usize >= n_numeric {
                            return Err(EnsembleValidationError::NumericFeatureOutOfRange {
                                tree_idx,
                                depth,
                                feature: *feature,
                                count: n_numeric,
                            });
                        }
                    }
                    Split::Categorical { feature, left } => {
                        let Some(&known) = bucket_counts.get(*feature as usize) else {
                            return Err(EnsembleValidationError::CategoricalFeatureOutOfRange {
                                tree_idx,
                                depth,
                                feature: *feature,
                                count: bucket_counts.len(),
                            });
                        };
                        if let Some(bucket) = left.max_bucket() {
                            if bucket as usize >= known {
                                return Err(EnsembleValidationError::BucketOutOfRange {
                                    tree_idx,
                                    depth,
                                    bucket,
                                    known,
                                });
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
