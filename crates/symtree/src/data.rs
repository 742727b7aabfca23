//! Caller-side feature containers.
//!
//! The evaluation core takes two matrices: `f32` numeric features and raw
//! categorical tokens. Callers whose rows interleave both kinds use
//! [`FeatureValue`] cells plus a [`ColumnLayout`] that says which flat columns
//! are categorical.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView2};

use crate::error::{ConfigError, FeatureShapeError};

// =============================================================================
// FeatureValue
// =============================================================================

/// One cell of a mixed feature row.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f32),
    Token(String),
}

impl From<f32> for FeatureValue {
    fn from(value: f32) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(token: &str) -> Self {
        Self::Token(token.to_owned())
    }
}

impl From<String> for FeatureValue {
    fn from(token: String) -> Self {
        Self::Token(token)
    }
}

// =============================================================================
// FeatureRow
// =============================================================================

/// Borrowed view of a single row, split by feature kind.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRow<'a, S> {
    pub numeric: &'a [f32],
    pub categorical: &'a [S],
}

impl<'a, S> FeatureRow<'a, S> {
    pub fn new(numeric: &'a [f32], categorical: &'a [S]) -> Self {
        Self {
            numeric,
            categorical,
        }
    }
}

// =============================================================================
// ColumnLayout
// =============================================================================

/// Which feature a flat column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnSlot {
    Numeric(usize),
    Categorical(usize),
}

/// Assignment of flat columns to numeric and categorical features.
///
/// Numeric feature `i` is the `i`-th non-categorical column; categorical
/// feature `j` is the column at `cat_feature_indices[j]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    slots: Box<[ColumnSlot]>,
    numeric: Box<[usize]>,
    categorical: Box<[usize]>,
}

impl ColumnLayout {
    /// Build a layout for `n_columns` flat columns.
    pub fn new(n_columns: usize, cat_feature_indices: &[usize]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(cat_feature_indices.len());
        for &index in cat_feature_indices {
            if index >= n_columns {
                return Err(ConfigError::CategoricalIndexOutOfRange { index, n_columns });
            }
            if !seen.insert(index) {
                return Err(ConfigError::DuplicateCategoricalIndex(index));
            }
        }

        let numeric: Box<[usize]> = (0..n_columns).filter(|c| !seen.contains(c)).collect();
        let mut slots = vec![ColumnSlot::Numeric(0); n_columns];
        for (feature, &column) in numeric.iter().enumerate() {
            slots[column] = ColumnSlot::Numeric(feature);
        }
        for (feature, &column) in cat_feature_indices.iter().enumerate() {
            slots[column] = ColumnSlot::Categorical(feature);
        }

        Ok(Self {
            slots: slots.into_boxed_slice(),
            numeric,
            categorical: cat_feature_indices.into(),
        })
    }

    /// Layout with all numeric columns first, then all categorical ones.
    pub fn trailing_categorical(n_numeric: usize, n_categorical: usize) -> Self {
        let n_columns = n_numeric + n_categorical;
        Self {
            slots: (0..n_numeric)
                .map(ColumnSlot::Numeric)
                .chain((0..n_categorical).map(ColumnSlot::Categorical))
                .collect(),
            numeric: (0..n_numeric).collect(),
            categorical: (n_numeric..n_columns).collect(),
        }
    }

    #[inline]
    pub fn n_columns(&self) -> usize {
        self.slots.len()
    }

    /// Flat column of each numeric feature.
    #[inline]
    pub fn numeric_columns(&self) -> &[usize] {
        &self.numeric
    }

    /// Flat column of each categorical feature.
    #[inline]
    pub fn categorical_columns(&self) -> &[usize] {
        &self.categorical
    }

    /// Split mixed rows into a numeric matrix and a token matrix.
    ///
    /// Tokens are borrowed from `rows`. A cell of the wrong kind is a
    /// [`FeatureShapeError::ValueKind`].
    pub fn split<'a>(
        &self,
        rows: ArrayView2<'a, FeatureValue>,
    ) -> Result<(Array2<f32>, Array2<&'a str>), FeatureShapeError> {
        let n_columns = self.n_columns();
        if rows.ncols() != n_columns {
            return Err(FeatureShapeError::TotalColumns {
                expected: n_columns,
                actual: rows.ncols(),
            });
        }

        let n_rows = rows.nrows();
        let mut numeric = Array2::<f32>::zeros((n_rows, self.numeric.len()));
        let mut tokens = Array2::<&'a str>::from_elem((n_rows, self.categorical.len()), "");

        // Logical (row-major) order regardless of the view's strides.
        for (cell_index, cell) in rows.into_iter().enumerate() {
            let (row, column) = (cell_index / n_columns, cell_index % n_columns);
            match (self.slots[column], cell) {
                (ColumnSlot::Numeric(feature), FeatureValue::Numeric(value)) => {
                    numeric[[row, feature]] = *value;
                }
                (ColumnSlot::Categorical(feature), FeatureValue::Token(token)) => {
                    tokens[[row, feature]] = token.as_str();
                }
                (ColumnSlot::Numeric(_), FeatureValue::Token(_)) => {
                    return Err(FeatureShapeError::ValueKind {
                        row,
                        column,
                        expected: "numeric",
                    });
                }
                (ColumnSlot::Categorical(_), FeatureValue::Numeric(_)) => {
                    return Err(FeatureShapeError::ValueKind {
                        row,
                        column,
                        expected: "categorical",
                    });
                }
            }
        }

        Ok((numeric, tokens))
    }
}
