//! Raw-score matrix returned by evaluation, plus caller-side transforms.
//!
//! Scores are always raw: no sigmoid or softmax is applied during evaluation.
//! The helpers here produce transformed copies on request.

use approx::{AbsDiffEq, RelativeEq};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// `n_rows x n_outputs` raw scores.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionMatrix {
    scores: Array2<f64>,
}

impl PredictionMatrix {
    pub fn new(scores: Array2<f64>) -> Self {
        Self { scores }
    }

    pub(crate) fn zeros(n_rows: usize, n_outputs: usize) -> Self {
        Self::new(Array2::zeros((n_rows, n_outputs)))
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.scores.nrows()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.scores.ncols()
    }

    #[inline]
    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.scores.row(row)
    }

    /// Score of `row` on output lane `output`.
    #[inline]
    pub fn get(&self, row: usize, output: usize) -> f64 {
        self.scores[[row, output]]
    }

    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.scores.view()
    }

    pub(crate) fn scores_mut(&mut self) -> &mut Array2<f64> {
        &mut self.scores
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.scores
    }

    /// Index of the largest score per row. Ties resolve to the lowest lane.
    pub fn argmax(&self) -> Vec<usize> {
        self.scores
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best, best_score), (k, &s)| {
                        if s > best_score {
                            (k, s)
                        } else {
                            (best, best_score)
                        }
                    })
                    .0
            })
            .collect()
    }

    /// Predicted class per row.
    ///
    /// A single lane is read as log-odds of class 1 (positive when the score
    /// is above zero). Several lanes use [`argmax`](Self::argmax).
    pub fn predicted_classes(&self) -> Vec<usize> {
        if self.n_outputs() == 1 {
            self.scores.column(0).iter().map(|&s| usize::from(s > 0.0)).collect()
        } else {
            self.argmax()
        }
    }

    /// Element-wise logistic sigmoid.
    pub fn sigmoid(&self) -> Array2<f64> {
        self.scores.mapv(sigmoid)
    }

    /// Row-wise softmax.
    pub fn softmax(&self) -> Array2<f64> {
        let mut out = self.scores.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|x| x / sum);
            }
        }
        out
    }
}

impl AbsDiffEq for PredictionMatrix {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.scores.dim() == other.scores.dim()
            && self
                .scores
                .iter()
                .zip(other.scores.iter())
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl RelativeEq for PredictionMatrix {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.scores.dim() == other.scores.dim()
            && self
                .scores
                .iter()
                .zip(other.scores.iter())
                .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}

/// Numerically stable sigmoid.
#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
