//! symtree: inference for symmetric (oblivious) decision tree ensembles.
//!
//! Every tree applies one split per depth level to all rows, so a row's leaf
//! is the bit pattern of its split outcomes. Models mix numeric and categorical
//! features; categorical tokens are mapped to buckets through per-feature hash
//! dictionaries stored with the model.
//!
//! # Key Types
//!
//! - [`Model`] - Validated, immutable model; loads from the native format
//! - [`Evaluator`] / [`EvaluatorConfig`] - Shared evaluation handle and its settings
//! - [`PredictionMatrix`] - Raw scores, one row per input row and one column per output
//! - [`ModelRegistry`] - Named collection of loaded models
//!
//! # Loading CatBoost Models
//!
//! Use [`compat::catboost::CatBoostModel`] to import JSON exports.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod categories;
pub mod compat;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod inference;
pub mod io;
pub mod model;
pub mod registry;
pub mod repr;
#[doc(hidden)]
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use model::{Model, ModelMeta, TaskKind};

pub use error::{ConfigError, Error, FeatureShapeError, Result};

pub use evaluator::{Evaluator, EvaluatorConfig};
pub use registry::ModelRegistry;

pub use data::{ColumnLayout, FeatureRow, FeatureValue};
pub use inference::{evaluate_batch, evaluate_batch_range, evaluate_row, PredictionMatrix};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
