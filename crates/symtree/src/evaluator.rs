//! Shared evaluation handle.
//!
//! [`Evaluator`] pairs an `Arc<Model>` with an [`EvaluatorConfig`] and is the
//! entry point for applications: load once, then score batches from any number
//! of threads.
//!
//! ```ignore
//! use symtree::{Evaluator, EvaluatorConfig};
//!
//! let config = EvaluatorConfig::builder()
//!     .cat_feature_indices(vec![0, 3])
//!     .n_threads(0)
//!     .build()?;
//! let evaluator = Evaluator::load("mushrooms.symt")?.with_config(config)?;
//! let scores = evaluator.evaluate_mixed(rows.view())?;
//! ```

use std::path::Path;
use std::sync::Arc;

use bon::Builder;
use ndarray::ArrayView2;

use crate::data::{ColumnLayout, FeatureValue};
use crate::error::{ConfigError, Result};
use crate::inference::{PredictionMatrix, Predictor, DEFAULT_BLOCK_SIZE};
use crate::model::Model;
use crate::run_with_threads;

// =============================================================================
// EvaluatorConfig
// =============================================================================

/// Evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct EvaluatorConfig {
    /// Flat column indices that hold categorical tokens in mixed rows.
    /// Entry `j` is the column of categorical feature `j`. Default: none.
    #[builder(default)]
    pub cat_feature_indices: Vec<usize>,

    /// Worker threads: 0 = all cores, 1 = sequential. Default: 1.
    #[builder(default = 1)]
    pub n_threads: usize,

    /// Rows per block. Default: 64.
    #[builder(default = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

impl<S: evaluator_config_builder::IsComplete> EvaluatorConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `block_size == 0`
    /// - a categorical column listed twice
    pub fn build(self) -> Result<EvaluatorConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cat_feature_indices: Vec::new(),
            n_threads: 1,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl EvaluatorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        let mut sorted = self.cat_feature_indices.clone();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::DuplicateCategoricalIndex(pair[0]));
        }
        Ok(())
    }

    /// Check the config against a model and derive the mixed-row layout.
    fn layout_for(&self, model: &Model) -> Result<ColumnLayout, ConfigError> {
        self.validate()?;
        let expected = model.n_categorical_features();
        if self.cat_feature_indices.len() != expected {
            return Err(ConfigError::CategoricalCountMismatch {
                configured: self.cat_feature_indices.len(),
                expected,
            });
        }
        ColumnLayout::new(model.n_features(), &self.cat_feature_indices)
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// A loaded model plus evaluation settings. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Evaluator {
    model: Arc<Model>,
    config: EvaluatorConfig,
    layout: ColumnLayout,
}

impl Evaluator {
    /// Wrap a model with a default config.
    ///
    /// The default layout puts categorical features after all numeric ones.
    pub fn new(model: impl Into<Arc<Model>>) -> Self {
        let model = model.into();
        let config = EvaluatorConfig {
            cat_feature_indices: (model.n_numeric_features()..model.n_features()).collect(),
            ..Default::default()
        };
        let layout =
            ColumnLayout::trailing_categorical(model.n_numeric_features(), model.n_categorical_features());
        Self {
            model,
            config,
            layout,
        }
    }

    /// Load a native-format model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Model::load(path)?))
    }

    /// Replace the config after checking it against the model.
    pub fn with_config(mut self, config: EvaluatorConfig) -> Result<Self> {
        self.layout = config.layout_for(&self.model)?;
        self.config = config;
        Ok(self)
    }

    #[inline]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    #[inline]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Raw scores for a numeric matrix and a token matrix.
    pub fn evaluate_batch<S>(
        &self,
        numeric: ArrayView2<'_, f32>,
        categorical: ArrayView2<'_, S>,
    ) -> Result<PredictionMatrix>
    where
        S: AsRef<str> + Sync,
    {
        let predictor = Predictor::new(&self.model).with_block_size(self.config.block_size);
        run_with_threads(self.config.n_threads, |parallelism| {
            predictor.predict(numeric, categorical, parallelism)
        })
    }

    /// Raw scores for rows that mix numeric values and tokens.
    ///
    /// Columns listed in `cat_feature_indices` must hold tokens; all others
    /// must hold numbers.
    pub fn evaluate_mixed(&self, rows: ArrayView2<'_, FeatureValue>) -> Result<PredictionMatrix> {
        let (numeric, tokens) = self.layout.split(rows)?;
        self.evaluate_batch(numeric.view(), tokens.view())
    }
}
