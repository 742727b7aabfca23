//! Loaded, immutable models.
//!
//! A [`Model`] bundles the tree ensemble, the categorical dictionaries and the
//! numeric feature settings needed to score rows. It is validated once when it
//! is built or loaded and never changes afterwards, so it can be shared across
//! threads behind an `Arc` without locking.
//!
//! ```ignore
//! use symtree::Model;
//!
//! let model = Model::load("boston_housing.symt")?;
//! let scores = model.evaluate_batch(features.view(), tokens.view())?;
//! ```

pub mod meta;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::ArrayView2;

use crate::categories::CategoricalEncoder;
use crate::error::{Error, Result};
use crate::inference::PredictionMatrix;
use crate::io::{convert, FormatHeader, NativeCodec, Payload};
use crate::repr::{Ensemble, NanMode};

pub use meta::{ModelMeta, TaskKind};

/// Immutable symmetric-tree model ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    ensemble: Ensemble,
    encoder: CategoricalEncoder,
    nan_modes: Box<[NanMode]>,
    meta: ModelMeta,
}

#[bon::bon]
impl Model {
    /// Assemble and validate a model.
    ///
    /// `nan_modes` defaults to [`NanMode::Min`] for every numeric feature; when
    /// given it must have exactly `n_numeric_features` entries.
    ///
    /// ```ignore
    /// let model = Model::builder()
    ///     .ensemble(ensemble)
    ///     .n_numeric_features(4)
    ///     .meta(ModelMeta::for_multiclass(3))
    ///     .build()?;
    /// ```
    #[builder]
    pub fn new(
        ensemble: Ensemble,
        n_numeric_features: usize,
        #[builder(default)] encoder: CategoricalEncoder,
        nan_modes: Option<Vec<NanMode>>,
        #[builder(default)] meta: ModelMeta,
    ) -> Result<Self> {
        let nan_modes = nan_modes.unwrap_or_else(|| vec![NanMode::Min; n_numeric_features]);
        if nan_modes.len() != n_numeric_features {
            return Err(Error::corrupt(format!(
                "{} nan modes for {} numeric features",
                nan_modes.len(),
                n_numeric_features
            )));
        }
        Self::from_parts(ensemble, encoder, nan_modes, meta)
    }
}

impl Model {
    /// Validate parts into a model. The numeric feature count is `nan_modes.len()`.
    pub(crate) fn from_parts(
        ensemble: Ensemble,
        encoder: CategoricalEncoder,
        nan_modes: Vec<NanMode>,
        meta: ModelMeta,
    ) -> Result<Self> {
        ensemble
            .validate(nan_modes.len(), &encoder.bucket_counts())
            .map_err(|e| Error::corrupt(e.to_string()))?;
        meta.validate(ensemble.n_outputs()).map_err(Error::CorruptModel)?;

        Ok(Self {
            ensemble,
            encoder,
            nan_modes: nan_modes.into_boxed_slice(),
            meta,
        })
    }

    // =========================================================================
    // Loading & saving
    // =========================================================================

    /// Load a model from a native-format file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let model = Self::read_from(&mut reader)?;
        log::debug!("loaded model from {}", path.display());
        Ok(model)
    }

    /// Load a model from an in-memory native-format buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        Self::read_from(&mut reader)
    }

    /// Read a native-format model from any reader.
    ///
    /// Nothing is returned unless the header, checksum, payload and model
    /// structure all validate.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let (header, payload): (FormatHeader, Payload) = NativeCodec::new().deserialize(reader)?;
        let Payload::V1(v1) = payload;
        let model = convert::model_from_payload(v1)?;
        convert::check_header(&header, &model)?;

        log::debug!(
            "model: {} trees (max depth {}), {} numeric + {} categorical features, {} outputs",
            model.n_trees(),
            model.ensemble.max_depth(),
            model.n_numeric_features(),
            model.n_categorical_features(),
            model.n_outputs()
        );
        Ok(model)
    }

    /// Serialize to native-format bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = convert::header_for(self);
        let payload = Payload::V1(convert::payload_from_model(self));
        Ok(NativeCodec::new().serialize(header, &payload)?)
    }

    /// Write native-format bytes to any writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Save to a native-format file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::debug!("saved model with {} trees to {}", self.n_trees(), path.display());
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    #[inline]
    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    /// NaN handling of each numeric feature.
    #[inline]
    pub fn nan_modes(&self) -> &[NanMode] {
        &self.nan_modes
    }

    #[inline]
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    #[inline]
    pub fn task(&self) -> TaskKind {
        self.meta.task
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.ensemble.n_trees()
    }

    #[inline]
    pub fn n_numeric_features(&self) -> usize {
        self.nan_modes.len()
    }

    #[inline]
    pub fn n_categorical_features(&self) -> usize {
        self.encoder.n_features()
    }

    /// Total feature columns (numeric + categorical).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_numeric_features() + self.n_categorical_features()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.ensemble.n_outputs()
    }

    /// Score a batch sequentially. See [`crate::inference::evaluate_batch`].
    pub fn evaluate_batch<S>(
        &self,
        numeric: ArrayView2<'_, f32>,
        categorical: ArrayView2<'_, S>,
    ) -> Result<PredictionMatrix>
    where
        S: AsRef<str> + Sync,
    {
        crate::inference::evaluate_batch(self, numeric, categorical)
    }
}
