//! Model serialization and deserialization.
//!
//! The native `.symt` format is a fixed 32-byte header followed by a
//! version-tagged Postcard payload. [`crate::Model::load`] and
//! [`crate::Model::save`] are the usual entry points.
//!
//! # Feature Flags
//!
//! - `compression`: adds zstd compression for large payloads

pub mod convert;
pub mod native;
pub mod payload;

pub use native::{
    DeserializeError, FormatFlags, FormatHeader, ModelKind, NativeCodec, SerializeError,
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, HEADER_SIZE, MAGIC,
};
pub use payload::{
    DictionaryPayload, EnsemblePayload, FeaturesPayload, MetadataPayload, Payload, PayloadV1,
    SplitPayload, TaskPayload, TreePayload,
};
