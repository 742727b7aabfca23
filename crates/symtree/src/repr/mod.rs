//! Canonical in-memory representation of symmetric tree ensembles.

pub mod ensemble;
pub mod split;
pub mod tree;

pub use ensemble::{Ensemble, EnsembleValidationError};
pub use split::{BucketId, BucketSet, NanMode, Split, UNKNOWN_BUCKET};
pub use tree::{ObliviousTree, TreeValidationError, MAX_DEPTH};
