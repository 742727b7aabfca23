//! Importers for models trained by other libraries.

pub mod catboost;
