//! Named collection of loaded models.
//!
//! A [`ModelRegistry`] is an ordinary value owned by the application; there
//! is no process-wide model cache. Models are handed out as `Arc<Model>`, so a
//! model removed from the registry stays alive for callers still using it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::model::Model;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under `name`, returning the model it replaces.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        model: impl Into<Arc<Model>>,
    ) -> Option<Arc<Model>> {
        let name = name.into();
        let model = model.into();
        log::debug!("registering model {name:?} ({} trees)", model.n_trees());
        self.models.insert(name, model)
    }

    /// Load a native-format file and register it under `name`.
    ///
    /// On failure the registry is left unchanged.
    pub fn load(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<Arc<Model>> {
        let model = Arc::new(Model::load(path)?);
        self.insert(name, Arc::clone(&model));
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Drop a model from the registry.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Model>> {
        let removed = self.models.remove(name);
        if removed.is_some() {
            log::debug!("evicted model {name:?}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
