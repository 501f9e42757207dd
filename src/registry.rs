//! Model registry with per-kind, at-most-once loading
//!
//! The registry is an explicit object passed to the entry points. Each model
//! kind owns a slot; the first request for a kind loads it while holding only
//! that slot's lock, so concurrent first requests for different kinds proceed
//! in parallel and requests for the same kind wait for the single load.

use crate::config::InferenceConfig;
use crate::error::{CutoutError, Result};
use crate::models::{DefaultModelLoader, ModelKind, ModelLoader};
use instant::Instant;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub use crate::inference::ModelHandle;

type Slot = Arc<Mutex<Option<ModelHandle>>>;

/// Lazily loaded, memoized segmentation models keyed by kind
pub struct ModelRegistry {
    loader: Box<dyn ModelLoader>,
    slots: Mutex<HashMap<ModelKind, Slot>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.loaded_models())
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    #[must_use]
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by model files on disk
    #[must_use]
    pub fn with_default_loader(config: InferenceConfig) -> Self {
        Self::new(Box::new(DefaultModelLoader::new(config)))
    }

    /// Resolve `name` and return its handle, loading it on first use
    ///
    /// Unknown names resolve to the general-purpose model. A failed load is
    /// not cached; the next request for the same kind tries again.
    ///
    /// # Errors
    /// - Loader failures (missing weights, unparsable model)
    pub fn get_model(&self, name: &str) -> Result<ModelHandle> {
        self.get(ModelKind::from_name(name))
    }

    /// Same as [`Self::get_model`] for an already resolved kind
    ///
    /// # Errors
    /// - Loader failures
    pub fn get(&self, kind: ModelKind) -> Result<ModelHandle> {
        let slot = self.slot(kind)?;
        let mut guard = slot
            .lock()
            .map_err(|_| CutoutError::internal(format!("Model slot for {kind} poisoned")))?;

        if let Some(handle) = guard.as_ref() {
            log::trace!("Model {kind} served from registry");
            return Ok(Arc::clone(handle));
        }

        let load_start = Instant::now();
        let handle = self.loader.load(kind).map_err(|e| {
            log::warn!("Loading {kind} failed: {e}");
            e
        })?;
        log::info!(
            "Model {kind} loaded in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );
        *guard = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Kinds with a successfully loaded model, sorted
    #[must_use]
    pub fn loaded_models(&self) -> Vec<ModelKind> {
        let Ok(slots) = self.slots.lock() else {
            return Vec::new();
        };
        let mut kinds: Vec<ModelKind> = slots
            .iter()
            .filter(|(_, slot)| slot.try_lock().map_or(false, |guard| guard.is_some()))
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    #[must_use]
    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.loaded_models().contains(&kind)
    }

    /// Number of loaded models
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded_models().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, kind: ModelKind) -> Result<Slot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| CutoutError::internal("Model registry lock poisoned"))?;
        Ok(Arc::clone(slots.entry(kind).or_default()))
    }
}
