//! Process-wide model container.
//!
//! Built once in `main` and shared through router state. The first successful
//! load wins; later `initialize` calls leave the handle untouched. A
//! `OnceCell` makes concurrent first calls perform a single load.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ModelError, StoreError};
use crate::model::{LinearTextModel, SentimentModel};

pub type ModelHandle = Arc<dyn SentimentModel>;

#[derive(Default)]
pub struct ModelStore {
    model: OnceCell<ModelHandle>,
}

impl ModelStore {
    pub fn new() -> Self { Self::default() }

    /// Store that already holds `model`.
    pub fn with_model<M: SentimentModel + 'static>(model: M) -> Self {
        let store = Self::new();
        // fresh cell, cannot be occupied
        let _ = store.model.set(Arc::new(model));
        store
    }

    /// Load the JSON linear-model artifact at `path`, unless a model is already held.
    pub fn initialize(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.initialize_with(path, |p| Ok(Arc::new(LinearTextModel::load(p)?) as ModelHandle))
    }

    pub fn initialize_with<F>(&self, path: impl AsRef<Path>, loader: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Path) -> Result<ModelHandle, ModelError>,
    {
        let path = path.as_ref();
        if self.model.get().is_some() {
            debug!(path = %path.display(), "model_already_loaded");
            return Ok(());
        }
        self.model.get_or_try_init(|| {
            info!(path = %path.display(), "loading model");
            let model = loader(path).map_err(|source| StoreError::LoadFailed { path: path.to_path_buf(), source })?;
            info!("model loaded");
            Ok::<_, StoreError>(model)
        })?;
        Ok(())
    }

    pub fn current(&self) -> Result<ModelHandle, StoreError> {
        self.model.get().cloned().ok_or(StoreError::Uninitialized)
    }

    pub fn is_loaded(&self) -> bool { self.model.get().is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{tests::THREE_CLASS, ModelOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(&'static str);

    impl SentimentModel for Fixed {
        fn predict(&self, batch: &[String]) -> Result<ModelOutput, ModelError> {
            Ok(ModelOutput::Labels(vec![self.0.to_string(); batch.len()]))
        }
    }

    fn label_of(store: &ModelStore) -> String {
        let out = store.current().unwrap().predict(&["x".to_string()]).unwrap();
        out.into_labels().unwrap().remove(0)
    }

    #[test]
    fn current_before_initialize_fails() {
        let store = ModelStore::new();
        assert!(!store.is_loaded());
        assert!(matches!(store.current(), Err(StoreError::Uninitialized)));
    }

    #[test]
    fn second_initialize_is_a_noop() {
        let store = ModelStore::new();
        let loads = AtomicUsize::new(0);
        store
            .initialize_with("first.json", |p| {
                loads.fetch_add(1, Ordering::SeqCst);
                assert_eq!(p, Path::new("first.json"));
                Ok(Arc::new(Fixed("first")) as ModelHandle)
            })
            .unwrap();
        store
            .initialize_with("second.json", |_| {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Fixed("second")) as ModelHandle)
            })
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(label_of(&store), "first");
        assert!(Arc::ptr_eq(&store.current().unwrap(), &store.current().unwrap()));
    }

    #[test]
    fn concurrent_first_use_loads_once() {
        let store = Arc::new(ModelStore::new());
        let loads = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let loads = loads.clone();
                std::thread::spawn(move || {
                    store.initialize_with(format!("model-{i}.json"), |_| {
                        loads.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok(Arc::new(Fixed("shared")) as ModelHandle)
                    })
                })
            })
            .collect();
        for h in handles { h.join().unwrap().unwrap(); }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(label_of(&store), "shared");
    }

    #[test]
    fn failed_load_propagates_and_leaves_store_empty() {
        let store = ModelStore::new();
        let err = store.initialize("/nonexistent/sentiment_model.json").unwrap_err();
        assert!(matches!(err, StoreError::LoadFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/sentiment_model.json"));
        assert!(!store.is_loaded());

        store.initialize_with("retry.json", |_| Ok(Arc::new(Fixed("later")) as ModelHandle)).unwrap();
        assert_eq!(label_of(&store), "later");
    }

    #[test]
    fn initialize_reads_linear_artifact() {
        let path = std::env::temp_dir().join(format!("sentiment-store-{}.json", std::process::id()));
        std::fs::write(&path, THREE_CLASS).unwrap();
        let store = ModelStore::new();
        store.initialize(&path).unwrap();
        let out = store.current().unwrap().predict(&["terrible".to_string()]).unwrap();
        assert_eq!(out.into_labels().unwrap(), vec!["negative"]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn with_model_is_preloaded() {
        let store = ModelStore::with_model(Fixed("pre"));
        assert!(store.is_loaded());
        assert_eq!(label_of(&store), "pre");
    }
}
