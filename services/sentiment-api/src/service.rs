use std::sync::Arc;
use tracing::error;

use crate::error::PredictionError;
use crate::store::ModelStore;

/// Batch prediction over the stored model.
#[derive(Clone)]
pub struct PredictionService {
    store: Arc<ModelStore>,
}

impl PredictionService {
    pub fn new(store: Arc<ModelStore>) -> Self { Self { store } }

    /// Classify `inputs` in one model call; label `i` belongs to input `i`.
    ///
    /// An empty batch returns immediately without consulting the store.
    pub fn predict(&self, inputs: &[String]) -> Result<Vec<String>, PredictionError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.run(inputs).map_err(|e| {
            error!(error = %e, batch = inputs.len(), "prediction_error");
            e
        })
    }

    fn run(&self, inputs: &[String]) -> Result<Vec<String>, PredictionError> {
        let model = self.store.current()?;
        let labels = model.predict(inputs)?.into_labels()?;
        if labels.len() != inputs.len() {
            return Err(PredictionError::Failed(format!(
                "model returned {} labels for {} inputs",
                labels.len(),
                inputs.len()
            )));
        }
        Ok(labels)
    }
}
