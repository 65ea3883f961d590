//! Sentiment model capability and the JSON-artifact linear classifier.
//!
//! Any classifier plugs in through [`SentimentModel`]. Its raw output is a
//! [`ModelOutput`], which the prediction service normalizes into labels.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::error::ModelError;

/// Same token rule as a default TF-IDF vectorizer: runs of two or more word chars.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("static token pattern"));

/// Raw batch output of a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Labels(Vec<String>),
    /// Positions into a class table, as array-style classifiers emit them.
    ClassIndices { classes: Arc<[String]>, indices: Vec<usize> },
}

impl ModelOutput {
    pub fn into_labels(self) -> Result<Vec<String>, ModelError> {
        match self {
            ModelOutput::Labels(labels) => Ok(labels),
            ModelOutput::ClassIndices { classes, indices } => indices
                .into_iter()
                .map(|i| {
                    classes
                        .get(i)
                        .cloned()
                        .ok_or(ModelError::UnknownClass { index: i, classes: classes.len() })
                })
                .collect(),
        }
    }
}

impl From<Vec<String>> for ModelOutput {
    fn from(v: Vec<String>) -> Self { ModelOutput::Labels(v) }
}

impl From<Vec<&str>> for ModelOutput {
    fn from(v: Vec<&str>) -> Self { ModelOutput::Labels(v.into_iter().map(String::from).collect()) }
}

/// Batch classifier safe to call from many requests at once.
pub trait SentimentModel: Send + Sync {
    fn predict(&self, batch: &[String]) -> Result<ModelOutput, ModelError>;
}

/// Classifier that mutates internal state while predicting.
pub trait StatefulModel: Send {
    fn predict_mut(&mut self, batch: &[String]) -> Result<ModelOutput, ModelError>;
}

/// Serializes calls into a [`StatefulModel`] so it can be shared.
pub struct Serialized<M> {
    inner: Mutex<M>,
}

impl<M: StatefulModel> Serialized<M> {
    pub fn new(model: M) -> Self { Self { inner: Mutex::new(model) } }

    pub fn into_inner(self) -> M { self.inner.into_inner() }
}

impl<M: StatefulModel> SentimentModel for Serialized<M> {
    fn predict(&self, batch: &[String]) -> Result<ModelOutput, ModelError> {
        self.inner.lock().predict_mut(batch)
    }
}

#[derive(Debug, Deserialize)]
struct LinearArtifact {
    classes: Vec<String>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    #[serde(default)]
    stop_words: Vec<String>,
}

/// TF-IDF features scored by a linear classifier, loaded from a JSON artifact.
#[derive(Debug)]
pub struct LinearTextModel {
    classes: Arc<[String]>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    stop_words: HashSet<String>,
}

impl LinearTextModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let a: LinearArtifact = serde_json::from_str(text)?;
        let n_features = a.idf.len();
        if a.classes.len() < 2 {
            return Err(ModelError::InvalidArtifact(format!("need at least 2 classes, got {}", a.classes.len())));
        }
        let binary = a.classes.len() == 2 && a.coefficients.len() == 1;
        if !binary && a.coefficients.len() != a.classes.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "{} coefficient rows for {} classes",
                a.coefficients.len(),
                a.classes.len()
            )));
        }
        if a.intercepts.len() != a.coefficients.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "{} intercepts for {} coefficient rows",
                a.intercepts.len(),
                a.coefficients.len()
            )));
        }
        if let Some(row) = a.coefficients.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::InvalidArtifact(format!(
                "coefficient row has {} weights, expected {n_features}",
                row.len()
            )));
        }
        if let Some((term, idx)) = a.vocabulary.iter().find(|&(_, &i)| i >= n_features) {
            return Err(ModelError::InvalidArtifact(format!("term {term:?} maps to feature {idx} of {n_features}")));
        }
        Ok(Self {
            classes: a.classes.into(),
            vocabulary: a.vocabulary,
            idf: a.idf,
            coefficients: a.coefficients,
            intercepts: a.intercepts,
            stop_words: a.stop_words.into_iter().map(|w| w.to_lowercase()).collect(),
        })
    }

    /// Sparse L2-normalized tf-idf vector.
    fn features(&self, text: &str) -> Vec<(usize, f64)> {
        let lowered = text.to_lowercase();
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for m in TOKEN_RE.find_iter(&lowered) {
            let tok = m.as_str();
            if self.stop_words.contains(tok) { continue; }
            if let Some(&idx) = self.vocabulary.get(tok) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let mut feats: Vec<(usize, f64)> = counts.into_iter().map(|(i, tf)| (i, tf * self.idf[i])).collect();
        let norm = feats.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in feats.iter_mut() { *v /= norm; }
        }
        feats
    }

    fn classify(&self, text: &str) -> usize {
        let x = self.features(text);
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| x.iter().map(|&(i, v)| row[i] * v).sum::<f64>() + b)
            .collect();
        if scores.len() == 1 {
            return usize::from(scores[0] > 0.0);
        }
        // first maximum wins on ties
        scores
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
            .0
    }
}

impl SentimentModel for LinearTextModel {
    fn predict(&self, batch: &[String]) -> Result<ModelOutput, ModelError> {
        let indices = batch.iter().map(|t| self.classify(t)).collect();
        Ok(ModelOutput::ClassIndices { classes: self.classes.clone(), indices })
    }
}
