// Detection Module
// Machine-translation detection organized into specialized submodules:
// - back_translation / dependency_tree / word_distribution / word_embedding:
//   per-method feature extraction
// - extractor: pairs a unit source with one method's extractor
// - classifier: schema-guarded wrapper over an injected model
// - aggregation: folds unit labels into a document verdict
// - pipeline: end-to-end run with progress, highlighting and cancellation
// - dataset: feature logs, batch export and evaluation

pub mod aggregation;
pub mod back_translation;
pub mod classifier;
pub mod dataset;
pub mod dependency_tree;
pub mod extractor;
pub mod pipeline;
pub mod word_distribution;
pub mod word_embedding;

use crate::models::Method;
use crate::services::nlp::CapabilityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("{method} expects {expected} features, got {actual}")]
    SchemaMismatch {
        method: Method,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("run cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub use aggregation::{aggregate, confidence_percent, majority_label};
pub use classifier::UnitClassifier;
pub use dataset::{
    evaluate, export_features, recall, EvaluationLevel, EvaluationSummary, ExportSummary,
    FeatureLog, RecallSummary,
};
pub use extractor::{ExtractorSettings, FeatureExtractor};
pub use pipeline::{CancelToken, DetectionPipeline};
