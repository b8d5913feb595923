// mtdetect Core Services

pub mod chapter_parser;
pub mod config_store;
pub mod detection;
pub mod embeddings;
pub mod linear_model;
pub mod nlp;
pub mod nlp_client;
pub mod sentence_segmenter;
pub mod text_processor;

#[cfg(test)]
pub(crate) mod testing;

pub use chapter_parser::{segment_chapters, write_chapters, ParseFailure};
pub use config_store::{AppConfig, ConfigError, ConfigStore};
pub use embeddings::GloveTable;
pub use linear_model::LinearModel;
pub use nlp::*;
pub use nlp_client::NlpServiceClient;
pub use sentence_segmenter::{FallbackSentenceTokenizer, RuleSentenceTokenizer, UnitSource};
pub use text_processor::*;

// Re-export detection entry points
pub use detection::{
    aggregate, evaluate, export_features, recall, CancelToken, DetectError, DetectionPipeline,
    EvaluationLevel, ExtractorSettings, FeatureExtractor, FeatureLog, UnitClassifier,
};
