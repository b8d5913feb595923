// Command layer
// Wires configuration, service clients and models into runnable commands

use crate::models::{Chapter, Checkpoint, DocumentVerdict, Label, Method};
use crate::services::chapter_parser::{segment_chapters, write_chapters, ParseFailure};
use crate::services::config_store::{AppConfig, ConfigError, ConfigStore};
use crate::services::detection::{
    evaluate, export_features, recall, CancelToken, DetectError, DetectionPipeline,
    EvaluationLevel, EvaluationSummary, ExportSummary, ExtractorSettings, FeatureExtractor,
    FeatureLog, RecallSummary, UnitClassifier,
};
use crate::services::embeddings::GloveTable;
use crate::services::linear_model::LinearModel;
use crate::services::nlp::{CapabilityError, EmbeddingTable, NlpServices, SentenceTokenizer};
use crate::services::nlp_client::NlpServiceClient;
use crate::services::sentence_segmenter::FallbackSentenceTokenizer;
use crate::services::text_processor::read_text_file;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("book is unparseable: {0}")]
    Unparseable(#[from] ParseFailure),
    #[error("no classifier model configured for {0}")]
    MissingModel(Method),
    #[error("I/O on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Load config from `dir`, or from the default config directory.
pub fn load_config(dir: Option<&Path>) -> Result<(ConfigStore, AppConfig), ApiError> {
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(ConfigStore::default_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let store = ConfigStore::new(dir);
    let config = store.load()?;
    Ok((store, config))
}

fn read_document(path: &Path) -> Result<String, ApiError> {
    read_text_file(path).map_err(|source| ApiError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Long-lived capabilities for one process. Models load on first use per command.
pub struct Detector {
    config: AppConfig,
    services: NlpServices,
}

impl Detector {
    pub fn new(config: AppConfig) -> Self {
        let client = Arc::new(NlpServiceClient::new(
            &config.nlp_service.effective_base_url(),
            config.nlp_service.timeout(),
        ));
        if client.is_available() {
            info!(base_url = client.base_url(), "[api] NLP service reachable");
        } else {
            warn!(base_url = client.base_url(), "[api] NLP service health check failed");
        }

        let tokenizer: Arc<dyn SentenceTokenizer> = if config.nlp_service.fallback_sentence_splitter {
            Arc::new(FallbackSentenceTokenizer::new(client.clone()))
        } else {
            client.clone()
        };

        let services = NlpServices {
            tokenizer,
            parser: client.clone(),
            lemmatizer: client.clone(),
            tagger: client.clone(),
            translator: client,
        };
        Self::with_services(config, services)
    }

    pub fn with_services(config: AppConfig, services: NlpServices) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn settings(&self) -> ExtractorSettings {
        ExtractorSettings::from(&self.config.detection)
    }

    fn embeddings(&self, method: Method) -> Result<Option<Arc<dyn EmbeddingTable>>, ApiError> {
        if method != Method::WordEmbedding {
            return Ok(None);
        }
        let Some(path) = self.config.models.embedding_table.as_deref() else {
            return Ok(None);
        };
        let table = GloveTable::load(path)?;
        Ok(Some(Arc::new(table)))
    }

    pub fn extractor(&self, method: Method) -> Result<FeatureExtractor, ApiError> {
        let embeddings = self.embeddings(method)?;
        Ok(FeatureExtractor::for_method(
            method,
            &self.services,
            embeddings,
            &self.settings(),
        )?)
    }

    /// Pipeline for `method`; `model` overrides the configured classifier file.
    pub fn pipeline(&self, method: Method, model: Option<&Path>) -> Result<DetectionPipeline, ApiError> {
        let path = model
            .or_else(|| self.config.models.classifier(method))
            .ok_or(ApiError::MissingModel(method))?;
        let classifier = UnitClassifier::new(method, Arc::new(LinearModel::load(path)?))?;
        Ok(DetectionPipeline::new(self.extractor(method)?, classifier)?)
    }

    pub fn classify_file(
        &self,
        path: &Path,
        method: Method,
        model: Option<&Path>,
        progress: &mut dyn FnMut(Checkpoint, u8),
        cancel: &CancelToken,
    ) -> Result<DocumentVerdict, ApiError> {
        let pipeline = self.pipeline(method, model)?;
        let text = read_document(path)?;
        Ok(pipeline.classify_with(&text, cancel, progress, None)?)
    }

    pub fn export_dataset(
        &self,
        root: &Path,
        method: Method,
        label: Label,
        out: &Path,
        cancel: &CancelToken,
    ) -> Result<ExportSummary, ApiError> {
        let extractor = self.extractor(method)?;
        let log = FeatureLog::new(out, method);
        Ok(export_features(&extractor, root, label, &log, cancel)?)
    }

    pub fn evaluate_dataset(
        &self,
        root: &Path,
        method: Method,
        model: Option<&Path>,
        level: EvaluationLevel,
        out: &Path,
        cancel: &CancelToken,
    ) -> Result<EvaluationSummary, ApiError> {
        let pipeline = self.pipeline(method, model)?;
        Ok(evaluate(&pipeline, root, level, out, cancel)?)
    }
}

/// Segment a book into chapters without writing anything.
pub fn preview_chapters(book: &Path) -> Result<Vec<Chapter>, ApiError> {
    let text = read_document(book)?;
    Ok(segment_chapters(&text)?)
}

/// Segment `book` and write its chapters under `out_root`.
pub fn segment_book(book: &Path, out_root: &Path) -> Result<(PathBuf, usize), ApiError> {
    let chapters = match preview_chapters(book) {
        Ok(chapters) => chapters,
        Err(e) => {
            warn!(book = %book.display(), "[api] {}", e);
            return Err(e);
        }
    };
    let dir = write_chapters(book, &chapters, out_root).map_err(|source| ApiError::Io {
        path: out_root.to_path_buf(),
        source,
    })?;
    Ok((dir, chapters.len()))
}

pub fn recall_file(path: &Path) -> Result<RecallSummary, ApiError> {
    recall(path).map_err(|source| ApiError::Io {
        path: path.to_path_buf(),
        source,
    })
}
