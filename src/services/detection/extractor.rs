// Feature Extractor
// Pairs a unit source with the extractor of one detection method

use super::back_translation::{BackTranslationExtractor, DEFAULT_PIVOT_LANGUAGE};
use super::dependency_tree::DependencyTreeExtractor;
use super::word_distribution::{WordDistributionExtractor, DEFAULT_LEMMATIZE_BATCH_SIZE};
use super::word_embedding::WordEmbeddingExtractor;
use crate::models::{AnalysisUnit, FeatureVector, Method};
use crate::services::nlp::{CapabilityError, EmbeddingTable, NlpServices};
use crate::services::sentence_segmenter::UnitSource;
use std::sync::Arc;

/// Unit-size thresholds and batching knobs shared by the extractors.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Sentences need strictly more whitespace tokens than this.
    pub sentence_min_tokens: usize,
    /// Paragraphs need strictly more lemmas than this.
    pub paragraph_min_lemmas: usize,
    pub lemmatize_batch_size: usize,
    pub translation_pivot: String,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            sentence_min_tokens: 5,
            paragraph_min_lemmas: 50,
            lemmatize_batch_size: DEFAULT_LEMMATIZE_BATCH_SIZE,
            translation_pivot: DEFAULT_PIVOT_LANGUAGE.to_string(),
        }
    }
}

pub enum MethodExtractor {
    BackTranslation(BackTranslationExtractor),
    DependencyTree(DependencyTreeExtractor),
    WordDistribution(WordDistributionExtractor),
    WordEmbedding(WordEmbeddingExtractor),
}

impl MethodExtractor {
    pub fn method(&self) -> Method {
        match self {
            Self::BackTranslation(_) => Method::BackTranslation,
            Self::DependencyTree(_) => Method::DependencyTree,
            Self::WordDistribution(_) => Method::WordDistribution,
            Self::WordEmbedding(_) => Method::WordEmbedding,
        }
    }

    pub fn extract(&self, unit_text: &str) -> Result<Option<FeatureVector>, CapabilityError> {
        match self {
            Self::BackTranslation(e) => e.extract(unit_text),
            Self::DependencyTree(e) => e.extract(unit_text),
            Self::WordDistribution(e) => e.extract(unit_text),
            Self::WordEmbedding(e) => e.extract(unit_text),
        }
    }
}

pub struct FeatureExtractor {
    units: UnitSource,
    inner: MethodExtractor,
}

impl FeatureExtractor {
    pub fn new(units: UnitSource, inner: MethodExtractor) -> Self {
        Self { units, inner }
    }

    /// Build the extractor for `method`. The embedding table is only
    /// required by the word-embedding method.
    pub fn for_method(
        method: Method,
        services: &NlpServices,
        embeddings: Option<Arc<dyn EmbeddingTable>>,
        settings: &ExtractorSettings,
    ) -> Result<Self, CapabilityError> {
        let inner = match method {
            Method::BackTranslation => MethodExtractor::BackTranslation(
                BackTranslationExtractor::new(
                    services.translator.clone(),
                    &settings.translation_pivot,
                    settings.sentence_min_tokens,
                ),
            ),
            Method::DependencyTree => MethodExtractor::DependencyTree(DependencyTreeExtractor::new(
                services.parser.clone(),
                settings.sentence_min_tokens,
            )),
            Method::WordDistribution => MethodExtractor::WordDistribution(
                WordDistributionExtractor::new(
                    services.lemmatizer.clone(),
                    settings.lemmatize_batch_size,
                ),
            ),
            Method::WordEmbedding => {
                let embeddings = embeddings.ok_or_else(|| {
                    CapabilityError::InvalidModel("no embedding table loaded".to_string())
                })?;
                if embeddings.dimension() == 0 {
                    return Err(CapabilityError::InvalidModel(
                        "embedding table is empty".to_string(),
                    ));
                }
                MethodExtractor::WordEmbedding(WordEmbeddingExtractor::new(
                    services.lemmatizer.clone(),
                    services.tagger.clone(),
                    embeddings,
                    settings.paragraph_min_lemmas,
                ))
            }
        };
        let units = UnitSource::for_method(method, services.tokenizer.clone());
        Ok(Self::new(units, inner))
    }

    pub fn method(&self) -> Method {
        self.inner.method()
    }

    pub fn units(&self, text: &str) -> Result<Vec<AnalysisUnit>, CapabilityError> {
        self.units.units(text)
    }

    /// Features of one unit, or `None` when the unit is filtered out.
    pub fn extract(&self, unit: &AnalysisUnit) -> Result<Option<FeatureVector>, CapabilityError> {
        self.inner.extract(&unit.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitKind;
    use crate::services::sentence_segmenter::RuleSentenceTokenizer;
    use crate::services::testing::{
        parsed_doc, FixedParser, TableEmbeddings, TableTagger, TableTranslator, WordLemmatizer,
    };

    fn services() -> NlpServices {
        NlpServices {
            tokenizer: Arc::new(RuleSentenceTokenizer),
            parser: Arc::new(FixedParser(parsed_doc(&[], &[], &[]))),
            lemmatizer: Arc::new(WordLemmatizer::default()),
            tagger: Arc::new(TableTagger::default()),
            translator: Arc::new(TableTranslator::default()),
        }
    }

    #[test]
    fn test_for_method_wires_granularity() {
        let settings = ExtractorSettings::default();
        let bt = FeatureExtractor::for_method(Method::BackTranslation, &services(), None, &settings)
            .unwrap();
        assert_eq!(bt.method(), Method::BackTranslation);
        let units = bt.units("First sentence here. Second one.").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].kind, UnitKind::Sentence);

        let wd = FeatureExtractor::for_method(Method::WordDistribution, &services(), None, &settings)
            .unwrap();
        assert_eq!(wd.units("a\nb").unwrap().len(), 1);
    }

    #[test]
    fn test_word_embedding_requires_table() {
        let settings = ExtractorSettings::default();
        assert!(
            FeatureExtractor::for_method(Method::WordEmbedding, &services(), None, &settings)
                .is_err()
        );
    }

    #[test]
    fn test_word_embedding_rejects_empty_table() {
        let settings = ExtractorSettings::default();
        let empty: Arc<dyn EmbeddingTable> = Arc::new(TableEmbeddings::default());
        let result =
            FeatureExtractor::for_method(Method::WordEmbedding, &services(), Some(empty), &settings);
        assert!(matches!(result, Err(CapabilityError::InvalidModel(_))));

        let table: Arc<dyn EmbeddingTable> = Arc::new(TableEmbeddings::default().with("a", &[1.0]));
        let extractor =
            FeatureExtractor::for_method(Method::WordEmbedding, &services(), Some(table), &settings)
                .unwrap();
        assert_eq!(extractor.method(), Method::WordEmbedding);
    }
}
