// Unit Segmentation
// Cuts a document into the sentences, paragraphs or whole text a method analyzes

use crate::models::{AnalysisUnit, Method, UnitKind};
use crate::services::nlp::{CapabilityError, SentenceTokenizer};
use crate::services::text_processor::{collapse_newlines, split_paragraphs, split_sentences_rules};
use std::sync::Arc;
use tracing::{info, warn};

/// Local rule-based tokenizer, used when no NLP service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleSentenceTokenizer;

impl SentenceTokenizer for RuleSentenceTokenizer {
    fn sentences(&self, text: &str) -> Result<Vec<String>, CapabilityError> {
        Ok(split_sentences_rules(text))
    }
}

/// Tries the primary tokenizer and falls back to local rules when it cannot be reached.
/// Any other failure (bad status, bad payload) is still reported.
pub struct FallbackSentenceTokenizer {
    primary: Arc<dyn SentenceTokenizer>,
}

impl FallbackSentenceTokenizer {
    pub fn new(primary: Arc<dyn SentenceTokenizer>) -> Self {
        Self { primary }
    }
}

impl SentenceTokenizer for FallbackSentenceTokenizer {
    fn sentences(&self, text: &str) -> Result<Vec<String>, CapabilityError> {
        match self.primary.sentences(text) {
            Ok(sentences) => Ok(sentences),
            Err(e) if e.is_unreachable() => {
                warn!(
                    "[segmenter] sentence service unavailable ({}), falling back to local rules",
                    e
                );
                Ok(split_sentences_rules(text))
            }
            Err(e) => Err(e),
        }
    }
}

/// Produces the analysis units for one method granularity.
#[derive(Clone)]
pub enum UnitSource {
    Sentences(Arc<dyn SentenceTokenizer>),
    Paragraphs,
    WholeDocument,
}

impl UnitSource {
    pub fn for_method(method: Method, tokenizer: Arc<dyn SentenceTokenizer>) -> Self {
        match method.granularity() {
            UnitKind::Sentence => Self::Sentences(tokenizer),
            UnitKind::Paragraph => Self::Paragraphs,
            UnitKind::Document => Self::WholeDocument,
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            Self::Sentences(_) => UnitKind::Sentence,
            Self::Paragraphs => UnitKind::Paragraph,
            Self::WholeDocument => UnitKind::Document,
        }
    }

    /// Ordered units of `text`. Sentences are taken from the text with every
    /// newline replaced by a space.
    pub fn units(&self, text: &str) -> Result<Vec<AnalysisUnit>, CapabilityError> {
        let kind = self.kind();
        let pieces = match self {
            Self::Sentences(tokenizer) => tokenizer.sentences(&collapse_newlines(text))?,
            Self::Paragraphs => split_paragraphs(text),
            Self::WholeDocument => vec![text.to_string()],
        };

        info!("[segmenter] {} {:?} units", pieces.len(), kind);

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| AnalysisUnit { index, kind, text })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nlp_client::NlpServiceClient;
    use crate::services::testing::closed_port_url;
    use std::time::Duration;

    struct BrokenTokenizer;

    impl SentenceTokenizer for BrokenTokenizer {
        fn sentences(&self, _text: &str) -> Result<Vec<String>, CapabilityError> {
            Err(CapabilityError::Service {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_sentence_units_collapse_newlines() {
        let source = UnitSource::Sentences(Arc::new(RuleSentenceTokenizer));
        let units = source.units("The rain kept\nfalling. Nobody came.").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "The rain kept falling.");
        assert_eq!(units[1].index, 1);
        assert_eq!(units[1].kind, UnitKind::Sentence);
    }

    #[test]
    fn test_paragraph_and_document_units() {
        let text = "One\ntwo.\n\nThree.";
        let paragraphs = UnitSource::Paragraphs.units(text).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text, "One two.");
        let whole = UnitSource::WholeDocument.units(text).unwrap();
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].text, text);
    }

    #[test]
    fn test_for_method_granularity() {
        let tok: Arc<dyn SentenceTokenizer> = Arc::new(RuleSentenceTokenizer);
        assert_eq!(UnitSource::for_method(Method::BackTranslation, tok.clone()).kind(), UnitKind::Sentence);
        assert_eq!(UnitSource::for_method(Method::WordEmbedding, tok.clone()).kind(), UnitKind::Paragraph);
        assert_eq!(UnitSource::for_method(Method::WordDistribution, tok).kind(), UnitKind::Document);
    }

    #[test]
    fn test_fallback_when_service_unreachable() {
        let client = NlpServiceClient::new(&closed_port_url(), Duration::from_secs(2));
        let tokenizer = FallbackSentenceTokenizer::new(Arc::new(client));
        let sentences = tokenizer.sentences("First one. Second one.").unwrap();
        assert_eq!(sentences, vec!["First one.", "Second one."]);
    }

    #[test]
    fn test_fallback_keeps_service_errors() {
        let tokenizer = FallbackSentenceTokenizer::new(Arc::new(BrokenTokenizer));
        assert!(tokenizer.sentences("Anything.").is_err());
    }
}
