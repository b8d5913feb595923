// NLP Capabilities
// Contracts for the pretrained services the feature extractors depend on.
// Implementations are built once per process and shared read-only.

use crate::models::{FlaggedUnit, Label};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service error: {status} - {message}")]
    Service { status: u16, message: String },
    #[error("missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    Json(String),
    #[error("malformed parse: {0}")]
    MalformedParse(String),
    #[error("model file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model data: {0}")]
    InvalidModel(String),
}

impl CapabilityError {
    /// The service could not be reached at all (as opposed to answering badly).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_connect() || e.is_timeout())
    }
}

// ============ Parsed documents ============

/// Universal part-of-speech tag as produced by the dependency parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UPos {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    Space,
    X,
}

impl From<String> for UPos {
    fn from(tag: String) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "ADJ" => Self::Adj,
            "ADP" => Self::Adp,
            "ADV" => Self::Adv,
            "AUX" => Self::Aux,
            "CCONJ" | "CONJ" => Self::Cconj,
            "DET" => Self::Det,
            "INTJ" => Self::Intj,
            "NOUN" => Self::Noun,
            "NUM" => Self::Num,
            "PART" => Self::Part,
            "PRON" => Self::Pron,
            "PROPN" => Self::Propn,
            "PUNCT" => Self::Punct,
            "SCONJ" => Self::Sconj,
            "SYM" => Self::Sym,
            "VERB" => Self::Verb,
            "SPACE" => Self::Space,
            _ => Self::X,
        }
    }
}

impl From<UPos> for String {
    fn from(tag: UPos) -> Self {
        format!("{:?}", tag).to_ascii_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedToken {
    pub text: String,
    /// Whether the token is followed by whitespace in the source.
    #[serde(default)]
    pub whitespace: bool,
    pub pos: UPos,
    /// Index of the syntactic head; a root points at itself.
    pub head: usize,
    #[serde(default)]
    pub lemma: String,
}

/// Half-open token range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDoc {
    pub tokens: Vec<ParsedToken>,
    #[serde(default)]
    pub noun_chunks: Vec<TokenSpan>,
    #[serde(default)]
    pub sentences: Vec<TokenSpan>,
}

impl ParsedDoc {
    /// Source text of a token span, rebuilt from token texts and trailing whitespace.
    pub fn span_text(&self, span: TokenSpan) -> String {
        let end = span.end.min(self.tokens.len());
        let start = span.start.min(end);
        let mut out = String::new();
        for (i, token) in self.tokens[start..end].iter().enumerate() {
            out.push_str(&token.text);
            if token.whitespace && start + i + 1 < end {
                out.push(' ');
            }
        }
        out
    }

    pub fn pos_tags(&self) -> Vec<UPos> {
        self.tokens.iter().map(|t| t.pos).collect()
    }
}

// ============ Capability contracts ============

pub trait SentenceTokenizer: Send + Sync {
    /// Ordered sentences of `text`.
    fn sentences(&self, text: &str) -> Result<Vec<String>, CapabilityError>;
}

pub trait SyntacticParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedDoc, CapabilityError>;
}

pub trait Lemmatizer: Send + Sync {
    /// Lowercase lemma of every alphabetic, non-punctuation token.
    fn lemmatize(&self, text: &str) -> Result<Vec<String>, CapabilityError>;

    /// Lemmatize many texts. Implementations may send them in batches of
    /// `batch_size` for throughput; the default runs them one by one.
    fn lemmatize_batch(
        &self,
        texts: &[String],
        _batch_size: usize,
    ) -> Result<Vec<Vec<String>>, CapabilityError> {
        texts.iter().map(|t| self.lemmatize(t)).collect()
    }
}

pub trait PosTagger: Send + Sync {
    /// One Penn Treebank tag per input word.
    fn tag(&self, words: &[String]) -> Result<Vec<String>, CapabilityError>;
}

pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, CapabilityError>;
}

pub trait EmbeddingTable: Send + Sync {
    fn dimension(&self) -> usize;
    fn vector(&self, word: &str) -> Option<&[f32]>;
}

pub trait Classifier: Send + Sync {
    /// Feature count the model was trained on.
    fn n_features(&self) -> usize;
    fn predict(&self, features: &[f64]) -> Result<Label, CapabilityError>;
}

/// Marks flagged units in a rendered copy of the document.
pub trait Highlighter {
    fn highlight(&mut self, units: &[FlaggedUnit]) -> Result<(), CapabilityError>;
}

/// Shared handles to every text-analysis service a pipeline may need.
#[derive(Clone)]
pub struct NlpServices {
    pub tokenizer: Arc<dyn SentenceTokenizer>,
    pub parser: Arc<dyn SyntacticParser>,
    pub lemmatizer: Arc<dyn Lemmatizer>,
    pub tagger: Arc<dyn PosTagger>,
    pub translator: Arc<dyn Translator>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upos_round_trip_and_unknown() {
        assert_eq!(UPos::from("verb".to_string()), UPos::Verb);
        assert_eq!(UPos::from("???".to_string()), UPos::X);
        assert_eq!(String::from(UPos::Propn), "PROPN");
    }

    #[test]
    fn test_parsed_doc_deserializes() {
        let json = r#"{
            "tokens": [
                {"text": "Dogs", "whitespace": true, "pos": "NOUN", "head": 1},
                {"text": "bark", "whitespace": false, "pos": "VERB", "head": 1}
            ],
            "nounChunks": [{"start": 0, "end": 1}],
            "sentences": [{"start": 0, "end": 2}]
        }"#;
        let doc: ParsedDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.tokens[1].pos, UPos::Verb);
        assert_eq!(doc.span_text(doc.sentences[0]), "Dogs bark");
        assert_eq!(doc.span_text(doc.noun_chunks[0]), "Dogs");
    }
}
