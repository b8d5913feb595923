// Test doubles for the NLP capabilities

use crate::models::{FlaggedUnit, Label};
use crate::services::nlp::{
    CapabilityError, Classifier, EmbeddingTable, Highlighter, Lemmatizer, ParsedDoc, ParsedToken,
    PosTagger, SyntacticParser, TokenSpan, Translator, UPos,
};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// URL of a local port that was bound and released, so connects are refused.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Build a parsed doc from `(text, pos, head)` triples; every token is
/// followed by a space except the last.
pub fn parsed_doc(
    tokens: &[(&str, UPos, usize)],
    noun_chunks: &[(usize, usize)],
    sentences: &[(usize, usize)],
) -> ParsedDoc {
    let n = tokens.len();
    ParsedDoc {
        tokens: tokens
            .iter()
            .enumerate()
            .map(|(i, (text, pos, head))| ParsedToken {
                text: text.to_string(),
                whitespace: i + 1 < n,
                pos: *pos,
                head: *head,
                lemma: text.to_lowercase(),
            })
            .collect(),
        noun_chunks: noun_chunks
            .iter()
            .map(|&(start, end)| TokenSpan { start, end })
            .collect(),
        sentences: sentences
            .iter()
            .map(|&(start, end)| TokenSpan { start, end })
            .collect(),
    }
}

/// Returns the same parse for every input.
pub struct FixedParser(pub ParsedDoc);

impl SyntacticParser for FixedParser {
    fn parse(&self, _text: &str) -> Result<ParsedDoc, CapabilityError> {
        Ok(self.0.clone())
    }
}

/// Lowercases alphabetic whitespace tokens after trimming punctuation.
#[derive(Default)]
pub struct WordLemmatizer {
    pub batch_calls: AtomicUsize,
}

impl Lemmatizer for WordLemmatizer {
    fn lemmatize(&self, text: &str) -> Result<Vec<String>, CapabilityError> {
        Ok(text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase())
            .filter(|w| !w.is_empty() && w.chars().all(char::is_alphabetic))
            .collect())
    }

    fn lemmatize_batch(
        &self,
        texts: &[String],
        _batch_size: usize,
    ) -> Result<Vec<Vec<String>>, CapabilityError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.lemmatize(t)).collect()
    }
}

/// Tags from a lookup table, `NN` otherwise.
#[derive(Default)]
pub struct TableTagger(pub HashMap<String, String>);

impl PosTagger for TableTagger {
    fn tag(&self, words: &[String]) -> Result<Vec<String>, CapabilityError> {
        Ok(words
            .iter()
            .map(|w| self.0.get(w).cloned().unwrap_or_else(|| "NN".to_string()))
            .collect())
    }
}

/// Looks up `(text, target)` and echoes the input when unknown.
#[derive(Default)]
pub struct TableTranslator(pub HashMap<(String, String), String>);

impl TableTranslator {
    pub fn with(mut self, text: &str, target: &str, output: &str) -> Self {
        self.0
            .insert((text.to_string(), target.to_string()), output.to_string());
        self
    }
}

/// Fails every call.
pub struct FailingTranslator;

impl Translator for FailingTranslator {
    fn translate(&self, _text: &str, _source: &str, _target: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::MissingContent)
    }
}

impl Translator for TableTranslator {
    fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String, CapabilityError> {
        Ok(self
            .0
            .get(&(text.to_string(), target.to_string()))
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

/// Embedding lookup; the dimension is the width of the first vector added.
#[derive(Default)]
pub struct TableEmbeddings {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl TableEmbeddings {
    pub fn with(mut self, word: &str, vector: &[f32]) -> Self {
        if self.vectors.is_empty() {
            self.dimension = vector.len();
        }
        self.vectors.insert(word.to_string(), vector.to_vec());
        self
    }
}

impl EmbeddingTable for TableEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }
}

/// Replays a fixed label script, cycling when exhausted.
pub struct ScriptedClassifier {
    pub n_features: usize,
    pub labels: Vec<Label>,
    cursor: AtomicUsize,
    widths: Mutex<Vec<usize>>,
}

impl ScriptedClassifier {
    pub fn new(n_features: usize, labels: Vec<Label>) -> Self {
        Self {
            n_features,
            labels,
            cursor: AtomicUsize::new(0),
            widths: Mutex::new(Vec::new()),
        }
    }

    /// Lengths of the feature vectors seen so far.
    pub fn widths(&self) -> Vec<usize> {
        self.widths.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<Label, CapabilityError> {
        self.widths.lock().unwrap().push(features.len());
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.labels
            .get(i % self.labels.len().max(1))
            .copied()
            .ok_or(CapabilityError::MissingContent)
    }
}

#[derive(Default)]
pub struct RecordingHighlighter {
    pub calls: Vec<Vec<FlaggedUnit>>,
}

impl Highlighter for RecordingHighlighter {
    fn highlight(&mut self, units: &[FlaggedUnit]) -> Result<(), CapabilityError> {
        self.calls.push(units.to_vec());
        Ok(())
    }
}
