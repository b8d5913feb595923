// Back-Translation Features
// BLEU agreement between a sentence and its round trip through a pivot language

use crate::models::{FeatureVector, Method};
use crate::services::nlp::{CapabilityError, Translator};
use crate::services::text_processor::whitespace_token_count;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const SOURCE_LANGUAGE: &str = "en";
pub const DEFAULT_PIVOT_LANGUAGE: &str = "de";

/// Individual 1..4-gram scores, then cumulative 2, 3 and 4-gram scores.
const BLEU_WEIGHTS: [[f64; 4]; 7] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
    [0.5, 0.5, 0.0, 0.0],
    [0.33, 0.33, 0.33, 0.0],
    [0.25, 0.25, 0.25, 0.25],
];

fn ngram_counts<'t>(tokens: &'t [&'t str], n: usize) -> HashMap<&'t [&'t str], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
    }
    counts
}

/// Clipped n-gram matches and the (at least 1) hypothesis n-gram count.
fn modified_precision(reference: &[&str], hypothesis: &[&str], n: usize) -> (usize, usize) {
    let hyp_counts = ngram_counts(hypothesis, n);
    let ref_counts = ngram_counts(reference, n);

    let matched: usize = hyp_counts
        .iter()
        .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let total: usize = hyp_counts.values().sum();
    (matched, total.max(1))
}

fn brevity_penalty(reference_len: usize, hypothesis_len: usize) -> f64 {
    if hypothesis_len > reference_len {
        1.0
    } else if hypothesis_len == 0 {
        0.0
    } else {
        (1.0 - reference_len as f64 / hypothesis_len as f64).exp()
    }
}

/// Sentence BLEU against a single reference without smoothing. A zero
/// n-gram precision contributes the smallest positive float instead of
/// zero; no unigram match at all scores 0.
pub fn sentence_bleu(reference: &[&str], hypothesis: &[&str], weights: &[f64; 4]) -> f64 {
    let precisions: Vec<(usize, usize)> = (1..=4)
        .map(|n| modified_precision(reference, hypothesis, n))
        .collect();

    if precisions[0].0 == 0 {
        return 0.0;
    }

    let log_sum: f64 = weights
        .iter()
        .zip(&precisions)
        .map(|(w, &(matched, total))| {
            let p = if matched == 0 {
                f64::MIN_POSITIVE
            } else {
                matched as f64 / total as f64
            };
            w * p.ln()
        })
        .sum();

    brevity_penalty(reference.len(), hypothesis.len()) * log_sum.exp()
}

/// The seven BLEU features of a sentence and its back-translation, both
/// split on whitespace.
pub fn back_translation_features(source: &str, back_translated: &str) -> Vec<f64> {
    let reference: Vec<&str> = source.split_whitespace().collect();
    let hypothesis: Vec<&str> = back_translated.split_whitespace().collect();
    BLEU_WEIGHTS
        .iter()
        .map(|w| sentence_bleu(&reference, &hypothesis, w))
        .collect()
}

pub struct BackTranslationExtractor {
    translator: Arc<dyn Translator>,
    pivot: String,
    min_tokens: usize,
}

impl BackTranslationExtractor {
    pub fn new(translator: Arc<dyn Translator>, pivot: &str, min_tokens: usize) -> Self {
        Self {
            translator,
            pivot: pivot.to_string(),
            min_tokens,
        }
    }

    /// English to pivot and back.
    pub fn back_translate(&self, text: &str) -> Result<String, CapabilityError> {
        let forward = self.translator.translate(text, SOURCE_LANGUAGE, &self.pivot)?;
        self.translator.translate(&forward, &self.pivot, SOURCE_LANGUAGE)
    }

    pub fn qualifies(&self, sentence: &str) -> bool {
        whitespace_token_count(sentence) > self.min_tokens
    }

    /// `None` for sentences too short to score.
    pub fn extract(&self, sentence: &str) -> Result<Option<FeatureVector>, CapabilityError> {
        if !self.qualifies(sentence) {
            return Ok(None);
        }
        let back = self.back_translate(sentence)?;
        debug!("[back_translation] '{}' -> '{}'", sentence, back);
        Ok(Some(FeatureVector::new(
            Method::BackTranslation,
            back_translation_features(sentence, &back),
        )))
    }
}
