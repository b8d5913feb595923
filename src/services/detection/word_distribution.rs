// Word-Distribution Features
// Zipf fit of lemma frequency against frequency rank over a whole document

use crate::models::{FeatureVector, Method};
use crate::services::nlp::{CapabilityError, Lemmatizer};
use crate::services::text_processor::normalize_line;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_LEMMATIZE_BATCH_SIZE: usize = 20;

/// Least-squares fit of log10(frequency) on log10(rank).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZipfFit {
    pub slope: f64,
    pub r2: f64,
    pub mse: f64,
}

impl ZipfFit {
    pub fn to_vec(self) -> Vec<f64> {
        vec![self.slope, self.r2, self.mse]
    }
}

/// Distinct normalized lines in first-seen order. Repeated lines count once.
pub fn unique_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

/// Frequencies ordered most common first. Ties keep first-seen order.
pub fn ranked_frequencies(lemma_lists: &[Vec<String>]) -> Vec<usize> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for lemma in lemma_lists.iter().flatten() {
        let count = counts.entry(lemma.as_str()).or_insert_with(|| {
            order.push(lemma.as_str());
            0
        });
        *count += 1;
    }

    let mut freqs: Vec<usize> = order.iter().map(|l| counts[l]).collect();
    // Stable sort: equal counts stay in insertion order.
    freqs.sort_by(|a, b| b.cmp(a));
    freqs
}

/// `None` when fewer than two distinct terms make the fit meaningless.
pub fn zipf_fit(freqs: &[usize]) -> Option<ZipfFit> {
    if freqs.len() < 2 {
        return None;
    }
    let n = freqs.len() as f64;
    let xs: Vec<f64> = (1..=freqs.len()).map(|r| (r as f64).log10()).collect();
    let ys: Vec<f64> = freqs.iter().map(|&f| (f as f64).log10()).collect();

    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();

    // A constant series is perfectly predicted by the flat line.
    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    };

    Some(ZipfFit {
        slope,
        r2,
        mse: ss_res / n,
    })
}

pub struct WordDistributionExtractor {
    lemmatizer: Arc<dyn Lemmatizer>,
    batch_size: usize,
}

impl WordDistributionExtractor {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>, batch_size: usize) -> Self {
        Self {
            lemmatizer,
            batch_size,
        }
    }

    pub fn fit(&self, text: &str) -> Result<Option<ZipfFit>, CapabilityError> {
        let lines = unique_lines(text);
        let lemma_lists = self.lemmatizer.lemmatize_batch(&lines, self.batch_size)?;
        let freqs = ranked_frequencies(&lemma_lists);
        debug!(
            "[word_distribution] {} unique lines, {} distinct lemmas",
            lines.len(),
            freqs.len()
        );
        let fit = zipf_fit(&freqs);
        if fit.is_none() {
            warn!("[word_distribution] too few distinct lemmas to fit ({})", freqs.len());
        }
        Ok(fit)
    }

    pub fn extract(&self, text: &str) -> Result<Option<FeatureVector>, CapabilityError> {
        Ok(self
            .fit(text)?
            .map(|fit| FeatureVector::new(Method::WordDistribution, fit.to_vec())))
    }
}
