// Word-Embedding Features
// Pairwise embedding distances grouped by part-of-speech pair buckets

use crate::models::{FeatureVector, Method};
use crate::services::embeddings::euclidean_distance;
use crate::services::nlp::{CapabilityError, EmbeddingTable, Lemmatizer, PosTagger};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::warn;

/// Penn Treebank word tags.
pub const PTB_TAGS: [&str; 36] = [
    "CC", "CD", "DT", "EX", "FW", "IN", "JJ", "JJR", "JJS", "LS", "MD", "NN", "NNS", "NNP",
    "NNPS", "PDT", "POS", "PRP", "PRP$", "RB", "RBR", "RBS", "RP", "SYM", "TO", "UH", "VB",
    "VBD", "VBG", "VBN", "VBP", "VBZ", "WDT", "WP", "WP$", "WRB",
];

pub const BUCKET_COUNT: usize = PTB_TAGS.len() * (PTB_TAGS.len() + 1) / 2;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tag pair ({0}, {1}) is outside the bucket alphabet")]
pub struct UnknownBucket(pub String, pub String);

fn bucket_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Unordered tag pairs in sorted key order.
pub struct BucketIndex {
    keys: Vec<(&'static str, &'static str)>,
}

impl BucketIndex {
    fn build() -> Self {
        let mut keys: Vec<(&'static str, &'static str)> = Vec::with_capacity(BUCKET_COUNT);
        for (i, a) in PTB_TAGS.iter().enumerate() {
            for b in &PTB_TAGS[i..] {
                keys.push(bucket_key(*a, *b));
            }
        }
        keys.sort_unstable();
        Self { keys }
    }

    pub fn global() -> &'static BucketIndex {
        static INDEX: OnceLock<BucketIndex> = OnceLock::new();
        INDEX.get_or_init(Self::build)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[(&'static str, &'static str)] {
        &self.keys
    }

    pub fn position(&self, a: &str, b: &str) -> Option<usize> {
        let (lo, hi) = bucket_key(a, b);
        self.keys
            .binary_search_by(|(k_lo, k_hi)| k_lo.cmp(&lo).then_with(|| k_hi.cmp(&hi)))
            .ok()
    }
}

/// Distances filed per bucket. Same-tag buckets hold only their minimum.
pub struct DistanceBuckets {
    index: &'static BucketIndex,
    buckets: Vec<Vec<f64>>,
}

impl Default for DistanceBuckets {
    fn default() -> Self {
        let index = BucketIndex::global();
        Self {
            index,
            buckets: vec![Vec::new(); index.len()],
        }
    }
}

impl DistanceBuckets {
    pub fn file(&mut self, tag_a: &str, tag_b: &str, distance: f64) -> Result<(), UnknownBucket> {
        let pos = self
            .index
            .position(tag_a, tag_b)
            .ok_or_else(|| UnknownBucket(tag_a.to_string(), tag_b.to_string()))?;
        let bucket = &mut self.buckets[pos];
        if tag_a == tag_b {
            match bucket.first() {
                Some(&current) if current <= distance => {}
                _ => *bucket = vec![distance],
            }
        } else {
            bucket.push(distance);
        }
        Ok(())
    }

    pub fn bucket(&self, tag_a: &str, tag_b: &str) -> Option<&[f64]> {
        self.index
            .position(tag_a, tag_b)
            .map(|pos| self.buckets[pos].as_slice())
    }

    /// All bucket means, then all population variances; 0.0 for empty buckets.
    pub fn means_and_variances(&self) -> Vec<f64> {
        let mut means = Vec::with_capacity(self.buckets.len());
        let mut variances = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            if bucket.is_empty() {
                means.push(0.0);
                variances.push(0.0);
                continue;
            }
            let n = bucket.len() as f64;
            let mean = bucket.iter().sum::<f64>() / n;
            means.push(mean);
            variances.push(bucket.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n);
        }
        means.extend(variances);
        means
    }
}

/// Features of one tagged paragraph. Words without an embedding of the
/// table's dimension contribute nothing.
pub fn word_embedding_features(
    tagged: &[(String, String)],
    table: &dyn EmbeddingTable,
) -> Result<Vec<f64>, UnknownBucket> {
    let dimension = table.dimension();
    let lookup = |word: &str| table.vector(word).filter(|v| v.len() == dimension);

    let mut buckets = DistanceBuckets::default();
    for (i, (word_a, tag_a)) in tagged.iter().enumerate() {
        let Some(vec_a) = lookup(word_a) else {
            continue;
        };
        for (word_b, tag_b) in &tagged[i + 1..] {
            if let Some(vec_b) = lookup(word_b) {
                buckets.file(tag_a, tag_b, euclidean_distance(vec_a, vec_b))?;
            }
        }
    }
    Ok(buckets.means_and_variances())
}

pub struct WordEmbeddingExtractor {
    lemmatizer: Arc<dyn Lemmatizer>,
    tagger: Arc<dyn PosTagger>,
    embeddings: Arc<dyn EmbeddingTable>,
    min_lemmas: usize,
}

impl WordEmbeddingExtractor {
    pub fn new(
        lemmatizer: Arc<dyn Lemmatizer>,
        tagger: Arc<dyn PosTagger>,
        embeddings: Arc<dyn EmbeddingTable>,
        min_lemmas: usize,
    ) -> Self {
        Self {
            lemmatizer,
            tagger,
            embeddings,
            min_lemmas,
        }
    }

    /// `None` for short paragraphs and for paragraphs whose tags fall outside
    /// the bucket alphabet.
    pub fn extract(&self, paragraph: &str) -> Result<Option<FeatureVector>, CapabilityError> {
        let lemmas = self.lemmatizer.lemmatize(paragraph)?;
        if lemmas.len() <= self.min_lemmas {
            return Ok(None);
        }
        let tags = self.tagger.tag(&lemmas)?;
        let tagged: Vec<(String, String)> = lemmas.into_iter().zip(tags).collect();

        match word_embedding_features(&tagged, self.embeddings.as_ref()) {
            Ok(values) => Ok(Some(FeatureVector::new(Method::WordEmbedding, values))),
            Err(e) => {
                warn!("[word_embedding] skipping paragraph: {}", e);
                Ok(None)
            }
        }
    }
}
