// GloVe Embedding Table
// Whitespace-separated text format: `word v1 v2 ... vn`, one word per line

use crate::services::nlp::{CapabilityError, EmbeddingTable};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

#[derive(Debug, Default)]
pub struct GloveTable {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl GloveTable {
    pub fn load(path: &Path) -> Result<Self, CapabilityError> {
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        info!(
            "[embeddings] loaded {} vectors of dimension {} from {:?}",
            table.len(),
            table.dimension,
            path
        );
        Ok(table)
    }

    /// Parse GloVe text. Every vector must have the width of the first one.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CapabilityError> {
        let mut table = Self::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split(' ');
            let Some(word) = parts.next().filter(|w| !w.is_empty()) else {
                continue;
            };

            let values = parts
                .filter(|p| !p.is_empty())
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    CapabilityError::InvalidModel(format!("line {}: {}", line_no + 1, e))
                })?;

            if table.dimension == 0 {
                table.dimension = values.len();
            }
            if values.is_empty() || values.len() != table.dimension {
                return Err(CapabilityError::InvalidModel(format!(
                    "line {}: expected {} values for '{}', found {}",
                    line_no + 1,
                    table.dimension,
                    word,
                    values.len()
                )));
            }
            table.vectors.insert(word.to_string(), values);
        }

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl EmbeddingTable for GloveTable {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }
}

/// Euclidean distance computed in double precision.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
