// Dataset Export & Evaluation
// Feature CSV logs over chapter folders, prediction logs and recall

use super::extractor::FeatureExtractor;
use super::pipeline::{extract_units, CancelToken, DetectionPipeline};
use super::DetectError;
use crate::models::{AnalysisUnit, FeatureVector, Label, Method};
use crate::services::text_processor::read_text_file;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Appends `f1,...,fN,label` rows for one method.
pub struct FeatureLog {
    path: PathBuf,
    method: Method,
}

impl FeatureLog {
    pub fn new(path: impl Into<PathBuf>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row. Returns `false` when the row policy drops it.
    pub fn append(&self, features: &FeatureVector, label: Label) -> Result<bool, DetectError> {
        let expected = self.method.feature_len();
        if features.method != self.method || features.len() != expected {
            return Err(DetectError::SchemaMismatch {
                method: self.method,
                expected,
                actual: features.len(),
            });
        }
        if !keeps_row(features) {
            return Ok(false);
        }

        let mut row: Vec<String> = features.values.iter().map(|v| format!("{:?}", v)).collect();
        row.push(label.as_str().to_string());

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", row.join(","))?;
        Ok(true)
    }
}

/// Word-distribution rows whose slope rounds to 0.00 carry no signal.
/// The literal 0.005 sits just above a half cent, so it rounds away from zero.
pub fn keeps_row(features: &FeatureVector) -> bool {
    match features.method {
        Method::WordDistribution => features
            .values
            .first()
            .map_or(false, |slope| slope.is_nan() || slope.abs() >= 0.005),
        _ => true,
    }
}

/// Chapter files under `<root>/<book>/`, sorted by path.
pub fn chapter_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for book in fs::read_dir(root)? {
        let book = book?.path();
        if !book.is_dir() {
            continue;
        }
        for chapter in fs::read_dir(&book)? {
            let chapter = chapter?.path();
            if chapter.is_file() {
                files.push(chapter);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub chapters: usize,
    pub rows: usize,
    pub dropped: usize,
}

/// Extract features for every chapter under `root` and log them with `label`.
/// Back-translation keeps only the first qualifying sentence of a chapter.
pub fn export_features(
    extractor: &FeatureExtractor,
    root: &Path,
    label: Label,
    log: &FeatureLog,
    cancel: &CancelToken,
) -> Result<ExportSummary, DetectError> {
    let first_only = extractor.method() == Method::BackTranslation;
    let mut summary = ExportSummary::default();

    for path in chapter_files(root)? {
        let text = read_text_file(&path)?;
        let units = extractor.units(&text)?;
        let rows = if first_only {
            first_qualifying(extractor, units, cancel)?
        } else {
            extract_units(extractor, units, cancel)?
                .into_iter()
                .map(|(_, f)| f)
                .collect()
        };

        for features in &rows {
            if log.append(features, label)? {
                summary.rows += 1;
            } else {
                summary.dropped += 1;
            }
        }
        summary.chapters += 1;
        info!(chapter = %path.display(), rows = rows.len(), "[dataset] chapter exported");
    }

    info!(
        method = %extractor.method(),
        chapters = summary.chapters,
        rows = summary.rows,
        dropped = summary.dropped,
        "[dataset] export finished"
    );
    Ok(summary)
}

fn first_qualifying(
    extractor: &FeatureExtractor,
    units: Vec<AnalysisUnit>,
    cancel: &CancelToken,
) -> Result<Vec<FeatureVector>, DetectError> {
    for unit in units {
        if cancel.is_cancelled() {
            return Err(DetectError::Cancelled);
        }
        if let Some(features) = extractor.extract(&unit)? {
            return Ok(vec![features]);
        }
    }
    Ok(Vec::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EvaluationLevel {
    /// One line per classified unit.
    Feature,
    /// One line per chapter verdict.
    Chapter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub chapters: usize,
    pub lines: usize,
    pub undetermined: usize,
}

/// Append predicted labels for every chapter under `root` to `results`.
pub fn evaluate(
    pipeline: &DetectionPipeline,
    root: &Path,
    level: EvaluationLevel,
    results: &Path,
    cancel: &CancelToken,
) -> Result<EvaluationSummary, DetectError> {
    let mut out = OpenOptions::new().create(true).append(true).open(results)?;
    let mut summary = EvaluationSummary::default();

    for path in chapter_files(root)? {
        let text = read_text_file(&path)?;
        let labels: Vec<Label> = match level {
            EvaluationLevel::Feature => pipeline
                .predict_units(&text, cancel)?
                .into_iter()
                .map(|p| p.label)
                .collect(),
            EvaluationLevel::Chapter => {
                let verdict = pipeline.classify_with(&text, cancel, &mut |_, _| {}, None)?;
                match verdict.label {
                    Some(label) => vec![label],
                    None => {
                        warn!(chapter = %path.display(), "[evaluate] no qualifying units");
                        summary.undetermined += 1;
                        Vec::new()
                    }
                }
            }
        };

        for label in &labels {
            writeln!(out, "{}", label)?;
        }
        summary.lines += labels.len();
        summary.chapters += 1;
    }

    info!(
        method = %pipeline.method(),
        chapters = summary.chapters,
        lines = summary.lines,
        "[evaluate] results written to {}",
        results.display()
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallSummary {
    pub machine_translated: usize,
    pub total: usize,
}

impl RecallSummary {
    /// `None` for an empty results file.
    pub fn ratio(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.machine_translated as f64 / self.total as f64)
    }
}

/// Count machine-translated labels in a results file. Unparseable lines are skipped.
pub fn recall(results: &Path) -> io::Result<RecallSummary> {
    let content = fs::read_to_string(results)?;
    let mut summary = RecallSummary::default();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<Label>() {
            Ok(label) => {
                summary.total += 1;
                if label.is_machine_translated() {
                    summary.machine_translated += 1;
                }
            }
            Err(e) => warn!("[recall] skipping line: {}", e),
        }
    }
    Ok(summary)
}
