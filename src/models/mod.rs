// mtdetect Data Models
// Shared types for segmentation, feature extraction and document verdicts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============ Labels ============

/// Categorical label produced by every per-method classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "machine-translated", alias = "machine_translated")]
    MachineTranslated,
    #[serde(rename = "human-written", alias = "human_written")]
    HumanWritten,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MachineTranslated => "machine-translated",
            Self::HumanWritten => "human-written",
        }
    }

    #[must_use]
    pub fn is_machine_translated(&self) -> bool {
        matches!(self, Self::MachineTranslated)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    /// Accepts both the hyphenated and the underscored spellings found in
    /// older feature files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "machine-translated" => Ok(Self::MachineTranslated),
            "human-written" => Ok(Self::HumanWritten),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

// ============ Methods ============

pub const BACK_TRANSLATION_FEATURES: usize = 7;
pub const DEPENDENCY_TREE_FEATURES: usize = 6;
pub const WORD_DISTRIBUTION_FEATURES: usize = 3;
/// 666 bucket means followed by 666 bucket variances.
pub const WORD_EMBEDDING_FEATURES: usize = 1332;

/// Detection method. Each one owns a fixed feature schema and unit granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Method {
    BackTranslation,
    DependencyTree,
    WordDistribution,
    WordEmbedding,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::BackTranslation,
        Method::DependencyTree,
        Method::WordDistribution,
        Method::WordEmbedding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackTranslation => "back_translation",
            Self::DependencyTree => "dependency_tree",
            Self::WordDistribution => "word_distribution",
            Self::WordEmbedding => "word_embedding",
        }
    }

    /// Length of the feature vector the paired classifier was trained on.
    pub fn feature_len(&self) -> usize {
        match self {
            Self::BackTranslation => BACK_TRANSLATION_FEATURES,
            Self::DependencyTree => DEPENDENCY_TREE_FEATURES,
            Self::WordDistribution => WORD_DISTRIBUTION_FEATURES,
            Self::WordEmbedding => WORD_EMBEDDING_FEATURES,
        }
    }

    pub fn granularity(&self) -> UnitKind {
        match self {
            Self::BackTranslation | Self::DependencyTree => UnitKind::Sentence,
            Self::WordEmbedding => UnitKind::Paragraph,
            Self::WordDistribution => UnitKind::Document,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_ascii_lowercase().replace('-', "_"))
            .ok_or_else(|| format!("unknown method: {}", s))
    }
}

// ============ Units & Features ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Sentence,
    Paragraph,
    Document,
}

/// One sentence, paragraph or whole document handed to a feature extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisUnit {
    pub index: usize,
    pub kind: UnitKind,
    pub text: String,
}

/// Ordered feature values tagged with the method whose schema they follow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub method: Method,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(method: Method, values: Vec<f64>) -> Self {
        Self { method, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitPrediction {
    pub unit: AnalysisUnit,
    pub label: Label,
}

// ============ Verdict ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanOffsets {
    /// UTF-8 byte offset (0-based) into the analyzed text.
    pub start: usize,
    /// UTF-8 byte offset (end-exclusive).
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedUnit {
    pub index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offsets: Option<SpanOffsets>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum Confidence {
    /// Rounded percentage of units predicted machine-translated.
    Percent(u32),
    /// Whole-document methods have no sub-document units to count.
    NotApplicable,
    /// Every unit was filtered out before classification.
    InsufficientData,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{} %", p),
            Self::NotApplicable => f.write_str("N/A"),
            Self::InsufficientData => f.write_str("insufficient data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVerdict {
    pub method: Method,
    /// `None` only when no unit qualified for classification.
    pub label: Option<Label>,
    pub confidence: Confidence,
    pub total_units: usize,
    /// Set when the majority vote had to break a tie between labels.
    pub tied: bool,
    pub flagged_units: Vec<FlaggedUnit>,
}

impl DocumentVerdict {
    pub fn is_insufficient(&self) -> bool {
        matches!(self.confidence, Confidence::InsufficientData)
    }

    /// `label,confidence` as streamed to the front end.
    pub fn report_line(&self) -> String {
        let label = self
            .label
            .map(|l| l.as_str().to_string())
            .unwrap_or_else(|| "undetermined".to_string());
        format!("{},{}", label, self.confidence)
    }
}

// ============ Chapters ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// 1-based chapter number.
    pub number: usize,
    /// First line of the chapter (the heading line itself).
    pub start_line: usize,
    /// End-exclusive line index.
    pub end_line: usize,
    pub text: String,
}

// ============ Progress ============

/// Progress points of one run. There is no separate completion point:
/// `Highlighted` reports 100 and the verdict is returned right after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Started,
    UnitsLoaded,
    FeaturesExtracted,
    /// Also marks completion.
    Highlighted,
}

impl Checkpoint {
    /// Percentage reported to the progress stream.
    pub fn percent(&self, method: Method) -> u8 {
        match (self, method) {
            (Self::Started, _) => 0,
            (Self::UnitsLoaded, _) => 10,
            (Self::FeaturesExtracted, Method::WordDistribution) => 50,
            (Self::FeaturesExtracted, _) => 80,
            (Self::Highlighted, _) => 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parses_both_spellings() {
        assert_eq!("machine-translated".parse::<Label>(), Ok(Label::MachineTranslated));
        assert_eq!("machine_translated".parse::<Label>(), Ok(Label::MachineTranslated));
        assert_eq!("Human_Written".parse::<Label>(), Ok(Label::HumanWritten));
        assert!("robot".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_serde_accepts_alias() {
        let label: Label = serde_json::from_str("\"human_written\"").unwrap();
        assert_eq!(label, Label::HumanWritten);
        assert_eq!(serde_json::to_string(&label).unwrap(), "\"human-written\"");
    }

    #[test]
    fn test_method_schema_lengths() {
        assert_eq!(Method::BackTranslation.feature_len(), 7);
        assert_eq!(Method::DependencyTree.feature_len(), 6);
        assert_eq!(Method::WordDistribution.feature_len(), 3);
        assert_eq!(Method::WordEmbedding.feature_len(), 1332);
        assert_eq!("word-embedding".parse::<Method>(), Ok(Method::WordEmbedding));
    }

    #[test]
    fn test_confidence_display() {
        assert_eq!(Confidence::Percent(30).to_string(), "30 %");
        assert_eq!(Confidence::NotApplicable.to_string(), "N/A");
    }

    #[test]
    fn test_checkpoint_percentages() {
        assert_eq!(Checkpoint::FeaturesExtracted.percent(Method::WordDistribution), 50);
        assert_eq!(Checkpoint::FeaturesExtracted.percent(Method::DependencyTree), 80);
        assert_eq!(Checkpoint::Highlighted.percent(Method::WordEmbedding), 100);
    }

    #[test]
    fn test_highlighted_completes_every_method() {
        for method in [
            Method::BackTranslation,
            Method::DependencyTree,
            Method::WordDistribution,
            Method::WordEmbedding,
        ] {
            assert_eq!(Checkpoint::Highlighted.percent(method), 100);
            assert!(Checkpoint::FeaturesExtracted.percent(method) < 100);
        }
    }
}
