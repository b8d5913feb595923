// Detection Pipeline
// units -> features -> unit labels -> verdict, with progress checkpoints

use super::aggregation::aggregate;
use super::classifier::UnitClassifier;
use super::extractor::FeatureExtractor;
use super::DetectError;
use crate::models::{
    AnalysisUnit, Checkpoint, DocumentVerdict, FeatureVector, Method, UnitPrediction,
};
use crate::services::nlp::Highlighter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared flag checked between units. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DetectError> {
        if self.is_cancelled() {
            return Err(DetectError::Cancelled);
        }
        Ok(())
    }
}

pub struct DetectionPipeline {
    extractor: FeatureExtractor,
    classifier: UnitClassifier,
}

impl DetectionPipeline {
    /// Extractor and classifier must agree on the method.
    pub fn new(extractor: FeatureExtractor, classifier: UnitClassifier) -> Result<Self, DetectError> {
        if extractor.method() != classifier.method() {
            return Err(DetectError::SchemaMismatch {
                method: classifier.method(),
                expected: classifier.method().feature_len(),
                actual: extractor.method().feature_len(),
            });
        }
        Ok(Self {
            extractor,
            classifier,
        })
    }

    pub fn method(&self) -> Method {
        self.classifier.method()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Labels of every qualifying unit, in unit order.
    pub fn predict_units(
        &self,
        text: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<UnitPrediction>, DetectError> {
        let units = self.extractor.units(text)?;
        self.predict(units, cancel)
    }

    fn predict(
        &self,
        units: Vec<AnalysisUnit>,
        cancel: &CancelToken,
    ) -> Result<Vec<UnitPrediction>, DetectError> {
        let total = units.len();
        let mut predictions = Vec::new();
        for unit in units {
            cancel.check()?;
            let Some(features) = self.extractor.extract(&unit)? else {
                continue;
            };
            let label = self.classifier.predict(&features)?;
            predictions.push(UnitPrediction { unit, label });
        }
        debug!(
            "[pipeline] {} of {} units qualified",
            predictions.len(),
            total
        );
        Ok(predictions)
    }

    pub fn classify(&self, text: &str) -> Result<DocumentVerdict, DetectError> {
        self.classify_with(text, &CancelToken::default(), &mut |_, _| {}, None)
    }

    /// Full run. `progress` receives each checkpoint with its percentage;
    /// the highlighter, when given, sees the flagged units before completion.
    pub fn classify_with(
        &self,
        text: &str,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Checkpoint, u8),
        highlighter: Option<&mut dyn Highlighter>,
    ) -> Result<DocumentVerdict, DetectError> {
        let method = self.method();
        let run_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        let mut report = |checkpoint: Checkpoint| progress(checkpoint, checkpoint.percent(method));

        info!(run_id = %run_id, method = %method, chars = text.len(), "[pipeline] run started");
        report(Checkpoint::Started);

        let units = self.extractor.units(text)?;
        info!(run_id = %run_id, units = units.len(), "[pipeline] units loaded");
        report(Checkpoint::UnitsLoaded);

        let predictions = self.predict(units, cancel)?;
        report(Checkpoint::FeaturesExtracted);

        let verdict = aggregate(method, &predictions, text);
        if let Some(highlighter) = highlighter {
            if !verdict.flagged_units.is_empty() {
                highlighter.highlight(&verdict.flagged_units)?;
            }
        }
        report(Checkpoint::Highlighted);

        info!(
            run_id = %run_id,
            method = %method,
            verdict = %verdict.report_line(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[pipeline] run finished"
        );
        Ok(verdict)
    }
}

/// Runs `extractor` over `units`, dropping the ones it filters out.
pub fn extract_units(
    extractor: &FeatureExtractor,
    units: Vec<AnalysisUnit>,
    cancel: &CancelToken,
) -> Result<Vec<(AnalysisUnit, FeatureVector)>, DetectError> {
    let mut out = Vec::new();
    for unit in units {
        cancel.check()?;
        if let Some(features) = extractor.extract(&unit)? {
            out.push((unit, features));
        }
    }
    Ok(out)
}
