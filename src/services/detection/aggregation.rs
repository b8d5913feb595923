// Aggregation Logic
// Folds per-unit predictions into one document verdict

use crate::models::{
    Confidence, DocumentVerdict, FlaggedUnit, Label, Method, SpanOffsets, UnitKind,
    UnitPrediction,
};
use crate::services::text_processor::{collapse_newlines, SpanLocator};
use tracing::warn;

/// Most frequent label. On a tie the label seen first wins and the second
/// value is `true`.
pub fn majority_label(labels: &[Label]) -> Option<(Label, bool)> {
    let mut counts: Vec<(Label, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((*label, 1)),
        }
    }

    let (winner, best) = counts.iter().copied().fold(None, |acc: Option<(Label, usize)>, c| {
        match acc {
            Some(a) if a.1 >= c.1 => Some(a),
            _ => Some(c),
        }
    })?;
    let tied = counts.iter().filter(|(_, n)| *n == best).count() > 1;
    Some((winner, tied))
}

/// `flagged / total` as a percentage rounded half to even.
pub fn confidence_percent(flagged: usize, total: usize) -> Option<u32> {
    if total == 0 {
        return None;
    }
    let pct = (flagged as f64 / total as f64 * 100.0).round_ties_even();
    Some(pct as u32)
}

/// Flagged units in unit order, with their byte range in `document` when the
/// text can be found verbatim.
fn flagged_units(predictions: &[UnitPrediction], document: &str) -> Vec<FlaggedUnit> {
    let flagged: Vec<&UnitPrediction> = predictions
        .iter()
        .filter(|p| p.label.is_machine_translated())
        .collect();
    if flagged.is_empty() {
        return Vec::new();
    }

    // Units were cut from newline-collapsed text; collapsing swaps one byte
    // for one byte, so offsets hold for the original document too.
    let haystack = collapse_newlines(document);
    let mut locator = SpanLocator::new(&haystack);

    flagged
        .into_iter()
        .map(|p| {
            let offsets = match p.unit.kind {
                UnitKind::Document => Some(SpanOffsets {
                    start: 0,
                    end: document.len(),
                }),
                UnitKind::Sentence | UnitKind::Paragraph => locator.locate(&p.unit.text),
            };
            FlaggedUnit {
                index: p.unit.index,
                text: p.unit.text.clone(),
                offsets,
            }
        })
        .collect()
}

/// Verdict for `predictions`, which hold only the units that passed
/// extraction. No predictions means insufficient data.
pub fn aggregate(method: Method, predictions: &[UnitPrediction], document: &str) -> DocumentVerdict {
    let labels: Vec<Label> = predictions.iter().map(|p| p.label).collect();
    let total = labels.len();

    let Some((label, tied)) = majority_label(&labels) else {
        warn!("[aggregate] {}: no unit qualified for classification", method);
        return DocumentVerdict {
            method,
            label: None,
            confidence: Confidence::InsufficientData,
            total_units: 0,
            tied: false,
            flagged_units: Vec::new(),
        };
    };

    if tied {
        warn!(
            "[aggregate] {}: tie between labels over {} units, keeping {}",
            method, total, label
        );
    }

    let flagged = flagged_units(predictions, document);
    let confidence = if method.granularity() == UnitKind::Document {
        Confidence::NotApplicable
    } else {
        confidence_percent(flagged.len(), total)
            .map(Confidence::Percent)
            .unwrap_or(Confidence::InsufficientData)
    };

    DocumentVerdict {
        method,
        label: Some(label),
        confidence,
        total_units: total,
        tied,
        flagged_units: flagged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisUnit;
    use Label::*;

    fn predictions(kind: UnitKind, texts: &[&str], labels: &[Label]) -> Vec<UnitPrediction> {
        texts
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (text, label))| UnitPrediction {
                unit: AnalysisUnit {
                    index,
                    kind,
                    text: text.to_string(),
                },
                label: *label,
            })
            .collect()
    }

    #[test]
    fn test_majority_and_tie_break() {
        assert_eq!(
            majority_label(&[HumanWritten, MachineTranslated, MachineTranslated]),
            Some((MachineTranslated, false))
        );
        assert_eq!(
            majority_label(&[HumanWritten, MachineTranslated]),
            Some((HumanWritten, true))
        );
        assert_eq!(majority_label(&[]), None);
    }

    #[test]
    fn test_confidence_rounds_half_to_even() {
        assert_eq!(confidence_percent(3, 10), Some(30));
        assert_eq!(confidence_percent(1, 8), Some(12)); // 12.5
        assert_eq!(confidence_percent(3, 8), Some(38)); // 37.5
        assert_eq!(confidence_percent(1, 3), Some(33));
        assert_eq!(confidence_percent(0, 0), None);
    }

    #[test]
    fn test_sentence_verdict_with_offsets() {
        let doc = "It rained all\nday long. The ship left port at dawn. Nobody waved goodbye to it.";
        let texts = [
            "It rained all day long.",
            "The ship left port at dawn.",
            "Nobody waved goodbye to it.",
        ];
        let preds = predictions(
            UnitKind::Sentence,
            &texts,
            &[MachineTranslated, HumanWritten, HumanWritten],
        );
        let verdict = aggregate(Method::DependencyTree, &preds, doc);
        assert_eq!(verdict.label, Some(HumanWritten));
        assert_eq!(verdict.confidence, Confidence::Percent(33));
        assert_eq!(verdict.total_units, 3);
        assert_eq!(verdict.flagged_units.len(), 1);
        let offsets = verdict.flagged_units[0].offsets.unwrap();
        assert_eq!((offsets.start, offsets.end), (0, 23));
    }

    #[test]
    fn test_ten_sentences_three_flagged() {
        let texts: Vec<String> = (0..10).map(|i| format!("Sentence number {} is here.", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut labels = vec![HumanWritten; 10];
        labels[2] = MachineTranslated;
        labels[5] = MachineTranslated;
        labels[9] = MachineTranslated;
        let doc = refs.join(" ");
        let verdict = aggregate(
            Method::BackTranslation,
            &predictions(UnitKind::Sentence, &refs, &labels),
            &doc,
        );
        assert_eq!(verdict.report_line(), "human-written,30 %");
        let indices: Vec<usize> = verdict.flagged_units.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![2, 5, 9]);
    }

    #[test]
    fn test_whole_document_is_not_applicable() {
        let doc = "A whole chapter.";
        let verdict = aggregate(
            Method::WordDistribution,
            &predictions(UnitKind::Document, &[doc], &[MachineTranslated]),
            doc,
        );
        assert_eq!(verdict.report_line(), "machine-translated,N/A");
        assert_eq!(verdict.flagged_units[0].offsets.unwrap().end, doc.len());
    }

    #[test]
    fn test_no_units_is_insufficient() {
        let verdict = aggregate(Method::WordEmbedding, &[], "short");
        assert!(verdict.is_insufficient());
        assert_eq!(verdict.label, None);
        assert_eq!(verdict.report_line(), "undetermined,insufficient data");
    }
}
