// Dependency-Tree Features
// Phrase lengths and parse depth of a single sentence

use crate::models::{FeatureVector, Method};
use crate::services::nlp::{CapabilityError, ParsedDoc, SyntacticParser, TokenSpan, UPos};
use crate::services::text_processor::whitespace_token_count;
use std::sync::Arc;

/// Whether `tags` matches `VERB? ADV* AUX* VERB+` exactly.
fn is_verb_phrase(tags: &[UPos]) -> bool {
    let trailing_verbs = tags.iter().rev().take_while(|t| **t == UPos::Verb).count();
    (1..=trailing_verbs).any(|k| is_verb_phrase_prefix(&tags[..tags.len() - k]))
}

/// `VERB? ADV* AUX*`
fn is_verb_phrase_prefix(tags: &[UPos]) -> bool {
    let tags = match tags.first() {
        Some(UPos::Verb) => &tags[1..],
        _ => tags,
    };
    let adverbs = tags.iter().take_while(|t| **t == UPos::Adv).count();
    tags[adverbs..].iter().all(|t| *t == UPos::Aux)
}

/// Every token range matching the verb-phrase pattern, overlaps included.
pub fn verb_phrase_matches(tags: &[UPos]) -> Vec<TokenSpan> {
    let mut matches = Vec::new();
    for start in 0..tags.len() {
        for end in start + 1..=tags.len() {
            if is_verb_phrase(&tags[start..end]) {
                matches.push(TokenSpan { start, end });
            }
        }
    }
    matches
}

/// Keep the longest spans that do not share a token, earliest first on ties.
/// The result is ordered by start.
pub fn filter_spans(spans: &[TokenSpan]) -> Vec<TokenSpan> {
    let mut sorted = spans.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));

    let mut taken: Vec<TokenSpan> = Vec::new();
    for span in sorted {
        if taken
            .iter()
            .all(|t| span.end <= t.start || span.start >= t.end)
        {
            taken.push(span);
        }
    }
    taken.sort_by_key(|s| s.start);
    taken
}

/// Total token count of the longest non-overlapping verb phrases.
pub fn verb_phrase_length(doc: &ParsedDoc) -> usize {
    filter_spans(&verb_phrase_matches(&doc.pos_tags()))
        .iter()
        .map(TokenSpan::len)
        .sum()
}

/// Total whitespace word count of all noun chunks.
pub fn noun_phrase_length(doc: &ParsedDoc) -> usize {
    doc.noun_chunks
        .iter()
        .map(|chunk| whitespace_token_count(&doc.span_text(*chunk)))
        .sum()
}

/// Depth of the dependency tree of the first sentence: 0 for a lone root,
/// otherwise one more than the deepest child.
pub fn max_tree_depth(doc: &ParsedDoc) -> Result<usize, CapabilityError> {
    let n = doc.tokens.len();
    if n == 0 {
        return Ok(0);
    }
    let sentence = doc
        .sentences
        .first()
        .copied()
        .unwrap_or(TokenSpan { start: 0, end: n });
    let range = sentence.start..sentence.end.min(n);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut root = None;
    for i in range.clone() {
        let head = doc.tokens[i].head;
        if head == i || !range.contains(&head) {
            root.get_or_insert(i);
        } else {
            children[head].push(i);
        }
    }
    let root = root.ok_or_else(|| {
        CapabilityError::MalformedParse("sentence has no root token".to_string())
    })?;

    // Only the root's subtree is walked, so head cycles elsewhere are never entered.
    let mut deepest = 0;
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        stack.extend(children[node].iter().map(|&c| (c, depth + 1)));
    }
    Ok(deepest)
}

/// `[length, np, vp, np/length, vp/length, depth]` for one sentence.
pub fn dependency_tree_features(sentence: &str, doc: &ParsedDoc) -> Result<Vec<f64>, CapabilityError> {
    let s_length = whitespace_token_count(sentence) as f64;
    let np = noun_phrase_length(doc) as f64;
    let vp = verb_phrase_length(doc) as f64;
    let depth = max_tree_depth(doc)? as f64;
    Ok(vec![s_length, np, vp, np / s_length, vp / s_length, depth])
}

pub struct DependencyTreeExtractor {
    parser: Arc<dyn SyntacticParser>,
    min_tokens: usize,
}

impl DependencyTreeExtractor {
    pub fn new(parser: Arc<dyn SyntacticParser>, min_tokens: usize) -> Self {
        Self { parser, min_tokens }
    }

    pub fn qualifies(&self, sentence: &str) -> bool {
        whitespace_token_count(sentence) > self.min_tokens
    }

    pub fn extract(&self, sentence: &str) -> Result<Option<FeatureVector>, CapabilityError> {
        if !self.qualifies(sentence) {
            return Ok(None);
        }
        let doc = self.parser.parse(sentence)?;
        let values = dependency_tree_features(sentence, &doc)?;
        Ok(Some(FeatureVector::new(Method::DependencyTree, values)))
    }
}
