// Text Processing Service
// Line, paragraph and sentence level helpers shared by the unit sources

use crate::models::SpanOffsets;
use std::fs;
use std::io;
use std::path::Path;

const ABBREVIATIONS: [&str; 14] = [
    "mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "mt.", "jr.", "sr.", "vs.", "e.g.", "i.e.",
    "no.", "fig.",
];

/// Read a text file, dropping a leading UTF-8 BOM and normalizing line endings.
pub fn read_text_file(path: &Path) -> io::Result<String> {
    let raw = fs::read_to_string(path)?;
    Ok(normalize_line_endings(raw.strip_prefix('\u{feff}').unwrap_or(&raw)))
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Replace every newline with a space. Byte offsets are preserved.
pub fn collapse_newlines(text: &str) -> String {
    text.replace('\n', " ")
}

/// Strip a line and collapse its internal whitespace runs to single spaces.
pub fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-delimited tokens.
pub fn whitespace_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split on blank-line boundaries (`\n\n`), collapsing newlines inside each paragraph.
/// Empty paragraphs are kept; they never pass the lemma threshold downstream.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n").map(collapse_newlines).collect()
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_double_quote(ch: char) -> bool {
    matches!(ch, '"' | '\u{201c}' | '\u{201d}')
}

fn ends_with_abbreviation(buffer: &str) -> bool {
    let last_word = buffer
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase();
    if ABBREVIATIONS.contains(&last_word.as_str()) {
        return true;
    }
    // Single initials such as "J." ("I." and "A." usually end a sentence)
    let mut chars = last_word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_alphabetic() && c != 'i' && c != 'a'
    )
}

/// Rule-based English sentence splitter.
///
/// Splits after `.`, `!` or `?` when followed by whitespace, except inside
/// double quotes, after common abbreviations and initials, and before a
/// lowercase continuation.
pub fn split_sentences_rules(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut buffer = String::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        buffer.push(ch);

        if is_double_quote(ch) {
            in_quote = !in_quote;
        }

        let closes_quoted_sentence =
            is_double_quote(ch) && !in_quote && i > 0 && is_terminator(chars[i - 1]);
        let candidate = (is_terminator(ch) && !in_quote) || closes_quoted_sentence;

        if candidate {
            // Swallow "?!", "..." and closing brackets.
            while let Some(&next) = chars.get(i + 1) {
                if is_terminator(next) || matches!(next, ')' | ']' | '\'' | '\u{2019}') {
                    buffer.push(next);
                    i += 1;
                } else {
                    break;
                }
            }

            let at_boundary = chars.get(i + 1).map_or(true, |c| c.is_whitespace());
            let continues_lowercase = chars[i + 1..]
                .iter()
                .find(|c| !c.is_whitespace())
                .map_or(false, |c| c.is_lowercase());

            if at_boundary && !continues_lowercase && !ends_with_abbreviation(&buffer) {
                let sentence = buffer.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                buffer.clear();
            }
        }

        i += 1;
    }

    let remaining = buffer.trim();
    if !remaining.is_empty() {
        sentences.push(remaining.to_string());
    }

    sentences
}

/// Locate units inside the text they were cut from, scanning forward so that
/// repeated phrases map to successive occurrences.
pub struct SpanLocator<'a> {
    haystack: &'a str,
    cursor: usize,
}

impl<'a> SpanLocator<'a> {
    pub fn new(haystack: &'a str) -> Self {
        Self { haystack, cursor: 0 }
    }

    pub fn locate(&mut self, needle: &str) -> Option<SpanOffsets> {
        let needle = needle.trim();
        if needle.is_empty() {
            return None;
        }
        let start = self.haystack[self.cursor..].find(needle)? + self.cursor;
        let end = start + needle.len();
        self.cursor = end;
        Some(SpanOffsets { start, end })
    }
}
