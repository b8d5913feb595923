// Chapter Parser
// Detects chapter headings in a plain-text book and slices it into chapters

use crate::models::Chapter;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A book needs at least this many boundaries (the end of book included).
const MIN_HEADINGS: usize = 3;
/// Headings closer than this are table-of-contents entries.
const TOC_MAX_DISTANCE: usize = 4;

const ROMAN_NUMERAL: &str = r"M{0,3}(?:CM|CD|D?C{0,3})(?:XC|XL|L?X{0,3})(?:IX|IV|V?I{0,3})";

const DIGIT_WORDS: [&str; 19] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const TENS_WORDS: [&str; 8] = [
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const ORDINAL_TENS: [&str; 8] = [
    "twentieth", "thirtieth", "fortieth", "fiftieth", "sixtieth", "seventieth", "eightieth",
    "ninetieth",
];
const ORDINAL_WORDS: [&str; 11] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
    "twelfth", "last",
];

const END_MARKERS: [&str; 6] = [
    r"End of the Project Gutenberg EBook",
    r"End of Project Gutenberg's",
    r"\*\*\*END OF THE PROJECT GUTENBERG EBOOK",
    r"\*\*\* END OF THE PROJECT GUTENBERG EBOOK",
    r"\*\*\*END OF THIS PROJECT GUTENBERG EBOOK",
    r"\*\*\* END OF THIS PROJECT GUTENBERG EBOOK",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("only {found} chapter boundaries found (need at least {min})", min = MIN_HEADINGS)]
    TooFewHeadings { found: usize },
    #[error("no chapters left after removing table-of-contents headings")]
    NoChapters,
}

fn number_words() -> Vec<String> {
    DIGIT_WORDS
        .iter()
        .chain(TENS_WORDS.iter())
        .map(|w| w.to_string())
        .collect()
}

fn ordinal_words() -> Vec<String> {
    let mut words: Vec<String> = ORDINAL_WORDS.iter().map(|w| w.to_string()).collect();
    words.extend(number_words().into_iter().map(|w| format!("{}th", w)));
    words.extend(ORDINAL_TENS.iter().map(|w| w.to_string()));
    words.extend(TENS_WORDS.iter().map(|w| w.to_string()));
    words
}

/// "Chapter 1", "CHAPTER IV", "Chapter Twelve", "chapter the first".
/// The roman branch comes last so an empty roman match only wins when
/// nothing else does; `roman_is_valid` then rejects it.
fn chapter_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^chapter (?:\d+|(?:{})|(?:the )?(?:{})|(?P<roman>{}))",
            number_words().join("|"),
            ordinal_words().join("|"),
            ROMAN_NUMERAL
        );
        RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("chapter heading regex")
    })
}

/// Case-sensitive numbered headings: "II. The Mail", "II The Mail",
/// "II. THE OPEN ROAD", and a bare "8", "8." or "VIII" line.
fn numbered_heading_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(&format!(r"^(?P<roman>{})(?:\. | )[A-Z][a-z]", ROMAN_NUMERAL))
                .expect("titled heading regex"),
            Regex::new(&format!(r"^(?P<roman>{})\. [A-Z][A-Z]", ROMAN_NUMERAL))
                .expect("upper-case heading regex"),
            Regex::new(&format!(r"^(?:\d+\.?|(?P<roman>{})\.?)$", ROMAN_NUMERAL))
                .expect("standalone numeral regex"),
        ]
    })
}

fn end_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(&format!("^(?:{})", END_MARKERS.join("|")))
            .case_insensitive(true)
            .build()
            .expect("end marker regex")
    })
}

/// A roman numeral capture must not be empty.
fn roman_is_valid(re: &Regex, line: &str) -> bool {
    match re.captures(line) {
        Some(caps) => caps.name("roman").map_or(true, |m| !m.as_str().is_empty()),
        None => false,
    }
}

/// Whether a line starts with a chapter heading in any supported form.
pub fn is_heading(line: &str) -> bool {
    roman_is_valid(chapter_word_re(), line)
        || numbered_heading_res()
            .iter()
            .any(|re| roman_is_valid(re, line))
}

/// Index of the first end-of-book line, or the last line when there is none.
pub fn find_end_location(lines: &[&str]) -> usize {
    lines
        .iter()
        .position(|line| end_marker_re().is_match(line))
        .unwrap_or_else(|| lines.len().saturating_sub(1))
}

/// Heading line indices before `end`, followed by `end` itself.
pub fn find_heading_locations(lines: &[&str], end: usize) -> Vec<usize> {
    let mut headings: Vec<usize> = lines
        .iter()
        .take(end)
        .enumerate()
        .filter(|(_, line)| is_heading(line))
        .map(|(i, _)| i)
        .collect();
    headings.push(end);
    headings
}

/// Drop every heading that sits fewer than `TOC_MAX_DISTANCE` lines from its
/// neighbour. Pairs are taken from the original list, so a dense run of
/// contents entries disappears entirely.
pub fn remove_table_of_contents(locations: &[usize]) -> Vec<usize> {
    let mut toc: Vec<usize> = Vec::new();
    for pair in locations.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second.saturating_sub(first) < TOC_MAX_DISTANCE {
            for loc in [first, second] {
                if !toc.contains(&loc) {
                    toc.push(loc);
                }
            }
        }
    }
    if !toc.is_empty() {
        debug!(removed = toc.len(), "[chapters] table of contents headings removed");
    }
    locations
        .iter()
        .copied()
        .filter(|loc| !toc.contains(loc))
        .collect()
}

/// Split a book into chapters.
///
/// Each chapter spans from its heading line up to (not including) the next
/// surviving heading; the last one stops before the end-of-book line.
pub fn segment_chapters(text: &str) -> Result<Vec<Chapter>, ParseFailure> {
    let lines: Vec<&str> = text.split('\n').collect();
    let end = find_end_location(&lines);
    let headings = find_heading_locations(&lines, end);

    if headings.len() < MIN_HEADINGS {
        warn!(found = headings.len(), "[chapters] too few headings, book is unparseable");
        return Err(ParseFailure::TooFewHeadings {
            found: headings.len(),
        });
    }

    let boundaries = remove_table_of_contents(&headings);
    if boundaries.len() < 2 {
        warn!("[chapters] every heading was treated as table of contents");
        return Err(ParseFailure::NoChapters);
    }

    let chapters: Vec<Chapter> = boundaries
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Chapter {
            number: i + 1,
            start_line: pair[0],
            end_line: pair[1],
            text: lines[pair[0]..pair[1]].join("\n"),
        })
        .collect();

    info!(
        chapters = chapters.len(),
        headings = headings.len() - 1,
        end_line = end,
        "[chapters] book segmented"
    );
    Ok(chapters)
}

/// Digits needed to zero-pad chapter numbers up to `count`.
pub fn zero_pad_width(count: usize) -> usize {
    count.max(1).to_string().len()
}

pub fn chapter_file_name(number: usize, width: usize) -> String {
    format!("{:0width$}.txt", number, width = width)
}

/// Write chapters to `<out_root>/<book stem>-chapters/<NN>.txt` and return
/// the chapter directory.
pub fn write_chapters(book_path: &Path, chapters: &[Chapter], out_root: &Path) -> io::Result<PathBuf> {
    let stem = book_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "book".to_string());
    let out_dir = out_root.join(format!("{}-chapters", stem));
    fs::create_dir_all(&out_dir)?;

    let width = zero_pad_width(chapters.len());
    for chapter in chapters {
        fs::write(out_dir.join(chapter_file_name(chapter.number, width)), &chapter.text)?;
    }

    info!(dir = %out_dir.display(), count = chapters.len(), "[chapters] chapter files written");
    Ok(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_book(headings: &[(usize, &str)], end: Option<(usize, &str)>, len: usize) -> String {
        (0..len)
            .map(|i| {
                if let Some((_, h)) = headings.iter().find(|(at, _)| *at == i) {
                    h.to_string()
                } else if let Some((_, marker)) = end.filter(|(at, _)| *at == i) {
                    marker.to_string()
                } else {
                    format!("Some text on line {}.", i)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_chapter_word_headings() {
        assert!(is_heading("Chapter Twelve"));
        assert!(is_heading("CHAPTER 3"));
        assert!(is_heading("chapter the first"));
        assert!(is_heading("Chapter XIV"));
        assert!(is_heading("CHAPTER THE TWENTIETH"));
        assert!(!is_heading("The chapter ends here"));
        assert!(!is_heading("Chapter and verse"));
    }

    #[test]
    fn test_numbered_headings() {
        assert!(is_heading("VIII. The Open Road"));
        assert!(is_heading("II The Mail"));
        assert!(is_heading("II. THE OPEN ROAD"));
        assert!(is_heading("42."));
        assert!(is_heading("VIII"));
        assert!(!is_heading(""));
        assert!(!is_heading("."));
        assert!(!is_heading("42 apples"));
        assert!(!is_heading("It was a dark night."));
    }

    #[test]
    fn test_end_location_falls_back_to_last_line() {
        let lines = vec!["a", "b", "c"];
        assert_eq!(find_end_location(&lines), 2);
        let lines = vec!["a", "*** END OF THE PROJECT GUTENBERG EBOOK X ***", "c"];
        assert_eq!(find_end_location(&lines), 1);
        let lines = vec!["a", "end of project gutenberg's Book", "c"];
        assert_eq!(find_end_location(&lines), 1);
    }

    #[test]
    fn test_toc_headings_three_lines_apart_are_removed() {
        let kept = remove_table_of_contents(&[10, 13, 50, 120, 200]);
        assert_eq!(kept, vec![50, 120, 200]);
    }

    #[test]
    fn test_toc_run_is_removed_entirely() {
        let kept = remove_table_of_contents(&[2, 3, 4, 5, 40, 90, 150]);
        assert_eq!(kept, vec![40, 90, 150]);
    }

    #[test]
    fn test_two_chapter_book_with_end_marker() {
        let text = synthetic_book(
            &[(0, "Chapter One"), (100, "Chapter Two")],
            Some((199, "*** END OF THE PROJECT GUTENBERG EBOOK ***")),
            200,
        );
        let chapters = segment_chapters(&text).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].start_line, chapters[0].end_line), (0, 100));
        assert_eq!((chapters[1].start_line, chapters[1].end_line), (100, 199));
        assert!(chapters[1].text.starts_with("Chapter Two"));
    }

    #[test]
    fn test_chapters_reconstruct_body() {
        let text = synthetic_book(
            &[(0, "CHAPTER I"), (30, "CHAPTER II"), (70, "CHAPTER III")],
            Some((99, "End of the Project Gutenberg EBook of Something")),
            110,
        );
        let chapters = segment_chapters(&text).unwrap();
        assert_eq!(chapters.len(), 3);
        let lines: Vec<&str> = text.split('\n').collect();
        let rebuilt = chapters
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rebuilt, lines[0..99].join("\n"));
    }

    #[test]
    fn test_contents_page_is_skipped() {
        let text = synthetic_book(
            &[
                (2, "Chapter 1"),
                (3, "Chapter 2"),
                (4, "Chapter 3"),
                (20, "Chapter 1"),
                (60, "Chapter 2"),
                (100, "Chapter 3"),
            ],
            None,
            140,
        );
        let chapters = segment_chapters(&text).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].start_line, 20);
        assert_eq!(chapters[2].end_line, 139);
    }

    #[test]
    fn test_too_few_headings_fails() {
        let text = synthetic_book(&[(5, "Chapter One")], None, 50);
        assert_eq!(
            segment_chapters(&text),
            Err(ParseFailure::TooFewHeadings { found: 2 })
        );
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(zero_pad_width(9), 1);
        assert_eq!(zero_pad_width(12), 2);
        assert_eq!(chapter_file_name(3, 2), "03.txt");
    }

    #[test]
    fn test_write_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let chapters: Vec<Chapter> = (1..=10)
            .map(|n| Chapter {
                number: n,
                start_line: n * 10,
                end_line: n * 10 + 10,
                text: format!("Chapter {}\nbody", n),
            })
            .collect();
        let out = write_chapters(Path::new("/books/alice.txt"), &chapters, dir.path()).unwrap();
        assert_eq!(out, dir.path().join("alice-chapters"));
        assert_eq!(fs::read_to_string(out.join("01.txt")).unwrap(), "Chapter 1\nbody");
        assert!(out.join("10.txt").exists());
    }
}
