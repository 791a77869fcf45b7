//! Book/chapter references and the title parser.
//!
//! A [`Reference`] is a `(book, chapter)` pair. Its wire form is the string
//! `"<BookId> <Chapter>"` (e.g. `"I_Samuel 17"`), which is what the placement
//! map stores. A reference is not validated on construction: an out-of-range
//! chapter is a legal value that the normalizer later repairs.
//!
//! ## Title Parsing
//!
//! [`parse`] turns a free-text artwork title and its filename into at most
//! three ranked [`Suggestion`]s:
//!
//! ```text
//! "Abraham about to sacrifice Isaac (Genesis XXII)"
//!     → Genesis 22 (0.90, "Genesis followed by XXII in title")
//! "chagall_david_and_goliath_samuel.jpg"
//!     → I_Samuel 17 (0.60, subject cue)
//! "Moses receiving the tables of law"
//!     → []
//! ```
//!
//! Book names are matched as whole words, case-insensitively, longest name
//! first; a matched span is claimed so that `Samuel` cannot match again inside
//! `I Samuel`. The chapter is the first Arabic or Roman numeral in a short
//! window after the name, which ends at a closing parenthesis, the end of the
//! text, or after [`WINDOW_TOKENS`] tokens. Parsing never fails: unknown text
//! yields an empty list.

use crate::numerals::{is_roman_token, roman_to_int};
use crate::registry::{Registry, display_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("Expected \"<Book> <Chapter>\", got {0:?}")]
    Malformed(String),
}

/// A `(book, chapter)` location.
///
/// Ordering is by book id then chapter, which gives maps keyed by
/// `Reference` a stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    pub book: String,
    pub chapter: u32,
}

impl Reference {
    pub fn new(book: impl Into<String>, chapter: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
        }
    }

    /// Parse `"<BookId> <Chapter>"`. The book id may itself contain spaces
    /// (`"Song of Songs 2"`); they are folded to underscores.
    pub fn parse(s: &str) -> Result<Self, ReferenceError> {
        let trimmed = s.trim();
        let (book, chapter) = trimmed
            .rsplit_once(char::is_whitespace)
            .ok_or_else(|| ReferenceError::Malformed(s.to_string()))?;
        let chapter = parse_chapter(chapter).ok_or_else(|| ReferenceError::Malformed(s.to_string()))?;
        let book = book.trim();
        if book.is_empty() {
            return Err(ReferenceError::Malformed(s.to_string()));
        }
        Ok(Self::new(book.split_whitespace().collect::<Vec<_>>().join("_"), chapter))
    }
}

/// Decimal chapter number. Digit runs too large for `u32` saturate, so they
/// stay out of range instead of becoming unparseable.
fn parse_chapter(s: &str) -> Option<u32> {
    match s.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => Some(u32::MAX),
        Err(_) => None,
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl TryFrom<String> for Reference {
    type Error = ReferenceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Reference::parse(&s)
    }
}

impl From<Reference> for String {
    fn from(r: Reference) -> Self {
        r.to_string()
    }
}

// ============================================================================
// Title parser
// ============================================================================

/// Maximum number of tokens inspected after a book name.
pub const WINDOW_TOKENS: usize = 5;

/// Maximum number of suggestions returned by [`parse`].
pub const MAX_SUGGESTIONS: usize = 3;

pub const CONFIDENCE_TITLE: f32 = 0.90;
pub const CONFIDENCE_ALIAS_TITLE: f32 = 0.70;
pub const CONFIDENCE_SUBJECT_CUE: f32 = 0.60;
pub const CONFIDENCE_FILENAME: f32 = 0.55;
pub const CONFIDENCE_BOOK_ONLY: f32 = 0.30;

/// A ranked candidate location for an image.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub reference: Reference,
    pub confidence: f32,
    pub rationale: String,
}

/// Partial names that resolve to the first of a pair of books.
const ALIASES: &[(&str, &str)] = &[
    ("samuel", "I_Samuel"),
    ("kings", "I_Kings"),
    ("chronicles", "I_Chronicles"),
    ("song of solomon", "Song_of_Songs"),
    ("canticles", "Song_of_Songs"),
    ("psalm", "Psalms"),
];

/// Book id for a bare partial name such as `Samuel` or `Song of Solomon`.
pub fn resolve_alias(name: &str) -> Option<&'static str> {
    let name = name.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, book)| *book)
}

/// Well-known narratives that pin a chapter when no numeral is present.
struct SubjectCue {
    book: &'static str,
    keywords: &'static [&'static str],
    chapter: u32,
}

const SUBJECT_CUES: &[SubjectCue] = &[
    SubjectCue {
        book: "I_Samuel",
        keywords: &["goliath"],
        chapter: 17,
    },
    SubjectCue {
        book: "Genesis",
        keywords: &["ladder"],
        chapter: 28,
    },
    SubjectCue {
        book: "Genesis",
        keywords: &["isaac", "sacrifice"],
        chapter: 22,
    },
    SubjectCue {
        book: "Genesis",
        keywords: &["noah", "ark"],
        chapter: 6,
    },
    SubjectCue {
        book: "Exodus",
        keywords: &["burning", "bush"],
        chapter: 3,
    },
];

/// Where the matched text came from; title hits outrank filename hits.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Origin {
    Title,
    Filename,
}

/// One searchable book name.
struct BookName {
    needle: String,
    book: String,
    alias: bool,
}

fn book_names(registry: &Registry) -> Vec<BookName> {
    let mut names: Vec<BookName> = registry
        .books()
        .iter()
        .map(|b| BookName {
            needle: display_name(&b.id).to_lowercase(),
            book: b.id.clone(),
            alias: false,
        })
        .collect();
    names.extend(
        ALIASES
            .iter()
            .filter(|(_, book)| registry.contains(book))
            .map(|(needle, book)| BookName {
                needle: needle.to_string(),
                book: book.to_string(),
                alias: true,
            }),
    );
    // Longest first so that "ii samuel" claims its span before "samuel".
    names.sort_by(|a, b| b.needle.len().cmp(&a.needle.len()));
    names
}

/// Normalize a filename into searchable text: drop the extension and turn
/// separators into spaces.
fn filename_text(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains(' ') => stem,
        _ => filename,
    };
    stem.replace(['_', '-', '.'], " ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte ranges of whole-word, case-insensitive occurrences of `needle`.
///
/// `hay` must already be lowercased.
fn find_whole_words(hay: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut hits = Vec::new();
    let mut from = 0;
    while let Some(pos) = hay[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = hay[..start].chars().next_back().is_none_or(|c| !is_word_char(c));
        let after_ok = hay[end..].chars().next().is_none_or(|c| !is_word_char(c));
        if before_ok && after_ok {
            hits.push((start, end));
        }
        from = start + needle.chars().next().map(char::len_utf8).unwrap_or(1);
    }
    hits
}

/// First chapter numeral in the window following a book name.
///
/// Returns the value and the token it was read from.
fn numeral_after(tail: &str) -> Option<(u32, String)> {
    let window = tail.split(')').next().unwrap_or("");
    window
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .take(WINDOW_TOKENS)
        .find_map(|token| {
            if token.chars().all(|c| c.is_ascii_digit()) {
                if token.len() > 3 {
                    return None;
                }
                token
                    .parse::<u32>()
                    .ok()
                    .filter(|&n| n > 0)
                    .map(|n| (n, token.to_string()))
            } else if is_roman_token(token) {
                roman_to_int(token).map(|n| (n, token.to_uppercase()))
            } else {
                None
            }
        })
}

fn subject_cue(book: &str, hay: &str) -> Option<u32> {
    SUBJECT_CUES
        .iter()
        .find(|cue| cue.book == book && cue.keywords.iter().all(|k| hay.contains(k)))
        .map(|cue| cue.chapter)
}

fn scan_text(
    text: &str,
    origin: Origin,
    names: &[BookName],
    cue_hay: &str,
    out: &mut Vec<Suggestion>,
) {
    let hay = text.to_lowercase();
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let source = match origin {
        Origin::Title => "title",
        Origin::Filename => "filename",
    };

    for name in names {
        for (start, end) in find_whole_words(&hay, &name.needle) {
            if claimed.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            claimed.push((start, end));

            let label = display_name(&name.book);
            let suggestion = if let Some((chapter, token)) = numeral_after(&hay[end..]) {
                let confidence = match (origin, name.alias) {
                    (Origin::Title, false) => CONFIDENCE_TITLE,
                    (Origin::Title, true) => CONFIDENCE_ALIAS_TITLE,
                    (Origin::Filename, _) => CONFIDENCE_FILENAME,
                };
                Suggestion {
                    reference: Reference::new(name.book.as_str(), chapter),
                    confidence,
                    rationale: format!("{label} followed by {token} in {source}"),
                }
            } else if let Some(chapter) = subject_cue(&name.book, cue_hay) {
                Suggestion {
                    reference: Reference::new(name.book.as_str(), chapter),
                    confidence: CONFIDENCE_SUBJECT_CUE,
                    rationale: format!("{label} with a known subject in {source}"),
                }
            } else {
                Suggestion {
                    reference: Reference::new(name.book.as_str(), 1),
                    confidence: CONFIDENCE_BOOK_ONLY,
                    rationale: format!("{label} in {source}; defaulting to chapter 1"),
                }
            };
            out.push(suggestion);
        }
    }
}

/// Suggest locations for an image from its title and filename.
///
/// Results are deduplicated by reference (keeping the highest confidence),
/// sorted by descending confidence, then canonical book order, then chapter,
/// and truncated to [`MAX_SUGGESTIONS`].
pub fn parse(title: &str, filename: &str, registry: &Registry) -> Vec<Suggestion> {
    let names = book_names(registry);
    let file_text = filename_text(filename);
    let cue_hay = format!("{} {}", title, file_text).to_lowercase();

    let mut raw = Vec::new();
    scan_text(title, Origin::Title, &names, &cue_hay, &mut raw);
    scan_text(&file_text, Origin::Filename, &names, &cue_hay, &mut raw);

    let mut best: Vec<Suggestion> = Vec::new();
    for s in raw {
        match best.iter_mut().find(|b| b.reference == s.reference) {
            Some(existing) if s.confidence > existing.confidence => *existing = s,
            Some(_) => {}
            None => best.push(s),
        }
    }

    best.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| {
                let pa = registry.position(&a.reference.book).unwrap_or(usize::MAX);
                let pb = registry.position(&b.reference.book).unwrap_or(usize::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| a.reference.chapter.cmp(&b.reference.chapter))
    });
    best.truncate(MAX_SUGGESTIONS);
    best
}
