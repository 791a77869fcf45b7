//! Chapter text source.
//!
//! Verse text arrives as Sefaria-shaped JSON, one object per chapter:
//!
//! ```json
//! { "he": ["בְּרֵאשִׁית בָּרָא …", …], "text": ["In the beginning …", …] }
//! ```
//!
//! Either field may be a string, an array of strings, or nested arrays of
//! strings. Markup is stripped, entities decoded and whitespace collapsed.
//! A chapter where both fields are absent has no content; that is not an
//! error.
//!
//! Failures are typed so callers can pick a policy per kind:
//!
//! | Error       | Policy                                   |
//! |-------------|------------------------------------------|
//! | `Transient` | retried with a fixed backoff             |
//! | `Malformed` | not retried; the chapter is skipped      |
//! | `NotFound`  | treated as a chapter with no content     |
//!
//! Calls are sequential with a fixed delay between them ([`PacedFetcher`]).

use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TextError {
    #[error("Transient failure fetching {0}")]
    Transient(String),
    #[error("Malformed chapter text for {0}")]
    Malformed(String),
    #[error("No text found for {0}")]
    NotFound(String),
}

/// Hebrew and English verses of one chapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterText {
    pub hebrew: Vec<String>,
    pub english: Vec<String>,
}

impl ChapterText {
    /// Parse a chapter object. `Ok(None)` when both `he` and `text` are absent.
    pub fn from_json(value: &Value, key: &str) -> Result<Option<Self>, TextError> {
        let malformed = || TextError::Malformed(key.to_string());
        let obj = value.as_object().ok_or_else(malformed)?;
        let he = obj.get("he").filter(|v| !v.is_null());
        let en = obj.get("text").filter(|v| !v.is_null());
        if he.is_none() && en.is_none() {
            return Ok(None);
        }

        let mut text = ChapterText::default();
        if let Some(he) = he {
            collect_verses(he, &mut text.hebrew).ok_or_else(malformed)?;
        }
        if let Some(en) = en {
            collect_verses(en, &mut text.english).ok_or_else(malformed)?;
        }
        Ok(Some(text))
    }

    pub fn is_empty(&self) -> bool {
        self.hebrew.is_empty() && self.english.is_empty()
    }

    /// Verse pairs, padding the shorter column with empty strings.
    pub fn verse_pairs(&self) -> Vec<(&str, &str)> {
        let len = self.hebrew.len().max(self.english.len());
        (0..len)
            .map(|i| {
                (
                    self.hebrew.get(i).map_or("", String::as_str),
                    self.english.get(i).map_or("", String::as_str),
                )
            })
            .collect()
    }
}

/// Flatten strings and nested arrays of strings. `None` on any other shape.
fn collect_verses(value: &Value, out: &mut Vec<String>) -> Option<()> {
    match value {
        Value::String(s) => {
            let cleaned = clean_text(s);
            if !cleaned.is_empty() {
                out.push(cleaned);
            }
            Some(())
        }
        Value::Array(items) => items.iter().try_for_each(|v| collect_verses(v, out)),
        Value::Null => Some(()),
        _ => None,
    }
}

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&thinsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Strip tags, decode common entities, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    // &amp; last so "&amp;lt;" decodes to "&lt;", not "<".
    let decoded = ENTITIES
        .iter()
        .fold(stripped, |s, (entity, ch)| s.replace(entity, ch));
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Anything that can produce a chapter's text.
pub trait TextSource {
    fn fetch(&self, book: &str, chapter: u32) -> Result<Option<ChapterText>, TextError>;
}

/// Reads `<dir>/<book>.<chapter>.json`, the layout of a mirrored text API.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chapter_path(&self, book: &str, chapter: u32) -> PathBuf {
        self.dir.join(format!("{book}.{chapter}.json"))
    }
}

impl TextSource for DirectorySource {
    fn fetch(&self, book: &str, chapter: u32) -> Result<Option<ChapterText>, TextError> {
        let key = format!("{book}.{chapter}");
        let content = match fs::read_to_string(self.chapter_path(book, chapter)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(TextError::NotFound(key)),
            Err(e) if e.kind() == ErrorKind::InvalidData => return Err(TextError::Malformed(key)),
            Err(_) => return Err(TextError::Transient(key)),
        };
        let value: Value =
            serde_json::from_str(&content).map_err(|_| TextError::Malformed(key.clone()))?;
        ChapterText::from_json(&value, &key)
    }
}

/// Bounded retries and pacing for a text source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per chapter, including the first.
    pub attempts: u32,
    /// Pause after a transient failure.
    pub backoff: Duration,
    /// Pause between consecutive chapter requests.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(2000),
            delay: Duration::from_millis(100),
        }
    }
}

/// Fetch one chapter, retrying transient failures.
///
/// `NotFound` becomes `Ok(None)`. `Malformed` is returned at once. A
/// transient failure on the last attempt is returned as is.
pub fn fetch_with_retry(
    source: &dyn TextSource,
    book: &str,
    chapter: u32,
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<Option<ChapterText>, TextError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match source.fetch(book, chapter) {
            Ok(text) => return Ok(text),
            Err(TextError::NotFound(_)) => return Ok(None),
            Err(TextError::Transient(_)) if attempt < attempts => {
                sleep(policy.backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sequential fetcher that waits `policy.delay` between chapter requests.
pub struct PacedFetcher<'a, F: FnMut(Duration)> {
    source: &'a dyn TextSource,
    policy: RetryPolicy,
    sleep: F,
    calls: u64,
}

impl<'a> PacedFetcher<'a, fn(Duration)> {
    /// A fetcher that sleeps the current thread.
    pub fn new(source: &'a dyn TextSource, policy: RetryPolicy) -> Self {
        Self::with_sleep(source, policy, std::thread::sleep)
    }
}

impl<'a, F: FnMut(Duration)> PacedFetcher<'a, F> {
    pub fn with_sleep(source: &'a dyn TextSource, policy: RetryPolicy, sleep: F) -> Self {
        Self {
            source,
            policy,
            sleep,
            calls: 0,
        }
    }

    pub fn fetch(&mut self, book: &str, chapter: u32) -> Result<Option<ChapterText>, TextError> {
        if self.calls > 0 && !self.policy.delay.is_zero() {
            (self.sleep)(self.policy.delay);
        }
        self.calls += 1;
        fetch_with_retry(self.source, book, chapter, &self.policy, &mut self.sleep)
    }
}
