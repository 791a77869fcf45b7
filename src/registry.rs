//! Canonical book registry.
//!
//! Every range check in the crate goes through a [`Registry`]: a fixed,
//! ordered table of book identifiers and their chapter counts. The order of
//! the table is the canonical reading order (Torah, Prophets, Writings) and is
//! also used as a deterministic tiebreak by the selector.
//!
//! Book ids use underscores in place of spaces (`I_Samuel`, `Song_of_Songs`)
//! so they survive as single tokens in `"<Book> <Chapter>"` strings and in
//! filenames. [`display_name`] turns an id back into the human form.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Duplicate book id in registry: {0}")]
    DuplicateBook(String),
    #[error("Book {0} has no chapters")]
    EmptyBook(String),
}

/// The three divisions of the Tanakh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Torah,
    Prophets,
    Writings,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Torah => "Torah",
            Section::Prophets => "Prophets",
            Section::Writings => "Writings",
        };
        f.write_str(name)
    }
}

/// A book and its fixed chapter count. Chapters are `1..=chapter_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSpec {
    pub id: String,
    pub chapter_count: u32,
    pub hebrew_name: String,
    pub section: Section,
}

impl BookSpec {
    pub fn new(id: &str, chapter_count: u32, hebrew_name: &str, section: Section) -> Self {
        Self {
            id: id.to_string(),
            chapter_count,
            hebrew_name: hebrew_name.to_string(),
            section,
        }
    }

    pub fn contains_chapter(&self, chapter: u32) -> bool {
        (1..=self.chapter_count).contains(&chapter)
    }
}

const TANAKH: &[(&str, u32, &str, Section)] = &[
    ("Genesis", 50, "בראשית", Section::Torah),
    ("Exodus", 40, "שמות", Section::Torah),
    ("Leviticus", 27, "ויקרא", Section::Torah),
    ("Numbers", 36, "במדבר", Section::Torah),
    ("Deuteronomy", 34, "דברים", Section::Torah),
    ("Joshua", 24, "יהושע", Section::Prophets),
    ("Judges", 21, "שופטים", Section::Prophets),
    ("I_Samuel", 31, "שמואל א", Section::Prophets),
    ("II_Samuel", 24, "שמואל ב", Section::Prophets),
    ("I_Kings", 22, "מלכים א", Section::Prophets),
    ("II_Kings", 25, "מלכים ב", Section::Prophets),
    ("Isaiah", 66, "ישעיהו", Section::Prophets),
    ("Jeremiah", 52, "ירמיהו", Section::Prophets),
    ("Ezekiel", 48, "יחזקאל", Section::Prophets),
    ("Hosea", 14, "הושע", Section::Prophets),
    ("Joel", 4, "יואל", Section::Prophets),
    ("Amos", 9, "עמוס", Section::Prophets),
    ("Obadiah", 1, "עובדיה", Section::Prophets),
    ("Jonah", 4, "יונה", Section::Prophets),
    ("Micah", 7, "מיכה", Section::Prophets),
    ("Nahum", 3, "נחום", Section::Prophets),
    ("Habakkuk", 3, "חבקוק", Section::Prophets),
    ("Zephaniah", 3, "צפניה", Section::Prophets),
    ("Haggai", 2, "חגי", Section::Prophets),
    ("Zechariah", 14, "זכריה", Section::Prophets),
    ("Malachi", 3, "מלאכי", Section::Prophets),
    ("Psalms", 150, "תהילים", Section::Writings),
    ("Proverbs", 31, "משלי", Section::Writings),
    ("Job", 42, "איוב", Section::Writings),
    ("Song_of_Songs", 8, "שיר השירים", Section::Writings),
    ("Ruth", 4, "רות", Section::Writings),
    ("Lamentations", 5, "איכה", Section::Writings),
    ("Ecclesiastes", 12, "קהלת", Section::Writings),
    ("Esther", 10, "אסתר", Section::Writings),
    ("Daniel", 12, "דניאל", Section::Writings),
    ("Ezra", 10, "עזרא", Section::Writings),
    ("Nehemiah", 13, "נחמיה", Section::Writings),
    ("I_Chronicles", 29, "דברי הימים א", Section::Writings),
    ("II_Chronicles", 36, "דברי הימים ב", Section::Writings),
];

/// Ordered, immutable table of books.
#[derive(Debug, Clone)]
pub struct Registry {
    books: Vec<BookSpec>,
}

impl Registry {
    /// Build a registry from an ordered list of books.
    ///
    /// Rejects duplicate ids and books with zero chapters.
    pub fn new(books: Vec<BookSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for book in &books {
            if !seen.insert(book.id.as_str()) {
                return Err(RegistryError::DuplicateBook(book.id.clone()));
            }
            if book.chapter_count == 0 {
                return Err(RegistryError::EmptyBook(book.id.clone()));
            }
        }
        Ok(Self { books })
    }

    /// The full 39-book Tanakh in canonical order.
    pub fn tanakh() -> Self {
        let books = TANAKH
            .iter()
            .map(|&(id, count, hebrew, section)| BookSpec::new(id, count, hebrew, section))
            .collect();
        Self { books }
    }

    /// Keep only the books of the given sections, preserving canonical order.
    pub fn with_sections(&self, sections: &[Section]) -> Self {
        Self {
            books: self
                .books
                .iter()
                .filter(|b| sections.contains(&b.section))
                .cloned()
                .collect(),
        }
    }

    pub fn books(&self) -> &[BookSpec] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BookSpec> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn chapter_count(&self, id: &str) -> Option<u32> {
        self.get(id).map(|b| b.chapter_count)
    }

    /// Canonical position of a book, used for ordering.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.books.iter().position(|b| b.id == id)
    }

    /// `Some(true)` if the chapter is in range, `None` for an unknown book.
    pub fn chapter_in_range(&self, id: &str, chapter: u32) -> Option<bool> {
        self.get(id).map(|b| b.contains_chapter(chapter))
    }
}

/// Human-readable form of a book id: `I_Samuel` → `I Samuel`.
pub fn display_name(id: &str) -> String {
    id.replace('_', " ")
}
