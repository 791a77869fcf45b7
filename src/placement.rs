//! The persisted placement map.
//!
//! The placement map is the only state that survives between runs. On disk it
//! is a JSON object from image filename to a list of `"<Book> <Chapter>"`
//! strings:
//!
//! ```json
//! {
//!   "abraham.jpg": ["Genesis 22"],
//!   "ladder.jpg": ["Genesis 28", "Genesis 29"]
//! }
//! ```
//!
//! Only the first string of each list (the *primary reference*) is
//! authoritative. Trailing strings are legacy data from older tools; they are
//! preserved on load and save but never consulted.
//!
//! Strings that do not parse as references are kept verbatim so a bad entry
//! never takes the whole file down with it; such entries have no primary
//! reference and are reported by [`audit`].
//!
//! Entries are held in a `BTreeMap`, so every traversal is in lexical
//! filename order. The normalizer's tie-breaks depend on this order.
//!
//! Saving replaces the whole file. There is no locking: tools that mutate the
//! map must not run concurrently.

use crate::reference::Reference;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filename → list of reference strings, primary first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlacementMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl PlacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a placement map. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, PlacementError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a placement map, treating a missing file as an empty map.
    pub fn load_or_default(path: &Path) -> Result<Self, PlacementError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the whole map, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PlacementError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Raw reference strings for a filename.
    pub fn refs(&self, filename: &str) -> Option<&[String]> {
        self.entries.get(filename).map(Vec::as_slice)
    }

    /// All entries in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The authoritative reference of an entry, if it has a parseable one.
    pub fn primary(&self, filename: &str) -> Option<Reference> {
        self.entries
            .get(filename)
            .and_then(|refs| refs.first())
            .and_then(|r| Reference::parse(r).ok())
    }

    /// Every parseable primary reference, in filename order.
    pub fn primaries(&self) -> Vec<(&str, Reference)> {
        self.entries
            .iter()
            .filter_map(|(fname, refs)| {
                let primary = Reference::parse(refs.first()?).ok()?;
                Some((fname.as_str(), primary))
            })
            .collect()
    }

    /// Replace an entry with a single reference.
    pub fn insert(&mut self, filename: &str, reference: Reference) {
        self.entries
            .insert(filename.to_string(), vec![reference.to_string()]);
    }

    /// Replace only the primary reference, keeping any legacy trailing ones.
    pub fn set_primary(&mut self, filename: &str, reference: Reference) {
        let refs = self.entries.entry(filename.to_string()).or_default();
        match refs.first_mut() {
            Some(first) => *first = reference.to_string(),
            None => refs.push(reference.to_string()),
        }
    }

    pub fn remove(&mut self, filename: &str) -> Option<Vec<String>> {
        self.entries.remove(filename)
    }

    /// Chapters of `book` claimed by some primary reference.
    pub fn chapters_used(&self, book: &str) -> BTreeSet<u32> {
        self.primaries()
            .into_iter()
            .filter(|(_, r)| r.book == book)
            .map(|(_, r)| r.chapter)
            .collect()
    }

    /// Add entries from `other` for filenames this map does not have yet.
    ///
    /// Returns the number of entries added.
    pub fn merge_missing(&mut self, other: &PlacementMap) -> usize {
        let mut added = 0;
        for (fname, refs) in &other.entries {
            if !self.entries.contains_key(fname) {
                self.entries.insert(fname.clone(), refs.clone());
                added += 1;
            }
        }
        added
    }

    /// Place an image, moving it to the end of the book if its chapter is taken.
    ///
    /// If another image already claims `desired`, the image goes to the
    /// highest-numbered chapter of the book no other image claims. Unknown
    /// books and full books keep the desired chapter. The image's own current
    /// placement does not count as taken. Returns the reference written.
    pub fn assign(&mut self, filename: &str, desired: Reference, registry: &Registry) -> Reference {
        let placed = match registry.chapter_count(&desired.book) {
            Some(count) => {
                let used: BTreeSet<u32> = self
                    .primaries()
                    .into_iter()
                    .filter(|(f, r)| *f != filename && r.book == desired.book)
                    .map(|(_, r)| r.chapter)
                    .collect();
                if used.contains(&desired.chapter) {
                    highest_free(count, &used)
                        .map(|c| Reference::new(desired.book.as_str(), c))
                        .unwrap_or(desired)
                } else {
                    desired
                }
            }
            None => desired,
        };
        self.insert(filename, placed.clone());
        placed
    }
}

/// Highest chapter in `1..=chapter_count` not in `used`.
pub fn highest_free(chapter_count: u32, used: &BTreeSet<u32>) -> Option<u32> {
    (1..=chapter_count).rev().find(|c| !used.contains(c))
}

/// Problems found in a placement map without changing it.
#[derive(Debug, Default, PartialEq)]
pub struct PlacementAudit {
    /// Entries whose primary book is not in the registry.
    pub unknown_books: Vec<(String, Reference)>,
    /// Entries with no parseable primary reference.
    pub malformed: Vec<String>,
    /// Entries whose primary chapter is outside the book.
    pub out_of_range: Vec<(String, Reference)>,
    /// Chapters claimed by more than one entry, with their claimants.
    pub duplicates: Vec<(Reference, Vec<String>)>,
    /// Entries for filenames absent from the catalog.
    pub not_in_catalog: Vec<String>,
}

impl PlacementAudit {
    pub fn is_clean(&self) -> bool {
        self.unknown_books.is_empty()
            && self.malformed.is_empty()
            && self.out_of_range.is_empty()
            && self.duplicates.is_empty()
            && self.not_in_catalog.is_empty()
    }
}

/// Inspect a map against the registry and, optionally, the catalog filenames.
pub fn audit(
    map: &PlacementMap,
    registry: &Registry,
    known_filename: impl Fn(&str) -> bool,
) -> PlacementAudit {
    let mut report = PlacementAudit::default();
    let mut claims: BTreeMap<Reference, Vec<String>> = BTreeMap::new();

    for (fname, _) in map.iter() {
        if !known_filename(fname) {
            report.not_in_catalog.push(fname.to_string());
        }
        let Some(primary) = map.primary(fname) else {
            report.malformed.push(fname.to_string());
            continue;
        };
        match registry.chapter_in_range(&primary.book, primary.chapter) {
            None => report.unknown_books.push((fname.to_string(), primary)),
            Some(false) => report.out_of_range.push((fname.to_string(), primary)),
            Some(true) => claims.entry(primary).or_default().push(fname.to_string()),
        }
    }

    report.duplicates = claims.into_iter().filter(|(_, f)| f.len() > 1).collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn load_preserves_legacy_trailing_refs() {
        let map: PlacementMap =
            serde_json::from_str(r#"{"a.jpg": ["Genesis 22", "Genesis 23"]}"#).unwrap();
        assert_eq!(map.primary("a.jpg"), Some(reference("Genesis", 22)));
        assert_eq!(map.refs("a.jpg").unwrap().len(), 2);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a.jpg":["Genesis 22","Genesis 23"]}"#);
    }

    #[test]
    fn malformed_and_empty_entries_have_no_primary() {
        let map: PlacementMap =
            serde_json::from_str(r#"{"a.jpg": ["somewhere"], "b.jpg": []}"#).unwrap();
        assert_eq!(map.primary("a.jpg"), None);
        assert_eq!(map.primary("b.jpg"), None);
        assert!(map.primaries().is_empty());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn iteration_is_in_filename_order() {
        let map = placement_map(&[("c.jpg", "Ruth 1"), ("a.jpg", "Ruth 2"), ("b.jpg", "Ruth 3")]);
        let names: Vec<&str> = map.iter().map(|(f, _)| f).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn set_primary_keeps_trailing_refs() {
        let mut map: PlacementMap =
            serde_json::from_str(r#"{"a.jpg": ["Genesis 75", "Genesis 2"]}"#).unwrap();
        map.set_primary("a.jpg", reference("Genesis", 50));
        assert_eq!(
            map.refs("a.jpg").unwrap(),
            &["Genesis 50".to_string(), "Genesis 2".to_string()]
        );
    }

    #[test]
    fn save_and_load_round_trip_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/placement.json");
        let map = placement_map(&[("a.jpg", "Genesis 1"), ("b.jpg", "Exodus 3")]);

        map.save(&path).unwrap();
        let loaded = PlacementMap::load(&path).unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let tmp = TempDir::new().unwrap();
        let map = PlacementMap::load_or_default(&tmp.path().join("absent.json")).unwrap();
        assert!(map.is_empty());
        assert!(PlacementMap::load(&tmp.path().join("absent.json")).is_err());
    }

    #[test]
    fn assign_free_chapter_keeps_it() {
        let registry = genesis_registry();
        let mut map = placement_map(&[("a.jpg", "Genesis 22")]);
        let placed = map.assign("b.jpg", reference("Genesis", 28), &registry);
        assert_eq!(placed, reference("Genesis", 28));
    }

    #[test]
    fn assign_taken_chapter_moves_to_end_of_book() {
        let registry = genesis_registry();
        let mut map = placement_map(&[("a.jpg", "Genesis 22"), ("z.jpg", "Genesis 50")]);
        let placed = map.assign("b.jpg", reference("Genesis", 22), &registry);
        assert_eq!(placed, reference("Genesis", 49));
        assert_eq!(map.primary("b.jpg"), Some(reference("Genesis", 49)));
    }

    #[test]
    fn assign_ignores_the_images_own_placement() {
        let registry = genesis_registry();
        let mut map = placement_map(&[("a.jpg", "Genesis 22")]);
        let placed = map.assign("a.jpg", reference("Genesis", 22), &registry);
        assert_eq!(placed, reference("Genesis", 22));
    }

    #[test]
    fn assign_unknown_book_keeps_request() {
        let registry = genesis_registry();
        let mut map = PlacementMap::new();
        let placed = map.assign("a.jpg", reference("Tobit", 3), &registry);
        assert_eq!(placed, reference("Tobit", 3));
    }

    #[test]
    fn merge_missing_does_not_overwrite() {
        let mut base = placement_map(&[("a.jpg", "Genesis 1")]);
        let other = placement_map(&[("a.jpg", "Genesis 2"), ("b.jpg", "Genesis 3")]);
        assert_eq!(base.merge_missing(&other), 1);
        assert_eq!(base.primary("a.jpg"), Some(reference("Genesis", 1)));
        assert_eq!(base.primary("b.jpg"), Some(reference("Genesis", 3)));
    }

    #[test]
    fn highest_free_searches_downward() {
        let used: BTreeSet<u32> = [3, 4].into_iter().collect();
        assert_eq!(highest_free(4, &used), Some(2));
        let full: BTreeSet<u32> = [1, 2].into_iter().collect();
        assert_eq!(highest_free(2, &full), None);
    }

    #[test]
    fn audit_reports_every_problem_kind() {
        let registry = genesis_registry();
        let mut map = placement_map(&[
            ("a.jpg", "Genesis 22"),
            ("b.jpg", "Genesis 22"),
            ("c.jpg", "Genesis 75"),
            ("d.jpg", "Tobit 2"),
        ]);
        map.entries.insert("e.jpg".into(), vec!["garbage".into()]);

        let report = audit(&map, &registry, |f| f != "a.jpg");
        assert_eq!(report.not_in_catalog, vec!["a.jpg"]);
        assert_eq!(report.malformed, vec!["e.jpg"]);
        assert_eq!(report.out_of_range.len(), 1);
        assert_eq!(report.unknown_books[0].0, "d.jpg");
        assert_eq!(
            report.duplicates,
            vec![(reference("Genesis", 22), vec!["a.jpg".to_string(), "b.jpg".to_string()])]
        );
        assert!(!report.is_clean());
    }
}
