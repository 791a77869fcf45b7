//! Shared test utilities for the tanakh-gal test suite.
//!
//! Small builders for registries, image records, catalogs and placement maps,
//! so each test states only the data it cares about.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let registry = genesis_registry();
//! let map = placement_map(&[("a.jpg", "Genesis 22"), ("b.jpg", "Genesis 22")]);
//! let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "General")]);
//! ```

use std::path::Path;

use crate::catalog::{Catalog, ImageRecord};
use crate::placement::PlacementMap;
use crate::reference::Reference;
use crate::registry::{BookSpec, Registry, Section};

// =========================================================================
// Registries
// =========================================================================

/// A one-book registry: `Genesis: 50`.
pub fn genesis_registry() -> Registry {
    small_registry(&[("Genesis", 50)])
}

/// A registry of the given books, all in the Torah section, in order.
pub fn small_registry(books: &[(&str, u32)]) -> Registry {
    Registry::new(
        books
            .iter()
            .map(|&(id, count)| BookSpec::new(id, count, id, Section::Torah))
            .collect(),
    )
    .unwrap()
}

// =========================================================================
// References and placement maps
// =========================================================================

pub fn reference(book: &str, chapter: u32) -> Reference {
    Reference::new(book, chapter)
}

/// Build a placement map from `(filename, "Book Chapter")` pairs.
pub fn placement_map(entries: &[(&str, &str)]) -> PlacementMap {
    let mut map = PlacementMap::new();
    for (filename, r) in entries {
        map.insert(filename, Reference::parse(r).unwrap());
    }
    map
}

/// Primary chapters of `book`, sorted, for multiset assertions.
pub fn chapters_of(map: &PlacementMap, book: &str) -> Vec<u32> {
    let mut chapters: Vec<u32> = map
        .primaries()
        .into_iter()
        .filter(|(_, r)| r.book == book)
        .map(|(_, r)| r.chapter)
        .collect();
    chapters.sort_unstable();
    chapters
}

// =========================================================================
// Images
// =========================================================================

pub fn image(filename: &str, source_book: &str) -> ImageRecord {
    ImageRecord::new(filename, "", source_book, Path::new("images"))
}

pub fn titled_image(filename: &str, title: &str, source_book: &str) -> ImageRecord {
    ImageRecord::new(filename, title, source_book, Path::new("images"))
}

/// Catalog of `(filename, source_book)` pairs, in the given order.
pub fn catalog(images: &[(&str, &str)]) -> Catalog {
    Catalog::from_records(images.iter().map(|&(f, b)| image(f, b)).collect()).unwrap()
}
