//! Per-run image selection.
//!
//! A [`Selector`] hands out at most one image per book intro and per chapter
//! while a document is generated. Every image it returns is recorded in a
//! [`UsageLedger`] and is never returned again in the same run.
//!
//! Chapter resolution order:
//!
//! ```text
//! (a) chapter override          [selection.chapter_overrides]
//! (b) explicit chapter mapping  strict mode only; ends the search
//! (c) balanced slot             even-distribution slot for (book, chapter)
//! (d) placement map             images whose primary reference matches,
//!                               ranked by: source == book, lowest source
//!                               usage, registry order, filename
//! ```
//!
//! Intro resolution: override, then the first unused image of the same source
//! book, then the first unused image whose source tag names no book.
//!
//! Results depend on call order. Callers walk books in registry order and
//! chapters ascending.
//!
//! In strict mode only explicit mappings are used, and a gap or a second use
//! of the same image is an error instead of a skip.

use crate::builder::BalancedSlots;
use crate::catalog::{Catalog, ImageRecord};
use crate::placement::PlacementMap;
use crate::reference::Reference;
use crate::registry::Registry;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SelectError {
    #[error("No explicit intro image mapped for {book}")]
    MissingIntroMapping { book: String },
    #[error("Image {filename} is already used in this document ({role})")]
    ImageReused { filename: String, role: String },
    #[error("Image {filename} mapped for {role} is not in the catalog")]
    UnknownImage { filename: String, role: String },
}

/// Images consumed so far in one generation run.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    used: HashSet<String>,
    per_source: HashMap<String, usize>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_used(&self, filename: &str) -> bool {
        self.used.contains(filename)
    }

    /// Record an image as used. Returns false if it already was.
    pub fn mark(&mut self, image: &ImageRecord) -> bool {
        if !self.used.insert(image.filename.clone()) {
            return false;
        }
        *self.per_source.entry(image.source_book.clone()).or_default() += 1;
        true
    }

    /// How many images from `source_book` have been used.
    pub fn usage(&self, source_book: &str) -> usize {
        self.per_source.get(source_book).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Fully explicit mappings; when present the selector runs in strict mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplicitMapping {
    pub intros: BTreeMap<String, String>,
    pub chapters: BTreeMap<Reference, String>,
}

/// Hand-curated selection inputs, usually from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRules {
    pub intro_overrides: BTreeMap<String, String>,
    pub chapter_overrides: BTreeMap<Reference, String>,
    pub explicit: Option<ExplicitMapping>,
}

impl SelectionRules {
    pub fn is_strict(&self) -> bool {
        self.explicit.is_some()
    }
}

pub struct Selector<'a> {
    registry: &'a Registry,
    /// Full book table; section-limited runs still classify against it.
    canon: Registry,
    catalog: &'a Catalog,
    slots: BalancedSlots,
    rules: SelectionRules,
    /// Catalog images grouped by the primary reference of their placement.
    placed: HashMap<Reference, Vec<&'a ImageRecord>>,
    ledger: UsageLedger,
}

impl<'a> Selector<'a> {
    pub fn new(
        registry: &'a Registry,
        catalog: &'a Catalog,
        placement: &PlacementMap,
        slots: BalancedSlots,
        rules: SelectionRules,
    ) -> Self {
        let mut placed: HashMap<Reference, Vec<&'a ImageRecord>> = HashMap::new();
        for (fname, reference) in placement.primaries() {
            if let Some(image) = catalog.get(fname) {
                placed.entry(reference).or_default().push(image);
            }
        }
        Self {
            registry,
            canon: Registry::tanakh(),
            catalog,
            slots,
            rules,
            placed,
            ledger: UsageLedger::new(),
        }
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn is_strict(&self) -> bool {
        self.rules.is_strict()
    }

    /// Pick the intro image for `book`.
    pub fn select_book_intro_image(
        &mut self,
        book: &str,
    ) -> Result<Option<&'a ImageRecord>, SelectError> {
        let role = format!("{book} intro");

        if let Some(explicit) = &self.rules.explicit {
            let Some(fname) = explicit.intros.get(book).cloned() else {
                return Err(SelectError::MissingIntroMapping {
                    book: book.to_string(),
                });
            };
            return self.take_strict(&fname, role).map(Some);
        }

        if let Some(fname) = self.rules.intro_overrides.get(book).cloned()
            && let Some(image) = self.take_if_unused(&fname)
        {
            return Ok(Some(image));
        }

        let catalog = self.catalog;
        let same_source = catalog
            .images()
            .iter()
            .find(|i| i.source_book == book && !self.ledger.is_used(&i.filename));
        let general = || {
            catalog
                .images()
                .iter()
                .find(|i| self.is_unclassified(&i.source_book) && !self.ledger.is_used(&i.filename))
        };
        let chosen = same_source.or_else(general);

        if let Some(image) = chosen {
            self.ledger.mark(image);
        }
        Ok(chosen)
    }

    /// Pick the image for one chapter.
    pub fn select_chapter_image(
        &mut self,
        book: &str,
        chapter: u32,
    ) -> Result<Option<&'a ImageRecord>, SelectError> {
        let target = Reference::new(book, chapter);
        let role = format!("{target}");

        if let Some(fname) = self.rules.chapter_overrides.get(&target).cloned() {
            if self.is_strict() {
                return self.take_strict(&fname, role).map(Some);
            }
            if let Some(image) = self.take_if_unused(&fname) {
                return Ok(Some(image));
            }
        }

        if let Some(explicit) = &self.rules.explicit {
            return match explicit.chapters.get(&target).cloned() {
                Some(fname) => self.take_strict(&fname, role).map(Some),
                None => Ok(None),
            };
        }

        if let Some(fname) = self.slots.get(&target).map(str::to_string)
            && let Some(image) = self.take_if_unused(&fname)
        {
            return Ok(Some(image));
        }

        Ok(self.take_placed(&target))
    }

    /// A source tag naming no book at all, such as `General`.
    fn is_unclassified(&self, source_book: &str) -> bool {
        !self.registry.contains(source_book) && !self.canon.contains(source_book)
    }

    fn take_if_unused(&mut self, filename: &str) -> Option<&'a ImageRecord> {
        let catalog = self.catalog;
        let image = catalog.get(filename)?;
        self.ledger.mark(image).then_some(image)
    }

    fn take_strict(&mut self, filename: &str, role: String) -> Result<&'a ImageRecord, SelectError> {
        let catalog = self.catalog;
        let Some(image) = catalog.get(filename) else {
            return Err(SelectError::UnknownImage {
                filename: filename.to_string(),
                role,
            });
        };
        if !self.ledger.mark(image) {
            return Err(SelectError::ImageReused {
                filename: filename.to_string(),
                role,
            });
        }
        Ok(image)
    }

    fn take_placed(&mut self, target: &Reference) -> Option<&'a ImageRecord> {
        let candidates = self.placed.get(target)?;
        let chosen = candidates
            .iter()
            .copied()
            .filter(|i| !self.ledger.is_used(&i.filename))
            .min_by_key(|&i| {
                (
                    i.source_book != target.book,
                    self.ledger.usage(&i.source_book),
                    self.registry.position(&i.source_book).unwrap_or(usize::MAX),
                    i.filename.as_str(),
                )
            })?;
        self.ledger.mark(chosen);
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::distribute_evenly;
    use crate::registry::Section;
    use crate::test_helpers::*;

    fn selector<'a>(
        registry: &'a Registry,
        catalog: &'a Catalog,
        placement: &PlacementMap,
        rules: SelectionRules,
    ) -> Selector<'a> {
        Selector::new(registry, catalog, placement, BalancedSlots::default(), rules)
    }

    fn name(image: Option<&ImageRecord>) -> Option<&str> {
        image.map(|i| i.filename.as_str())
    }

    #[test]
    fn ledger_counts_per_source() {
        let mut ledger = UsageLedger::new();
        assert!(ledger.mark(&image("a.jpg", "Genesis")));
        assert!(!ledger.mark(&image("a.jpg", "Genesis")));
        assert!(ledger.mark(&image("b.jpg", "Genesis")));
        assert_eq!(ledger.usage("Genesis"), 2);
        assert_eq!(ledger.usage("Exodus"), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn chapter_image_from_placement_map() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis")]);
        let placement = placement_map(&[("a.jpg", "Genesis 22")]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        assert_eq!(name(sel.select_chapter_image("Genesis", 21).unwrap()), None);
        assert_eq!(name(sel.select_chapter_image("Genesis", 22).unwrap()), Some("a.jpg"));
    }

    #[test]
    fn exhaustion_after_k_selections() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "Genesis"), ("c.jpg", "Genesis")]);
        let placement = placement_map(&[
            ("a.jpg", "Genesis 1"),
            ("b.jpg", "Genesis 1"),
            ("c.jpg", "Genesis 1"),
        ]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        let picks: Vec<Option<&str>> = (0..4)
            .map(|_| name(sel.select_chapter_image("Genesis", 1).unwrap()))
            .collect();
        assert_eq!(picks, vec![Some("a.jpg"), Some("b.jpg"), Some("c.jpg"), None]);
    }

    #[test]
    fn exhaustion_across_chapters() {
        let registry = small_registry(&[("Ruth", 4)]);
        let catalog = catalog(&[("a.jpg", "Ruth"), ("b.jpg", "Ruth"), ("c.jpg", "Ruth")]);
        let images: Vec<&ImageRecord> = catalog.images().iter().collect();
        let slots = distribute_evenly(&images, &registry);
        let placement = slots.to_placement_map();
        let mut sel = Selector::new(&registry, &catalog, &placement, slots, SelectionRules::default());

        let picked: Vec<&str> = (1..=4)
            .filter_map(|c| sel.select_chapter_image("Ruth", c).unwrap())
            .map(|i| i.filename.as_str())
            .collect();
        assert_eq!(picked.len(), 3);
        let distinct: HashSet<&str> = picked.iter().copied().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn image_is_never_selected_twice() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis")]);
        let placement = placement_map(&[("a.jpg", "Genesis 2")]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("a.jpg"));
        assert_eq!(name(sel.select_chapter_image("Genesis", 2).unwrap()), None);
    }

    #[test]
    fn chapter_override_wins() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "Genesis")]);
        let placement = placement_map(&[("a.jpg", "Genesis 3")]);
        let rules = SelectionRules {
            chapter_overrides: [(reference("Genesis", 3), "b.jpg".to_string())].into(),
            ..SelectionRules::default()
        };
        let mut sel = selector(&registry, &catalog, &placement, rules);
        assert_eq!(name(sel.select_chapter_image("Genesis", 3).unwrap()), Some("b.jpg"));
    }

    #[test]
    fn used_override_falls_through() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "Genesis")]);
        let placement = placement_map(&[("a.jpg", "Genesis 3")]);
        let rules = SelectionRules {
            intro_overrides: [("Genesis".to_string(), "b.jpg".to_string())].into(),
            chapter_overrides: [(reference("Genesis", 3), "b.jpg".to_string())].into(),
            ..SelectionRules::default()
        };
        let mut sel = selector(&registry, &catalog, &placement, rules);
        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("b.jpg"));
        assert_eq!(name(sel.select_chapter_image("Genesis", 3).unwrap()), Some("a.jpg"));
    }

    #[test]
    fn balanced_slot_before_placement_map() {
        let registry = genesis_registry();
        let catalog = catalog(&[("placed.jpg", "Genesis"), ("slotted.jpg", "Genesis")]);
        let placement = placement_map(&[("placed.jpg", "Genesis 26")]);
        let images = [catalog.get("slotted.jpg").unwrap()];
        let slots = distribute_evenly(&images, &registry);
        let mut sel = Selector::new(&registry, &catalog, &placement, slots, SelectionRules::default());

        assert_eq!(
            name(sel.select_chapter_image("Genesis", 26).unwrap()),
            Some("slotted.jpg")
        );
    }

    #[test]
    fn tie_break_prefers_matching_source_book() {
        let registry = small_registry(&[("Genesis", 50), ("Exodus", 40)]);
        let catalog = catalog(&[("a.jpg", "Exodus"), ("b.jpg", "Genesis")]);
        let placement = placement_map(&[("a.jpg", "Genesis 5"), ("b.jpg", "Genesis 5")]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());
        assert_eq!(name(sel.select_chapter_image("Genesis", 5).unwrap()), Some("b.jpg"));
    }

    #[test]
    fn tie_break_prefers_least_used_source() {
        let registry = small_registry(&[("Genesis", 50), ("Exodus", 40), ("Leviticus", 27)]);
        let catalog = catalog(&[
            ("ex1.jpg", "Exodus"),
            ("ex2.jpg", "Exodus"),
            ("lev.jpg", "Leviticus"),
        ]);
        let placement = placement_map(&[
            ("ex1.jpg", "Genesis 1"),
            ("ex2.jpg", "Genesis 2"),
            ("lev.jpg", "Genesis 2"),
        ]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        assert_eq!(name(sel.select_chapter_image("Genesis", 1).unwrap()), Some("ex1.jpg"));
        // Exodus has one use; Leviticus none, despite later registry order.
        assert_eq!(name(sel.select_chapter_image("Genesis", 2).unwrap()), Some("lev.jpg"));
    }

    #[test]
    fn tie_break_falls_back_to_registry_order_then_filename() {
        let registry = small_registry(&[("Genesis", 50), ("Exodus", 40), ("Leviticus", 27)]);
        let catalog = catalog(&[
            ("z.jpg", "Leviticus"),
            ("y.jpg", "Exodus"),
            ("x.jpg", "Exodus"),
        ]);
        let placement = placement_map(&[
            ("x.jpg", "Genesis 9"),
            ("y.jpg", "Genesis 9"),
            ("z.jpg", "Genesis 9"),
        ]);
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());
        assert_eq!(name(sel.select_chapter_image("Genesis", 9).unwrap()), Some("x.jpg"));
    }

    #[test]
    fn intro_prefers_same_source_then_general() {
        let registry = small_registry(&[("Genesis", 50), ("Exodus", 40)]);
        let catalog = catalog(&[
            ("general.jpg", "General"),
            ("ex.jpg", "Exodus"),
            ("gen.jpg", "Genesis"),
        ]);
        let placement = PlacementMap::new();
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("gen.jpg"));
        assert_eq!(name(sel.select_book_intro_image("Exodus").unwrap()), Some("ex.jpg"));
        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("general.jpg"));
        assert_eq!(name(sel.select_book_intro_image("Exodus").unwrap()), None);
    }

    #[test]
    fn intro_general_pool_excludes_books_outside_the_sections() {
        let registry = Registry::tanakh().with_sections(&[Section::Torah]);
        let catalog = catalog(&[("isaiah.jpg", "Isaiah"), ("general.jpg", "General")]);
        let placement = PlacementMap::new();
        let mut sel = selector(&registry, &catalog, &placement, SelectionRules::default());

        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("general.jpg"));
        assert_eq!(name(sel.select_book_intro_image("Exodus").unwrap()), None);
    }

    fn strict_rules() -> SelectionRules {
        SelectionRules {
            explicit: Some(ExplicitMapping {
                intros: [("Genesis".to_string(), "a.jpg".to_string())].into(),
                chapters: [
                    (reference("Genesis", 1), "b.jpg".to_string()),
                    (reference("Genesis", 2), "a.jpg".to_string()),
                    (reference("Genesis", 3), "ghost.jpg".to_string()),
                ]
                .into(),
            }),
            ..SelectionRules::default()
        }
    }

    #[test]
    fn strict_mode_uses_only_explicit_mappings() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "Genesis"), ("c.jpg", "Genesis")]);
        let placement = placement_map(&[("c.jpg", "Genesis 4")]);
        let mut sel = selector(&registry, &catalog, &placement, strict_rules());

        assert_eq!(name(sel.select_book_intro_image("Genesis").unwrap()), Some("a.jpg"));
        assert_eq!(name(sel.select_chapter_image("Genesis", 1).unwrap()), Some("b.jpg"));
        assert_eq!(name(sel.select_chapter_image("Genesis", 4).unwrap()), None);
    }

    #[test]
    fn strict_mode_missing_intro_is_fatal() {
        let registry = small_registry(&[("Genesis", 50), ("Exodus", 40)]);
        let catalog = catalog(&[("a.jpg", "Genesis")]);
        let placement = PlacementMap::new();
        let mut sel = selector(&registry, &catalog, &placement, strict_rules());

        assert_eq!(
            sel.select_book_intro_image("Exodus"),
            Err(SelectError::MissingIntroMapping {
                book: "Exodus".to_string()
            })
        );
    }

    #[test]
    fn strict_mode_reuse_is_fatal() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis"), ("b.jpg", "Genesis")]);
        let placement = PlacementMap::new();
        let mut sel = selector(&registry, &catalog, &placement, strict_rules());

        sel.select_book_intro_image("Genesis").unwrap();
        sel.select_chapter_image("Genesis", 1).unwrap();
        assert!(matches!(
            sel.select_chapter_image("Genesis", 2),
            Err(SelectError::ImageReused { filename, .. }) if filename == "a.jpg"
        ));
    }

    #[test]
    fn strict_mode_unknown_image_is_fatal() {
        let registry = genesis_registry();
        let catalog = catalog(&[("a.jpg", "Genesis")]);
        let placement = PlacementMap::new();
        let mut sel = selector(&registry, &catalog, &placement, strict_rules());

        assert!(matches!(
            sel.select_chapter_image("Genesis", 3),
            Err(SelectError::UnknownImage { filename, .. }) if filename == "ghost.jpg"
        ));
    }
}
