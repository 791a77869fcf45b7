//! Initial placement map construction.
//!
//! Two strategies produce a first, unchecked placement map from the catalog:
//!
//! - **References**: run the title parser over each image and keep the top
//!   suggestion as its primary placement. Images with no recognizable book
//!   stay unplaced.
//! - **Even distribution**: group images by their source book and spread each
//!   group across that book's chapters (see [`even_targets`]).
//!
//! [`Strategy::Combined`] takes reference-driven placements first and fills
//! the remaining images from the even distribution.
//!
//! The output may still carry out-of-range chapters (a bad parse) or duplicate
//! chapters (two images citing the same chapter). Repairing those is the
//! normalizer's job, not this module's.
//!
//! Cover-like images are never placed.

use crate::catalog::{Catalog, ImageRecord};
use crate::placement::PlacementMap;
use crate::reference::{self, Reference};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    References,
    EvenDistribution,
    Combined,
}

/// Result of a build, with the images that did not get a placement.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub map: PlacementMap,
    /// Images with no parseable reference or no source book in the registry.
    pub unplaced: Vec<String>,
    /// Images whose even-distribution slot could not be found (book full).
    pub dropped: Vec<String>,
    /// Cover-like images, skipped on purpose.
    pub covers: Vec<String>,
}

/// Build a placement map from the catalog images.
pub fn build(images: &[ImageRecord], registry: &Registry, strategy: Strategy) -> BuildOutcome {
    let covers: Vec<String> = images
        .iter()
        .filter(|i| i.is_cover_like())
        .map(|i| i.filename.clone())
        .collect();
    let placeable: Vec<&ImageRecord> = images.iter().filter(|i| !i.is_cover_like()).collect();

    let mut outcome = match strategy {
        Strategy::References => from_references(&placeable, registry),
        Strategy::EvenDistribution => {
            let slots = distribute_evenly(&placeable, registry);
            let map = slots.to_placement_map();
            let unplaced = placeable
                .iter()
                .filter(|i| !map.contains(&i.filename) && !slots.dropped.contains(&i.filename))
                .map(|i| i.filename.clone())
                .collect();
            BuildOutcome {
                map,
                unplaced,
                dropped: slots.dropped,
                covers: Vec::new(),
            }
        }
        Strategy::Combined => {
            let mut outcome = from_references(&placeable, registry);
            let rest: Vec<&ImageRecord> = placeable
                .iter()
                .copied()
                .filter(|i| !outcome.map.contains(&i.filename))
                .collect();
            let slots = distribute_evenly_around(&rest, registry, &outcome.map);
            outcome.map.merge_missing(&slots.to_placement_map());
            outcome.unplaced.retain(|f| !outcome.map.contains(f) && !slots.dropped.contains(f));
            outcome.dropped = slots.dropped;
            outcome
        }
    };
    outcome.covers = covers;
    outcome
}

fn from_references(images: &[&ImageRecord], registry: &Registry) -> BuildOutcome {
    let mut map = PlacementMap::new();
    let mut unplaced = Vec::new();
    for img in images {
        match reference::parse(&img.title, &img.filename, registry).into_iter().next() {
            Some(top) => map.insert(&img.filename, top.reference),
            None => unplaced.push(img.filename.clone()),
        }
    }
    BuildOutcome {
        map,
        unplaced,
        ..BuildOutcome::default()
    }
}

// ============================================================================
// Even distribution
// ============================================================================

/// Evenly spaced target chapters for `count` images in a book of
/// `chapter_count` chapters.
///
/// `target_i = clamp(1, chapter_count, round((i + 1) * (chapter_count + 1) / (count + 1)))`,
/// with halves rounded up. Spacing the targets this way avoids bunching
/// images at the start or end of the book. Targets are distinct whenever
/// `count <= chapter_count`.
pub fn even_targets(count: usize, chapter_count: u32) -> Vec<u32> {
    let n = count as u64 + 1;
    let c = u64::from(chapter_count) + 1;
    (0..count as u64)
        .map(|i| {
            let t = ((i + 1) * c * 2 + n) / (2 * n);
            (t as u32).clamp(1, chapter_count.max(1))
        })
        .collect()
}

/// Nearest free chapter to `target`, probing forward first, then backward.
fn nearest_free(target: u32, chapter_count: u32, taken: &BTreeSet<u32>) -> Option<u32> {
    if !taken.contains(&target) {
        return Some(target);
    }
    for d in 1..=chapter_count {
        let forward = target + d;
        if forward <= chapter_count && !taken.contains(&forward) {
            return Some(forward);
        }
        if let Some(back) = target.checked_sub(d).filter(|&b| b >= 1)
            && !taken.contains(&back)
        {
            return Some(back);
        }
    }
    None
}

/// Pre-computed even-distribution slots: one filename per `(book, chapter)`.
#[derive(Debug, Clone, Default)]
pub struct BalancedSlots {
    slots: BTreeMap<Reference, String>,
    /// Images that found no free chapter in their source book.
    pub dropped: Vec<String>,
}

impl BalancedSlots {
    pub fn get(&self, reference: &Reference) -> Option<&str> {
        self.slots.get(reference).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, &str)> {
        self.slots.iter().map(|(r, f)| (r, f.as_str()))
    }

    pub fn to_placement_map(&self) -> PlacementMap {
        let mut map = PlacementMap::new();
        for (r, f) in &self.slots {
            map.insert(f, r.clone());
        }
        map
    }
}

/// Spread images across the chapters of their source books.
///
/// Images are grouped by source book in catalog order; images whose source
/// book is not in the registry (including `General`) get no slot.
pub fn distribute_evenly(images: &[&ImageRecord], registry: &Registry) -> BalancedSlots {
    distribute_evenly_around(images, registry, &PlacementMap::new())
}

/// Like [`distribute_evenly`], treating chapters already claimed in
/// `existing` as taken.
pub fn distribute_evenly_around(
    images: &[&ImageRecord],
    registry: &Registry,
    existing: &PlacementMap,
) -> BalancedSlots {
    let mut groups: BTreeMap<usize, Vec<&ImageRecord>> = BTreeMap::new();
    for img in images {
        if let Some(pos) = registry.position(&img.source_book) {
            groups.entry(pos).or_default().push(img);
        }
    }

    let mut result = BalancedSlots::default();
    for (pos, group) in groups {
        let book = &registry.books()[pos];
        let mut taken = existing.chapters_used(&book.id);
        let targets = even_targets(group.len(), book.chapter_count);
        for (img, target) in group.iter().zip(targets) {
            match nearest_free(target, book.chapter_count, &taken) {
                Some(chapter) => {
                    taken.insert(chapter);
                    result
                        .slots
                        .insert(Reference::new(book.id.as_str(), chapter), img.filename.clone());
                }
                None => result.dropped.push(img.filename.clone()),
            }
        }
    }
    result
}

/// Balanced slots for the catalog images the placement map leaves out.
///
/// Chapters already claimed in `placement` stay taken. Cover-like images get
/// no slot.
pub fn unplaced_slots(catalog: &Catalog, registry: &Registry, placement: &PlacementMap) -> BalancedSlots {
    let loose: Vec<&ImageRecord> = catalog
        .images()
        .iter()
        .filter(|i| !i.is_cover_like() && !placement.contains(&i.filename))
        .collect();
    distribute_evenly_around(&loose, registry, placement)
}
