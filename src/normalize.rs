//! Placement map normalization.
//!
//! Repairs a placement map so that, for every book the registry knows, the
//! primary references of all entries name distinct, in-range chapters.
//!
//! ```text
//! Phase 1  fix-range   entries in filename order
//!          chapter < 1 or > count  ->  highest chapter no in-range entry uses
//!
//! Phase 2  move-dup    books in registry order, chapters ascending
//!          first filename (lexical) keeps the chapter
//!          every other claimant    ->  highest chapter still unused
//! ```
//!
//! When a book has no free chapter left, the displaced entry is pinned to the
//! book's last chapter and the collision stays. Entries naming an unknown
//! book, and entries with no parseable primary reference, are never touched;
//! they are returned so the operator can triage them.
//!
//! Only the primary reference of an entry is rewritten. Trailing legacy
//! references ride along unchanged.
//!
//! Running [`normalize`] on its own output yields no further changes.

use crate::placement::{PlacementMap, highest_free};
use crate::reference::Reference;
use crate::registry::Registry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    FixRange,
    MoveDup,
}

impl ChangeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeReason::FixRange => "fix-range",
            ChangeReason::MoveDup => "move-dup",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reassignment made by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub reason: ChangeReason,
    pub filename: String,
    pub book: String,
    pub old_chapter: u32,
    pub new_chapter: u32,
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {} {} -> {}",
            self.reason, self.filename, self.book, self.old_chapter, self.new_chapter
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub map: PlacementMap,
    /// Every reassignment, in the order it was applied.
    pub changes: Vec<ChangeLogEntry>,
    /// Entries whose primary book is not in the registry. Left untouched.
    pub unrecognized: Vec<(String, Reference)>,
    /// Entries with no parseable primary reference. Left untouched.
    pub malformed: Vec<String>,
}

impl NormalizeOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Repair out-of-range and duplicate chapters.
pub fn normalize(map: &PlacementMap, registry: &Registry) -> NormalizeOutcome {
    let mut out = NormalizeOutcome {
        map: map.clone(),
        ..NormalizeOutcome::default()
    };

    out.malformed = map
        .iter()
        .filter(|(fname, _)| map.primary(fname).is_none())
        .map(|(fname, _)| fname.to_string())
        .collect();

    fix_ranges(&mut out, registry);
    move_duplicates(&mut out, registry);
    out
}

fn in_range_chapters(map: &PlacementMap, book: &str, count: u32) -> BTreeSet<u32> {
    map.chapters_used(book)
        .into_iter()
        .filter(|c| (1..=count).contains(c))
        .collect()
}

fn fix_ranges(out: &mut NormalizeOutcome, registry: &Registry) {
    let primaries: Vec<(String, Reference)> = out
        .map
        .primaries()
        .into_iter()
        .map(|(f, r)| (f.to_string(), r))
        .collect();

    for (fname, primary) in primaries {
        let Some(count) = registry.chapter_count(&primary.book) else {
            out.unrecognized.push((fname, primary));
            continue;
        };
        if (1..=count).contains(&primary.chapter) {
            continue;
        }
        // Recomputed per entry so earlier repairs in the same book count as used.
        let used = in_range_chapters(&out.map, &primary.book, count);
        let dest = highest_free(count, &used).unwrap_or(count);
        out.map
            .set_primary(&fname, Reference::new(primary.book.as_str(), dest));
        out.changes.push(ChangeLogEntry {
            reason: ChangeReason::FixRange,
            filename: fname,
            book: primary.book,
            old_chapter: primary.chapter,
            new_chapter: dest,
        });
    }
}

fn move_duplicates(out: &mut NormalizeOutcome, registry: &Registry) {
    for book in registry.books() {
        let mut per_chapter: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for (fname, r) in out.map.primaries() {
            if r.book == book.id && book.contains_chapter(r.chapter) {
                per_chapter.entry(r.chapter).or_default().push(fname.to_string());
            }
        }
        let mut used: BTreeSet<u32> = per_chapter.keys().copied().collect();

        for (chapter, claimants) in per_chapter {
            for fname in claimants.into_iter().skip(1) {
                let dest = highest_free(book.chapter_count, &used).unwrap_or(book.chapter_count);
                if dest == chapter {
                    continue;
                }
                out.map
                    .set_primary(&fname, Reference::new(book.id.as_str(), dest));
                used.insert(dest);
                out.changes.push(ChangeLogEntry {
                    reason: ChangeReason::MoveDup,
                    filename: fname,
                    book: book.id.clone(),
                    old_chapter: chapter,
                    new_chapter: dest,
                });
            }
        }
    }
}
