//! CLI output formatting for every command.
//!
//! Output is **information-first**: each entity leads with its identity
//! (positional index and image title, or book name) and filesystem detail is
//! indented context beneath it.
//!
//! # Output Format
//!
//! ## Suggest
//!
//! ```text
//! 001 Abraham is going to sacrifice his son (Genesis XXII)
//!     Source: abraham.jpg
//!     Mapped: Genesis 22
//!     Genesis 22 (0.90) title: Genesis + numeral XXII
//! ```
//!
//! ## Normalize
//!
//! ```text
//! Applied changes:
//!    fix-range: a.jpg: Genesis 51 -> 50
//!    move-dup: b.jpg: Genesis 50 -> 49
//!   ... and 12 more
//! ```
//!
//! ## Plan
//!
//! ```text
//! 001 Genesis (3 of 50 chapters illustrated)
//!     Intro: creation.jpg
//!     001 creation_day.jpg
//!     022 abraham.jpg
//! ```
//!
//! ## Generate
//!
//! ```text
//! Genesis בראשית (50 chapters)
//!     Intro: creation.jpg
//!     001 → Genesis-001.html (31 verses)
//!     002 (no text)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::builder::BuildOutcome;
use crate::catalog::{AssetReport, ImageRecord};
use crate::generate::{GenerateEvent, GenerateSummary, chapter_filename};
use crate::normalize::{ChangeLogEntry, NormalizeOutcome};
use crate::placement::{PlacementAudit, PlacementMap};
use crate::plan::DocumentPlan;
use crate::reference::Suggestion;
use crate::registry::display_name;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Titled images show the title, untitled ones the filename in parens.
fn image_line(index: usize, image: &ImageRecord) -> String {
    if image.title.trim().is_empty() {
        format!("{} ({})", format_index(index), image.filename)
    } else {
        format!("{} {}", format_index(index), image.title.trim())
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// `Heading (n)` followed by indented names, or nothing when empty.
fn name_section(heading: &str, names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{} ({})", heading, names.len())];
    lines.extend(names.iter().map(|n| format!("{}{}", indent(1), n)));
    lines
}

// ============================================================================
// Suggest
// ============================================================================

/// One catalog item with its current mapping and ranked suggestions.
///
/// `index` is the item's 1-based position in the catalog.
pub fn format_suggestions(
    index: usize,
    image: &ImageRecord,
    mapped: Option<&[String]>,
    suggestions: &[Suggestion],
) -> Vec<String> {
    let mut lines = vec![image_line(index, image)];
    lines.push(format!("{}Source: {}", indent(1), image.filename));
    if let Some(refs) = mapped
        && !refs.is_empty()
    {
        lines.push(format!("{}Mapped: {}", indent(1), refs.join(", ")));
    }
    if suggestions.is_empty() {
        lines.push(format!("{}(no suggestions)", indent(1)));
    }
    for s in suggestions {
        lines.push(format!(
            "{}{} ({:.2}) {}",
            indent(1),
            s.reference,
            s.confidence,
            s.rationale
        ));
    }
    lines
}

pub fn print_suggestions(
    index: usize,
    image: &ImageRecord,
    mapped: Option<&[String]>,
    suggestions: &[Suggestion],
) {
    for line in format_suggestions(index, image, mapped, suggestions) {
        println!("{}", line);
    }
}

// ============================================================================
// Build map
// ============================================================================

pub fn format_build_outcome(outcome: &BuildOutcome) -> Vec<String> {
    let mut lines = vec![format!("Placed {}", plural(outcome.map.len(), "image"))];
    lines.extend(name_section("Unplaced", &outcome.unplaced));
    lines.extend(name_section("Dropped (book full)", &outcome.dropped));
    lines.extend(name_section("Skipped covers", &outcome.covers));
    lines
}

pub fn print_build_outcome(outcome: &BuildOutcome) {
    for line in format_build_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Normalize
// ============================================================================

/// Change log capped at `limit` lines, with a `... and N more` suffix.
pub fn format_change_log(changes: &[ChangeLogEntry], limit: usize) -> Vec<String> {
    if changes.is_empty() {
        return vec!["No changes needed.".to_string()];
    }
    let mut lines = vec!["Applied changes:".to_string()];
    lines.extend(changes.iter().take(limit).map(|c| format!("   {}", c)));
    if changes.len() > limit {
        lines.push(format!("  ... and {} more", changes.len() - limit));
    }
    lines
}

/// Change log plus the entries normalization left alone.
pub fn format_normalize_report(outcome: &NormalizeOutcome, limit: usize) -> Vec<String> {
    let mut lines = format_change_log(&outcome.changes, limit);
    let unrecognized: Vec<String> = outcome
        .unrecognized
        .iter()
        .map(|(f, r)| format!("{}: {}", f, r))
        .collect();
    lines.extend(name_section("Unrecognized books (left as is)", &unrecognized));
    lines.extend(name_section("Malformed entries (left as is)", &outcome.malformed));
    lines
}

pub fn print_normalize_report(outcome: &NormalizeOutcome, limit: usize) {
    for line in format_normalize_report(outcome, limit) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan(plan: &DocumentPlan) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, book) in plan.books.iter().enumerate() {
        lines.push(format!(
            "{} {} ({} of {} illustrated)",
            format_index(i + 1),
            display_name(&book.book),
            book.illustrated_chapters(),
            plural(book.chapters.len(), "chapter")
        ));
        if let Some(intro) = &book.intro {
            lines.push(format!("{}Intro: {}", indent(1), intro));
        }
        for slot in &book.chapters {
            if let Some(image) = &slot.image {
                lines.push(format!(
                    "{}{} {}",
                    indent(1),
                    format_index(slot.chapter as usize),
                    image
                ));
            }
        }
    }
    let images = plan.images().count();
    lines.push(String::new());
    lines.push(format!(
        "Planned {}, {}, {}",
        plural(plan.books.len(), "book"),
        plural(plan.chapter_count(), "chapter"),
        plural(images, "image")
    ));
    lines
}

pub fn print_plan(plan: &DocumentPlan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format a single generate progress event as display lines.
pub fn format_generate_event(event: &GenerateEvent) -> Vec<String> {
    match event {
        GenerateEvent::BookStarted {
            book,
            hebrew_name,
            chapters,
            intro,
        } => {
            let mut lines = vec![format!(
                "{} {} ({})",
                display_name(book),
                hebrew_name,
                plural(*chapters, "chapter")
            )];
            if let Some(intro) = intro {
                lines.push(format!("{}Intro: {}", indent(1), intro));
            }
            lines
        }
        GenerateEvent::ChapterRendered {
            book,
            chapter,
            verses,
            image,
        } => {
            let mut line = format!(
                "{}{} \u{2192} {} ({})",
                indent(1),
                format_index(*chapter as usize),
                chapter_filename(book, *chapter),
                plural(*verses, "verse")
            );
            if let Some(image) = image {
                line.push_str(&format!(" [{}]", image));
            }
            vec![line]
        }
        GenerateEvent::ChapterEmpty { chapter, image, .. } => {
            let mut line = format!("{}{} (no text)", indent(1), format_index(*chapter as usize));
            if let Some(image) = image {
                line.push_str(&format!(" [{} unused]", image));
            }
            vec![line]
        }
        GenerateEvent::ChapterSkipped {
            chapter,
            reason,
            image,
            ..
        } => {
            let mut line = format!(
                "{}{} skipped: {}",
                indent(1),
                format_index(*chapter as usize),
                reason
            );
            if let Some(image) = image {
                line.push_str(&format!(" [{} unused]", image));
            }
            vec![line]
        }
    }
}

pub fn format_generate_summary(summary: &GenerateSummary) -> Vec<String> {
    vec![format!(
        "Generated {}, {}, {} ({} skipped) \u{2192} {}",
        plural(summary.documents, "document"),
        plural(summary.chapters, "chapter"),
        plural(summary.images, "image"),
        summary.skipped,
        summary.output.display()
    )]
}

pub fn print_generate_summary(summary: &GenerateSummary) {
    for line in format_generate_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_report(assets: &AssetReport, audit: &PlacementAudit) -> Vec<String> {
    let mut lines = Vec::new();
    lines.extend(name_section("Missing image files", &assets.missing));
    lines.extend(name_section("Images not in catalog", &assets.untracked));

    let unknown: Vec<String> = audit
        .unknown_books
        .iter()
        .map(|(f, r)| format!("{}: {}", f, r))
        .collect();
    let out_of_range: Vec<String> = audit
        .out_of_range
        .iter()
        .map(|(f, r)| format!("{}: {}", f, r))
        .collect();
    let duplicates: Vec<String> = audit
        .duplicates
        .iter()
        .map(|(r, files)| format!("{}: {}", r, files.join(", ")))
        .collect();
    lines.extend(name_section("Placements for unknown books", &unknown));
    lines.extend(name_section("Malformed placements", &audit.malformed));
    lines.extend(name_section("Out-of-range placements", &out_of_range));
    lines.extend(name_section("Shared chapters", &duplicates));
    lines.extend(name_section(
        "Placements not in catalog",
        &audit.not_in_catalog,
    ));

    if lines.is_empty() {
        lines.push("No problems found.".to_string());
    }
    lines
}

pub fn print_check_report(assets: &AssetReport, audit: &PlacementAudit) {
    for line in format_check_report(assets, audit) {
        println!("{}", line);
    }
}

/// One line per placement, for `assign`.
pub fn format_assignment(filename: &str, map: &PlacementMap) -> Vec<String> {
    match map.refs(filename) {
        Some(refs) => vec![format!("{} \u{2192} {}", filename, refs.join(", "))],
        None => vec![format!("{} is not placed", filename)],
    }
}

pub fn print_assignment(filename: &str, map: &PlacementMap) {
    for line in format_assignment(filename, map) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
