//! # Tanakh Gal
//!
//! Places a catalog of artwork images into the books and chapters of the
//! Hebrew Bible, and renders illustrated chapter documents from the result.
//! Each image is a painting with a free-text title ("Abraham is going to
//! sacrifice his son (Genesis XXII)"); the tool works out where it belongs,
//! keeps a persisted placement map consistent, and picks a distinct image for
//! every book intro and chapter at generation time.
//!
//! # Architecture: Placement Pipeline
//!
//! ```text
//! 1. Parse      titles     →  suggestions       (title/filename → "Book N")
//! 2. Build      catalog    →  placement map     (references or even spread)
//! 3. Normalize  map        →  map + change log  (in range, one image per chapter)
//! 4. Select     map        →  document plan     (each image used at most once)
//! 5. Generate   plan+text  →  dist/             (HTML bundle via a DocumentSink)
//! ```
//!
//! The placement map (`chagall_placement_map.json`) is the only persisted
//! state between stages. It is human-editable JSON; the normalizer repairs
//! what editing or merging breaks, and is idempotent.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`registry`] | The 39 books: ids, chapter counts, Hebrew names, sections |
//! | [`numerals`] | Roman numeral decoding and Hebrew chapter numerals |
//! | [`reference`] | `"Book N"` references and the title parser |
//! | [`catalog`] | Image catalog loading and on-disk asset checks |
//! | [`placement`] | The persisted placement map, incremental assignment, audits |
//! | [`builder`] | Build a placement map from the catalog |
//! | [`normalize`] | Repair out-of-range and shared chapters |
//! | [`selector`] | Uniqueness-aware intro and chapter image selection |
//! | [`plan`] | Canonical-order selection over the whole document |
//! | [`text`] | Chapter text source contract, retries and pacing |
//! | [`generate`] | Render documents with Maud and package them |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Canonical Order Everywhere
//!
//! Selection is stateful: an image claimed by Genesis is no longer available
//! to Exodus. Every consumer walks the registry in canonical order (intro,
//! then chapters ascending), so the same inputs always produce the same
//! document.
//!
//! ## One Primary Reference Per Image
//!
//! Placement entries are lists for compatibility with older maps, but only
//! the first reference is read or rewritten. Trailing references survive
//! normalization untouched.
//!
//! ## Strict Mode
//!
//! Curated editions set `selection.strict`. Selection then uses only the
//! explicit mappings in `config.toml`, and a missing intro or a reused image
//! aborts the run before anything is packaged.

pub mod builder;
pub mod catalog;
pub mod config;
pub mod generate;
pub mod normalize;
pub mod numerals;
pub mod output;
pub mod placement;
pub mod plan;
pub mod reference;
pub mod registry;
pub mod selector;
pub mod text;

#[cfg(test)]
pub(crate) mod test_helpers;
