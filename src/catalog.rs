//! Image catalog loading.
//!
//! The catalog is the JSON array written by the artwork scraper:
//!
//! ```json
//! [
//!   {
//!     "filename": "chagall_abraham_is_going_to_sacrifice_his_son.jpg",
//!     "url": "https://…/abraham.jpg",
//!     "title": "Abraham is going to sacrifice his son (Genesis XXII)",
//!     "book": "Genesis",
//!     "page_url": "https://…"
//!   }
//! ]
//! ```
//!
//! Each entry becomes an [`ImageRecord`]. `book` is a best-effort provenance
//! guess and is not validated against the registry; a missing tag becomes
//! [`GENERAL_BOOK`]. Bare partial tags such as `Samuel` or `Kings` resolve to
//! the first book of the pair. Entries without a filename are skipped, duplicate
//! filenames are rejected.

use crate::reference::resolve_alias;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Source-book tag for images with no inferred provenance.
pub const GENERAL_BOOK: &str = "General";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate filename in catalog: {0}")]
    DuplicateFilename(String),
}

/// One raw catalog entry as written by the scraper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub filename: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub book: Option<String>,
    pub page_url: Option<String>,
}

/// An artwork image available for placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub filename: String,
    pub title: String,
    /// Book the scraper guessed the image depicts, or [`GENERAL_BOOK`].
    pub source_book: String,
    pub asset_path: PathBuf,
}

impl ImageRecord {
    pub fn new(filename: &str, title: &str, source_book: &str, images_dir: &Path) -> Self {
        Self {
            filename: filename.to_string(),
            title: title.to_string(),
            source_book: source_book.to_string(),
            asset_path: images_dir.join(filename),
        }
    }

    /// Covers and title plates are never placed in a chapter.
    pub fn is_cover_like(&self) -> bool {
        let hay = format!("{} {}", self.filename, self.title).to_lowercase();
        hay.contains("cover")
    }
}

/// All images of one run, in catalog order, with a filename index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    images: Vec<ImageRecord>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_records(images: Vec<ImageRecord>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            if index.insert(img.filename.clone(), i).is_some() {
                return Err(CatalogError::DuplicateFilename(img.filename.clone()));
            }
        }
        Ok(Self { images, index })
    }

    /// Build a catalog from raw entries, resolving assets under `images_dir`.
    pub fn from_entries(entries: Vec<CatalogEntry>, images_dir: &Path) -> Result<Self, CatalogError> {
        let records = entries
            .into_iter()
            .filter_map(|e| {
                let filename = e.filename.filter(|f| !f.trim().is_empty())?;
                let book = match e.book.as_deref().map(str::trim) {
                    None | Some("") => GENERAL_BOOK.to_string(),
                    Some(tag) => resolve_alias(tag).map_or_else(|| tag.to_string(), str::to_string),
                };
                Some(ImageRecord::new(
                    &filename,
                    e.title.as_deref().unwrap_or(""),
                    &book,
                    images_dir,
                ))
            })
            .collect();
        Self::from_records(records)
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn get(&self, filename: &str) -> Option<&ImageRecord> {
        self.index.get(filename).map(|&i| &self.images[i])
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.index.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Load the catalog JSON file.
pub fn load_catalog(path: &Path, images_dir: &Path) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(path)?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&content)?;
    Catalog::from_entries(entries, images_dir)
}

/// Differences between the catalog and the image files on disk.
#[derive(Debug, Default, PartialEq)]
pub struct AssetReport {
    /// Catalog entries whose asset file does not exist.
    pub missing: Vec<String>,
    /// Image files under the images directory that the catalog does not list.
    pub untracked: Vec<String>,
}

impl AssetReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Compare catalog entries against the files present under `images_dir`.
///
/// A missing images directory reports every entry as missing.
pub fn check_assets(catalog: &Catalog, images_dir: &Path) -> AssetReport {
    let mut on_disk: BTreeSet<String> = BTreeSet::new();
    if images_dir.is_dir() {
        for entry in WalkDir::new(images_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image(e.path()))
        {
            if let Ok(rel) = entry.path().strip_prefix(images_dir) {
                on_disk.insert(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    let listed: HashSet<&str> = catalog.images().iter().map(|i| i.filename.as_str()).collect();
    let missing = catalog
        .images()
        .iter()
        .filter(|i| !i.asset_path.is_file())
        .map(|i| i.filename.clone())
        .collect();
    let untracked = on_disk
        .into_iter()
        .filter(|f| !listed.contains(f.as_str()))
        .collect();

    AssetReport { missing, untracked }
}
