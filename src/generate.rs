//! Document rendering and packaging.
//!
//! Final stage of the pipeline. Takes a [`DocumentPlan`] (every image choice
//! already made), fetches chapter text, renders one document per book divider
//! and per chapter, and hands the ordered documents to a [`DocumentSink`].
//!
//! ## Documents
//!
//! - **Divider** (`{book}.html`): Hebrew and English book name, intro image
//! - **Chapter** (`{book}-{chapter:03}.html`): heading with Hebrew numeral,
//!   chapter image, padded Hebrew/English verse columns
//!
//! Document order is reading order: registry order, divider first, chapters
//! ascending.
//!
//! ## Output Structure (HTML bundle)
//!
//! ```text
//! dist/
//! ├── index.html               # Table of contents in reading order
//! ├── style.css
//! ├── Genesis.html             # Divider
//! ├── Genesis-001.html         # Chapters
//! ├── Genesis-002.html
//! └── images/
//!     └── abraham.jpg          # Copied from the catalog's images_dir
//! ```
//!
//! ## Text failures
//!
//! A chapter whose text source reports no content, or fails after retries,
//! is left out with a [`GenerateEvent`] explaining why. Generation goes on.
//! Its image was already claimed at planning time and is not offered to
//! another chapter; the event names it so it can be placed elsewhere.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::catalog::{Catalog, ImageRecord};
use crate::numerals::hebrew_numeral;
use crate::plan::DocumentPlan;
use crate::registry::{BookSpec, Registry, display_name};
use crate::text::{ChapterText, TextError};
use maud::{DOCTYPE, Markup, html};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image asset not found: {0}")]
    MissingAsset(PathBuf),
    #[error("Book {0} is in the plan but not in the registry")]
    UnknownBook(String),
}

const CSS_STATIC: &str = include_str!("../static/style.css");

/// Directory inside a bundle that holds image assets.
pub const IMAGES_DIR: &str = "images";

/// One rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub filename: String,
    pub title: String,
    pub html: String,
}

/// A named binary asset and where to read it from.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Path inside the package, e.g. `images/abraham.jpg`.
    pub name: String,
    pub source: PathBuf,
}

/// Packages ordered documents, a stylesheet and assets into one output.
pub trait DocumentSink {
    /// Returns the path of the produced output.
    fn package(
        &mut self,
        documents: &[Document],
        stylesheet: &str,
        assets: &[Asset],
    ) -> Result<PathBuf, GenerateError>;
}

/// Progress reported while documents are rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    BookStarted {
        book: String,
        hebrew_name: String,
        chapters: usize,
        intro: Option<String>,
    },
    ChapterRendered {
        book: String,
        chapter: u32,
        verses: usize,
        image: Option<String>,
    },
    /// The selected image stays claimed, so it appears nowhere else.
    ChapterEmpty {
        book: String,
        chapter: u32,
        image: Option<String>,
    },
    ChapterSkipped {
        book: String,
        chapter: u32,
        reason: String,
        image: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSummary {
    pub output: PathBuf,
    pub documents: usize,
    pub chapters: usize,
    pub skipped: usize,
    pub images: usize,
}

/// Rendered documents and the assets they reference.
#[derive(Debug, Default)]
pub struct RenderedDocuments {
    pub documents: Vec<Document>,
    pub assets: Vec<Asset>,
    pub chapters: usize,
    pub skipped: usize,
}

pub fn divider_filename(book: &str) -> String {
    format!("{book}.html")
}

pub fn chapter_filename(book: &str, chapter: u32) -> String {
    format!("{book}-{chapter:03}.html")
}

fn asset_name(filename: &str) -> String {
    format!("{IMAGES_DIR}/{filename}")
}

fn asset_for(image: &ImageRecord) -> Asset {
    Asset {
        name: asset_name(&image.filename),
        source: image.asset_path.clone(),
    }
}

fn send(events: &Option<Sender<GenerateEvent>>, event: GenerateEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// Render every document of the plan in reading order.
///
/// `fetch` returns a chapter's text; it is called once per planned chapter,
/// in order.
pub fn render_documents(
    plan: &DocumentPlan,
    registry: &Registry,
    catalog: &Catalog,
    language: &str,
    fetch: &mut dyn FnMut(&str, u32) -> Result<Option<ChapterText>, TextError>,
    events: &Option<Sender<GenerateEvent>>,
) -> Result<RenderedDocuments, GenerateError> {
    let mut out = RenderedDocuments::default();

    for book_plan in &plan.books {
        let book = registry
            .get(&book_plan.book)
            .ok_or_else(|| GenerateError::UnknownBook(book_plan.book.clone()))?;
        let intro = book_plan.intro.as_deref().and_then(|f| catalog.get(f));
        send(
            events,
            GenerateEvent::BookStarted {
                book: book.id.clone(),
                hebrew_name: book.hebrew_name.clone(),
                chapters: book_plan.chapters.len(),
                intro: intro.map(|i| i.filename.clone()),
            },
        );

        if let Some(image) = intro {
            out.assets.push(asset_for(image));
        }
        out.documents.push(Document {
            filename: divider_filename(&book.id),
            title: display_name(&book.id),
            html: render_divider(book, intro, language).into_string(),
        });

        for slot in &book_plan.chapters {
            let text = match fetch(&book.id, slot.chapter) {
                Ok(Some(text)) if !text.is_empty() => text,
                Ok(_) => {
                    send(
                        events,
                        GenerateEvent::ChapterEmpty {
                            book: book.id.clone(),
                            chapter: slot.chapter,
                            image: slot.image.clone(),
                        },
                    );
                    out.skipped += 1;
                    continue;
                }
                Err(e) => {
                    send(
                        events,
                        GenerateEvent::ChapterSkipped {
                            book: book.id.clone(),
                            chapter: slot.chapter,
                            reason: e.to_string(),
                            image: slot.image.clone(),
                        },
                    );
                    out.skipped += 1;
                    continue;
                }
            };

            let image = slot.image.as_deref().and_then(|f| catalog.get(f));
            if let Some(image) = image {
                out.assets.push(asset_for(image));
            }
            out.documents.push(Document {
                filename: chapter_filename(&book.id, slot.chapter),
                title: format!("{} {}", display_name(&book.id), slot.chapter),
                html: render_chapter(book, slot.chapter, image, &text, language).into_string(),
            });
            out.chapters += 1;
            send(
                events,
                GenerateEvent::ChapterRendered {
                    book: book.id.clone(),
                    chapter: slot.chapter,
                    verses: text.verse_pairs().len(),
                    image: image.map(|i| i.filename.clone()),
                },
            );
        }
    }
    Ok(out)
}

/// Render the plan and package it through `sink`.
pub fn generate(
    plan: &DocumentPlan,
    registry: &Registry,
    catalog: &Catalog,
    language: &str,
    fetch: &mut dyn FnMut(&str, u32) -> Result<Option<ChapterText>, TextError>,
    sink: &mut dyn DocumentSink,
    events: Option<Sender<GenerateEvent>>,
) -> Result<GenerateSummary, GenerateError> {
    let rendered = render_documents(plan, registry, catalog, language, fetch, &events)?;
    // Dropping the sender lets a printer thread drain and finish.
    drop(events);
    let output = sink.package(&rendered.documents, CSS_STATIC, &rendered.assets)?;
    Ok(GenerateSummary {
        output,
        documents: rendered.documents.len(),
        chapters: rendered.chapters,
        skipped: rendered.skipped,
        images: rendered.assets.len(),
    })
}

// ============================================================================
// HTML bundle sink
// ============================================================================

/// Writes a browsable directory: `index.html`, documents, `style.css`, images.
pub struct HtmlBundleSink {
    output_dir: PathBuf,
    title: String,
    language: String,
}

impl HtmlBundleSink {
    pub fn new(output_dir: &Path, title: &str, language: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            title: title.to_string(),
            language: language.to_string(),
        }
    }
}

impl DocumentSink for HtmlBundleSink {
    fn package(
        &mut self,
        documents: &[Document],
        stylesheet: &str,
        assets: &[Asset],
    ) -> Result<PathBuf, GenerateError> {
        for asset in assets {
            if !asset.source.is_file() {
                return Err(GenerateError::MissingAsset(asset.source.clone()));
            }
        }

        fs::create_dir_all(&self.output_dir)?;
        fs::write(self.output_dir.join("style.css"), stylesheet)?;
        for doc in documents {
            fs::write(self.output_dir.join(&doc.filename), &doc.html)?;
        }
        for asset in assets {
            let dest = self.output_dir.join(&asset.name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&asset.source, &dest)?;
        }

        let index = render_index(&self.title, &self.language, documents);
        let index_path = self.output_dir.join("index.html");
        fs::write(&index_path, index.into_string())?;
        Ok(index_path)
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, language: &str, body_class: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(language) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href="style.css";
            }
            body class=(body_class) {
                (content)
            }
        }
    }
}

fn figure(image: &ImageRecord) -> Markup {
    html! {
        figure.artwork {
            img src=(asset_name(&image.filename)) alt=(image.title) loading="lazy";
            @if !image.title.is_empty() {
                figcaption { (image.title) }
            }
        }
    }
}

/// Renders a book divider page
fn render_divider(book: &BookSpec, intro: Option<&ImageRecord>, language: &str) -> Markup {
    let name = display_name(&book.id);
    let content = html! {
        main.divider {
            h1.book-hebrew lang="he" dir="rtl" { (book.hebrew_name) }
            h2.book-english lang="en" { (name) }
            p.book-meta { (book.section) " · " (book.chapter_count) " chapters" }
            @if let Some(image) = intro {
                (figure(image))
            }
        }
    };
    base_document(&name, language, "divider-page", content)
}

/// Renders a chapter page with its verses
fn render_chapter(
    book: &BookSpec,
    chapter: u32,
    image: Option<&ImageRecord>,
    text: &ChapterText,
    language: &str,
) -> Markup {
    let title = format!("{} {}", display_name(&book.id), chapter);
    let content = html! {
        main.chapter {
            header.chapter-header {
                h1.chapter-hebrew lang="he" dir="rtl" {
                    (book.hebrew_name) " " (hebrew_numeral(chapter))
                }
                h2.chapter-english lang="en" { (title) }
            }
            @if let Some(image) = image {
                (figure(image))
            }
            div.verses {
                @for (i, (he, en)) in text.verse_pairs().into_iter().enumerate() {
                    div.verse id={ "v" (i + 1) } {
                        span.verse-number { (i + 1) }
                        p.verse-hebrew lang="he" dir="rtl" { (he) }
                        p.verse-english lang="en" { (en) }
                    }
                }
            }
        }
    };
    base_document(&title, language, "chapter-page", content)
}

/// Renders the bundle's table of contents
fn render_index(title: &str, language: &str, documents: &[Document]) -> Markup {
    let content = html! {
        main.index-page {
            h1 { (title) }
            ol.toc {
                @for doc in documents {
                    li { a href=(doc.filename) { (doc.title) } }
                }
            }
        }
    };
    base_document(title, language, "index-page", content)
}
