//! Canonical-order document plan.
//!
//! Walks the registry in order (book intro, then chapters ascending) and asks
//! the selector for an image at each stop. The plan is the complete list of
//! image choices for one document; generation renders it without making any
//! further selection decisions.
//!
//! A strict-mode selection error aborts planning, so nothing is packaged from
//! an incomplete plan.

use crate::registry::Registry;
use crate::selector::{SelectError, Selector};

/// Chapters per book in test mode when no explicit limit is given.
pub const TEST_CHAPTER_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterSlot {
    pub chapter: u32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookPlan {
    pub book: String,
    pub intro: Option<String>,
    pub chapters: Vec<ChapterSlot>,
}

impl BookPlan {
    pub fn illustrated_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.image.is_some()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPlan {
    pub books: Vec<BookPlan>,
}

impl DocumentPlan {
    /// Every image the plan uses, in reading order.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.books.iter().flat_map(|b| {
            b.intro
                .iter()
                .chain(b.chapters.iter().filter_map(|c| c.image.as_ref()))
                .map(String::as_str)
        })
    }

    pub fn chapter_count(&self) -> usize {
        self.books.iter().map(|b| b.chapters.len()).sum()
    }
}

/// Select intro and chapter images for every book of `registry`.
///
/// `chapter_limit` caps the chapters planned per book.
pub fn plan_document(
    registry: &Registry,
    selector: &mut Selector<'_>,
    chapter_limit: Option<u32>,
) -> Result<DocumentPlan, SelectError> {
    let mut plan = DocumentPlan::default();
    for book in registry.books() {
        let intro = selector
            .select_book_intro_image(&book.id)?
            .map(|i| i.filename.clone());

        let last = chapter_limit.map_or(book.chapter_count, |n| n.min(book.chapter_count));
        let mut chapters = Vec::with_capacity(last as usize);
        for chapter in 1..=last {
            let image = selector
                .select_chapter_image(&book.id, chapter)?
                .map(|i| i.filename.clone());
            chapters.push(ChapterSlot { chapter, image });
        }

        plan.books.push(BookPlan {
            book: book.id.clone(),
            intro,
            chapters,
        });
    }
    Ok(plan)
}
