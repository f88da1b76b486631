//! Chapter selection shared across all source adapters.
//!
//! A selector is the user-facing chapter spec: empty for everything, a single
//! number for one chapter, or an inclusive `"A-B"` range.

use crate::error::{Error, Result};
use crate::models::{Chapter, ChapterNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSelector {
    All,
    Single(ChapterNumber),
    Range(ChapterNumber, ChapterNumber),
}

impl ChapterSelector {
    /// Parse a selector spec. Non-numeric tokens on either side of a range
    /// are `InvalidChapterReference`. Bounds are not reordered: an inverted
    /// range simply selects nothing and fails at resolution time.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(ChapterSelector::All);
        }
        match spec.split_once('-') {
            Some((start, end)) => {
                let start = ChapterNumber::parse(start)?;
                let end = ChapterNumber::parse(end)?;
                Ok(ChapterSelector::Range(start, end))
            }
            None => Ok(ChapterSelector::Single(ChapterNumber::parse(spec)?)),
        }
    }

    /// Resolve the selector against a discovered chapter list.
    ///
    /// The returned chapters are ascending by number. A single number with no
    /// match is `ChapterNotFound`; a range that covers no chapter (including
    /// an inverted `A-B` with A > B) is `EmptyRange`.
    pub fn select<'a>(&self, chapters: &'a [Chapter]) -> Result<Vec<&'a Chapter>> {
        match self {
            ChapterSelector::All => Ok(chapters.iter().collect()),
            ChapterSelector::Single(number) => {
                let found: Vec<&Chapter> =
                    chapters.iter().filter(|c| c.number == *number).collect();
                if found.is_empty() {
                    Err(Error::ChapterNotFound(number.to_string()))
                } else {
                    Ok(found)
                }
            }
            ChapterSelector::Range(start, end) => {
                let mut found: Vec<&Chapter> = chapters
                    .iter()
                    .filter(|c| c.number >= *start && c.number <= *end)
                    .collect();
                if found.is_empty() {
                    return Err(Error::EmptyRange {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
                found.sort_by_key(|c| c.number);
                Ok(found)
            }
        }
    }
}
