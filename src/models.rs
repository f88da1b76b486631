//! Core data model: series, chapters, pages and chapter numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A chapter number with one decimal of precision, stored in tenths so it is
/// `Eq + Ord + Hash`. Textual variants compare numerically: `"034"`, `"34"`
/// and `"34.0"` are the same chapter, `"34.5"` sits between 34 and 35.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterNumber(u64);

impl ChapterNumber {
    /// Parse `"34"` or `"34.5"` style tokens. Anything non-numeric is
    /// rejected with `InvalidChapterReference`.
    pub fn parse(s: &str) -> Result<Self> {
        let token = s.trim();
        let (whole, frac) = match token.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (token, None),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidChapterReference(s.to_string()));
        }
        if let Some(f) = frac {
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidChapterReference(s.to_string()));
            }
        }
        let value: f64 = token
            .parse()
            .map_err(|_| Error::InvalidChapterReference(s.to_string()))?;
        Ok(ChapterNumber((value * 10.0).round() as u64))
    }

    pub fn from_tenths(tenths: u64) -> Self {
        ChapterNumber(tenths)
    }

    pub fn tenths(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}", self.0 / 10)
        } else {
            write!(f, "{}.{}", self.0 / 10, self.0 % 10)
        }
    }
}

/// One manga title as hosted at a single source site. Created by
/// `SourceAdapter::resolve_series`; immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct Series {
    /// Canonical source URL; the series identity.
    pub url: String,
    pub title: String,
    /// Identifier of the site adapter that resolved this series.
    pub site: &'static str,
    /// Discovered chapters, deduplicated and ascending by number.
    pub chapters: Vec<Chapter>,
}

/// One numbered installment of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: ChapterNumber,
    pub title: String,
    /// Opaque source reference used by the adapter to list pages; for all
    /// current sites, the chapter page URL.
    pub url: String,
}

/// One page image of a chapter. The sequence index defines the in-archive
/// order and must be preserved exactly; sites serve page markup unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_and_decimal_numbers() {
        assert_eq!(ChapterNumber::parse("34").unwrap().tenths(), 340);
        assert_eq!(ChapterNumber::parse("34.5").unwrap().tenths(), 345);
        assert_eq!(ChapterNumber::parse(" 7 ").unwrap().tenths(), 70);
        assert_eq!(ChapterNumber::parse("0").unwrap().tenths(), 0);
    }

    #[test]
    fn canonicalizes_textual_variants() {
        assert_eq!(
            ChapterNumber::parse("034").unwrap(),
            ChapterNumber::parse("34").unwrap()
        );
        assert_eq!(
            ChapterNumber::parse("34.0").unwrap(),
            ChapterNumber::parse("34").unwrap()
        );
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        for bad in ["", "extra", "12a", "1.2.3", "-4", "3.", ".5"] {
            assert!(
                matches!(
                    ChapterNumber::parse(bad),
                    Err(Error::InvalidChapterReference(_))
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn displays_without_trailing_zero() {
        assert_eq!(ChapterNumber::parse("34").unwrap().to_string(), "34");
        assert_eq!(ChapterNumber::parse("34.5").unwrap().to_string(), "34.5");
        assert_eq!(ChapterNumber::parse("034.0").unwrap().to_string(), "34");
    }

    #[test]
    fn orders_numerically() {
        let a = ChapterNumber::parse("9").unwrap();
        let b = ChapterNumber::parse("10").unwrap();
        let c = ChapterNumber::parse("10.5").unwrap();
        assert!(a < b && b < c);
    }
}
