//! Page specification parsing
//!
//! Three grammars over a known page count, all comma separated:
//! - page list with ranges (`"1,3,5-8"`) -> [`PageIndexSet`]
//! - split boundaries (`"2,5"`) -> ascending boundary list
//! - extract ranges (`"1-3,5-8"`) -> ordered [`PageRange`] list
//!
//! Page numbers are 1-based throughout.

use crate::error::{PageOpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ascending, duplicate-free set of 1-based page numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIndexSet(BTreeSet<u32>);

impl PageIndexSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, page: u32) -> bool {
        self.0.contains(&page)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<u32> for PageIndexSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inclusive 1-based page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// One comma-separated token, before bounds checking
enum Token {
    Single(u64),
    Range(u64, u64),
}

/// Parse a page list such as `"1,3,5-8"` into a set of pages within `1..=total_pages`
pub fn parse_page_list(input: &str, total_pages: u32) -> Result<PageIndexSet> {
    let mut pages = BTreeSet::new();

    for token in tokenize(input)? {
        let (start, end) = match token {
            Token::Single(page) => (page, page),
            Token::Range(start, end) => (start, end),
        };
        let range = check_range(start, end, total_pages)?;
        pages.extend(range.pages());
    }

    Ok(PageIndexSet(pages))
}

/// Parse split boundaries such as `"2,5"`.
///
/// Every boundary must be a bare page number strictly below `total_pages`;
/// splitting after the last page is rejected. Duplicates collapse.
pub fn parse_boundaries(input: &str, total_pages: u32) -> Result<Vec<u32>> {
    let mut points = BTreeSet::new();

    for part in non_empty_parts(input)? {
        let value = parse_number(part, part)?;
        let max = total_pages.saturating_sub(1);
        if value < 1 || value > u64::from(max) {
            return Err(PageOpError::OutOfBounds { value, min: 1, max });
        }
        points.insert(value as u32);
    }

    Ok(points.into_iter().collect())
}

/// Parse extract ranges such as `"1-3,5-8"`.
///
/// A bare number `n` is the range `n-n`. Ranges keep the order they were
/// given in, and overlapping or repeated ranges are all kept.
pub fn parse_range_list(input: &str, total_pages: u32) -> Result<Vec<PageRange>> {
    tokenize(input)?
        .into_iter()
        .map(|token| match token {
            Token::Single(page) => check_range(page, page, total_pages),
            Token::Range(start, end) => check_range(start, end, total_pages),
        })
        .collect()
}

fn non_empty_parts(input: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(PageOpError::EmptyInput);
    }
    Ok(parts)
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    non_empty_parts(input)?
        .into_iter()
        .map(|part| match part.split_once('-') {
            Some((start, end)) => Ok(Token::Range(
                parse_number(start, part)?,
                parse_number(end, part)?,
            )),
            None => Ok(Token::Single(parse_number(part, part)?)),
        })
        .collect()
}

/// Parse one number; `token` is the whole comma-separated item for error reporting
fn parse_number(text: &str, token: &str) -> Result<u64> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PageOpError::InvalidNumber {
            token: token.to_string(),
        });
    }
    // All digits: only overflow can fail, which is out of bounds for any document
    Ok(text.parse::<u64>().unwrap_or(u64::MAX))
}

fn check_range(start: u64, end: u64, total_pages: u32) -> Result<PageRange> {
    if start > end {
        return Err(PageOpError::InvalidRange { start, end });
    }
    for value in [start, end] {
        if value < 1 || value > u64::from(total_pages) {
            return Err(PageOpError::OutOfBounds {
                value,
                min: 1,
                max: total_pages,
            });
        }
    }
    Ok(PageRange::new(start as u32, end as u32))
}
