//! Output planning
//!
//! Decides which source pages go into which output document, before any PDF
//! bytes are produced. Planners only need page counts, so every rule here can
//! be tested without opening a PDF.

use crate::error::{PageOpError, Result};
use crate::page_ranges::{PageIndexSet, PageRange};
use serde::Serialize;
use std::collections::HashSet;

/// One page to copy: source document slot and zero-based page index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub source: usize,
    pub index: u32,
}

impl PageRef {
    pub fn new(source: usize, index: u32) -> Self {
        Self { source, index }
    }
}

/// 1-based first/last page of a contiguous output, used for labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

/// A single planned output document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub filename: String,
    pub pages: Vec<PageRef>,
    pub span: Option<PageSpan>,
}

impl PlanEntry {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Human-readable page range, e.g. `"3-7"` or `"Page 4"`
    pub fn label(&self) -> String {
        match self.span {
            Some(span) if span.start == span.end => format!("Page {}", span.start),
            Some(span) => format!("{}-{}", span.start, span.end),
            None => format!("{} pages", self.pages.len()),
        }
    }

    fn contiguous(filename: String, source: usize, start: u32, end: u32) -> Self {
        Self {
            filename,
            pages: (start..=end).map(|p| PageRef::new(source, p - 1)).collect(),
            span: Some(PageSpan { start, end }),
        }
    }
}

/// Ordered list of output documents for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPlan {
    entries: Vec<PlanEntry>,
}

impl OutputPlan {
    /// Build a plan, checking that every entry has pages and file names are unique
    fn new(entries: Vec<PlanEntry>) -> Result<Self> {
        let mut names = HashSet::new();
        for entry in &entries {
            if entry.pages.is_empty() {
                return Err(PageOpError::AssemblyFailed(format!(
                    "planned output '{}' has no pages",
                    entry.filename
                )));
            }
            if !names.insert(entry.filename.as_str()) {
                return Err(PageOpError::AssemblyFailed(format!(
                    "duplicate output name '{}'",
                    entry.filename
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every page of every source, in source order then page order
pub fn plan_merge(page_counts: &[u32]) -> Result<OutputPlan> {
    if page_counts.is_empty() {
        return Err(PageOpError::NoDocuments);
    }

    let pages = page_counts
        .iter()
        .enumerate()
        .flat_map(|(source, &count)| (0..count).map(move |index| PageRef::new(source, index)))
        .collect();

    OutputPlan::new(vec![PlanEntry {
        filename: "merged.pdf".to_string(),
        pages,
        span: None,
    }])
}

/// All pages not in `remove`, in original order; at least one page must remain
pub fn plan_remove_pages(total_pages: u32, remove: &PageIndexSet) -> Result<OutputPlan> {
    if remove.len() >= total_pages as usize {
        return Err(PageOpError::AllPagesRemoved {
            requested: remove.len(),
            total: total_pages,
        });
    }

    let pages = (1..=total_pages)
        .filter(|page| !remove.contains(*page))
        .map(|page| PageRef::new(0, page - 1))
        .collect();

    OutputPlan::new(vec![PlanEntry {
        filename: "pages-removed.pdf".to_string(),
        pages,
        span: None,
    }])
}

/// Contiguous segments ending at each boundary, plus a final segment ending at the last page
pub fn plan_split_at(total_pages: u32, boundaries: &[u32]) -> Result<OutputPlan> {
    if let Some(&bad) = boundaries.iter().find(|&&b| b < 1 || b >= total_pages) {
        return Err(PageOpError::OutOfBounds {
            value: u64::from(bad),
            min: 1,
            max: total_pages.saturating_sub(1),
        });
    }

    let mut breakpoints: Vec<u32> = boundaries.to_vec();
    breakpoints.push(total_pages);
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let mut entries = Vec::with_capacity(breakpoints.len());
    let mut start = 1;
    for (i, &end) in breakpoints.iter().enumerate() {
        let filename = format!("part-{}-pages-{}-{}.pdf", i + 1, start, end);
        entries.push(PlanEntry::contiguous(filename, 0, start, end));
        start = end + 1;
    }

    OutputPlan::new(entries)
}

/// One output per range, in the order given
pub fn plan_extract_ranges(total_pages: u32, ranges: &[PageRange]) -> Result<OutputPlan> {
    if ranges.is_empty() {
        return Err(PageOpError::EmptyInput);
    }

    let mut entries: Vec<PlanEntry> = Vec::with_capacity(ranges.len());
    let mut seen = HashSet::new();
    for range in ranges {
        if range.start > range.end {
            return Err(PageOpError::InvalidRange {
                start: u64::from(range.start),
                end: u64::from(range.end),
            });
        }
        if range.start < 1 || range.end > total_pages {
            let value = if range.start < 1 { range.start } else { range.end };
            return Err(PageOpError::OutOfBounds {
                value: u64::from(value),
                min: 1,
                max: total_pages,
            });
        }

        // The same range asked for twice yields one file per request, so the name needs a suffix
        let base = format!("pages-{}-{}", range.start, range.end);
        let mut filename = format!("{}.pdf", base);
        let mut copy = 2;
        while !seen.insert(filename.clone()) {
            filename = format!("{}-{}.pdf", base, copy);
            copy += 1;
        }

        entries.push(PlanEntry::contiguous(filename, 0, range.start, range.end));
    }

    OutputPlan::new(entries)
}

/// One single-page output per page
pub fn plan_split_individual(total_pages: u32) -> Result<OutputPlan> {
    let entries = (1..=total_pages)
        .map(|page| PlanEntry::contiguous(format!("page-{}.pdf", page), 0, page, page))
        .collect();
    OutputPlan::new(entries)
}
