//! Page-level PDF operations
//!
//! Merge several documents, remove pages, split at boundaries, extract ranges,
//! or burst a document into single pages.
//!
//! Every request goes through the same pipeline:
//! - `document`: open and validate input bytes
//! - `page_ranges`: parse user page specifications against a page count
//! - `plan`: compute the output documents as lists of page references
//! - `assemble`: copy the referenced pages into fresh PDFs
//! - `archive`: package multi-document results as a zip
//!
//! [`Job`] drives the pipeline for one [`PageCommand`].

pub mod archive;
pub mod assemble;
pub mod command;
pub mod document;
pub mod error;
pub mod job;
pub mod page_ranges;
pub mod plan;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use archive::{package_to_path, ArchiveWriter};
pub use assemble::{assemble, assemble_all, OutputDocument};
pub use command::{OperationKind, PageCommand, ProcessMetrics, SplitMode};
pub use document::{PdfBuilder, PdfInfo, SourceDocument};
pub use error::{PageOpError, Result};
pub use job::{Job, JobSummary, OutputSummary};
pub use page_ranges::{parse_boundaries, parse_page_list, parse_range_list, PageIndexSet, PageRange};
pub use plan::{OutputPlan, PageRef, PageSpan, PlanEntry};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32> {
    Ok(SourceDocument::open(bytes, "input.pdf")?.page_count())
}
