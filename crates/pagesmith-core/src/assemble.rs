//! Document assembly
//!
//! Turns a [`PlanEntry`] into PDF bytes by copying its pages, in order, into a
//! fresh document.

use crate::document::{PdfBuilder, SourceDocument};
use crate::error::{PageOpError, Result};
use crate::plan::{OutputPlan, PlanEntry};

/// An assembled output PDF
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub filename: String,
    pub page_count: u32,
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Build the document described by `entry`.
///
/// Any failure here happens after validation passed, so it is reported as
/// [`PageOpError::AssemblyFailed`] and no output is produced.
pub fn assemble(entry: &PlanEntry, sources: &[SourceDocument]) -> Result<OutputDocument> {
    let mut builder = PdfBuilder::new();
    let failed = |e: PageOpError| match e {
        PageOpError::AssemblyFailed(_) => e,
        other => PageOpError::AssemblyFailed(format!("{}: {}", entry.filename, other)),
    };

    let resolved = entry
        .pages
        .iter()
        .map(|page_ref| {
            sources
                .get(page_ref.source)
                .map(|source| (source, page_ref.index))
                .ok_or_else(|| {
                    PageOpError::AssemblyFailed(format!(
                        "{}: source document {} does not exist",
                        entry.filename, page_ref.source
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    // Reserve every page first so links between pages of this output survive
    for &(source, index) in &resolved {
        builder.reserve_page(source, index).map_err(failed)?;
    }

    for &(source, index) in &resolved {
        let page = builder.copy_page(source, index).map_err(failed)?;
        builder.append_page(page);
    }

    let page_count = builder.page_count();
    let bytes = builder.serialize()?;

    tracing::debug!(
        filename = %entry.filename,
        pages = page_count,
        bytes = bytes.len(),
        "Assembled output PDF"
    );

    Ok(OutputDocument {
        filename: entry.filename.clone(),
        page_count,
        label: entry.label(),
        bytes,
    })
}

/// Assemble every entry of the plan, in plan order
pub fn assemble_all(plan: &OutputPlan, sources: &[SourceDocument]) -> Result<Vec<OutputDocument>> {
    plan.entries()
        .iter()
        .map(|entry| assemble(entry, sources))
        .collect()
}
