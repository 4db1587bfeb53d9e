//! Request pipeline
//!
//! A [`Job`] is one validated, planned request. Everything that can be
//! rejected is rejected in [`Job::prepare`]; after that only assembly and
//! output writing remain.

use crate::archive::{package_to_path, write_atomically, ArchiveWriter};
use crate::assemble::{assemble, OutputDocument};
use crate::command::{OperationKind, PageCommand, ProcessMetrics};
use crate::document::SourceDocument;
use crate::error::{PageOpError, Result};
use crate::page_ranges::{parse_boundaries, parse_page_list, parse_range_list};
use crate::plan::{
    plan_extract_ranges, plan_merge, plan_remove_pages, plan_split_at, plan_split_individual,
    OutputPlan,
};
use serde::Serialize;
use std::io::{Seek, Write};
use std::path::Path;
use std::time::Instant;

/// Per-output metadata reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSummary {
    pub filename: String,
    pub page_count: u32,
    pub page_range: String,
}

/// What a job will produce, known before any assembly
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub operation: OperationKind,
    pub original_pages: u32,
    pub output_count: usize,
    pub outputs: Vec<OutputSummary>,
}

#[derive(Debug)]
pub struct Job {
    kind: OperationKind,
    sources: Vec<SourceDocument>,
    plan: OutputPlan,
    started: Instant,
}

impl Job {
    /// Resolve `command` against the opened sources and build the output plan
    pub fn prepare(command: PageCommand, sources: Vec<SourceDocument>) -> Result<Self> {
        let started = Instant::now();
        let kind = command.kind();

        let plan = match &command {
            PageCommand::Merge => {
                let counts: Vec<u32> = sources.iter().map(SourceDocument::page_count).collect();
                plan_merge(&counts)?
            }
            PageCommand::RemovePages { pages } => {
                let total = single_source(&sources)?.page_count();
                let remove = parse_page_list(pages, total)?;
                tracing::debug!(pages = ?remove.to_vec(), "Parsed pages to remove");
                plan_remove_pages(total, &remove)?
            }
            PageCommand::SplitAtPoints { points } => {
                let total = single_source(&sources)?.page_count();
                let boundaries = parse_boundaries(points, total)?;
                tracing::debug!(?boundaries, "Parsed split points");
                plan_split_at(total, &boundaries)?
            }
            PageCommand::ExtractRanges { ranges } => {
                let total = single_source(&sources)?.page_count();
                let ranges = parse_range_list(ranges, total)?;
                tracing::debug!(?ranges, "Parsed page ranges");
                plan_extract_ranges(total, &ranges)?
            }
            PageCommand::SplitIndividual => {
                let total = single_source(&sources)?.page_count();
                plan_split_individual(total)?
            }
        };

        tracing::info!(
            operation = kind.as_str(),
            sources = sources.len(),
            outputs = plan.len(),
            "Planned page operation"
        );

        Ok(Self {
            kind,
            sources,
            plan,
            started,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn plan(&self) -> &OutputPlan {
        &self.plan
    }

    pub fn sources(&self) -> &[SourceDocument] {
        &self.sources
    }

    /// Total pages across all sources
    pub fn original_pages(&self) -> u32 {
        self.sources.iter().map(SourceDocument::page_count).sum()
    }

    pub fn content_type(&self) -> &'static str {
        if self.kind.produces_archive() {
            "application/zip"
        } else {
            "application/pdf"
        }
    }

    pub fn file_extension(&self) -> &'static str {
        if self.kind.produces_archive() {
            "zip"
        } else {
            "pdf"
        }
    }

    pub fn summary(&self) -> JobSummary {
        let outputs: Vec<OutputSummary> = self
            .plan
            .entries()
            .iter()
            .map(|entry| OutputSummary {
                filename: entry.filename.clone(),
                page_count: entry.page_count(),
                page_range: entry.label(),
            })
            .collect();

        JobSummary {
            operation: self.kind,
            original_pages: self.original_pages(),
            output_count: outputs.len(),
            outputs,
        }
    }

    /// Assemble outputs lazily, one per plan entry, in plan order
    pub fn outputs(&self) -> impl Iterator<Item = Result<OutputDocument>> + '_ {
        self.plan
            .entries()
            .iter()
            .map(move |entry| assemble(entry, &self.sources))
    }

    pub fn assemble_all(&self) -> Result<Vec<OutputDocument>> {
        self.outputs().collect()
    }

    /// Write the deliverable: the PDF itself, or a zip of all outputs
    pub fn write_to<W: Write + Seek>(&self, mut writer: W) -> Result<()> {
        if self.kind.produces_archive() {
            let mut archive = ArchiveWriter::new(writer);
            for output in self.outputs() {
                archive.append(&output?)?;
            }
            archive.finish()?.flush()?;
        } else {
            let output = self.single_output()?;
            writer.write_all(&output.bytes)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Write the deliverable to `target`; nothing is left at `target` on failure
    pub fn write_to_path(&self, target: &Path) -> Result<ProcessMetrics> {
        let output_size_bytes = if self.kind.produces_archive() {
            package_to_path(target, self.outputs())?
        } else {
            let output = self.single_output()?;
            write_atomically(target, |file| Ok(file.write_all(&output.bytes)?))?
        };

        let metrics = ProcessMetrics {
            input_size_bytes: self.sources.iter().map(SourceDocument::size_bytes).sum(),
            output_size_bytes,
            page_count: self.plan.entries().iter().map(|e| e.page_count()).sum(),
            processing_time_ms: self.started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            operation = self.kind.as_str(),
            path = %target.display(),
            bytes = metrics.output_size_bytes,
            elapsed_ms = metrics.processing_time_ms,
            "Page operation complete"
        );

        Ok(metrics)
    }

    fn single_output(&self) -> Result<OutputDocument> {
        let entry = self.plan.entries().first().ok_or_else(|| {
            PageOpError::AssemblyFailed("plan has no output document".to_string())
        })?;
        assemble(entry, &self.sources)
    }
}

fn single_source(sources: &[SourceDocument]) -> Result<&SourceDocument> {
    match sources {
        [] => Err(PageOpError::NoDocuments),
        [source] => Ok(source),
        _ => Err(PageOpError::DocumentCount {
            expected: 1,
            actual: sources.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_test_pdf, page_count, page_markers};
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn open(pages: u32, prefix: &str) -> SourceDocument {
        SourceDocument::open(&create_test_pdf(pages, prefix), format!("{}.pdf", prefix)).unwrap()
    }

    fn unzip(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    fn run(job: &Job) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        job.write_to(&mut buffer).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_merge_job_orders_files_then_pages() {
        let job = Job::prepare(PageCommand::Merge, vec![open(2, "A"), open(3, "B")]).unwrap();
        assert_eq!(job.content_type(), "application/pdf");
        assert_eq!(job.original_pages(), 5);

        let bytes = run(&job);
        assert_eq!(
            page_markers(&bytes),
            vec!["A-Page-1", "A-Page-2", "B-Page-1", "B-Page-2", "B-Page-3"]
        );
    }

    #[test]
    fn test_remove_pages_job() {
        let command = PageCommand::RemovePages {
            pages: "1,3,5-8".into(),
        };
        let job = Job::prepare(command, vec![open(10, "D")]).unwrap();
        let summary = job.summary();
        assert_eq!(summary.original_pages, 10);
        assert_eq!(summary.outputs[0].page_count, 4);

        let bytes = run(&job);
        assert_eq!(
            page_markers(&bytes),
            vec!["D-Page-2", "D-Page-4", "D-Page-9", "D-Page-10"]
        );
    }

    #[test]
    fn test_remove_every_page_fails_before_assembly() {
        let command = PageCommand::RemovePages {
            pages: "1-4".into(),
        };
        let result = Job::prepare(command, vec![open(4, "All")]);
        assert!(matches!(result, Err(PageOpError::AllPagesRemoved { .. })));
    }

    #[test]
    fn test_remove_all_but_last_page() {
        let command = PageCommand::RemovePages {
            pages: "1-3".into(),
        };
        let job = Job::prepare(command, vec![open(4, "Keep")]).unwrap();
        assert_eq!(page_markers(&run(&job)), vec!["Keep-Page-4"]);
    }

    #[test]
    fn test_split_at_points_job_archive() {
        let command = PageCommand::SplitAtPoints {
            points: "2,5".into(),
        };
        let job = Job::prepare(command, vec![open(7, "S")]).unwrap();
        assert_eq!(job.content_type(), "application/zip");

        let entries = unzip(run(&job));
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "part-1-pages-1-2.pdf",
                "part-2-pages-3-5.pdf",
                "part-3-pages-6-7.pdf"
            ]
        );
        assert_eq!(page_markers(&entries[1].1), vec!["S-Page-3", "S-Page-4", "S-Page-5"]);
        assert_eq!(page_markers(&entries[2].1), vec!["S-Page-6", "S-Page-7"]);
    }

    #[test]
    fn test_split_at_last_page_is_rejected() {
        let command = PageCommand::SplitAtPoints { points: "7".into() };
        let result = Job::prepare(command, vec![open(7, "Edge")]);
        assert!(matches!(
            result,
            Err(PageOpError::OutOfBounds { value: 7, .. })
        ));
    }

    #[test]
    fn test_extract_ranges_job_reproduces_overlap() {
        let command = PageCommand::ExtractRanges {
            ranges: "3-5,1-4".into(),
        };
        let job = Job::prepare(command, vec![open(6, "X")]).unwrap();

        let entries = unzip(run(&job));
        assert_eq!(entries[0].0, "pages-3-5.pdf");
        assert_eq!(entries[1].0, "pages-1-4.pdf");
        assert_eq!(page_count(&entries[0].1), 3);
        assert_eq!(
            page_markers(&entries[1].1),
            vec!["X-Page-1", "X-Page-2", "X-Page-3", "X-Page-4"]
        );
    }

    #[test]
    fn test_split_individual_job() {
        let job = Job::prepare(PageCommand::SplitIndividual, vec![open(4, "I")]).unwrap();
        let summary = job.summary();
        assert_eq!(summary.output_count, 4);
        assert_eq!(summary.outputs[3].page_range, "Page 4");

        let entries = unzip(run(&job));
        assert_eq!(entries.len(), 4);
        for (i, (name, data)) in entries.iter().enumerate() {
            assert_eq!(name, &format!("page-{}.pdf", i + 1));
            assert_eq!(page_markers(data), vec![format!("I-Page-{}", i + 1)]);
        }
    }

    #[test]
    fn test_single_source_operation_rejects_two_files() {
        let result = Job::prepare(
            PageCommand::SplitIndividual,
            vec![open(1, "One"), open(1, "Two")],
        );
        assert!(matches!(
            result,
            Err(PageOpError::DocumentCount {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_parse_errors_surface_from_prepare() {
        let command = PageCommand::ExtractRanges {
            ranges: "abc".into(),
        };
        let err = Job::prepare(command, vec![open(3, "E")]).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.code(), "INVALID_NUMBER");
    }

    #[test]
    fn test_write_to_path_reports_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.zip");

        let job = Job::prepare(PageCommand::SplitIndividual, vec![open(3, "M")]).unwrap();
        let metrics = job.write_to_path(&target).unwrap();

        assert_eq!(metrics.page_count, 3);
        assert_eq!(
            metrics.output_size_bytes,
            std::fs::metadata(&target).unwrap().len()
        );
        assert_eq!(unzip(std::fs::read(&target).unwrap()).len(), 3);
    }
}
