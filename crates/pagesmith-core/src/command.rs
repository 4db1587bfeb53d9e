use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A page operation requested by a client.
///
/// The variant is chosen once at the request boundary; the page spec strings
/// are parsed against the opened documents by [`crate::Job::prepare`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum PageCommand {
    Merge,
    RemovePages { pages: String },
    SplitAtPoints { points: String },
    ExtractRanges { ranges: String },
    SplitIndividual,
}

impl PageCommand {
    pub fn kind(&self) -> OperationKind {
        match self {
            PageCommand::Merge => OperationKind::Merge,
            PageCommand::RemovePages { .. } => OperationKind::RemovePages,
            PageCommand::SplitAtPoints { .. } => OperationKind::SplitAtPoints,
            PageCommand::ExtractRanges { .. } => OperationKind::ExtractRanges,
            PageCommand::SplitIndividual => OperationKind::SplitIndividual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Merge,
    RemovePages,
    SplitAtPoints,
    ExtractRanges,
    SplitIndividual,
}

impl OperationKind {
    /// Whether the operation yields several documents packaged as one archive
    pub fn produces_archive(self) -> bool {
        matches!(
            self,
            OperationKind::SplitAtPoints
                | OperationKind::ExtractRanges
                | OperationKind::SplitIndividual
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Merge => "merge",
            OperationKind::RemovePages => "remove-pages",
            OperationKind::SplitAtPoints => "split-at-points",
            OperationKind::ExtractRanges => "extract-ranges",
            OperationKind::SplitIndividual => "split-individual",
        }
    }
}

/// The `splitType` values accepted from upload forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    AtPages,
    ExtractRanges,
    Individual,
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "split-at-pages" => Ok(SplitMode::AtPages),
            "extract-ranges" => Ok(SplitMode::ExtractRanges),
            "split-individual" => Ok(SplitMode::Individual),
            other => Err(format!(
                "Invalid split type '{}'. Expected one of: split-at-pages, extract-ranges, split-individual",
                other
            )),
        }
    }
}

/// Timing and size figures for a finished job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: u64,
    pub page_count: u32,
    pub processing_time_ms: u64,
}
