use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageOpError {
    #[error("Failed to parse PDF: {0}")]
    InvalidPdf(String),

    #[error("No pages specified")]
    EmptyInput,

    #[error("Invalid number: '{token}'")]
    InvalidNumber { token: String },

    #[error("Invalid range {start}-{end}: start is after end")]
    InvalidRange { start: u64, end: u64 },

    #[error("Page {value} is outside the valid range ({min}-{max})")]
    OutOfBounds { value: u64, min: u32, max: u32 },

    #[error("Cannot remove all pages: {requested} page(s) requested from a {total}-page document")]
    AllPagesRemoved { requested: usize, total: u32 },

    #[error("Page index {index} does not exist (document has {page_count} pages)")]
    IndexOutOfRange { index: u32, page_count: u32 },

    #[error("No documents to process")]
    NoDocuments,

    #[error("Expected {expected} document(s), got {actual}")]
    DocumentCount { expected: usize, actual: usize },

    #[error("PDF assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Archive write failed: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PageOpError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PageOpError::InvalidPdf(_) => "INVALID_PDF",
            PageOpError::EmptyInput => "EMPTY_INPUT",
            PageOpError::InvalidNumber { .. } => "INVALID_NUMBER",
            PageOpError::InvalidRange { .. } => "INVALID_RANGE",
            PageOpError::OutOfBounds { .. } => "OUT_OF_BOUNDS",
            PageOpError::AllPagesRemoved { .. } => "ALL_PAGES_REMOVED",
            PageOpError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            PageOpError::NoDocuments => "NO_DOCUMENTS",
            PageOpError::DocumentCount { .. } => "DOCUMENT_COUNT",
            PageOpError::AssemblyFailed(_) => "ASSEMBLY_FAILED",
            PageOpError::Archive(_) => "ARCHIVE_FAILED",
            PageOpError::Io(_) => "IO_ERROR",
        }
    }

    /// True for failures caught before any output is assembled.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PageOpError::InvalidPdf(_)
                | PageOpError::EmptyInput
                | PageOpError::InvalidNumber { .. }
                | PageOpError::InvalidRange { .. }
                | PageOpError::OutOfBounds { .. }
                | PageOpError::AllPagesRemoved { .. }
                | PageOpError::NoDocuments
                | PageOpError::DocumentCount { .. }
        )
    }
}

impl From<zip::result::ZipError> for PageOpError {
    fn from(err: zip::result::ZipError) -> Self {
        PageOpError::Archive(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PageOpError>;
