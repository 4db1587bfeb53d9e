//! Error types for the pagesmith server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pagesmith_core::PageOpError;
use serde::Serialize;
use thiserror::Error;

/// A file of a merge upload that could not be opened
#[derive(Debug, Clone, Serialize)]
pub struct InvalidFile {
    pub filename: String,
    pub error: String,
}

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No PDF file uploaded")]
    NoFiles,

    #[error("Please upload at least {min} PDF files (got {actual})")]
    TooFewFiles { min: usize, actual: usize },

    #[error("Too many files: at most {max} allowed")]
    TooManyFiles { max: usize },

    #[error("Unexpected file field '{0}'")]
    UnexpectedField(String),

    #[error("Only PDF files are allowed: '{0}'")]
    NotPdf(String),

    #[error("File size exceeds the allowed limit ({limit})")]
    FileTooLarge { limit: String },

    #[error("Some PDF files are invalid or corrupted")]
    InvalidFiles(Vec<InvalidFile>),

    #[error("Invalid filename")]
    InvalidFilename,

    #[error("File not found or expired")]
    NotFound,

    #[error(transparent)]
    PageOp(#[from] PageOpError),

    #[error("Failed to read upload: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_files: Option<Vec<InvalidFile>>,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Multipart { status, .. } => *status,
            ServerError::PageOp(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            ServerError::PageOp(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "INVALID_REQUEST",
            ServerError::NoFiles => "NO_FILE",
            ServerError::TooFewFiles { .. } => "TOO_FEW_FILES",
            ServerError::TooManyFiles { .. } => "LIMIT_FILE_COUNT",
            ServerError::UnexpectedField(_) => "LIMIT_UNEXPECTED_FILE",
            ServerError::NotPdf(_) => "INVALID_FILE_TYPE",
            ServerError::FileTooLarge { .. } => "LIMIT_FILE_SIZE",
            ServerError::InvalidFiles(_) => "INVALID_FILES",
            ServerError::InvalidFilename => "INVALID_FILENAME",
            ServerError::NotFound => "FILE_NOT_FOUND",
            ServerError::PageOp(err) => err.code(),
            ServerError::Multipart { .. } => "MULTIPART_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short headline for the `error` field; details go in `message`
    fn headline(&self) -> String {
        match self {
            ServerError::PageOp(PageOpError::InvalidPdf(_)) => "Invalid PDF file".to_string(),
            ServerError::PageOp(err) if err.is_validation() => {
                "Invalid page specification".to_string()
            }
            ServerError::PageOp(_) => "Processing failed".to_string(),
            ServerError::FileTooLarge { .. } => "File too large".to_string(),
            ServerError::Multipart { .. } => "Failed to read upload".to_string(),
            ServerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.headline(),
            code: self.code().to_string(),
            message: self.to_string(),
            invalid_files: match self {
                ServerError::InvalidFiles(files) => Some(files),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("background task failed: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
