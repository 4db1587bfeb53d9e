//! Runtime configuration for the pagesmith server

use std::path::PathBuf;
use std::time::Duration;

/// Upload size used when `FILE_SIZE_LIMIT` is missing or malformed
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Most files accepted by a single merge request
pub const MAX_MERGE_FILES: usize = 20;

/// Fewest files a merge request must carry
pub const MIN_MERGE_FILES: usize = 2;

/// Parse a size string such as `"50MB"`, `"512KB"` or `"1GB"`.
///
/// Units are case-insensitive and binary (1KB = 1024 bytes). Returns `None`
/// for anything that is not `<digits><unit>`.
pub fn parse_size(input: &str) -> Option<u64> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = input.split_at(split);
    if digits.is_empty() {
        return None;
    }

    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where uploads and results are stored
    pub temp_dir: PathBuf,
    /// Per-file upload limit in bytes
    pub max_file_size: u64,
    /// The limit as configured, reported by `/health`
    pub max_file_size_label: String,
    /// How long a result stays downloadable
    pub cleanup_delay: Duration,
    /// Browser origins allowed by CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Build a config from a raw `FILE_SIZE_LIMIT` value, falling back to 50MB
    pub fn new(temp_dir: PathBuf, file_size_limit: &str, cleanup_delay: Duration) -> Self {
        let (max_file_size, max_file_size_label) = match parse_size(file_size_limit) {
            Some(size) => (size, file_size_limit.trim().to_string()),
            None => {
                tracing::warn!(
                    value = file_size_limit,
                    "Unrecognized FILE_SIZE_LIMIT, using 50MB"
                );
                (DEFAULT_MAX_FILE_SIZE, "50MB".to_string())
            }
        };

        Self {
            temp_dir,
            max_file_size,
            max_file_size_label,
            cleanup_delay,
            allowed_origins: Vec::new(),
        }
    }

    pub fn with_allowed_origins(mut self, origins: &str) -> Self {
        self.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Request body ceiling: a full merge upload plus room for form fields
    pub fn body_limit(&self) -> usize {
        let files = self.max_file_size.saturating_mul(MAX_MERGE_FILES as u64);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }
}
