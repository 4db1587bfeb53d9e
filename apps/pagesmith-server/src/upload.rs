//! Multipart upload handling
//!
//! File parts are streamed chunk by chunk into the temp directory and checked
//! against the route's limits as they arrive. Text parts are kept in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart};
use tokio::io::AsyncWriteExt;

use crate::error::ServerError;
use crate::janitor::Janitor;
use crate::storage::Storage;

const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf", "application/octet-stream"];

/// Limits for one route's uploads
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub file_field: &'static str,
    pub max_files: usize,
    pub max_file_size: u64,
}

/// A stored upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Trimmed text field value; blank values count as missing
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Read a whole multipart body. On any error, files already stored are deleted.
pub async fn read_upload(
    multipart: &mut Multipart,
    storage: &Storage,
    janitor: &Janitor,
    rules: &UploadRules,
) -> Result<UploadForm, ServerError> {
    let mut form = UploadForm::default();

    match read_fields(multipart, storage, rules, &mut form).await {
        Ok(()) => {
            tracing::debug!(
                files = form.files.len(),
                fields = form.fields.len(),
                "Upload received"
            );
            Ok(form)
        }
        Err(e) => {
            janitor.remove_now(&form.paths()).await;
            Err(e)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    storage: &Storage,
    rules: &UploadRules,
    form: &mut UploadForm,
) -> Result<(), ServerError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        let Some(original_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await?;
            form.fields.insert(name, value);
            continue;
        };

        if name != rules.file_field {
            return Err(ServerError::UnexpectedField(name));
        }
        if form.files.len() >= rules.max_files {
            return Err(ServerError::TooManyFiles {
                max: rules.max_files,
            });
        }
        if !is_pdf_upload(field.content_type(), &original_name) {
            return Err(ServerError::NotPdf(original_name));
        }

        let path = storage.upload_path();
        let size = match stream_to_file(field, &path, rules.max_file_size).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        tracing::debug!(name = %original_name, size, path = %path.display(), "Stored upload");
        form.files.push(UploadedFile {
            original_name,
            path,
            size,
        });
    }

    Ok(())
}

async fn stream_to_file(
    mut field: Field<'_>,
    path: &Path,
    max_size: u64,
) -> Result<u64, ServerError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_size {
            return Err(ServerError::FileTooLarge {
                limit: format_size(max_size),
            });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

/// PDF by declared content type or by `.pdf` extension
fn is_pdf_upload(content_type: Option<&str>, file_name: &str) -> bool {
    let type_ok = content_type
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim();
            ALLOWED_CONTENT_TYPES
                .iter()
                .any(|allowed| essence.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    let extension_ok = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    type_ok || extension_ok
}

fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}
