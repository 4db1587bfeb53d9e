//! API handlers for the pagesmith server
//!
//! Provides REST endpoints for:
//! - Merging uploaded PDFs
//! - Splitting a PDF (at pages, by ranges, into single pages)
//! - Removing pages from a PDF
//! - Inspecting a PDF
//! - Downloading stored results

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{Multipart, Path as UrlPath, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use pagesmith_core::{
    Job, OutputSummary, PageCommand, PageOpError, ProcessMetrics, SourceDocument, SplitMode,
};
use serde::Serialize;
use tracing::info;

use crate::config::{MAX_MERGE_FILES, MIN_MERGE_FILES};
use crate::error::{InvalidFile, ServerError};
use crate::state::AppState;
use crate::storage::{ResultKind, Storage};
use crate::upload::{read_upload, UploadForm, UploadRules, UploadedFile};

/// Feature flags reported by `/health`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub merge: bool,
    pub split_at_pages: bool,
    pub extract_ranges: bool,
    pub split_individual: bool,
    pub remove_pages: bool,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub temp_dir_exists: bool,
    pub max_file_size: String,
    pub features: Features,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let temp_dir_exists = tokio::fs::metadata(state.storage.root())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    Json(HealthResponse {
        success: true,
        status: "healthy",
        service: "pagesmith-server",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        temp_dir_exists,
        max_file_size: state.config.max_file_size_label.clone(),
        features: Features {
            merge: true,
            split_at_pages: true,
            extract_ranges: true,
            split_individual: true,
            remove_pages: true,
        },
    })
}

/// Metadata for one merge input
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeFileInfo {
    pub filename: String,
    pub page_count: u32,
    pub file_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub total_files: usize,
    pub total_pages: u32,
    pub output_file_size: u64,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub success: bool,
    pub message: &'static str,
    pub filename: String,
    pub download_url: String,
    pub file_info: Vec<MergeFileInfo>,
    pub merge_result: MergeResult,
}

/// Metadata for a single-file upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileInfo {
    pub original_name: String,
    pub original_size: u64,
    pub original_pages: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    pub operation_type: &'static str,
    pub total_files: usize,
    pub files: Vec<OutputSummary>,
    pub output_file_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub success: bool,
    pub message: &'static str,
    pub filename: String,
    pub download_url: String,
    pub file_info: SourceFileInfo,
    pub split_result: SplitResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalResult {
    pub removed_pages: Vec<u32>,
    pub removed_count: usize,
    pub remaining_count: u32,
    pub output_file_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalResponse {
    pub success: bool,
    pub message: &'static str,
    pub filename: String,
    pub download_url: String,
    pub file_info: SourceFileInfo,
    pub removal_result: RemovalResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfoResponse {
    pub success: bool,
    pub filename: String,
    pub page_count: u32,
    pub file_size: u64,
    pub version: String,
}

/// Handler: POST /api/merge-pdf
pub async fn handle_merge(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<MergeResponse>, ServerError> {
    let rules = UploadRules {
        file_field: "pdfs",
        max_files: MAX_MERGE_FILES,
        max_file_size: state.config.max_file_size,
    };
    let form = read_upload(&mut multipart, &state.storage, &state.janitor, &rules).await?;
    info!(files = form.files.len(), "Merge request received");

    let storage = state.storage.clone();
    let files = form.files.clone();
    let (filename, file_info, metrics) = run_blocking(&state, &form, move || {
        if files.is_empty() {
            return Err(ServerError::NoFiles);
        }
        if files.len() < MIN_MERGE_FILES {
            return Err(ServerError::TooFewFiles {
                min: MIN_MERGE_FILES,
                actual: files.len(),
            });
        }

        // Open every file before reporting, so all bad files are listed together
        let mut sources = Vec::with_capacity(files.len());
        let mut invalid = Vec::new();
        for file in &files {
            match open_upload(file) {
                Ok(source) => sources.push(source),
                Err(e) => invalid.push(InvalidFile {
                    filename: file.original_name.clone(),
                    error: e.to_string(),
                }),
            }
        }
        if !invalid.is_empty() {
            return Err(ServerError::InvalidFiles(invalid));
        }

        let file_info: Vec<MergeFileInfo> = files
            .iter()
            .zip(&sources)
            .map(|(file, source)| MergeFileInfo {
                filename: file.original_name.clone(),
                page_count: source.page_count(),
                file_size: file.size,
            })
            .collect();

        let job = Job::prepare(PageCommand::Merge, sources)?;
        let filename = Storage::result_name("merged", job.file_extension());
        let output = storage.result_path(&filename);
        let metrics = job.write_to_path(&output)?;

        Ok(Completed {
            output: Some(output),
            body: (filename, file_info, metrics),
        })
    })
    .await?;

    let total_pages = file_info.iter().map(|f| f.page_count).sum();
    Ok(Json(MergeResponse {
        success: true,
        message: "PDFs merged successfully",
        download_url: download_url(&headers, ResultKind::Merge, &filename),
        filename,
        merge_result: MergeResult {
            total_files: file_info.len(),
            total_pages,
            output_file_size: metrics.output_size_bytes,
            processing_time_ms: metrics.processing_time_ms,
        },
        file_info,
    }))
}

/// Handler: POST /api/split-pdf
pub async fn handle_split(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SplitResponse>, ServerError> {
    let form = read_single_pdf(&state, &mut multipart).await?;

    let split_type = form.text("splitType").map(str::to_string);
    let split_points = form.text("splitPoints").map(str::to_string);
    let page_ranges = form.text("pageRanges").map(str::to_string);
    info!(split_type = ?split_type, "Split request received");

    let storage = state.storage.clone();
    let files = form.files.clone();
    let (filename, file_info, split_result) = run_blocking(&state, &form, move || {
        let file = single_file(&files)?;
        let split_type = split_type
            .ok_or_else(|| ServerError::InvalidRequest("No split type specified".into()))?;
        let mode: SplitMode = split_type.parse().map_err(ServerError::InvalidRequest)?;

        let (command, prefix, operation_type) = match mode {
            SplitMode::AtPages => {
                let points = split_points.ok_or_else(|| {
                    ServerError::InvalidRequest("No split points specified".into())
                })?;
                (PageCommand::SplitAtPoints { points }, "split-pdf", "split")
            }
            SplitMode::ExtractRanges => {
                let ranges = page_ranges.ok_or_else(|| {
                    ServerError::InvalidRequest("No page ranges specified".into())
                })?;
                (
                    PageCommand::ExtractRanges { ranges },
                    "extracted-pages",
                    "extract",
                )
            }
            SplitMode::Individual => (
                PageCommand::SplitIndividual,
                "individual-pages",
                "individual",
            ),
        };

        let source = open_upload(file)?;
        let file_info = source_file_info(file, &source);
        let job = Job::prepare(command, vec![source])?;
        let summary = job.summary();

        let filename = Storage::result_name(prefix, job.file_extension());
        let output = storage.result_path(&filename);
        let metrics = job.write_to_path(&output)?;

        Ok(Completed {
            output: Some(output),
            body: (
                filename,
                file_info,
                SplitResult {
                    operation_type,
                    total_files: summary.output_count,
                    files: summary.outputs,
                    output_file_size: metrics.output_size_bytes,
                },
            ),
        })
    })
    .await?;

    Ok(Json(SplitResponse {
        success: true,
        message: "PDF split successfully",
        download_url: download_url(&headers, ResultKind::Split, &filename),
        filename,
        file_info,
        split_result,
    }))
}

/// Handler: POST /api/remove-pages
pub async fn handle_remove_pages(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<RemovalResponse>, ServerError> {
    let form = read_single_pdf(&state, &mut multipart).await?;
    let pages = form.text("pages").map(str::to_string);
    info!(pages = ?pages, "Remove pages request received");

    let storage = state.storage.clone();
    let files = form.files.clone();
    let (filename, file_info, removal_result) = run_blocking(&state, &form, move || {
        let file = single_file(&files)?;
        let pages = pages.ok_or_else(|| {
            ServerError::InvalidRequest("No pages specified for removal".into())
        })?;

        let source = open_upload(file)?;
        let file_info = source_file_info(file, &source);
        let job = Job::prepare(PageCommand::RemovePages { pages }, vec![source])?;
        let removed_pages = removed_pages(&job);

        let filename = Storage::result_name("removed-pages", job.file_extension());
        let output = storage.result_path(&filename);
        let metrics: ProcessMetrics = job.write_to_path(&output)?;

        Ok(Completed {
            output: Some(output),
            body: (
                filename,
                file_info,
                RemovalResult {
                    removed_count: removed_pages.len(),
                    removed_pages,
                    remaining_count: metrics.page_count,
                    output_file_size: metrics.output_size_bytes,
                },
            ),
        })
    })
    .await?;

    Ok(Json(RemovalResponse {
        success: true,
        message: "Pages removed successfully",
        download_url: download_url(&headers, ResultKind::RemovePages, &filename),
        filename,
        file_info,
        removal_result,
    }))
}

/// Handler: POST /api/pdf-info
pub async fn handle_pdf_info(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PdfInfoResponse>, ServerError> {
    let form = read_single_pdf(&state, &mut multipart).await?;
    let files = form.files.clone();

    let response = run_blocking(&state, &form, move || {
        let file = single_file(&files)?;
        let info = open_upload(file)?.info();
        Ok(Completed {
            output: None,
            body: PdfInfoResponse {
                success: true,
                filename: info.name,
                page_count: info.page_count,
                file_size: file.size,
                version: info.version,
            },
        })
    })
    .await?;

    Ok(Json(response))
}

/// Handler: GET /api/merge-pdf/download/:filename
pub async fn handle_download_merged(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ServerError> {
    serve_result(&state, ResultKind::Merge, &filename).await
}

/// Handler: GET /api/split-pdf/download/:filename
pub async fn handle_download_split(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ServerError> {
    serve_result(&state, ResultKind::Split, &filename).await
}

/// Handler: GET /api/remove-pages/download/:filename
pub async fn handle_download_removed(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ServerError> {
    serve_result(&state, ResultKind::RemovePages, &filename).await
}

async fn serve_result(
    state: &AppState,
    kind: ResultKind,
    filename: &str,
) -> Result<Response, ServerError> {
    let path = state.storage.resolve_download(kind, filename).await?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        // Expired between the lookup and the read
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ServerError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let content_type = match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("zip") => "application/zip",
        _ => "application/pdf",
    };

    info!(filename, bytes = bytes.len(), "Serving result");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Result of blocking work: the response body plus the result file it wrote
struct Completed<T> {
    output: Option<PathBuf>,
    body: T,
}

/// Run PDF work off the async runtime.
///
/// Uploaded inputs are deleted whatever the outcome; a result file is kept
/// for download until the janitor's delay expires.
async fn run_blocking<T, F>(state: &AppState, form: &UploadForm, work: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<Completed<T>, ServerError> + Send + 'static,
{
    let result = match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(e.into()),
    };

    state.janitor.remove_now(&form.paths()).await;

    let completed = result?;
    if let Some(output) = completed.output {
        state.janitor.schedule_removal(output);
    }
    Ok(completed.body)
}

async fn read_single_pdf(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<UploadForm, ServerError> {
    let rules = UploadRules {
        file_field: "pdf",
        max_files: 1,
        max_file_size: state.config.max_file_size,
    };
    read_upload(multipart, &state.storage, &state.janitor, &rules).await
}

fn single_file(files: &[UploadedFile]) -> Result<&UploadedFile, ServerError> {
    files.first().ok_or(ServerError::NoFiles)
}

/// Open a stored upload under its client-side name
fn open_upload(file: &UploadedFile) -> Result<SourceDocument, PageOpError> {
    let bytes = std::fs::read(&file.path)?;
    SourceDocument::open(&bytes, file.original_name.clone())
}

fn source_file_info(file: &UploadedFile, source: &SourceDocument) -> SourceFileInfo {
    SourceFileInfo {
        original_name: file.original_name.clone(),
        original_size: file.size,
        original_pages: source.page_count(),
    }
}

/// 1-based page numbers missing from a remove-pages job's output
fn removed_pages(job: &Job) -> Vec<u32> {
    let kept: BTreeSet<u32> = job
        .plan()
        .entries()
        .iter()
        .flat_map(|entry| entry.pages.iter().map(|p| p.index + 1))
        .collect();
    (1..=job.original_pages())
        .filter(|page| !kept.contains(page))
        .collect()
}

/// Absolute URL when the request named its host, otherwise a path.
///
/// A proxy's `X-Forwarded-Proto`/`X-Forwarded-Host` win over the direct
/// connection so URLs stay correct behind TLS termination.
fn download_url(headers: &HeaderMap, kind: ResultKind, filename: &str) -> String {
    let path = format!("{}/{}", kind.download_route(), filename);
    let host = forwarded(headers, "x-forwarded-host")
        .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()));
    let scheme = match forwarded(headers, "x-forwarded-proto") {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    match host {
        Some(host) => format!("{}://{}{}", scheme, host, path),
        None => path,
    }
}

/// First entry of a comma-separated forwarding header
fn forwarded<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
