//! Temp-directory storage for uploads and results
//!
//! Every stored file gets a generated name, so client-supplied file names
//! never reach the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ServerError;

/// Which route produced a result, and so which stored files it may serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Merge,
    Split,
    RemovePages,
}

impl ResultKind {
    /// File name prefixes this route writes
    fn prefixes(self) -> &'static [&'static str] {
        match self {
            ResultKind::Merge => &["merged-"],
            ResultKind::Split => &["split-pdf-", "extracted-pages-", "individual-pages-"],
            ResultKind::RemovePages => &["removed-pages-"],
        }
    }

    /// Base path of the route's download endpoint
    pub fn download_route(self) -> &'static str {
        match self {
            ResultKind::Merge => "/api/merge-pdf/download",
            ResultKind::Split => "/api/split-pdf/download",
            ResultKind::RemovePages => "/api/remove-pages/download",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: Arc<PathBuf>,
}

impl Storage {
    /// Use `root` as the temp directory, creating it if needed
    pub async fn open(root: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(path = %root.display(), "Using temp directory");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh path for an incoming upload
    pub fn upload_path(&self) -> PathBuf {
        self.root
            .join(format!("upload-{}.pdf", uuid::Uuid::new_v4()))
    }

    /// Fresh result file name such as `merged-<uuid>.pdf`
    pub fn result_name(prefix: &str, extension: &str) -> String {
        format!("{}-{}.{}", prefix, uuid::Uuid::new_v4(), extension)
    }

    pub fn result_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Map a requested download name to a stored result of `kind`.
    ///
    /// Names with path separators or `..` are rejected outright; names that are
    /// not results of this route are treated as missing.
    pub async fn resolve_download(
        &self,
        kind: ResultKind,
        filename: &str,
    ) -> Result<PathBuf, ServerError> {
        if filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(ServerError::InvalidFilename);
        }

        if !kind.prefixes().iter().any(|p| filename.starts_with(p)) {
            return Err(ServerError::NotFound);
        }

        let path = self.root.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ServerError::NotFound),
        }
    }
}
