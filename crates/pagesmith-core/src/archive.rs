//! Zip packaging for multi-document results
//!
//! Documents are streamed into the archive one at a time; the writer never
//! holds more than the current document plus the zip encoder's buffer.

use crate::assemble::OutputDocument;
use crate::error::{PageOpError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Streams named PDFs into a zip container
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: HashSet<String>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            names: HashSet::new(),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
        }
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Add one document under its planned file name
    pub fn append(&mut self, document: &OutputDocument) -> Result<()> {
        if !self.names.insert(document.filename.clone()) {
            return Err(PageOpError::Archive(format!(
                "duplicate entry '{}'",
                document.filename
            )));
        }

        self.zip
            .start_file(document.filename.as_str(), self.options)?;
        self.zip.write_all(&document.bytes)?;

        tracing::debug!(entry = %document.filename, bytes = document.bytes.len(), "Added to archive");
        Ok(())
    }

    /// Write the central directory and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

/// Stream `documents` into a zip at `target`.
///
/// The first error stops packaging; the partially written file is removed and
/// nothing is left at `target`.
pub fn package_to_path<I>(target: &Path, documents: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<OutputDocument>>,
{
    write_atomically(target, |file| {
        let mut archive = ArchiveWriter::new(file);
        for document in documents {
            archive.append(&document?)?;
        }
        let entries = archive.len();
        archive.finish()?.flush()?;
        tracing::info!(path = %target.display(), entries, "Archive written");
        Ok(())
    })
}

/// Write through `write` into `<target>.part`, renaming into place only on success.
/// Returns the size of the finished file.
pub(crate) fn write_atomically<F>(target: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let partial = partial_path(target);

    let result = (|| -> Result<u64> {
        let mut file = BufWriter::new(File::create(&partial)?);
        write(&mut file)?;
        file.flush()?;
        drop(file);
        std::fs::rename(&partial, target)?;
        Ok(std::fs::metadata(target)?.len())
    })();

    if result.is_err() {
        if let Err(e) = std::fs::remove_file(&partial) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial output");
            }
        }
    }

    result
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
