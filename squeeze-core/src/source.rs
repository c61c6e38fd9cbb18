//! Input file handles and chunked loading.
//!
//! A [`SourceFile`] is what a user picked: a name, the declared MIME type and
//! readable content, either on disk or already in memory. Compressors read it
//! in chunks so loading can report progress.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CoreResult;
use crate::progress::{LOADING_WEIGHT, PHASE_LOADING, ProgressReporter};
use crate::utils::base_mime;

#[derive(Debug, Clone)]
enum SourceContent {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A user-selected file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    len: u64,
    content: SourceContent,
}

impl SourceFile {
    /// Opens a file on disk. The name is taken from the last path component.
    pub fn from_path(path: &Path, mime_type: impl Into<String>) -> CoreResult<Self> {
        let len = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime_type: mime_type.into(),
            len,
            content: SourceContent::Path(path.to_path_buf()),
        })
    }

    /// Wraps bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            len: bytes.len() as u64,
            content: SourceContent::Memory(bytes),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared MIME type as given by the caller.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The declared MIME type without parameters, lower-cased.
    #[must_use]
    pub fn base_mime(&self) -> String {
        base_mime(&self.mime_type)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens a fresh reader positioned at the start of the content.
    pub fn open(&self) -> CoreResult<Box<dyn Read + Send>> {
        Ok(match &self.content {
            SourceContent::Path(path) => Box::new(File::open(path)?),
            SourceContent::Memory(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
        })
    }

    /// Reads up to `n` leading bytes, for format sniffing.
    pub fn head(&self, n: usize) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(n);
        self.open()?.take(n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Reads the whole content in `chunk_size` chunks, reporting
    /// "loading input" progress in `[0, LOADING_WEIGHT]`.
    pub fn read_all(
        &self,
        chunk_size: usize,
        progress: &mut ProgressReporter<'_>,
    ) -> CoreResult<Vec<u8>> {
        let mut reader = self.open()?;
        let mut out = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        let mut chunk = vec![0u8; chunk_size.max(1)];
        let total = self.len.max(1) as f64;

        progress.update(0.0, PHASE_LOADING);
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            let done = (out.len() as f64 / total).min(1.0);
            progress.update(done * LOADING_WEIGHT, PHASE_LOADING);
        }
        Ok(out)
    }
}
