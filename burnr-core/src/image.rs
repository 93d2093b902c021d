//! Chunked, memory-bounded access to a local image file.

use std::cell::OnceCell;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default streaming chunk size, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Extensions accepted by default. The check is purely lexical, on the
/// final dot-separated path segment; the file is never opened to sniff
/// content.
pub const DEFAULT_EXTENSIONS: &[&str] = &["iso", "img"];

/// Knobs for [`ImageFile::open_with`].
#[derive(Clone, Debug)]
pub struct ImageOptions {
    /// Verify the path's suffix against `allowed_extensions` before use.
    pub check_extension: bool,
    /// Size of each streamed chunk, in bytes. Must be non-zero.
    pub chunk_size: usize,
    /// Accepted image extensions, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            check_extension: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// A validated handle to a source image.
///
/// Construction only checks that the path names an existing file with an
/// acceptable extension; no file content is read. The chunk count is
/// computed from metadata on first use and memoized on the handle; it is
/// never recomputed, even if the underlying file changes mid-write (a
/// changed file during a write is undefined behavior, not handled).
#[derive(Debug)]
pub struct ImageFile {
    path: PathBuf,
    chunk_size: usize,
    total_chunks: OnceCell<u64>,
}

impl ImageFile {
    /// Opens `path` with the default options.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, ImageOptions::default())
    }

    /// Opens `path`, validating existence and (optionally) its extension.
    ///
    /// # Errors
    ///
    /// [`Error::FileNotFound`] if `path` is not an existing file,
    /// [`Error::InvalidExtension`] if the extension check is enabled and
    /// the suffix is not in `options.allowed_extensions`.
    pub fn open_with(path: impl Into<PathBuf>, options: ImageOptions) -> Result<Self> {
        let path = path.into();
        assert!(options.chunk_size > 0, "chunk size must be non-zero");

        if !fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            return Err(Error::FileNotFound { path });
        }

        if options.check_extension {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            let accepted = ext
                .as_deref()
                .is_some_and(|e| options.allowed_extensions.iter().any(|a| a == e));
            if !accepted {
                return Err(Error::InvalidExtension {
                    path,
                    allowed: options.allowed_extensions.join(", "),
                });
            }
        }

        Ok(Self {
            path,
            chunk_size: options.chunk_size,
            total_chunks: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The number of chunks the image streams as: `ceil(size / chunk_size)`.
    ///
    /// Reads the file's metadata (not its content) once; the result is
    /// memoized on the handle.
    pub fn total_chunks(&self) -> Result<u64> {
        if let Some(total) = self.total_chunks.get() {
            return Ok(*total);
        }
        let size = fs::metadata(&self.path)?.len();
        let total = size.div_ceil(self.chunk_size as u64);
        let _ = self.total_chunks.set(total);
        Ok(total)
    }

    /// Opens the file and turns the handle into a lazy chunk sequence.
    ///
    /// The sequence is finite and single-pass; streaming the image again
    /// requires opening a new handle. At most one chunk is in memory at a
    /// time, and the underlying file is closed when the sequence ends,
    /// errors, or is dropped early.
    pub fn into_chunks(self) -> Result<Chunks> {
        let file = File::open(&self.path)?;
        Ok(Chunks {
            file: Some(file),
            chunk_size: self.chunk_size,
        })
    }
}

/// Lazy iterator over the chunks of an image file.
///
/// Owns the open file; every chunk is exactly `chunk_size` bytes except
/// possibly the last. The first empty read ends the sequence for good.
#[derive(Debug)]
pub struct Chunks {
    file: Option<File>,
    chunk_size: usize,
}

impl Chunks {
    /// Reads until `buf` is full or the file ends. A short count means
    /// end-of-file.
    fn fill(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl Iterator for Chunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.file.as_mut()?;
        let mut buf = vec![0u8; self.chunk_size];
        match Self::fill(file, &mut buf) {
            // First empty read: the sequence is over, release the file.
            Ok(0) => {
                self.file = None;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(buf))
            }
            Err(e) => {
                self.file = None;
                Some(Err(e))
            }
        }
    }
}
