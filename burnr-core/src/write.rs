//! Contains the logic for writing an image file to a device.
//!
//! [`WriteSession`] binds a target device to a source image and drives the
//! write to completion on the calling thread: wipe the partition table,
//! stream the image chunk by chunk, then flush. Progress is exposed as a
//! polled percentage; there is no callback surface and no internal
//! parallelism. Callers that want a progress UI run the session on a
//! worker thread and poll a [`ProgressHandle`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::image::{ImageFile, ImageOptions};
use crate::os::OsKind;
use crate::platform::{self, DeviceSink, Platform};

/// How long to wait before reopening a disconnected device.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A cloneable view of a session's write progress, safe to poll from
/// another thread while the session is writing.
#[derive(Clone, Debug)]
pub struct ProgressHandle(Arc<AtomicU8>);

impl ProgressHandle {
    /// Percentage of the image written so far, 0–100. Reads 100 only once
    /// every chunk has reached stable storage.
    pub fn percent(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }
}

/// One image-to-device write.
///
/// The session owns the device path, the image path, and the progress
/// counter, and is the single source of truth for how far along the write
/// is. Progress is monotonically non-decreasing within one
/// [`write_image`](Self::write_image) call and resets only when a new
/// session is constructed.
pub struct WriteSession {
    device_path: PathBuf,
    image_path: PathBuf,
    image_options: ImageOptions,
    backend: Box<dyn Platform>,
    progress: Arc<AtomicU8>,
}

impl WriteSession {
    /// Binds `device` and `image` on the host operating system.
    pub fn new(device: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_os(device, image, OsKind::resolve(None)?))
    }

    /// Binds `device` and `image` for an explicitly chosen OS.
    pub fn with_os(device: impl Into<PathBuf>, image: impl Into<PathBuf>, os: OsKind) -> Self {
        Self::with_backend(device, image, platform::backend_for(os))
    }

    /// Binds `device` and `image` to an arbitrary backend. This is the
    /// seam for substituting a fake platform under test.
    pub fn with_backend(
        device: impl Into<PathBuf>,
        image: impl Into<PathBuf>,
        backend: Box<dyn Platform>,
    ) -> Self {
        Self {
            device_path: device.into(),
            image_path: image.into(),
            image_options: ImageOptions::default(),
            backend,
            progress: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Overrides how the image is opened (chunk size, extension check).
    pub fn with_image_options(mut self, options: ImageOptions) -> Self {
        self.image_options = options;
        self
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// The operating system this session writes through.
    pub fn os(&self) -> OsKind {
        self.backend.kind()
    }

    /// Percentage of the image written so far, 0–100.
    pub fn progress_percent(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// A cloneable handle for polling progress from another thread.
    pub fn progress_handle(&self) -> ProgressHandle {
        ProgressHandle(self.progress.clone())
    }

    /// Writes the image onto the device: wipe, stream, flush.
    ///
    /// Blocks until every chunk is durably on the device or a fatal error
    /// occurs. A failed wipe is logged and does not block the write; a
    /// disconnected device is reopened and the write resumed for as long
    /// as the condition recurs. The device handle is closed on every exit
    /// path.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The image file does not exist or fails the extension check.
    /// - The device cannot be opened for writing.
    /// - The device denies a write ([`Error::PermissionDenied`], which is
    ///   fatal and never retried).
    /// - Any other I/O error occurs during streaming or the final sync.
    pub fn write_image(&mut self) -> Result<()> {
        let image = ImageFile::open_with(&self.image_path, self.image_options.clone())?;
        // Fixed before the first byte is streamed, never recomputed.
        let total_chunks = image.total_chunks()?;

        // Best-effort wipe: some devices take a fresh image fine without
        // one, so a failing partitioning tool is not a reason to stop.
        if let Err(e) = self.backend.wipe(&self.device_path) {
            error!(
                "wipe of {} failed, continuing: {e}",
                self.device_path.display()
            );
        }

        debug!(
            "writing {} to {} in {total_chunks} chunks",
            self.image_path.display(),
            self.device_path.display()
        );

        let mut sink = self
            .backend
            .open_target(&self.device_path)
            .map_err(|e| match e {
                Error::Io(source) if source.kind() == io::ErrorKind::PermissionDenied => {
                    Error::PermissionDenied {
                        path: self.device_path.clone(),
                        source,
                    }
                }
                other => other,
            })?;

        let mut written: u64 = 0;
        for chunk in image.into_chunks()? {
            let chunk = chunk?;
            self.write_chunk_with_retry(sink.as_mut(), &chunk)?;
            written += 1;
            self.progress
                .store(percent_of(written, total_chunks), Ordering::Relaxed);
        }

        debug!("flushing {}", self.device_path.display());
        sink.sync()?;
        drop(sink);

        // 100 means every chunk is on stable storage.
        self.progress.store(100, Ordering::Relaxed);
        info!(
            "image written successfully to {}",
            self.device_path.display()
        );
        Ok(())
    }

    /// Writes one chunk, riding out device disconnects.
    ///
    /// A disconnect closes the stale handle, waits [`RECONNECT_DELAY`],
    /// reopens, and retries the same chunk (none skipped, none written
    /// twice), as often as the condition recurs. Permission
    /// errors and anything unrecognized are fatal.
    fn write_chunk_with_retry(&self, sink: &mut dyn DeviceSink, chunk: &[u8]) -> Result<()> {
        loop {
            let err = match sink.write_chunk(chunk) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if err.kind() == io::ErrorKind::PermissionDenied {
                return Err(Error::PermissionDenied {
                    path: self.device_path.clone(),
                    source: err,
                });
            }
            if !is_disconnect(&err) {
                return Err(err.into());
            }

            warn!(
                "{} disconnected, reconnecting: {err}",
                self.device_path.display()
            );
            sink.close();
            loop {
                thread::sleep(RECONNECT_DELAY);
                match sink.reopen() {
                    Ok(()) => break,
                    // Still gone, or the device node has not come back yet.
                    Err(e) if is_disconnect(&e) || e.kind() == io::ErrorKind::NotFound => {
                        debug!("{} still absent: {e}", self.device_path.display());
                    }
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        return Err(Error::PermissionDenied {
                            path: self.device_path.clone(),
                            source: e,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

/// `floor(written / total * 100)`, held below 100 until the final sync
/// lands.
fn percent_of(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (((written * 100) / total) as u8).min(99)
}

/// Whether `err` means the device went away (unplugged mid-write). These
/// are the recoverable errors; everything else is fatal.
fn is_disconnect(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotConnected {
        return true;
    }
    match err.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::ENODEV || code == libc::ENXIO,
        // ERROR_NO_SUCH_DEVICE: raised when the drive vanishes under an
        // open handle.
        #[cfg(windows)]
        Some(code) => code == 433,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}
