//! The error taxonomy shared across the library.

use std::io;
use std::path::PathBuf;

use crate::os::OsKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while enumerating devices or writing an
/// image.
///
/// Device disconnects do not appear here: they are recovered inside the
/// write loop (close, wait, reopen, resume) and never surface to callers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The image path does not resolve to an existing file.
    #[error("image file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The image path's suffix is not an accepted image extension.
    #[error("'{}' does not look like a raw disk image (expected one of: {allowed})", path.display())]
    InvalidExtension { path: PathBuf, allowed: String },

    /// The host reported a platform outside Linux, Windows, and macOS.
    #[error("unsupported operating system: {name}")]
    UnsupportedOs { name: String },

    /// No probing mechanism could identify the host platform.
    #[error("unable to detect the host operating system")]
    OsDetectionFailed,

    /// The requested backend operation has no implementation in this build.
    #[error("{operation} is not implemented for {os}")]
    NotImplemented { os: OsKind, operation: &'static str },

    /// The device refused the write. Fatal: needs elevated privileges or
    /// an unlocked device, not a retry.
    #[error("permission denied while writing to {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external partitioning tool exited unsuccessfully.
    #[error("{tool} failed: {detail}")]
    ExternalTool { tool: &'static str, detail: String },

    /// Any other I/O failure, surfaced verbatim.
    #[error(transparent)]
    Io(#[from] io::Error),
}
