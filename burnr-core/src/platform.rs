//! Provides platform-specific functionality.
//!
//! This module contains the logic for interacting with the operating system
//! to perform the tasks that are not cross-platform: discovering removable
//! block devices, clearing a device's partition table with the platform's
//! partitioning tool, and opening a device for raw writing.
//!
//! Each operating system gets one [`Platform`] implementation. A backend is
//! selected once, when a session is constructed, instead of branching on
//! the OS at every call site; the trait seam also lets tests substitute a
//! fake backend for the whole pipeline.

mod linux;
mod macos;
mod windows;

pub use self::linux::LinuxPlatform;
pub use self::macos::MacOsPlatform;
pub use self::windows::WindowsPlatform;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::device::{Device, DeviceInventory};
use crate::error::Result;
use crate::os::OsKind;
use crate::os_options::{EXCLUSIVE_OPEN, OpenOptionsExt};

/// OS-specific operations needed by the write pipeline.
pub trait Platform: Send {
    /// The operating system this backend drives.
    fn kind(&self) -> OsKind;

    /// Enumerates the block devices currently attached to the host,
    /// partitioned into removable and fixed sets.
    fn list_devices(&self) -> Result<DeviceInventory>;

    /// Clears the partition table of `device` with the platform's
    /// partitioning tool.
    fn wipe(&self, device: &Path) -> Result<()>;

    /// Opens `device` for raw, exclusive writing.
    fn open_target(&self, device: &Path) -> Result<Box<dyn DeviceSink>>;
}

/// An open write handle to a block device.
///
/// Implementations own the handle; dropping a sink closes it, so no handle
/// outlives the streaming scope on any exit path.
pub trait DeviceSink {
    /// Writes one chunk in full.
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Closes the (possibly stale) handle without syncing. Writing again
    /// requires [`reopen`](Self::reopen).
    fn close(&mut self);

    /// Opens a fresh handle to the same device after a [`close`](Self::close).
    fn reopen(&mut self) -> io::Result<()>;

    /// Forces buffered writes down to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

/// Constructs the backend for `os`.
pub fn backend_for(os: OsKind) -> Box<dyn Platform> {
    match os {
        OsKind::Linux => Box::new(LinuxPlatform),
        OsKind::Windows => Box::new(WindowsPlatform),
        OsKind::MacOs => Box::new(MacOsPlatform),
    }
}

/// Enumerates block devices for `os`. When `show_all` is false only
/// removable devices are returned; otherwise removable devices come first,
/// followed by fixed ones.
pub fn list_devices(os: OsKind, show_all: bool) -> Result<Vec<Device>> {
    Ok(backend_for(os).list_devices()?.into_list(show_all))
}

/// The plain-file sink shared by the Linux and macOS backends: standard
/// buffered device writes, with one explicit durability sync at the end of
/// the stream.
pub(crate) struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(Self::open_device(path)?),
        })
    }

    fn open_device(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(EXCLUSIVE_OPEN)
            .open(path)
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device handle closed"))
    }
}

impl DeviceSink for FileSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.handle()?.write_all(chunk)
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.file = None;
        self.file = Some(Self::open_device(&self.path)?);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let file = self.handle()?;
        file.flush()?;
        file.sync_all()
    }
}
