//! The core, UI-agnostic library for the `burnr` disk imaging utility.
//!
//! `burnr-core` is designed to be used as a library by any front-end,
//! whether it's a command-line interface (like `burnr`) or a graphical
//! user interface. It handles the complexities of device discovery,
//! chunked streaming I/O, and recovery from transient device errors,
//! across Linux, Windows, and macOS.
//!
//! The library is structured into several key modules:
//! - [`os`]: Resolves which operating system the process is driving.
//! - [`device`]: Contains the cross-platform [`Device`] record.
//! - [`image`]: Validates a source image and streams it as lazy,
//!   memory-bounded chunks.
//! - [`platform`]: One backend per operating system for discovering
//!   devices, wiping partition tables, and opening raw write handles.
//! - [`mod@write`]: The write pipeline itself, [`WriteSession`].
//!
//! The primary entry point is [`WriteSession::write_image`]. It blocks the
//! calling thread until the image is durably written, and reports progress
//! through a polled percentage rather than callbacks: an application that
//! wants a live progress display runs the session on a worker thread and
//! polls a [`ProgressHandle`] from its UI loop.
//!
//! ## Example: Writing an Image with Progress Polling
//!
//! ```rust,no_run
//! use burnr_core::{OsKind, WriteSession, platform};
//! use std::thread;
//! use std::time::Duration;
//!
//! fn main() -> burnr_core::Result<()> {
//!     let os = OsKind::resolve(None)?;
//!
//!     let devices = platform::list_devices(os, false)?;
//!     let target = devices.first().expect("No removable devices found.");
//!
//!     let mut session = WriteSession::with_os(&target.path, "path/to/image.img", os);
//!     let progress = session.progress_handle();
//!
//!     println!("Starting write...");
//!
//!     let writer = thread::spawn(move || session.write_image());
//!     while !writer.is_finished() {
//!         println!("{}% written", progress.percent());
//!         thread::sleep(Duration::from_millis(500));
//!     }
//!     writer.join().expect("writer thread panicked")?;
//!
//!     println!("Write complete!");
//!
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod image;
pub mod os;
mod os_options;
pub mod platform;
pub mod write;

pub use device::{Device, DeviceInventory};
pub use error::{Error, Result};
pub use image::{ImageFile, ImageOptions};
pub use os::OsKind;
pub use write::{ProgressHandle, WriteSession};
