use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::device::{Device, DeviceInventory};
use crate::error::{Error, Result};
use crate::os::OsKind;
use crate::platform::{DeviceSink, Platform};

/// Windows backend: WMI enumeration, diskpart wiping, raw-handle writing.
pub struct WindowsPlatform;

/// Splits one `wmic diskdrive` output line into `(device_id, media_type)`.
///
/// Some driver types append extra columns after the media type; anything
/// past the second field is an opaque don't-care and ignored.
pub(crate) fn parse_diskdrive_line(line: &str) -> Option<(String, String)> {
    let mut fields = line.split_whitespace();
    let device_id = fields.next()?;
    let media_type = fields.next()?;
    Some((device_id.to_string(), media_type.to_string()))
}

fn wmic_query(columns: &str) -> Result<String> {
    let output = Command::new("wmic")
        .args(["diskdrive", "get", columns])
        .output()?;
    if !output.status.success() {
        return Err(Error::ExternalTool {
            tool: "wmic",
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Maps a device id to the disk index diskpart expects, via the WMI
/// `Index` column (the last field of the matching line).
fn find_drive_index(device: &Path) -> Result<u32> {
    let device_id = device.to_string_lossy();
    let stdout = wmic_query("DeviceID,Index")?;

    for line in stdout.lines().skip(1) {
        let line = line.trim();
        if !line.contains(&*device_id) {
            continue;
        }
        if let Some(index) = line.split_whitespace().last().and_then(|f| f.parse().ok()) {
            return Ok(index);
        }
    }

    Err(Error::ExternalTool {
        tool: "wmic",
        detail: format!("no disk index found for {device_id}"),
    })
}

impl Platform for WindowsPlatform {
    fn kind(&self) -> OsKind {
        OsKind::Windows
    }

    /// Queries WMI for the physical drives and classifies each by its
    /// `MediaType` column: exactly `Removable` means hot-pluggable.
    fn list_devices(&self) -> Result<DeviceInventory> {
        let stdout = wmic_query("DeviceID,MediaType")?;
        let mut inventory = DeviceInventory::default();

        // The first line is the column header.
        for line in stdout.lines().skip(1) {
            let Some((device_id, media_type)) = parse_diskdrive_line(line) else {
                continue;
            };
            inventory.push(Device {
                path: PathBuf::from(device_id),
                display_name: None,
                removable: media_type == "Removable",
                size_gb: None,
                mount_point: String::new(),
            });
        }

        Ok(inventory)
    }

    /// Cleans the drive with a scripted diskpart run: the disk index is
    /// looked up through WMI, then `select disk <index>` and `clean` are
    /// fed to diskpart on stdin.
    fn wipe(&self, device: &Path) -> Result<()> {
        let index = find_drive_index(device)?;
        debug!("cleaning disk {index} ({}) with diskpart", device.display());

        let script = format!("select disk {index}\nclean\n");
        let mut child = Command::new("diskpart")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        child
            .stdin
            .take()
            .ok_or_else(|| Error::ExternalTool {
                tool: "diskpart",
                detail: "stdin unavailable".to_string(),
            })?
            .write_all(script.as_bytes())?;

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::ExternalTool {
                tool: "diskpart",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("all partitions on disk {index} deleted");
        Ok(())
    }

    #[cfg(windows)]
    fn open_target(&self, device: &Path) -> Result<Box<dyn DeviceSink>> {
        Ok(Box::new(raw::RawDeviceSink::open(device)?))
    }

    #[cfg(not(windows))]
    fn open_target(&self, _device: &Path) -> Result<Box<dyn DeviceSink>> {
        Err(Error::NotImplemented {
            os: OsKind::Windows,
            operation: "raw device writing",
        })
    }
}

#[cfg(windows)]
mod raw {
    use std::ffi::OsStr;
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use windows_sys::Win32::Foundation::{
        CloseHandle, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
    };
    use windows_sys::Win32::Storage::FileSystem::{
        CreateFileW, FlushFileBuffers, OPEN_EXISTING, WriteFile,
    };

    use crate::platform::DeviceSink;

    /// Write handle to a physical drive, opened through `CreateFileW` for
    /// generic write against the existing device object.
    ///
    /// Every chunk is followed by `FlushFileBuffers`: this medium's
    /// implicit buffering guarantees are weaker than the unix page cache,
    /// and a reconnect after a mid-write unplug must not lose chunks that
    /// were already counted as written.
    pub(crate) struct RawDeviceSink {
        path: Vec<u16>,
        handle: HANDLE,
    }

    impl RawDeviceSink {
        pub(crate) fn open(device: &Path) -> io::Result<Self> {
            let path: Vec<u16> = OsStr::new(device).encode_wide().chain(Some(0)).collect();
            let handle = Self::open_handle(&path)?;
            Ok(Self { path, handle })
        }

        fn open_handle(path: &[u16]) -> io::Result<HANDLE> {
            let handle = unsafe {
                CreateFileW(
                    path.as_ptr(),
                    GENERIC_WRITE,
                    0,
                    std::ptr::null(),
                    OPEN_EXISTING,
                    0,
                    std::ptr::null_mut(),
                )
            };
            if handle == INVALID_HANDLE_VALUE {
                return Err(io::Error::last_os_error());
            }
            Ok(handle)
        }

        fn valid_handle(&self) -> io::Result<HANDLE> {
            if self.handle == INVALID_HANDLE_VALUE {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "device handle closed",
                ));
            }
            Ok(self.handle)
        }
    }

    impl DeviceSink for RawDeviceSink {
        fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
            let handle = self.valid_handle()?;
            let mut total = 0usize;
            while total < chunk.len() {
                let rest = &chunk[total..];
                let mut written: u32 = 0;
                let ok = unsafe {
                    WriteFile(
                        handle,
                        rest.as_ptr(),
                        rest.len() as u32,
                        &mut written,
                        std::ptr::null_mut(),
                    )
                };
                if ok == 0 {
                    return Err(io::Error::last_os_error());
                }
                total += written as usize;
            }
            if unsafe { FlushFileBuffers(handle) } == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn close(&mut self) {
            if self.handle != INVALID_HANDLE_VALUE {
                unsafe { CloseHandle(self.handle) };
                self.handle = INVALID_HANDLE_VALUE;
            }
        }

        fn reopen(&mut self) -> io::Result<()> {
            self.close();
            self.handle = Self::open_handle(&self.path)?;
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            let handle = self.valid_handle()?;
            if unsafe { FlushFileBuffers(handle) } == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

    impl Drop for RawDeviceSink {
        fn drop(&mut self) {
            self.close();
        }
    }
}
