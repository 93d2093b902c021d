use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::device::{Device, DeviceInventory};
use crate::error::{Error, Result};
use crate::os::OsKind;
use crate::platform::{DeviceSink, FileSink, Platform};

/// macOS backend: diskutil enumeration and wiping, plain-file writing.
pub struct MacOsPlatform;

fn diskutil(args: &[&str]) -> Result<String> {
    let output = Command::new("diskutil").args(args).output()?;
    if !output.status.success() {
        return Err(Error::ExternalTool {
            tool: "diskutil",
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extracts the whole-disk paths (`/dev/diskN`) from `diskutil list` output.
fn parse_disk_paths(listing: &str) -> Vec<PathBuf> {
    listing
        .lines()
        .filter(|l| l.starts_with("/dev/disk"))
        .filter_map(|l| l.split_whitespace().next())
        .map(PathBuf::from)
        .collect()
}

/// Parses `diskutil info` output into a key/value map. Keys and values are
/// whitespace-trimmed; lines without a colon are skipped.
fn parse_info(info: &str) -> HashMap<String, String> {
    info.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Pulls the byte count out of diskutil's `Disk Size` value, which looks
/// like `15.5 GB (15523119104 Bytes) (exactly 30318592 512-Byte-Units)`.
fn parse_size_gb(value: &str) -> Option<f64> {
    let start = value.find('(')? + 1;
    let rest = &value[start..];
    let end = rest.find(" Bytes")?;
    let bytes: u64 = rest[..end].trim().parse().ok()?;
    Some(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Disk images attach as virtual whole-disks; they are not writable media.
fn is_virtual(info: &HashMap<String, String>) -> bool {
    info.get("Virtual").is_some_and(|v| v == "Yes")
        || info.get("Protocol").is_some_and(|v| v == "Disk Image")
}

impl Platform for MacOsPlatform {
    fn kind(&self) -> OsKind {
        OsKind::MacOs
    }

    /// Lists whole disks with `diskutil list`, then queries each with
    /// `diskutil info` for its media name, removable flag, and size.
    ///
    /// Disk-image-backed (virtual) devices are excluded. A failed
    /// per-device query degrades that device's metadata instead of
    /// aborting the listing.
    fn list_devices(&self) -> Result<DeviceInventory> {
        let listing = diskutil(&["list"])?;
        let mut inventory = DeviceInventory::default();

        for path in parse_disk_paths(&listing) {
            let info = match diskutil(&["info", &path.to_string_lossy()]) {
                Ok(out) => parse_info(&out),
                Err(e) => {
                    warn!("diskutil info failed for {}: {e}", path.display());
                    HashMap::new()
                }
            };

            if is_virtual(&info) {
                continue;
            }

            let removable = info
                .get("Removable Media")
                .is_some_and(|v| v == "Removable" || v == "Yes");

            inventory.push(Device {
                path,
                display_name: info.get("Device / Media Name").cloned(),
                removable,
                size_gb: info.get("Disk Size").and_then(|v| parse_size_gb(v)),
                mount_point: info.get("Mount Point").cloned().unwrap_or_default(),
            });
        }

        Ok(inventory)
    }

    /// Erases the device to free GPT space. `%noformat%` keeps diskutil
    /// from writing a fresh filesystem onto the cleared disk.
    fn wipe(&self, device: &Path) -> Result<()> {
        debug!("erasing {} to free GPT space with diskutil", device.display());

        diskutil(&[
            "eraseDisk",
            "free",
            "%noformat%",
            "GPT",
            &device.to_string_lossy(),
        ])?;

        info!("partitions on {} erased", device.display());
        Ok(())
    }

    fn open_target(&self, device: &Path) -> Result<Box<dyn DeviceSink>> {
        Ok(Box::new(FileSink::open(device)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
/dev/disk0 (internal, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:      GUID_partition_scheme                        *500.3 GB   disk0
   1:                        EFI EFI                     314.6 MB   disk0s1

/dev/disk4 (external, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:     FDisk_partition_scheme                        *15.5 GB    disk4
";

    const INFO: &str = "\
   Device Identifier:         disk4
   Device Node:               /dev/disk4
   Device / Media Name:       USB SanDisk 3.2Gen1

   Removable Media:           Removable
   Media Type:                Generic
   Protocol:                  USB
   Disk Size:                 15.5 GB (15523119104 Bytes) (exactly 30318592 512-Byte-Units)
";

    #[test]
    fn finds_whole_disk_paths() {
        let paths = parse_disk_paths(LISTING);
        assert_eq!(
            paths,
            [PathBuf::from("/dev/disk0"), PathBuf::from("/dev/disk4")]
        );
    }

    #[test]
    fn reads_info_fields() {
        let info = parse_info(INFO);
        assert_eq!(
            info.get("Device / Media Name").map(String::as_str),
            Some("USB SanDisk 3.2Gen1")
        );
        assert_eq!(
            info.get("Removable Media").map(String::as_str),
            Some("Removable")
        );
        assert!(!is_virtual(&info));
    }

    #[test]
    fn extracts_byte_counts_from_disk_size() {
        let info = parse_info(INFO);
        let gb = info.get("Disk Size").and_then(|v| parse_size_gb(v)).unwrap();
        assert!((gb - 14.46).abs() < 0.01);
    }

    #[test]
    fn virtual_disks_are_flagged() {
        let info = parse_info("   Virtual:                   Yes\n");
        assert!(is_virtual(&info));
        let info = parse_info("   Protocol:                  Disk Image\n");
        assert!(is_virtual(&info));
    }
}
