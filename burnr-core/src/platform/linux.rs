use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::device::{Device, DeviceInventory};
use crate::error::{Error, Result};
use crate::os::OsKind;
use crate::platform::{DeviceSink, FileSink, Platform};

const SYS_BLOCK: &str = "/sys/block";

/// Helper to read a specific file from the /sys/block tree.
fn read_sys_file(device_name: &str, file: &str) -> io::Result<String> {
    let path = PathBuf::from(SYS_BLOCK).join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Linux backend: sysfs enumeration, `sfdisk` wiping, plain-file writing.
pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    fn kind(&self) -> OsKind {
        OsKind::Linux
    }

    /// Discovers devices by iterating through the `/sys/block` directory.
    ///
    /// The per-device `removable` flag file (`0`/`1`) is the sole
    /// classifier. The model name, size, and mount point are read
    /// best-effort: a missing or unreadable file degrades that device's
    /// record instead of aborting the listing. Loop devices are skipped.
    fn list_devices(&self) -> Result<DeviceInventory> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let mut inventory = DeviceInventory::default();

        for entry in fs::read_dir(SYS_BLOCK)?.filter_map(std::result::Result::ok) {
            let device_name = entry.file_name().to_string_lossy().to_string();
            if device_name.starts_with("loop") {
                continue;
            }

            let removable = read_sys_file(&device_name, "removable")
                .map(|s| s == "1")
                .unwrap_or(false);

            let display_name = read_sys_file(&device_name, "device/model")
                .ok()
                .filter(|s| !s.is_empty());

            let size_gb = read_sys_file(&device_name, "size")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|sectors| (sectors * 512) as f64 / (1024.0 * 1024.0 * 1024.0));

            // Find a mount point by matching partitions of this device in
            // the mounted-disk list.
            let mut mount_point = String::new();
            for disk in disks.iter() {
                let disk_name = disk.name().to_string_lossy();
                let disk_name = disk_name.strip_prefix("/dev/").unwrap_or(&disk_name);
                if disk_name.starts_with(&device_name) {
                    let mp = disk.mount_point().to_string_lossy().to_string();
                    if !mp.is_empty() {
                        mount_point = mp;
                        break;
                    }
                }
            }

            inventory.push(Device {
                path: PathBuf::from("/dev").join(&device_name),
                display_name,
                removable,
                size_gb,
                mount_point,
            });
        }

        Ok(inventory)
    }

    /// Deletes the partition table with `sfdisk --delete`. sfdisk ships
    /// with util-linux, so it is assumed to be installed.
    fn wipe(&self, device: &Path) -> Result<()> {
        debug!("wiping partition table on {} with sfdisk", device.display());

        let output = Command::new("sfdisk")
            .arg("--delete")
            .arg(device)
            .output()?;
        if !output.status.success() {
            return Err(Error::ExternalTool {
                tool: "sfdisk",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("partition table on {} deleted", device.display());
        Ok(())
    }

    fn open_target(&self, device: &Path) -> Result<Box<dyn DeviceSink>> {
        Ok(Box::new(FileSink::open(device)?))
    }
}
