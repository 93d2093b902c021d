use std::fmt;
use std::path::PathBuf;

/// A block device discovered on the system.
///
/// This struct holds cross-platform information about a device, populated
/// by the platform-specific discovery backends in [`crate::platform`].
/// Records are produced fresh on every enumeration call and never cached;
/// device presence is a point-in-time fact.
#[derive(Clone, Debug)]
pub struct Device {
    /// The system path to the device (e.g. `/dev/sdb` or `\\.\PHYSICALDRIVE1`).
    pub path: PathBuf,
    /// A human-readable model or media name, when the platform exposes one.
    pub display_name: Option<String>,
    /// Whether the host flags the device as hot-pluggable.
    pub removable: bool,
    /// The total size of the device in gigabytes (GB), when known.
    pub size_gb: Option<f64>,
    /// The primary mount point of the device, if any.
    pub mount_point: String,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.display_name.as_deref().unwrap_or("unknown");
        let size = match self.size_gb {
            Some(gb) => format!("{gb:.1} GB"),
            None => "?".to_string(),
        };
        let mount_info = if self.mount_point.is_empty() {
            "[Not mounted]".to_string()
        } else {
            format!("[Mounted at {}]", self.mount_point)
        };

        write!(
            f,
            "{:<15} {:<20} {:>9} {}",
            self.path.display(),
            name,
            size,
            mount_info
        )
    }
}

/// The result of one enumeration pass, partitioned by the removable flag.
#[derive(Clone, Debug, Default)]
pub struct DeviceInventory {
    pub removable: Vec<Device>,
    pub fixed: Vec<Device>,
}

impl DeviceInventory {
    /// Files `device` into the matching partition, preserving backend order.
    pub fn push(&mut self, device: Device) {
        if device.removable {
            self.removable.push(device);
        } else {
            self.fixed.push(device);
        }
    }

    /// Flattens the inventory into a single list, removable devices first.
    /// When `show_all` is false the fixed set is left out entirely.
    pub fn into_list(self, show_all: bool) -> Vec<Device> {
        let mut list = self.removable;
        if show_all {
            list.extend(self.fixed);
        }
        list
    }
}
