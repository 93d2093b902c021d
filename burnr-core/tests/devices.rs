use std::path::PathBuf;

use burnr_core::{Device, DeviceInventory};

fn device(path: &str, removable: bool) -> Device {
    Device {
        path: PathBuf::from(path),
        display_name: None,
        removable,
        size_gb: None,
        mount_point: String::new(),
    }
}

fn inventory() -> DeviceInventory {
    let mut inventory = DeviceInventory::default();
    for (path, removable) in [
        ("/dev/sda", false),
        ("/dev/sdb", true),
        ("/dev/sdc", false),
        ("/dev/sdd", true),
        ("/dev/sde", false),
    ] {
        inventory.push(device(path, removable));
    }
    inventory
}

fn paths(devices: &[Device]) -> Vec<String> {
    devices
        .iter()
        .map(|d| d.path.display().to_string())
        .collect()
}

#[test]
fn fixed_disks_are_hidden_by_default() {
    let listed = inventory().into_list(false);
    assert_eq!(paths(&listed), ["/dev/sdb", "/dev/sdd"]);
}

#[test]
fn show_all_lists_removable_first_in_backend_order() {
    let listed = inventory().into_list(true);
    assert_eq!(
        paths(&listed),
        ["/dev/sdb", "/dev/sdd", "/dev/sda", "/dev/sdc", "/dev/sde"]
    );
}

#[test]
fn unknown_names_degrade_in_display() {
    let shown = device("/dev/sdz", true).to_string();
    assert!(shown.contains("/dev/sdz"));
    assert!(shown.contains("unknown"));
    assert!(shown.contains("[Not mounted]"));
}
