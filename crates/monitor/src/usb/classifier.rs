//! Device classification
//!
//! Decides whether a raw device node is a USB device, whether it is a
//! storage device, and what to call it. Naming is heuristic: known vendor
//! IDs get a branded name, everything else falls back to the raw VID/PID.

use crate::usb::device::{LogicalDrive, RawDevice};
use protocol::{is_printable_ascii, printable_ascii};

/// Name of a storage drive nothing better is known about
pub const UNKNOWN_STORAGE_NAME: &str = "Unknown USB Device";

/// Known USB vendor IDs (upper-case hex) and their display names
const KNOWN_VENDORS: &[(&str, &str)] = &[
    ("046D", "Logitech Device"),
    ("1532", "Razer Device"),
    ("0489", "MediaTek Bluetooth Device"),
    ("0B05", "ASUS Device"),
    ("1BBB", "Tether Device"),
    ("2B7E", "Webcam Device"),
    ("1022", "AMD USB Device"),
];

/// Device class names that denote a Human-Interface-Device
const HID_CLASSES: &[&str] = &["HIDCLASS", "HUMANINTERFACEDEVICE", "HUMANSINTERFACEDEVICE"];

/// Result of classifying one device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_storage: bool,
    pub is_usb: bool,
    pub name_hint: String,
}

/// Classify a device node from the full device scan
///
/// Returns `None` for devices that are not USB devices.
pub fn classify(device: &RawDevice) -> Option<Classification> {
    let hardware_id = device
        .hardware_id
        .as_deref()
        .unwrap_or_default()
        .to_ascii_uppercase();

    let is_usb = hardware_id.contains("USB")
        || (device.device_class.as_deref().is_some_and(is_hid_class)
            && device
                .location_info
                .as_deref()
                .is_some_and(|loc| loc.contains("USB") || loc.contains("VID")));

    if !is_usb {
        return None;
    }

    let heuristic = heuristic_name(&hardware_id);
    let name_hint = match device.description.as_deref() {
        Some(desc) if !desc.is_empty() && is_printable_ascii(desc) => desc.to_string(),
        _ => heuristic,
    };

    Some(Classification {
        is_storage: hardware_id.contains("USBSTOR"),
        is_usb,
        name_hint,
    })
}

/// Display name for a drive found by the drive-letter scan
///
/// Volume label first, then the registry friendly name of the backing
/// disk, both reduced to printable ASCII.
pub fn storage_name(drive: &LogicalDrive) -> String {
    [&drive.volume_label, &drive.disk_friendly_name]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .map(|name| printable_ascii(name))
        .unwrap_or_else(|| UNKNOWN_STORAGE_NAME.to_string())
}

/// True for the Human-Interface-Device class names (case-insensitive)
pub fn is_hid_class(class: &str) -> bool {
    let class = class.to_ascii_uppercase();
    HID_CLASSES.contains(&class.as_str())
}

/// Heuristic name from an upper-cased hardware ID
fn heuristic_name(hardware_id: &str) -> String {
    if hardware_id.contains("USBSTOR") {
        return "USB Storage Device".to_string();
    }
    if hardware_id.contains("ROOT_HUB") {
        return "USB Root Hub".to_string();
    }

    if let Some(vid) = id_after(hardware_id, "VID_") {
        let mut name = match vendor_name(vid) {
            Some(vendor) => vendor.to_string(),
            None => format!("USB Device VID_{}", vid),
        };
        if let Some(pid) = id_after(hardware_id, "PID_") {
            name.push_str(" PID_");
            name.push_str(pid);
        }
        return name;
    }

    if hardware_id.contains("HID") {
        "HID Device".to_string()
    } else {
        "USB Device".to_string()
    }
}

/// Up to four characters following `marker`
fn id_after<'a>(hardware_id: &'a str, marker: &str) -> Option<&'a str> {
    let start = hardware_id.find(marker)? + marker.len();
    let rest = &hardware_id[start..];
    let end = rest
        .char_indices()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Branded name of a known vendor ID
pub fn vendor_name(vid: &str) -> Option<&'static str> {
    KNOWN_VENDORS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(vid))
        .map(|(_, name)| *name)
}
