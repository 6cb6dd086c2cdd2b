//! Device enumeration
//!
//! One pass produces a [`Snapshot`] in two steps:
//! 1. Storage pass over the drive letters: every removable or CD-ROM drive
//!    with a resolvable volume path becomes an ejectable storage record.
//! 2. Full pass over every present device node: nodes the classifier
//!    accepts as USB are added unless their key is already taken.
//!
//! Enumeration never fails. Missing fields degrade to placeholders.

use crate::state::Snapshot;
use crate::usb::backend::DeviceSource;
use crate::usb::classifier::{classify, storage_name};
use crate::usb::device::{DriveType, LogicalDrive, RawDevice};
use protocol::{DeviceRecord, MountKind};
use tracing::{debug, trace};

/// Enumerates USB devices through a [`DeviceSource`]
pub struct DeviceEnumerator<S> {
    source: S,
}

impl<S: DeviceSource> DeviceEnumerator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Take one snapshot of the attached USB devices
    pub fn enumerate(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        let drives = self.source.logical_drives();
        for record in drives.iter().filter_map(storage_record) {
            snapshot.insert_if_absent(record);
        }
        let storage_count = snapshot.len();

        for record in self.source.present_devices().iter().filter_map(device_record) {
            if !snapshot.insert_if_absent(record) {
                trace!("Skipping device already seen in storage pass");
            }
        }

        debug!(
            "Enumerated {} device(s) ({} storage, {} drive letters scanned)",
            snapshot.len(),
            storage_count,
            drives.len()
        );
        snapshot
    }
}

/// Storage record for a drive letter, if it is ejectable media
fn storage_record(drive: &LogicalDrive) -> Option<DeviceRecord> {
    let mount_kind = match drive.drive_type {
        DriveType::Removable => MountKind::Removable,
        DriveType::Cdrom => MountKind::Cdrom,
        _ => return None,
    };

    let Some(volume_path) = drive.volume_path.as_deref().filter(|p| !p.is_empty()) else {
        debug!("No volume path for {}, skipping", drive.target);
        return None;
    };

    let root = drive.target.root();
    Some(DeviceRecord {
        path: volume_path.to_string(),
        drive_letter: Some(root.clone()),
        is_storage: true,
        mount_kind,
        friendly_name: storage_name(drive),
        hardware_id: drive.hardware_id.clone().unwrap_or_default(),
        device_instance_id: root,
        safe_to_eject: true,
    })
}

/// Record for a device node the classifier accepts as USB
fn device_record(device: &RawDevice) -> Option<DeviceRecord> {
    let class = classify(device)?;
    let hardware_id = device.hardware_id.clone().unwrap_or_default();
    let instance_id = device.instance_id.clone().unwrap_or_default();

    if hardware_id.is_empty() && instance_id.is_empty() {
        return None;
    }

    Some(DeviceRecord {
        path: hardware_id.clone(),
        drive_letter: None,
        is_storage: class.is_storage,
        mount_kind: MountKind::None,
        friendly_name: class.name_hint,
        hardware_id,
        device_instance_id: instance_id,
        safe_to_eject: false,
    })
}
