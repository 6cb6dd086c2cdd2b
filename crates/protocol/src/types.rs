//! USB device type definitions
//!
//! This module defines the device record observed on every polling tick,
//! its mount classification, and the identity key used to compare
//! snapshots across ticks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a storage device is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// Optical or CD-ROM emulating drive
    Cdrom,
    /// Removable flash media
    Removable,
    /// Not mounted as a volume (non-storage devices)
    #[default]
    None,
}

/// One observed USB device
///
/// Value object: records are rebuilt wholesale on every polling tick and
/// have no lifetime of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceRecord {
    /// Opaque OS identifier
    ///
    /// Volume GUID path for storage devices, hardware ID otherwise.
    pub path: String,
    /// Drive root such as `E:\` (storage devices only)
    pub drive_letter: Option<String>,
    /// Whether the device is a storage device
    pub is_storage: bool,
    /// Mount classification
    pub mount_kind: MountKind,
    /// Best-effort display name
    pub friendly_name: String,
    /// OS hardware identifier
    pub hardware_id: String,
    /// OS device instance identifier
    pub device_instance_id: String,
    /// True only for storage devices reachable by the eject protocol
    pub safe_to_eject: bool,
}

impl DeviceRecord {
    /// Identity key used to match a device across snapshots
    ///
    /// First non-empty of: drive letter (storage devices only), device
    /// instance ID, path.
    pub fn identity_key(&self) -> DeviceKey {
        let drive = self
            .drive_letter
            .as_deref()
            .filter(|d| self.is_storage && !d.is_empty());

        let key = drive
            .or_else(|| Some(self.device_instance_id.as_str()).filter(|s| !s.is_empty()))
            .unwrap_or(self.path.as_str());

        DeviceKey(key.to_string())
    }

    /// True when the device is mounted as a CD-ROM
    pub fn is_cdrom(&self) -> bool {
        self.mount_kind == MountKind::Cdrom
    }

    /// True when the device is mounted as removable flash media
    pub fn is_flash(&self) -> bool {
        self.mount_kind == MountKind::Removable
    }
}

/// Identity key of a device within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey(pub String);

impl DeviceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
