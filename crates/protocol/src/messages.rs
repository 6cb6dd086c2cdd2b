//! Protocol message definitions
//!
//! This module defines the two message families of the monitor:
//! - Status reports (one JSON object per polling tick, standard output)
//! - Control commands (one text line per command, standard input)

use crate::types::DeviceRecord;
use serde::{Deserialize, Serialize};

/// Status report emitted once per polling tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusReport {
    /// Every device in the current snapshot
    pub usb_devices: Vec<DeviceEntry>,
    /// Accumulated failed eject attempts
    pub safe_removal_failures: Vec<String>,
    /// Accumulated event log
    pub recent_events: Vec<String>,
}

/// One device as it appears in the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    #[serde(rename = "devicePath")]
    pub device_path: String,
    #[serde(rename = "driveLetter")]
    pub drive_letter: String,
    #[serde(rename = "isStorageDevice")]
    pub is_storage_device: bool,
    #[serde(rename = "isMountedAsCDROM")]
    pub is_mounted_as_cdrom: bool,
    #[serde(rename = "isMountedAsFlash")]
    pub is_mounted_as_flash: bool,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    #[serde(rename = "deviceInstanceId")]
    pub device_instance_id: String,
    #[serde(rename = "isSafeToEject")]
    pub is_safe_to_eject: bool,
}

impl From<&DeviceRecord> for DeviceEntry {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            device_path: record.path.clone(),
            drive_letter: record.drive_letter.clone().unwrap_or_default(),
            is_storage_device: record.is_storage,
            is_mounted_as_cdrom: record.is_cdrom(),
            is_mounted_as_flash: record.is_flash(),
            friendly_name: record.friendly_name.clone(),
            device_instance_id: record.device_instance_id.clone(),
            is_safe_to_eject: record.safe_to_eject,
        }
    }
}

impl StatusReport {
    /// Build a report from device records and log snapshots
    pub fn new<'a>(
        devices: impl IntoIterator<Item = &'a DeviceRecord>,
        safe_removal_failures: Vec<String>,
        recent_events: Vec<String>,
    ) -> Self {
        Self {
            usb_devices: devices.into_iter().map(DeviceEntry::from).collect(),
            safe_removal_failures,
            recent_events,
        }
    }
}

/// Control command read from the command stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the safe-eject protocol against a drive
    SafeEject {
        /// Drive specifier exactly as received (e.g. `E:\`)
        target: String,
    },
}

impl Command {
    /// Literal prefix of the safe-eject command
    pub const SAFE_EJECT_PREFIX: &'static str = "safe_eject: ";

    /// Parse one control line
    ///
    /// Returns `None` for anything that is not a recognized command.
    ///
    /// # Example
    /// ```
    /// use protocol::Command;
    ///
    /// let cmd = Command::parse(r"safe_eject: E:\").unwrap();
    /// assert_eq!(cmd, Command::SafeEject { target: r"E:\".to_string() });
    /// assert!(Command::parse("status").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let target = line.strip_prefix(Self::SAFE_EJECT_PREFIX)?;

        Some(Command::SafeEject {
            target: target.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MountKind;

    #[test]
    fn test_parse_safe_eject() {
        let cmd = Command::parse("safe_eject: F:\\\r\n").unwrap();
        let Command::SafeEject { target } = cmd;
        assert_eq!(target, r"F:\");
    }

    #[test]
    fn test_parse_ignores_other_lines() {
        assert!(Command::parse("").is_none());
        assert!(Command::parse("safe_eject:E:").is_none());
        assert!(Command::parse("SAFE_EJECT: E:").is_none());
        assert!(Command::parse(" safe_eject: E:").is_none());
        assert!(Command::parse("eject E:").is_none());
    }

    #[test]
    fn test_entry_from_storage_record() {
        let record = DeviceRecord {
            path: r"\\?\Volume{abcd}\".to_string(),
            drive_letter: Some(r"E:\".to_string()),
            is_storage: true,
            mount_kind: MountKind::Removable,
            friendly_name: "BACKUP".to_string(),
            hardware_id: r"USBSTOR\DiskKingston".to_string(),
            device_instance_id: String::new(),
            safe_to_eject: true,
        };

        let entry = DeviceEntry::from(&record);
        assert_eq!(entry.drive_letter, r"E:\");
        assert!(entry.is_storage_device);
        assert!(entry.is_mounted_as_flash);
        assert!(!entry.is_mounted_as_cdrom);
        assert!(entry.is_safe_to_eject);
    }

    #[test]
    fn test_entry_from_non_storage_record() {
        let record = DeviceRecord {
            path: r"USB\VID_046D&PID_C52B".to_string(),
            friendly_name: "Logitech Device PID_C52B".to_string(),
            device_instance_id: r"USB\VID_046D&PID_C52B\6&1A".to_string(),
            ..Default::default()
        };

        let entry = DeviceEntry::from(&record);
        assert_eq!(entry.drive_letter, "");
        assert!(!entry.is_storage_device);
        assert!(!entry.is_mounted_as_flash);
        assert!(!entry.is_safe_to_eject);
    }
}
