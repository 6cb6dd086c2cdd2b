//! Raw device descriptors
//!
//! These are the unprocessed facts a platform backend reports about the
//! host: mounted drive letters and present device nodes. Every field that
//! comes from a separate OS query is optional so a failed query never
//! hides the rest of the device.

use std::fmt;

/// OS drive type of a mounted drive letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    Unknown,
    NoRootDir,
    Removable,
    Fixed,
    Remote,
    Cdrom,
    RamDisk,
}

impl DriveType {
    /// Map a Win32 `GetDriveType` result
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => DriveType::NoRootDir,
            2 => DriveType::Removable,
            3 => DriveType::Fixed,
            4 => DriveType::Remote,
            5 => DriveType::Cdrom,
            6 => DriveType::RamDisk,
            _ => DriveType::Unknown,
        }
    }

    /// Drive types covered by the storage pass
    pub fn is_ejectable_media(&self) -> bool {
        matches!(self, DriveType::Removable | DriveType::Cdrom)
    }
}

/// One drive letter present in the OS drive bitmask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDrive {
    /// The drive letter
    pub target: DriveTarget,
    /// Reported drive type
    pub drive_type: DriveType,
    /// Stable volume GUID path (`\\?\Volume{...}\`)
    pub volume_path: Option<String>,
    /// File-system volume label
    pub volume_label: Option<String>,
    /// Registry friendly name of the backing disk drive
    pub disk_friendly_name: Option<String>,
    /// Hardware ID of the backing disk drive
    pub hardware_id: Option<String>,
}

impl LogicalDrive {
    pub fn new(target: DriveTarget, drive_type: DriveType) -> Self {
        Self {
            target,
            drive_type,
            volume_path: None,
            volume_label: None,
            disk_friendly_name: None,
            hardware_id: None,
        }
    }
}

/// One present node of the OS device tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDevice {
    /// First entry of the hardware ID multi-string
    pub hardware_id: Option<String>,
    /// Setup class name (e.g. `HIDClass`)
    pub device_class: Option<String>,
    /// Location information string
    pub location_info: Option<String>,
    /// Device instance identifier
    pub instance_id: Option<String>,
    /// Localized device description
    pub description: Option<String>,
}

/// A drive letter addressed by the eject protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriveTarget {
    letter: char,
}

impl DriveTarget {
    /// Build a target from a drive letter (A-Z, case-insensitive)
    pub fn new(letter: char) -> Option<Self> {
        letter.is_ascii_alphabetic().then(|| Self {
            letter: letter.to_ascii_uppercase(),
        })
    }

    /// Parse a drive specifier
    ///
    /// Accepts `E:\`, `E:`, `E` and `\\.\E:`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let spec = spec.strip_prefix(r"\\.\").unwrap_or(spec);

        let mut chars = spec.chars();
        let letter = chars.next()?;
        match chars.as_str() {
            "" | ":" | r":\" => Self::new(letter),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    /// Root path, e.g. `E:\`
    pub fn root(&self) -> String {
        format!(r"{}:\", self.letter)
    }

    /// Volume device path for CreateFile, e.g. `\\.\E:`
    pub fn device_path(&self) -> String {
        format!(r"\\.\{}:", self.letter)
    }

    /// DOS device name, e.g. `E:`
    pub fn dos_name(&self) -> String {
        format!("{}:", self.letter)
    }

    /// Bit of this drive in the logical-drive bitmask
    pub fn mask_bit(&self) -> u32 {
        1u32 << (self.letter as u32 - 'A' as u32)
    }

    /// All drive letters set in a logical-drive bitmask
    pub fn from_mask(mask: u32) -> Vec<Self> {
        ('A'..='Z')
            .filter_map(Self::new)
            .filter(|t| mask & t.mask_bit() != 0)
            .collect()
    }
}

impl fmt::Display for DriveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r"{}:\", self.letter)
    }
}
