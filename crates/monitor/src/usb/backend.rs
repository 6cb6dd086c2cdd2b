//! Platform seams
//!
//! Every OS query the monitor performs goes through one of two traits:
//! [`DeviceSource`] for enumeration and [`EjectBackend`] for the stages of
//! the eject pipeline. The Windows backend lives in `crate::platform`; the
//! simulated backends in `crate::test_utils`.

use crate::usb::device::{DriveTarget, LogicalDrive, RawDevice};
use std::fmt;
use thiserror::Error;

/// Failure of a single OS call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct OsError {
    /// Numeric OS error code (Win32 `GetLastError` or CONFIGRET)
    pub code: Option<u32>,
    pub message: String,
}

impl OsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(message: impl Into<String>, code: u32) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (error {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Source of raw device facts for one enumeration pass
///
/// Implementations must not fail as a whole: a query that fails for one
/// drive or device leaves the corresponding field as `None`.
pub trait DeviceSource: Send + Sync {
    /// Drive letters present in the OS drive bitmask
    fn logical_drives(&self) -> Vec<LogicalDrive>;

    /// Every present device node, any class
    fn present_devices(&self) -> Vec<RawDevice>;
}

/// Scoped read/write handle on a mounted volume
///
/// Dropping the value releases the OS handle.
pub trait VolumeHandle {
    /// Lock the volume against new I/O
    fn lock(&mut self) -> Result<(), OsError>;

    /// Dismount the file system
    fn dismount(&mut self) -> Result<(), OsError>;

    /// Clear the media-removal prevention flag
    fn allow_removal(&mut self) -> Result<(), OsError>;

    /// Ask the drive to eject its media
    fn eject_media(&mut self) -> Result<(), OsError>;
}

/// OS operations behind each stage of the eject pipeline
pub trait EjectBackend: Send + Sync {
    type Volume: VolumeHandle;

    /// Open the volume of `target` for read/write
    fn open_volume(&self, target: &DriveTarget) -> Result<Self::Volume, OsError>;

    /// Resolve the backing physical disk and release its removal lock
    fn release_physical_disk(&self, target: &DriveTarget) -> Result<(), OsError>;

    /// Request removal of the parent node of the volume's disk
    fn request_device_eject(&self, target: &DriveTarget) -> Result<(), OsError>;

    /// Query-and-remove the device subtree of the drive, UI suppressed
    fn query_remove_subtree(&self, target: &DriveTarget) -> Result<(), OsError>;
}
