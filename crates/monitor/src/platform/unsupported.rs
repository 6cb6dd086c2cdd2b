//! Backend for hosts without volume ejection support

use crate::usb::backend::{DeviceSource, EjectBackend, OsError, VolumeHandle};
use crate::usb::device::{DriveTarget, LogicalDrive, RawDevice};

const UNSUPPORTED: &str = "volume ejection requires Windows";

/// Reports no drives and no devices
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDeviceSource;

impl DeviceSource for UnsupportedDeviceSource {
    fn logical_drives(&self) -> Vec<LogicalDrive> {
        Vec::new()
    }

    fn present_devices(&self) -> Vec<RawDevice> {
        Vec::new()
    }
}

/// Never opened; `open_volume` always fails first
#[derive(Debug)]
pub struct UnsupportedVolume;

impl VolumeHandle for UnsupportedVolume {
    fn lock(&mut self) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn dismount(&mut self) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn allow_removal(&mut self) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn eject_media(&mut self) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }
}

/// Fails every eject stage
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedEjectBackend;

impl EjectBackend for UnsupportedEjectBackend {
    type Volume = UnsupportedVolume;

    fn open_volume(&self, _target: &DriveTarget) -> Result<UnsupportedVolume, OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn release_physical_disk(&self, _target: &DriveTarget) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn request_device_eject(&self, _target: &DriveTarget) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }

    fn query_remove_subtree(&self, _target: &DriveTarget) -> Result<(), OsError> {
        Err(OsError::new(UNSUPPORTED))
    }
}
