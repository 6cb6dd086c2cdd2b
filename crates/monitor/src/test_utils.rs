//! Simulated platform backends
//!
//! [`MockDeviceSource`] serves a scripted host and can be changed between
//! ticks through any clone. [`MockEjectBackend`] fails the stages it is told
//! to fail and records every call so tests can assert where the pipeline
//! stopped.

use crate::usb::backend::{DeviceSource, EjectBackend, OsError, VolumeHandle};
use crate::usb::device::{DriveTarget, DriveType, LogicalDrive, RawDevice};
use std::sync::{Arc, Mutex};

/// Removable drive with a resolved volume path and the given label
pub fn removable_drive(letter: char, label: &str) -> LogicalDrive {
    let target = DriveTarget::new(letter).unwrap_or_else(|| panic!("invalid drive letter {letter}"));
    let mut drive = LogicalDrive::new(target, DriveType::Removable);
    drive.volume_path = Some(format!(
        r"\\?\Volume{{{:08x}-0000-0000-0000-000000000000}}\",
        target.letter() as u32
    ));
    if !label.is_empty() {
        drive.volume_label = Some(label.to_string());
    }
    drive
}

/// Present device node with a hardware ID and instance ID
pub fn usb_device(hardware_id: &str, instance_id: &str) -> RawDevice {
    RawDevice {
        hardware_id: Some(hardware_id.to_string()),
        instance_id: Some(instance_id.to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct Host {
    drives: Vec<LogicalDrive>,
    devices: Vec<RawDevice>,
}

/// Scripted [`DeviceSource`]
#[derive(Debug, Clone, Default)]
pub struct MockDeviceSource {
    host: Arc<Mutex<Host>>,
}

impl MockDeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drive(self, drive: LogicalDrive) -> Self {
        self.host().drives.push(drive);
        self
    }

    pub fn with_device(self, device: RawDevice) -> Self {
        self.host().devices.push(device);
        self
    }

    /// Replace the drives reported from now on
    pub fn set_drives(&self, drives: Vec<LogicalDrive>) {
        self.host().drives = drives;
    }

    /// Replace the device nodes reported from now on
    pub fn set_devices(&self, devices: Vec<RawDevice>) {
        self.host().devices = devices;
    }

    fn host(&self) -> std::sync::MutexGuard<'_, Host> {
        self.host.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DeviceSource for MockDeviceSource {
    fn logical_drives(&self) -> Vec<LogicalDrive> {
        self.host().drives.clone()
    }

    fn present_devices(&self) -> Vec<RawDevice> {
        self.host().devices.clone()
    }
}

/// One backend call observed by [`MockEjectBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCall {
    Open,
    Lock,
    Dismount,
    AllowRemoval,
    EjectMedia,
    /// Volume handle dropped
    Close,
    ReleasePhysicalDisk,
    RequestDeviceEject,
    QueryRemoveSubtree,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<StageCall>,
    opens: usize,
    fail_open_at: Option<(usize, u32)>,
    fail_lock: bool,
    fail_dismount: Option<u32>,
    fail_allow_removal: bool,
    eject_media_failures: usize,
    fail_release_physical_disk: bool,
    fail_device_eject: bool,
    fail_query_remove: Option<u32>,
}

/// Scripted [`EjectBackend`]; every stage succeeds unless told otherwise
#[derive(Debug, Clone, Default)]
pub struct MockEjectBackend {
    script: Arc<Mutex<Script>>,
}

fn simulated(stage: &str, code: u32) -> OsError {
    OsError::with_code(format!("simulated {} failure", stage), code)
}

impl MockEjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` (1-based) call to `open_volume` with `code`
    pub fn fail_open_at(self, nth: usize, code: u32) -> Self {
        self.script().fail_open_at = Some((nth, code));
        self
    }

    pub fn fail_lock(self) -> Self {
        self.script().fail_lock = true;
        self
    }

    pub fn fail_dismount(self, code: u32) -> Self {
        self.script().fail_dismount = Some(code);
        self
    }

    pub fn fail_allow_removal(self) -> Self {
        self.script().fail_allow_removal = true;
        self
    }

    /// Fail the first `times` media-eject calls
    pub fn fail_eject_media_times(self, times: usize) -> Self {
        self.script().eject_media_failures = times;
        self
    }

    pub fn fail_release_physical_disk(self) -> Self {
        self.script().fail_release_physical_disk = true;
        self
    }

    pub fn fail_device_eject(self) -> Self {
        self.script().fail_device_eject = true;
        self
    }

    pub fn fail_query_remove(self, code: u32) -> Self {
        self.script().fail_query_remove = Some(code);
        self
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> Vec<StageCall> {
        self.script().calls.clone()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn call(&self, call: StageCall) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script();
        script.calls.push(call);
        script
    }
}

/// Volume handle of [`MockEjectBackend`]
#[derive(Debug)]
pub struct MockVolume {
    backend: MockEjectBackend,
}

impl VolumeHandle for MockVolume {
    fn lock(&mut self) -> Result<(), OsError> {
        if self.backend.call(StageCall::Lock).fail_lock {
            Err(simulated("lock", 5))
        } else {
            Ok(())
        }
    }

    fn dismount(&mut self) -> Result<(), OsError> {
        match self.backend.call(StageCall::Dismount).fail_dismount {
            Some(code) => Err(simulated("dismount", code)),
            None => Ok(()),
        }
    }

    fn allow_removal(&mut self) -> Result<(), OsError> {
        if self.backend.call(StageCall::AllowRemoval).fail_allow_removal {
            Err(simulated("media removal", 1))
        } else {
            Ok(())
        }
    }

    fn eject_media(&mut self) -> Result<(), OsError> {
        let mut script = self.backend.call(StageCall::EjectMedia);
        if script.eject_media_failures > 0 {
            script.eject_media_failures -= 1;
            return Err(simulated("media eject", 21));
        }
        Ok(())
    }
}

impl Drop for MockVolume {
    fn drop(&mut self) {
        self.backend.call(StageCall::Close);
    }
}

impl EjectBackend for MockEjectBackend {
    type Volume = MockVolume;

    fn open_volume(&self, _target: &DriveTarget) -> Result<MockVolume, OsError> {
        let mut script = self.call(StageCall::Open);
        script.opens += 1;
        if let Some((nth, code)) = script.fail_open_at
            && nth == script.opens
        {
            return Err(simulated("open", code));
        }
        drop(script);

        Ok(MockVolume {
            backend: self.clone(),
        })
    }

    fn release_physical_disk(&self, _target: &DriveTarget) -> Result<(), OsError> {
        if self.call(StageCall::ReleasePhysicalDisk).fail_release_physical_disk {
            Err(simulated("physical disk", 5))
        } else {
            Ok(())
        }
    }

    fn request_device_eject(&self, _target: &DriveTarget) -> Result<(), OsError> {
        if self.call(StageCall::RequestDeviceEject).fail_device_eject {
            Err(simulated("device eject", 23))
        } else {
            Ok(())
        }
    }

    fn query_remove_subtree(&self, _target: &DriveTarget) -> Result<(), OsError> {
        match self.call(StageCall::QueryRemoveSubtree).fail_query_remove {
            Some(code) => Err(simulated("query remove", code)),
            None => Ok(()),
        }
    }
}
