//! Safe-eject pipeline
//!
//! Stages run in a fixed order and stop at the first success:
//!
//! 1. Open the volume (terminal on failure)
//! 2. Lock it (warning only)
//! 3. Dismount it (terminal on failure), then release the handle
//! 4. Release the physical disk removal lock (warning only)
//! 5. Device-tree eject of the parent node
//! 6. Media eject on a reopened handle, retried once
//! 7. Query-and-remove of the device subtree
//!
//! If the stage 6 reopen fails the volume is already dismounted and the
//! request ends as [`EjectOutcome::ReadyForManualRemoval`]. Side effects of
//! earlier stages are never rolled back. Each request appends exactly one
//! entry to the event log, and failures also go to the failure log.

use crate::state::MonitorState;
use crate::usb::backend::{EjectBackend, OsError, VolumeHandle};
use crate::usb::device::DriveTarget;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Stage at which a request can fail terminally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectStage {
    Open,
    Dismount,
    QueryRemove,
}

impl fmt::Display for EjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EjectStage::Open => "open",
            EjectStage::Dismount => "dismount",
            EjectStage::QueryRemove => "query remove",
        };
        f.write_str(name)
    }
}

/// Stage that completed the eject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectMethod {
    DeviceTree,
    MediaEject,
    QueryRemove,
}

/// Terminal failure of an eject request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct EjectFailure {
    pub stage: EjectStage,
    pub message: String,
    pub code: Option<u32>,
}

impl EjectFailure {
    pub fn new(stage: EjectStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            code: None,
        }
    }

    fn from_os(stage: EjectStage, message: &str, error: &OsError) -> Self {
        Self {
            stage,
            message: message.to_string(),
            code: error.code,
        }
    }

    /// Failure reason including the OS error code when known
    pub fn reason(&self) -> String {
        match self.code {
            Some(code) => format!("{}, error {}", self.message, code),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for EjectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason())
    }
}

/// Result of one eject request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EjectOutcome {
    Ejected(EjectMethod),
    /// Dismounted, but the handle for media eject could not be reopened
    ReadyForManualRemoval,
    Failed(EjectFailure),
}

impl EjectOutcome {
    /// True for every outcome except [`EjectOutcome::Failed`]
    pub fn is_success(&self) -> bool {
        !matches!(self, EjectOutcome::Failed(_))
    }

    /// Event log text for this outcome
    pub fn event_text(&self, target: &str) -> String {
        match self {
            EjectOutcome::Ejected(EjectMethod::QueryRemove) => {
                format!("Successfully queried removal for device: {}", target)
            }
            EjectOutcome::Ejected(_) => format!("Successfully ejected device: {}", target),
            EjectOutcome::ReadyForManualRemoval => {
                format!("Dismounted device (ready for manual removal): {}", target)
            }
            EjectOutcome::Failed(failure) => {
                format!("Failed to safely eject device: {} ({})", target, failure)
            }
        }
    }
}

enum MediaEjectError {
    Reopen(OsError),
    Eject(OsError),
}

/// Runs eject requests against an [`EjectBackend`]
pub struct EjectOrchestrator<B> {
    backend: B,
    state: Arc<MonitorState>,
    retry_delay: Duration,
}

impl<B: EjectBackend> EjectOrchestrator<B> {
    pub fn new(backend: B, state: Arc<MonitorState>, retry_delay: Duration) -> Self {
        Self {
            backend,
            state,
            retry_delay,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Eject the drive named by a raw specifier such as `E:\`
    ///
    /// An unparseable specifier fails at the open stage.
    pub fn safe_eject(&self, specifier: &str) -> EjectOutcome {
        match DriveTarget::parse(specifier) {
            Some(target) => self.eject(&target),
            None => {
                warn!("Invalid drive specifier: {:?}", specifier);
                let outcome = EjectOutcome::Failed(EjectFailure::new(
                    EjectStage::Open,
                    "invalid drive specifier",
                ));
                self.record(specifier, &outcome);
                outcome
            }
        }
    }

    /// Eject `target` and record the outcome
    pub fn eject(&self, target: &DriveTarget) -> EjectOutcome {
        info!("Safe eject requested for {}", target);
        let outcome = self.run_pipeline(target);
        self.record(&target.to_string(), &outcome);
        outcome
    }

    fn record(&self, target: &str, outcome: &EjectOutcome) {
        let event = outcome.event_text(target);
        match outcome {
            EjectOutcome::Failed(failure) => {
                warn!("{}", event);
                self.state
                    .record_eject_failure(event, format!("{} ({})", target, failure.reason()));
            }
            _ => {
                info!("{}", event);
                self.state.record_event(event);
            }
        }
    }

    fn run_pipeline(&self, target: &DriveTarget) -> EjectOutcome {
        if let Err(failure) = self.dismount(target) {
            return EjectOutcome::Failed(failure);
        }

        if let Err(e) = self.backend.release_physical_disk(target) {
            warn!("Could not release physical disk of {}: {}", target, e);
        }

        match self.backend.request_device_eject(target) {
            Ok(()) => {
                info!("Device-tree eject accepted for {}", target);
                return EjectOutcome::Ejected(EjectMethod::DeviceTree);
            }
            Err(e) => warn!("Device-tree eject failed for {}: {}", target, e),
        }

        match self.media_eject(target) {
            Ok(()) => return EjectOutcome::Ejected(EjectMethod::MediaEject),
            Err(MediaEjectError::Reopen(e)) => {
                warn!("Could not reopen {} after dismount: {}", target, e);
                return EjectOutcome::ReadyForManualRemoval;
            }
            Err(MediaEjectError::Eject(e)) => {
                warn!("Second media eject attempt failed for {}: {}", target, e);
            }
        }

        match self.backend.query_remove_subtree(target) {
            Ok(()) => EjectOutcome::Ejected(EjectMethod::QueryRemove),
            Err(e) => {
                warn!("Query-remove failed for {}: {}", target, e);
                EjectOutcome::Failed(EjectFailure::from_os(
                    EjectStage::QueryRemove,
                    "eject failed",
                    &e,
                ))
            }
        }
    }

    /// Open, lock and dismount; the handle is released on return
    fn dismount(&self, target: &DriveTarget) -> Result<(), EjectFailure> {
        let mut volume = self.backend.open_volume(target).map_err(|e| {
            warn!("Failed to open {}: {}", target.device_path(), e);
            EjectFailure::from_os(EjectStage::Open, "open failed", &e)
        })?;

        if let Err(e) = volume.lock() {
            warn!("Could not lock {}: {}", target.device_path(), e);
        }

        volume.dismount().map_err(|e| {
            warn!("Failed to dismount {}: {}", target.device_path(), e);
            EjectFailure::from_os(EjectStage::Dismount, "dismount failed", &e)
        })?;

        info!("Volume {} dismounted", target.device_path());
        Ok(())
    }

    fn media_eject(&self, target: &DriveTarget) -> Result<(), MediaEjectError> {
        let mut volume = self
            .backend
            .open_volume(target)
            .map_err(MediaEjectError::Reopen)?;

        if let Err(e) = volume.allow_removal() {
            warn!("Could not clear media removal lock on {}: {}", target, e);
        }

        if let Err(e) = volume.eject_media() {
            warn!("Media eject failed for {}: {}, retrying", target, e);
            std::thread::sleep(self.retry_delay);
            volume.eject_media().map_err(MediaEjectError::Eject)?;
        }
        Ok(())
    }
}
