//! USB subsystem
//!
//! Device enumeration, classification and the safe-eject pipeline.
//!
//! Everything here is synchronous. The report loop runs enumeration on the
//! blocking pool and the command reader runs ejects on its own thread, so
//! neither ever blocks the Tokio runtime.

pub mod backend;
pub mod classifier;
pub mod device;
pub mod eject;
pub mod enumerator;

// Re-export public types
pub use backend::{DeviceSource, EjectBackend, OsError, VolumeHandle};
pub use classifier::{Classification, classify};
pub use device::{DriveTarget, DriveType, LogicalDrive, RawDevice};
pub use eject::{EjectFailure, EjectMethod, EjectOrchestrator, EjectOutcome, EjectStage};
pub use enumerator::DeviceEnumerator;
