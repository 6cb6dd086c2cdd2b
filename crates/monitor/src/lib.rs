//! USB device monitor
//!
//! Polls the host for attached USB devices, reports them as one JSON line
//! per tick on standard output, and runs safe-eject requests received as
//! control lines on standard input.

pub mod command;
pub mod config;
pub mod platform;
pub mod reporter;
pub mod state;
pub mod test_utils;
pub mod usb;

pub use config::MonitorConfig;
pub use reporter::Reporter;
pub use state::{DeviceEvent, MonitorState, Snapshot, diff};
