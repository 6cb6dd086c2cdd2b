//! Protocol library for usb-monitor
//!
//! This crate defines the data exchanged by the USB monitor with the
//! process that drives it: the device records observed on every polling
//! tick, the JSON status report written to standard output, and the
//! line-oriented control commands read from standard input.
//!
//! # Example
//!
//! ```
//! use protocol::{DeviceRecord, MountKind, StatusReport, encode_report};
//!
//! let device = DeviceRecord {
//!     path: r"\\?\Volume{6f1d}\".to_string(),
//!     drive_letter: Some(r"E:\".to_string()),
//!     is_storage: true,
//!     mount_kind: MountKind::Removable,
//!     friendly_name: "BACKUP".to_string(),
//!     safe_to_eject: true,
//!     ..Default::default()
//! };
//!
//! let report = StatusReport::new([&device], Vec::new(), Vec::new());
//! let line = encode_report(&report).unwrap();
//! assert!(line.starts_with(r#"{"usb_devices":[{"devicePath""#));
//! ```
//!
//! # Commands
//!
//! ```
//! use protocol::Command;
//!
//! match Command::parse(r"safe_eject: E:\") {
//!     Some(Command::SafeEject { target }) => assert_eq!(target, r"E:\"),
//!     None => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{encode_report, is_printable_ascii, printable_ascii, sanitize_json_text, write_report};
pub use error::{ProtocolError, Result};
pub use messages::{Command, DeviceEntry, StatusReport};
pub use types::{DeviceKey, DeviceRecord, MountKind};
