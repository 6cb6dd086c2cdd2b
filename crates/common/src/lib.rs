//! Common utilities for usb-monitor
//!
//! This crate provides the ambient pieces shared by the monitor crates:
//! error types, tracing setup, and the retention-limited log used for the
//! event and failure histories.

pub mod bounded_log;
pub mod error;
pub mod logging;

pub use bounded_log::BoundedLog;
pub use error::{Error, Result};
pub use logging::setup_logging;
