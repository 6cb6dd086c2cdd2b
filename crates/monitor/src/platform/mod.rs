//! Host platform backends
//!
//! Windows gets the real SetupAPI/CfgMgr32 implementation. Every other host
//! gets a backend that sees no devices and refuses to eject, so the service
//! still runs and reports an empty device list.

#[cfg(not(windows))]
mod unsupported;
#[cfg(windows)]
mod win;

#[cfg(not(windows))]
pub use unsupported::{UnsupportedDeviceSource as HostDeviceSource, UnsupportedEjectBackend as HostEjectBackend};
#[cfg(windows)]
pub use win::{WindowsDeviceSource as HostDeviceSource, WindowsEjectBackend as HostEjectBackend};

/// Device source of the current host
pub fn device_source() -> HostDeviceSource {
    HostDeviceSource::default()
}

/// Eject backend of the current host
pub fn eject_backend() -> HostEjectBackend {
    HostEjectBackend::default()
}
