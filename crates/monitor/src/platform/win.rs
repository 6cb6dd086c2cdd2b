//! Windows backend
//!
//! Drive letters come from `GetLogicalDrives`, device nodes from SetupAPI,
//! and the eject stages are volume IOCTLs plus CfgMgr32 removal requests.
//! Every handle is owned by a wrapper that closes it on drop.

use crate::usb::backend::{DeviceSource, EjectBackend, OsError, VolumeHandle};
use crate::usb::device::{DriveTarget, DriveType, LogicalDrive, RawDevice};
use std::ffi::c_void;
use std::mem::size_of;
use tracing::{debug, trace};

use windows::Win32::Devices::DeviceAndDriverInstallation::{
    CM_Get_Parent, CM_LOCATE_DEVNODE_NORMAL, CM_Locate_DevNodeW, CM_Query_And_Remove_SubTreeW,
    CM_Request_Device_EjectW, CONFIGRET, CR_SUCCESS, DIGCF_ALLCLASSES, DIGCF_DEVICEINTERFACE,
    DIGCF_PRESENT, HDEVINFO, SETUP_DI_GET_CLASS_DEVS_FLAGS, SETUP_DI_REGISTRY_PROPERTY,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W, SP_DEVINFO_DATA, SPDRP_CLASS,
    SPDRP_DEVICEDESC, SPDRP_FRIENDLYNAME, SPDRP_HARDWAREID, SPDRP_LOCATION_INFORMATION,
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiEnumDeviceInterfaces,
    SetupDiGetClassDevsW, SetupDiGetDeviceInstanceIdW, SetupDiGetDeviceInterfaceDetailW,
    SetupDiGetDeviceRegistryPropertyW,
};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_DELETE, FILE_SHARE_MODE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, GetDriveTypeW, GetLogicalDrives, GetVolumeInformationW,
    GetVolumeNameForVolumeMountPointW, OPEN_EXISTING, QueryDosDeviceW,
};
use windows::Win32::System::IO::DeviceIoControl;
use windows::Win32::System::Ioctl::{
    FSCTL_DISMOUNT_VOLUME, FSCTL_LOCK_VOLUME, IOCTL_STORAGE_EJECT_MEDIA,
    IOCTL_STORAGE_GET_DEVICE_NUMBER, IOCTL_STORAGE_MEDIA_REMOVAL, PREVENT_MEDIA_REMOVAL,
    STORAGE_DEVICE_NUMBER,
};
use windows::core::{GUID, PCWSTR};

const GENERIC_READ: u32 = 0x8000_0000;
const GENERIC_WRITE: u32 = 0x4000_0000;
const CM_QUERY_REMOVE_UI_NOT_OK: u32 = 0x0000_0001;

const GUID_DEVINTERFACE_DISK: GUID = GUID::from_u128(0x53f56307_b6bf_11d0_94f2_00a0c91efb8b);
const GUID_DEVINTERFACE_CDROM: GUID = GUID::from_u128(0x53f56308_b6bf_11d0_94f2_00a0c91efb8b);
const GUID_DEVINTERFACE_FLOPPY: GUID = GUID::from_u128(0x53f56311_b6bf_11d0_94f2_00a0c91efb8b);
const GUID_DEVCLASS_DISKDRIVE: GUID = GUID::from_u128(0x4d36e967_e325_11ce_bfc1_08002be10318);

fn wide(s: &str) -> Vec<u16> {
    use std::os::windows::prelude::*;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// String up to the first NUL
fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end]).trim().to_string()
}

/// Win32 error code carried by a `windows::core::Error`
fn win32_code(err: &windows::core::Error) -> u32 {
    let hr = err.code().0 as u32;
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}

fn os_error(context: impl Into<String>, err: windows::core::Error) -> OsError {
    OsError::with_code(context, win32_code(&err))
}

fn cm_result(context: &str, cr: CONFIGRET) -> Result<(), OsError> {
    if cr == CR_SUCCESS {
        Ok(())
    } else {
        Err(OsError::with_code(context, cr.0))
    }
}

/// Owned file or device handle
struct OwnedHandle(HANDLE);

impl OwnedHandle {
    fn open(path: &str, access: u32, share: FILE_SHARE_MODE) -> Result<Self, OsError> {
        let w = wide(path);
        let handle = unsafe {
            CreateFileW(
                PCWSTR(w.as_ptr()),
                access,
                share,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                HANDLE::default(),
            )
        }
        .map_err(|e| os_error(format!("CreateFileW failed for {}", path), e))?;
        Ok(Self(handle))
    }

    fn ioctl(&self, name: &str, code: u32, input: Option<&[u8]>) -> Result<(), OsError> {
        let mut returned = 0u32;
        let (in_ptr, in_len) = match input {
            Some(buf) => (Some(buf.as_ptr() as *const c_void), buf.len() as u32),
            None => (None, 0),
        };
        unsafe {
            DeviceIoControl(
                self.0,
                code,
                in_ptr,
                in_len,
                None,
                0,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|e| os_error(format!("{} failed", name), e))
    }

    fn device_number(&self) -> Result<STORAGE_DEVICE_NUMBER, OsError> {
        let mut sdn = STORAGE_DEVICE_NUMBER::default();
        let mut returned = 0u32;
        unsafe {
            DeviceIoControl(
                self.0,
                IOCTL_STORAGE_GET_DEVICE_NUMBER,
                None,
                0,
                Some(&mut sdn as *mut _ as *mut c_void),
                size_of::<STORAGE_DEVICE_NUMBER>() as u32,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|e| os_error("IOCTL_STORAGE_GET_DEVICE_NUMBER failed", e))?;
        Ok(sdn)
    }

    fn set_media_removal(&self, prevent: bool) -> Result<(), OsError> {
        let request = PREVENT_MEDIA_REMOVAL {
            PreventMediaRemoval: prevent.into(),
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &request as *const PREVENT_MEDIA_REMOVAL as *const u8,
                size_of::<PREVENT_MEDIA_REMOVAL>(),
            )
        };
        self.ioctl("IOCTL_STORAGE_MEDIA_REMOVAL", IOCTL_STORAGE_MEDIA_REMOVAL, Some(bytes))
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Owned SetupAPI device information set
struct DevInfoList(HDEVINFO);

impl DevInfoList {
    fn new(class: Option<&GUID>, flags: SETUP_DI_GET_CLASS_DEVS_FLAGS) -> Result<Self, OsError> {
        let list = unsafe {
            SetupDiGetClassDevsW(
                class.map(|g| g as *const GUID),
                PCWSTR::null(),
                HWND::default(),
                flags,
            )
        }
        .map_err(|e| os_error("SetupDiGetClassDevsW failed", e))?;
        Ok(Self(list))
    }

    /// Device info element at `index`, `None` past the end
    fn device(&self, index: u32) -> Option<SP_DEVINFO_DATA> {
        let mut data = SP_DEVINFO_DATA {
            cbSize: size_of::<SP_DEVINFO_DATA>() as u32,
            ..Default::default()
        };
        unsafe { SetupDiEnumDeviceInfo(self.0, index, &mut data) }
            .ok()
            .map(|_| data)
    }

    fn devices(&self) -> impl Iterator<Item = SP_DEVINFO_DATA> + '_ {
        (0..).map_while(|index| self.device(index))
    }

    /// First string of a registry property
    fn property(&self, data: &SP_DEVINFO_DATA, property: SETUP_DI_REGISTRY_PROPERTY) -> Option<String> {
        let mut buf = [0u8; 2048];
        unsafe {
            SetupDiGetDeviceRegistryPropertyW(self.0, data, property, None, Some(&mut buf), None)
        }
        .ok()?;

        let units: Vec<u16> = buf
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(from_wide(&units)).filter(|s| !s.is_empty())
    }

    fn instance_id(&self, data: &SP_DEVINFO_DATA) -> Option<String> {
        let mut buf = [0u16; 1024];
        unsafe { SetupDiGetDeviceInstanceIdW(self.0, data, Some(&mut buf), None) }.ok()?;
        Some(from_wide(&buf)).filter(|s| !s.is_empty())
    }

    /// Device path and info element of the interface at `index`
    fn interface(&self, guid: &GUID, index: u32) -> Option<(Option<String>, SP_DEVINFO_DATA)> {
        let mut iface = SP_DEVICE_INTERFACE_DATA {
            cbSize: size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
            ..Default::default()
        };
        unsafe { SetupDiEnumDeviceInterfaces(self.0, None, guid, index, &mut iface) }.ok()?;

        // u64 storage keeps the detail struct aligned
        let mut storage = [0u64; 256];
        let detail = storage.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        let mut data = SP_DEVINFO_DATA {
            cbSize: size_of::<SP_DEVINFO_DATA>() as u32,
            ..Default::default()
        };

        let path = unsafe {
            (*detail).cbSize = size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
            SetupDiGetDeviceInterfaceDetailW(
                self.0,
                &iface,
                Some(detail),
                size_of_val(&storage) as u32,
                None,
                Some(&mut data),
            )
            .ok()
            .map(|_| {
                let path_ptr = std::ptr::addr_of!((*detail).DevicePath) as *const u16;
                let offset = path_ptr as usize - storage.as_ptr() as usize;
                let max_units = (size_of_val(&storage) - offset) / 2;
                from_wide(std::slice::from_raw_parts(path_ptr, max_units))
            })
        };

        Some((path, data))
    }
}

impl Drop for DevInfoList {
    fn drop(&mut self) {
        unsafe {
            let _ = SetupDiDestroyDeviceInfoList(self.0);
        }
    }
}

fn drive_type(target: &DriveTarget) -> DriveType {
    let root = wide(&target.root());
    DriveType::from_raw(unsafe { GetDriveTypeW(PCWSTR(root.as_ptr())) })
}

fn volume_path(target: &DriveTarget) -> Option<String> {
    let root = wide(&target.root());
    let mut buf = [0u16; 260];
    unsafe { GetVolumeNameForVolumeMountPointW(PCWSTR(root.as_ptr()), &mut buf) }.ok()?;
    Some(from_wide(&buf)).filter(|s| !s.is_empty())
}

fn volume_label(target: &DriveTarget) -> Option<String> {
    let root = wide(&target.root());
    let mut name = [0u16; 261];
    unsafe {
        GetVolumeInformationW(
            PCWSTR(root.as_ptr()),
            Some(&mut name),
            None,
            None,
            None,
            None,
        )
    }
    .ok()?;
    Some(from_wide(&name)).filter(|s| !s.is_empty())
}

/// Friendly name and hardware ID of the first USB disk drive
fn first_usb_disk() -> (Option<String>, Option<String>) {
    let Ok(list) = DevInfoList::new(Some(&GUID_DEVCLASS_DISKDRIVE), DIGCF_PRESENT) else {
        return (None, None);
    };

    list.devices()
        .find_map(|data| {
            let hardware_id = list.property(&data, SPDRP_HARDWAREID)?;
            hardware_id
                .to_ascii_uppercase()
                .contains("USB")
                .then(|| (list.property(&data, SPDRP_FRIENDLYNAME), Some(hardware_id)))
        })
        .unwrap_or((None, None))
}

/// Disk device node backing a drive letter
struct DiskNode {
    dev_inst: u32,
    instance_id: Option<String>,
}

fn interface_class(target: &DriveTarget) -> Result<GUID, OsError> {
    let mut dos_target = [0u16; 260];
    let name = wide(&target.dos_name());
    unsafe { QueryDosDeviceW(PCWSTR(name.as_ptr()), Some(&mut dos_target)) };
    let floppy = from_wide(&dos_target).contains(r"\Floppy");

    match drive_type(target) {
        DriveType::Removable if floppy => Ok(GUID_DEVINTERFACE_FLOPPY),
        DriveType::Removable | DriveType::Fixed => Ok(GUID_DEVINTERFACE_DISK),
        DriveType::Cdrom => Ok(GUID_DEVINTERFACE_CDROM),
        other => Err(OsError::new(format!("unsupported drive type {:?}", other))),
    }
}

/// Find the disk node whose device number matches the volume's
fn locate_disk(target: &DriveTarget) -> Result<DiskNode, OsError> {
    let volume = OwnedHandle::open(
        &target.device_path(),
        0,
        FILE_SHARE_READ | FILE_SHARE_WRITE,
    )?;
    let number = volume.device_number()?.DeviceNumber;
    drop(volume);

    let guid = interface_class(target)?;
    let list = DevInfoList::new(Some(&guid), DIGCF_PRESENT | DIGCF_DEVICEINTERFACE)?;

    for index in 0.. {
        let Some((path, data)) = list.interface(&guid, index) else {
            break;
        };
        let Some(path) = path else { continue };

        let matches = OwnedHandle::open(&path, 0, FILE_SHARE_READ | FILE_SHARE_WRITE)
            .and_then(|disk| disk.device_number())
            .is_ok_and(|sdn| sdn.DeviceNumber == number);
        if matches {
            trace!("Disk {} of {} is {}", number, target, path);
            return Ok(DiskNode {
                dev_inst: data.DevInst,
                instance_id: list.instance_id(&data),
            });
        }
    }

    Err(OsError::new(format!("no disk device found for {}", target)))
}

/// SetupAPI-backed device source
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsDeviceSource;

impl DeviceSource for WindowsDeviceSource {
    fn logical_drives(&self) -> Vec<LogicalDrive> {
        let mask = unsafe { GetLogicalDrives() };
        let mut usb_disk = None;

        DriveTarget::from_mask(mask)
            .into_iter()
            .map(|target| {
                let mut drive = LogicalDrive::new(target, drive_type(&target));
                if drive.drive_type.is_ejectable_media() {
                    drive.volume_path = volume_path(&target);
                    drive.volume_label = volume_label(&target);
                    let (friendly, hardware_id) = usb_disk.get_or_insert_with(first_usb_disk).clone();
                    drive.disk_friendly_name = friendly;
                    drive.hardware_id = hardware_id;
                }
                drive
            })
            .collect()
    }

    fn present_devices(&self) -> Vec<RawDevice> {
        let list = match DevInfoList::new(None, DIGCF_ALLCLASSES | DIGCF_PRESENT) {
            Ok(list) => list,
            Err(e) => {
                debug!("Device scan unavailable: {}", e);
                return Vec::new();
            }
        };

        list.devices()
            .map(|data| RawDevice {
                hardware_id: list.property(&data, SPDRP_HARDWAREID),
                device_class: list.property(&data, SPDRP_CLASS),
                location_info: list.property(&data, SPDRP_LOCATION_INFORMATION),
                instance_id: list.instance_id(&data),
                description: list.property(&data, SPDRP_DEVICEDESC),
            })
            .collect()
    }
}

/// Read/write handle on `\\.\X:`
pub struct WindowsVolume {
    handle: OwnedHandle,
}

impl VolumeHandle for WindowsVolume {
    fn lock(&mut self) -> Result<(), OsError> {
        self.handle.ioctl("FSCTL_LOCK_VOLUME", FSCTL_LOCK_VOLUME, None)
    }

    fn dismount(&mut self) -> Result<(), OsError> {
        self.handle.ioctl("FSCTL_DISMOUNT_VOLUME", FSCTL_DISMOUNT_VOLUME, None)
    }

    fn allow_removal(&mut self) -> Result<(), OsError> {
        self.handle.set_media_removal(false)
    }

    fn eject_media(&mut self) -> Result<(), OsError> {
        self.handle.ioctl("IOCTL_STORAGE_EJECT_MEDIA", IOCTL_STORAGE_EJECT_MEDIA, None)
    }
}

/// DeviceIoControl and CfgMgr32 eject stages
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsEjectBackend;

impl EjectBackend for WindowsEjectBackend {
    type Volume = WindowsVolume;

    fn open_volume(&self, target: &DriveTarget) -> Result<WindowsVolume, OsError> {
        let handle = OwnedHandle::open(
            &target.device_path(),
            GENERIC_READ | GENERIC_WRITE,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
        )?;
        Ok(WindowsVolume { handle })
    }

    fn release_physical_disk(&self, target: &DriveTarget) -> Result<(), OsError> {
        let number = OwnedHandle::open(
            &target.device_path(),
            GENERIC_READ | GENERIC_WRITE,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
        )?
        .device_number()?
        .DeviceNumber;

        let disk = OwnedHandle::open(
            &format!(r"\\.\PhysicalDrive{}", number),
            GENERIC_READ | GENERIC_WRITE,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
        )?;
        disk.set_media_removal(false)?;
        debug!("Physical disk {} of {} released", number, target);
        Ok(())
    }

    fn request_device_eject(&self, target: &DriveTarget) -> Result<(), OsError> {
        let disk = locate_disk(target)?;

        let mut parent = 0u32;
        cm_result("CM_Get_Parent failed", unsafe {
            CM_Get_Parent(&mut parent, disk.dev_inst, 0)
        })?;
        cm_result("CM_Request_Device_EjectW failed", unsafe {
            CM_Request_Device_EjectW(parent, None, None, 0)
        })
    }

    fn query_remove_subtree(&self, target: &DriveTarget) -> Result<(), OsError> {
        let disk = locate_disk(target)?;
        let instance_id = disk
            .instance_id
            .ok_or_else(|| OsError::new(format!("no device instance ID for {}", target)))?;

        let id = wide(&instance_id);
        let mut dev_inst = 0u32;
        cm_result("CM_Locate_DevNodeW failed", unsafe {
            CM_Locate_DevNodeW(&mut dev_inst, PCWSTR(id.as_ptr()), CM_LOCATE_DEVNODE_NORMAL)
        })?;
        cm_result("CM_Query_And_Remove_SubTreeW failed", unsafe {
            CM_Query_And_Remove_SubTreeW(dev_inst, None, None, CM_QUERY_REMOVE_UI_NOT_OK)
        })
    }
}
