//! Integration tests for the status report document and control commands
//!
//! Verifies that every emitted line is valid JSON with the documented
//! shape, including the empty cases, and that arbitrary device text can
//! never break the line format.

use protocol::{
    Command, DeviceRecord, MountKind, StatusReport, encode_report, sanitize_json_text,
    write_report,
};
use serde_json::Value;

fn make_storage_record(letter: char, name: &str) -> DeviceRecord {
    DeviceRecord {
        path: format!(r"\\?\Volume{{{letter}0000000-0000-0000-0000-000000000000}}\"),
        drive_letter: Some(format!(r"{letter}:\")),
        is_storage: true,
        mount_kind: MountKind::Removable,
        friendly_name: name.to_string(),
        hardware_id: r"USBSTOR\DiskGeneric".to_string(),
        device_instance_id: format!(r"{letter}:\"),
        safe_to_eject: true,
    }
}

fn make_hid_record(instance: &str) -> DeviceRecord {
    DeviceRecord {
        path: r"USB\VID_1532&PID_0071&REV_0100".to_string(),
        friendly_name: "Razer Device PID_0071".to_string(),
        hardware_id: r"USB\VID_1532&PID_0071&REV_0100".to_string(),
        device_instance_id: instance.to_string(),
        ..Default::default()
    }
}

mod report_document {
    use super::*;

    #[test]
    fn test_empty_report_is_valid_json() {
        let line = encode_report(&StatusReport::default()).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["usb_devices"], Value::Array(vec![]));
        assert_eq!(value["safe_removal_failures"], Value::Array(vec![]));
        assert_eq!(value["recent_events"], Value::Array(vec![]));
    }

    #[test]
    fn test_report_with_devices_and_logs() {
        let storage = make_storage_record('E', "BACKUP");
        let hid = make_hid_record(r"USB\VID_1532&PID_0071\6&2B1&0&3");
        let report = StatusReport::new(
            [&storage, &hid],
            vec![r"\\.\E: (dismount failed - error 5)".to_string()],
            vec![r"USB device connected: BACKUP (E:\)".to_string()],
        );

        let line = encode_report(&report).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        let devices = value["usb_devices"].as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["driveLetter"], r"E:\");
        assert_eq!(devices[0]["isStorageDevice"], true);
        assert_eq!(devices[0]["isMountedAsFlash"], true);
        assert_eq!(devices[0]["isMountedAsCDROM"], false);
        assert_eq!(devices[0]["isSafeToEject"], true);
        assert_eq!(devices[1]["driveLetter"], "");
        assert_eq!(devices[1]["isSafeToEject"], false);
        assert_eq!(devices[1]["friendlyName"], "Razer Device PID_0071");

        assert_eq!(
            value["safe_removal_failures"][0],
            r"\\.\E: (dismount failed - error 5)"
        );
        assert_eq!(value["recent_events"][0], r"USB device connected: BACKUP (E:\)");
    }

    #[test]
    fn test_hardware_id_is_not_reported() {
        let storage = make_storage_record('F', "CARD");
        let line = encode_report(&StatusReport::new([&storage], vec![], vec![])).unwrap();
        assert!(!line.contains("hardwareId"));
        assert!(!line.contains("USBSTOR"));
    }

    #[test]
    fn test_cdrom_flags() {
        let mut cdrom = make_storage_record('D', "DVD");
        cdrom.mount_kind = MountKind::Cdrom;
        let line = encode_report(&StatusReport::new([&cdrom], vec![], vec![])).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["usb_devices"][0]["isMountedAsCDROM"], true);
        assert_eq!(value["usb_devices"][0]["isMountedAsFlash"], false);
    }

    #[test]
    fn test_write_report_flushes_single_line() {
        let mut out = Vec::new();
        let storage = make_storage_record('G', "tab\there");
        write_report(&mut out, &StatusReport::new([&storage], vec![], vec![])).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(r#""friendlyName":"tab\there""#));
    }
}

mod commands {
    use super::*;

    #[test]
    fn test_safe_eject_targets() {
        for (line, expected) in [
            (r"safe_eject: E:\", r"E:\"),
            ("safe_eject: e:", "e:"),
            ("safe_eject: E:\\\r", r"E:\"),
            ("safe_eject:   H:\\  ", r"H:\"),
        ] {
            assert_eq!(
                Command::parse(line),
                Some(Command::SafeEject {
                    target: expected.to_string()
                }),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_unrecognized_lines() {
        for line in ["", "hello", "safe_eject", "safe_eject:E:\\", "Safe_Eject: E:\\"] {
            assert_eq!(Command::parse(line), None, "line {:?}", line);
        }
    }
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any device text yields one valid JSON line
        #[test]
        fn prop_report_line_always_valid(
            name in any::<String>(),
            event in any::<String>(),
            failure in any::<String>(),
        ) {
            let storage = make_storage_record('E', &name);
            let report = StatusReport::new([&storage], vec![failure], vec![event]);
            let line = encode_report(&report).unwrap();

            prop_assert!(!line.contains('\n'));
            prop_assert!(line.is_ascii());
            prop_assert!(!line.contains("\\u"));
            let value: Value = serde_json::from_str(&line).unwrap();
            prop_assert_eq!(value["usb_devices"].as_array().unwrap().len(), 1);
        }

        /// Property: sanitizing preserves the byte length
        #[test]
        fn prop_sanitize_preserves_byte_length(text in any::<String>()) {
            let sanitized = sanitize_json_text(&text);
            prop_assert_eq!(sanitized.len(), text.len());
            prop_assert!(sanitized.is_ascii());
        }
    }
}
