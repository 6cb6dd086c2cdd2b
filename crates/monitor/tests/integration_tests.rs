//! Monitor Integration Tests
//!
//! Drives the public API against the simulated backends:
//! - Polling ticks through the reporter and state
//! - Eject pipeline short-circuiting and soft success
//! - Command reader feeding the eject pipeline while ticks run
//!
//! Run with: `cargo test -p monitor --test integration_tests`

use monitor::command::run_command_reader;
use monitor::reporter::Reporter;
use monitor::state::MonitorState;
use monitor::test_utils::{MockDeviceSource, MockEjectBackend, StageCall, removable_drive, usb_device};
use monitor::usb::{DeviceEnumerator, EjectOrchestrator, EjectOutcome, EjectStage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn reporter(source: MockDeviceSource, state: Arc<MonitorState>) -> Reporter<MockDeviceSource> {
    Reporter::new(DeviceEnumerator::new(source), state)
}

fn orchestrator(
    backend: MockEjectBackend,
    state: Arc<MonitorState>,
) -> EjectOrchestrator<MockEjectBackend> {
    EjectOrchestrator::new(backend, state, Duration::ZERO)
}

// ============================================================================
// Polling
// ============================================================================

mod polling {
    use super::*;

    #[tokio::test]
    async fn test_first_tick_connects_then_stays_quiet() {
        let state = Arc::new(MonitorState::unbounded());
        let source = MockDeviceSource::new().with_drive(removable_drive('E', "STICK"));
        let reporter = reporter(source, state.clone());

        reporter.tick().await.unwrap();
        let events = state.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("connected"));
        assert!(events[0].contains(r"E:\"));

        reporter.tick().await.unwrap();
        assert_eq!(state.events().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_host_emits_valid_json() {
        let state = Arc::new(MonitorState::unbounded());
        let reporter = reporter(MockDeviceSource::new(), state);

        let mut out = Vec::new();
        reporter.emit(&mut out).await.unwrap();

        let line = String::from_utf8(out).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["usb_devices"], serde_json::json!([]));
        assert_eq!(value["safe_removal_failures"], serde_json::json!([]));
        assert_eq!(value["recent_events"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_report_lists_storage_and_peripherals() {
        let state = Arc::new(MonitorState::unbounded());
        let source = MockDeviceSource::new()
            .with_drive(removable_drive('E', "STICK"))
            .with_device(usb_device(r"USB\VID_1532&PID_0071", r"USB\VID_1532&PID_0071\7&3A"));
        let reporter = reporter(source, state);

        let mut out = Vec::new();
        reporter.emit(&mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let devices = value["usb_devices"].as_array().unwrap();
        assert_eq!(devices.len(), 2);

        let stick = devices.iter().find(|d| d["driveLetter"] == r"E:\").unwrap();
        assert_eq!(stick["isStorageDevice"], true);
        assert_eq!(stick["isMountedAsFlash"], true);
        assert_eq!(stick["isSafeToEject"], true);

        let mouse = devices.iter().find(|d| d["driveLetter"] == "").unwrap();
        assert_eq!(mouse["friendlyName"], "Razer Device PID_0071");
        assert_eq!(mouse["isSafeToEject"], false);
    }

    #[tokio::test]
    async fn test_unplug_and_replug_across_ticks() {
        let state = Arc::new(MonitorState::unbounded());
        let source = MockDeviceSource::new().with_drive(removable_drive('F', "BACKUP"));
        let reporter = reporter(source.clone(), state.clone());

        reporter.tick().await.unwrap();
        source.set_drives(Vec::new());
        reporter.tick().await.unwrap();
        source.set_drives(vec![removable_drive('F', "BACKUP")]);
        reporter.tick().await.unwrap();

        assert_eq!(
            state.events(),
            vec![
                r"USB device connected: BACKUP (F:\)".to_string(),
                r"USB device removed: BACKUP (F:\)".to_string(),
                r"USB device connected: BACKUP (F:\)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_ascii_label_is_reported_as_spaces() {
        let state = Arc::new(MonitorState::unbounded());
        let source = MockDeviceSource::new().with_drive(removable_drive('G', "D\u{e9}j\u{e0}"));
        let reporter = reporter(source, state);

        let mut out = Vec::new();
        reporter.emit(&mut out).await.unwrap();
        assert!(out.is_ascii());

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["usb_devices"][0]["friendlyName"], "D  j  ");
    }
}

// ============================================================================
// Eject pipeline
// ============================================================================

mod eject {
    use super::*;

    #[test]
    fn test_dismount_failure_short_circuits() {
        let state = Arc::new(MonitorState::unbounded());
        let orch = orchestrator(MockEjectBackend::new().fail_dismount(32), state.clone());

        let outcome = orch.safe_eject(r"E:\");
        let EjectOutcome::Failed(failure) = &outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(failure.stage, EjectStage::Dismount);

        assert_eq!(
            orch.backend().calls(),
            vec![
                StageCall::Open,
                StageCall::Lock,
                StageCall::Dismount,
                StageCall::Close,
            ]
        );
        assert_eq!(
            state.failures(),
            vec![r"E:\ (dismount failed, error 32)".to_string()]
        );
        assert_eq!(state.events().len(), 1);
    }

    #[test]
    fn test_reopen_failure_is_ready_for_manual_removal() {
        let state = Arc::new(MonitorState::unbounded());
        let backend = MockEjectBackend::new()
            .fail_device_eject()
            .fail_open_at(2, 32);
        let orch = orchestrator(backend, state.clone());

        let outcome = orch.safe_eject(r"E:\");
        assert_eq!(outcome, EjectOutcome::ReadyForManualRemoval);
        assert!(outcome.is_success());

        let calls = orch.backend().calls();
        assert!(!calls.contains(&StageCall::EjectMedia));
        assert!(!calls.contains(&StageCall::QueryRemoveSubtree));
        assert!(state.failures().is_empty());
        assert_eq!(
            state.events(),
            vec![r"Dismounted device (ready for manual removal): E:\".to_string()]
        );
    }

    #[test]
    fn test_failed_eject_shows_up_in_next_report() {
        let state = Arc::new(MonitorState::unbounded());
        let orch = orchestrator(MockEjectBackend::new().fail_open_at(1, 5), state.clone());
        orch.safe_eject("E:");

        let report = state.report();
        assert_eq!(report.safe_removal_failures, vec![r"E:\ (open failed, error 5)".to_string()]);
        assert_eq!(report.recent_events.len(), 1);
    }
}

// ============================================================================
// Command channel
// ============================================================================

mod commands {
    use super::*;

    #[test]
    fn test_commands_and_ticks_share_state() {
        let state = Arc::new(MonitorState::unbounded());
        let orch = Arc::new(orchestrator(MockEjectBackend::new(), state.clone()));

        let reader_orch = orch.clone();
        let reader = std::thread::spawn(move || {
            let input = Cursor::new("safe_eject: E:\\\r\nsafe_eject: F:\\\r\n");
            run_command_reader(input, &*reader_orch)
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let source = MockDeviceSource::new().with_drive(removable_drive('E', "STICK"));
        let reporter = reporter(source, state.clone());
        runtime.block_on(async {
            for _ in 0..3 {
                reporter.tick().await.unwrap();
            }
        });

        assert_eq!(reader.join().unwrap(), 2);

        let events = state.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.starts_with("Successfully ejected device"))
                .count(),
            2
        );
        assert_eq!(
            events.iter().filter(|e| e.starts_with("USB device connected")).count(),
            1
        );
    }
}
