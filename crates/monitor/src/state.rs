//! Shared monitor state
//!
//! [`MonitorState`] owns the previous snapshot together with the event and
//! failure logs behind one mutex. The report loop is the only caller of
//! [`MonitorState::apply_snapshot`]; the eject path only appends to the
//! logs. No OS call is ever made while the lock is held.

use crate::config::RetentionSettings;
use common::BoundedLog;
use protocol::{DeviceKey, DeviceRecord, StatusReport};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Devices observed at one polling tick, keyed by identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    devices: BTreeMap<DeviceKey, DeviceRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, keeping the first record seen for each key
    pub fn from_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let mut snapshot = Self::new();
        for record in records {
            snapshot.insert_if_absent(record);
        }
        snapshot
    }

    /// Insert a record unless its key is already present
    ///
    /// Returns `true` when the record was inserted.
    pub fn insert_if_absent(&mut self, record: DeviceRecord) -> bool {
        match self.devices.entry(record.identity_key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains_key(&self, key: &DeviceKey) -> bool {
        self.devices.contains_key(key)
    }

    pub fn get(&self, key: &DeviceKey) -> Option<&DeviceRecord> {
        self.devices.get(key)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DeviceKey> {
        self.devices.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceKey, &DeviceRecord)> {
        self.devices.iter()
    }
}

/// Connect or disconnect transition between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected { key: DeviceKey, name: String },
    Removed { key: DeviceKey, name: String },
}

impl DeviceEvent {
    pub fn key(&self) -> &DeviceKey {
        match self {
            DeviceEvent::Connected { key, .. } | DeviceEvent::Removed { key, .. } => key,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, DeviceEvent::Connected { .. })
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Connected { key, name } => {
                write!(f, "USB device connected: {} ({})", name, key)
            }
            DeviceEvent::Removed { key, name } => {
                write!(f, "USB device removed: {} ({})", name, key)
            }
        }
    }
}

/// Key-set difference between two snapshots
///
/// Connect events come first (in key order), then removals. Record values
/// are never compared: a key present in both snapshots yields no event.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<DeviceEvent> {
    let connected = current
        .iter()
        .filter(|(key, _)| !previous.contains_key(key))
        .map(|(key, record)| DeviceEvent::Connected {
            key: key.clone(),
            name: record.friendly_name.clone(),
        });

    let removed = previous
        .iter()
        .filter(|(key, _)| !current.contains_key(key))
        .map(|(key, record)| DeviceEvent::Removed {
            key: key.clone(),
            name: record.friendly_name.clone(),
        });

    connected.chain(removed).collect()
}

struct Inner {
    previous: Snapshot,
    events: BoundedLog<String>,
    failures: BoundedLog<String>,
}

/// Previous snapshot plus the event and failure logs
pub struct MonitorState {
    inner: Mutex<Inner>,
}

impl MonitorState {
    /// Create empty state with the given retention limits
    pub fn new(retention: &RetentionSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                previous: Snapshot::new(),
                events: BoundedLog::new(retention.max_events),
                failures: BoundedLog::new(retention.max_failures),
            }),
        }
    }

    /// Create empty state that never drops log entries
    pub fn unbounded() -> Self {
        Self::new(&RetentionSettings::unbounded())
    }

    // Critical sections are single appends or a replace, so a panic while
    // holding the lock cannot leave the data half-updated.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Diff `current` against the previous snapshot, log the transitions
    /// and make `current` the new previous snapshot
    pub fn apply_snapshot(&self, current: Snapshot) -> Vec<DeviceEvent> {
        let mut inner = self.lock();
        let events = diff(&inner.previous, &current);
        for event in &events {
            inner.events.push(event.to_string());
        }
        inner.previous = current;
        drop(inner);

        for event in &events {
            info!("{}", event);
        }
        events
    }

    /// Append an entry to the event log
    pub fn record_event(&self, entry: impl Into<String>) {
        self.lock().events.push(entry.into());
    }

    /// Append an entry to the failure log
    pub fn record_failure(&self, entry: impl Into<String>) {
        self.lock().failures.push(entry.into());
    }

    /// Append a terminal eject failure to both logs
    pub fn record_eject_failure(&self, event: impl Into<String>, failure: impl Into<String>) {
        let mut inner = self.lock();
        inner.events.push(event.into());
        inner.failures.push(failure.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.to_vec()
    }

    pub fn failures(&self) -> Vec<String> {
        self.lock().failures.to_vec()
    }

    /// Copy of the previous snapshot
    pub fn previous(&self) -> Snapshot {
        self.lock().previous.clone()
    }

    /// Build the status report for the last applied snapshot
    pub fn report(&self) -> StatusReport {
        let inner = self.lock();
        StatusReport::new(
            inner.previous.records(),
            inner.failures.to_vec(),
            inner.events.to_vec(),
        )
    }
}

impl fmt::Debug for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MonitorState")
            .field("devices", &inner.previous.len())
            .field("events", &inner.events.len())
            .field("failures", &inner.failures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MountKind;

    fn storage(letter: &str, name: &str) -> DeviceRecord {
        DeviceRecord {
            path: format!(r"\\?\Volume{{{}}}\", name),
            drive_letter: Some(letter.to_string()),
            is_storage: true,
            mount_kind: MountKind::Removable,
            friendly_name: name.to_string(),
            hardware_id: String::new(),
            device_instance_id: letter.to_string(),
            safe_to_eject: true,
        }
    }

    fn peripheral(instance: &str, name: &str) -> DeviceRecord {
        DeviceRecord {
            path: instance.to_string(),
            friendly_name: name.to_string(),
            hardware_id: instance.to_string(),
            device_instance_id: instance.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_diff_reports_everything_connected() {
        let current = Snapshot::from_records([
            storage(r"E:\", "STICK"),
            peripheral(r"USB\VID_046D&PID_C52B\1", "Logitech Device PID_C52B"),
        ]);

        let events = diff(&Snapshot::new(), &current);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(DeviceEvent::is_connected));
    }

    #[test]
    fn test_changed_metadata_under_same_key_is_silent() {
        let previous = Snapshot::from_records([storage(r"E:\", "OLD")]);
        let current = Snapshot::from_records([storage(r"E:\", "NEW")]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn test_removed_event_uses_previous_name() {
        let previous = Snapshot::from_records([storage(r"F:\", "BACKUP")]);
        let events = diff(&previous, &Snapshot::new());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_string(), r"USB device removed: BACKUP (F:\)");
    }

    #[test]
    fn test_snapshot_keeps_first_record_per_key() {
        let snapshot = Snapshot::from_records([storage(r"E:\", "FIRST"), storage(r"E:\", "SECOND")]);
        assert_eq!(snapshot.len(), 1);
        let key = DeviceKey(r"E:\".to_string());
        assert_eq!(snapshot.get(&key).unwrap().friendly_name, "FIRST");
    }

    #[test]
    fn test_apply_snapshot_replaces_previous() {
        let state = MonitorState::unbounded();

        let events = state.apply_snapshot(Snapshot::from_records([storage(r"E:\", "STICK")]));
        assert_eq!(events.len(), 1);
        assert_eq!(state.events(), vec![r"USB device connected: STICK (E:\)".to_string()]);

        let events = state.apply_snapshot(Snapshot::from_records([storage(r"G:\", "OTHER")]));
        assert_eq!(events.len(), 2);
        assert_eq!(state.previous().len(), 1);
        assert_eq!(state.events().len(), 3);
    }

    #[test]
    fn test_eject_failure_goes_to_both_logs() {
        let state = MonitorState::unbounded();
        state.record_eject_failure("event", "failure");
        assert_eq!(state.events(), vec!["event".to_string()]);
        assert_eq!(state.failures(), vec!["failure".to_string()]);
    }

    #[test]
    fn test_retention_limits_apply() {
        let state = MonitorState::new(&RetentionSettings {
            max_events: 2,
            max_failures: 1,
        });
        for i in 0..5 {
            state.record_event(format!("event {}", i));
            state.record_failure(format!("failure {}", i));
        }
        assert_eq!(state.events(), vec!["event 3".to_string(), "event 4".to_string()]);
        assert_eq!(state.failures(), vec!["failure 4".to_string()]);
    }

    #[test]
    fn test_report_reflects_previous_snapshot() {
        let state = MonitorState::unbounded();
        let report = state.report();
        assert!(report.usb_devices.is_empty());
        assert!(report.recent_events.is_empty());

        state.apply_snapshot(Snapshot::from_records([storage(r"E:\", "STICK")]));
        let report = state.report();
        assert_eq!(report.usb_devices.len(), 1);
        assert_eq!(report.usb_devices[0].drive_letter, r"E:\");
        assert_eq!(report.recent_events.len(), 1);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let state = std::sync::Arc::new(MonitorState::unbounded());
        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the state lock");
        })
        .join();

        state.record_event("after poison");
        assert_eq!(state.events(), vec!["after poison".to_string()]);
    }
}
