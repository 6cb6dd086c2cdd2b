//! Status report encoding
//!
//! Reports are written as one JSON object per line. Before serialization
//! every string is reduced to printable ASCII plus the five control
//! characters JSON has short escapes for (`\b \f \n \r \t`); any other byte
//! becomes a space. serde_json then escapes `"`, `\` and those five
//! characters, so the output line never contains a `\u` escape.
//!
//! # Line Format
//!
//! ```text
//! {"usb_devices":[...],"safe_removal_failures":[...],"recent_events":[...]}\n
//! ```

use crate::error::Result;
use crate::messages::{DeviceEntry, StatusReport};
use std::io::Write;

/// Replace every byte outside printable ASCII with a space
///
/// Multi-byte characters become one space per byte.
///
/// # Example
/// ```
/// use protocol::printable_ascii;
///
/// assert_eq!(printable_ascii("USB\tDisk"), "USB Disk");
/// assert_eq!(printable_ascii("Fl\u{e4}sh"), "Fl  sh");
/// ```
pub fn printable_ascii(input: &str) -> String {
    replace_bytes(input, |c| matches!(c, ' '..='~'))
}

/// Sanitize a string for the JSON report line
///
/// Keeps printable ASCII and `\b \f \n \r \t`; every other byte becomes a
/// space.
pub fn sanitize_json_text(input: &str) -> String {
    replace_bytes(input, |c| {
        matches!(c, ' '..='~' | '\u{8}' | '\u{c}' | '\n' | '\r' | '\t')
    })
}

/// True when every character is printable ASCII
pub fn is_printable_ascii(input: &str) -> bool {
    input.chars().all(|c| matches!(c, ' '..='~'))
}

fn replace_bytes(input: &str, keep: impl Fn(char) -> bool) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        if keep(c) {
            output.push(c);
        } else {
            output.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    }
    output
}

fn sanitize_entry(entry: &DeviceEntry) -> DeviceEntry {
    DeviceEntry {
        device_path: sanitize_json_text(&entry.device_path),
        drive_letter: sanitize_json_text(&entry.drive_letter),
        friendly_name: sanitize_json_text(&entry.friendly_name),
        device_instance_id: sanitize_json_text(&entry.device_instance_id),
        ..entry.clone()
    }
}

/// Encode a status report as a single JSON line (without the newline)
///
/// # Example
/// ```
/// use protocol::{StatusReport, encode_report};
///
/// let line = encode_report(&StatusReport::default()).unwrap();
/// assert_eq!(
///     line,
///     r#"{"usb_devices":[],"safe_removal_failures":[],"recent_events":[]}"#
/// );
/// ```
pub fn encode_report(report: &StatusReport) -> Result<String> {
    let sanitized = StatusReport {
        usb_devices: report.usb_devices.iter().map(sanitize_entry).collect(),
        safe_removal_failures: report
            .safe_removal_failures
            .iter()
            .map(|s| sanitize_json_text(s))
            .collect(),
        recent_events: report
            .recent_events
            .iter()
            .map(|s| sanitize_json_text(s))
            .collect(),
    };

    Ok(serde_json::to_string(&sanitized)?)
}

/// Write a status report line and flush the writer
pub fn write_report<W: Write>(writer: &mut W, report: &StatusReport) -> Result<()> {
    let line = encode_report(report)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
