//! Transcript formatting.
//!
//! Every chat event renders as one line prefixed with a local timestamp:
//!
//! ```text
//! [16.10.2026 14:03:27] Connected with bob (127.0.0.1)
//! [16.10.2026 14:03:31] bob: hi
//! ```
//!
//! Lines with an author put the nickname between timestamp and text.

use chrono::NaiveDateTime;
use duet_core::ChatEvent;

/// `chrono` format of the timestamp prefix (`dd.MM.yyyy HH:mm:ss`).
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Render one event as a transcript line, without a line terminator.
pub fn format_line(event: &ChatEvent, at: NaiveDateTime) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT);
    match event.from_nick() {
        Some(nick) => format!("[{stamp}] {nick}: {}", event.text()),
        None => format!("[{stamp}] {}", event.text()),
    }
}
