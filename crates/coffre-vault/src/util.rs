//! Identifier and timestamp helpers.
//!
//! Audit events and item records need a v4 UUID and an ISO 8601 wall
//! clock reading. Both are small enough to derive from `OsRng` and
//! `SystemTime` directly, which keeps `uuid` and `chrono` out of the
//! dependency tree.

use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

/// Random RFC 4122 version-4 UUID in lowercase hyphenated form.
#[must_use]
pub fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0F) | 0x40; // version nibble
    bytes[8] = (bytes[8] & 0x3F) | 0x80; // RFC 4122 variant

    let head = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let time_mid = u16::from_be_bytes([bytes[4], bytes[5]]);
    let time_hi = u16::from_be_bytes([bytes[6], bytes[7]]);
    let clock_seq = u16::from_be_bytes([bytes[8], bytes[9]]);
    let node_hi = u16::from_be_bytes([bytes[10], bytes[11]]);
    let node_lo = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    format!("{head:08x}-{time_mid:04x}-{time_hi:04x}-{clock_seq:04x}-{node_hi:04x}{node_lo:08x}")
}

/// Current UTC wall clock as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // clock fields bounded by their modulus
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let (year, month, day) = civil_date(secs / 86_400);
    let clock = secs % 86_400;
    let (hour, minute, second) = (clock / 3600, clock % 3600 / 60, clock % 60);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

/// Gregorian date for a day count since 1970-01-01.
///
/// Era-based conversion (Hinnant's `civil_from_days`), exact through
/// year 9999 — far beyond what an audit timestamp needs.
#[allow(clippy::arithmetic_side_effects)] // era arithmetic stays within u64
const fn civil_date(days_since_epoch: u64) -> (u64, u64, u64) {
    // Shift the epoch to 0000-03-01 so leap days land at year end.
    let shifted = days_since_epoch + 719_468;
    let era = shifted / 146_097;
    let day_of_era = shifted % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_point = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_point + 2) / 5 + 1;
    if month_point < 10 {
        (era * 400 + year_of_era, month_point + 3, day)
    } else {
        (era * 400 + year_of_era + 1, month_point - 9, day)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
