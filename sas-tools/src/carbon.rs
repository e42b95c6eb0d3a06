// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Carbon/Graphite plaintext protocol: `<dotted.path> <value> <timestamp>`.

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Carbon path components must not contain whitespace.
pub(crate) fn sanitize_path(path: &str) -> String {
    path.replace(' ', "_")
}

/// Counter values: sysfs exposes some counters as hex (`0x1f`); Carbon wants
/// plain decimal. Non-hex values pass through unchanged.
pub(crate) fn counter_value(raw: &str) -> String {
    if let Some(hex) = raw.strip_prefix("0x") {
        if let Ok(value) = u64::from_str_radix(hex, 16) {
            return value.to_string();
        }
    }
    raw.to_owned()
}

pub(crate) fn emit(path: &str, raw_value: &str, timestamp: u64) {
    println!(
        "{} {} {timestamp}",
        sanitize_path(path),
        counter_value(raw_value)
    );
}
