// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;

/// Human-readable decimal byte size, TB above one terabyte, GB below.
pub(crate) fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes >= 1e12 {
        format!("{:.1}TB", bytes / 1e12)
    } else {
        format!("{:.1}GB", bytes / 1e9)
    }
}

/// Folds repeated values into `N x value` groups, in value order:
/// `["A", "B", "A"]` becomes `"2 x A, B"`.
pub(crate) fn counted_summary(values: impl IntoIterator<Item = String>) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(value, count)| {
            if count == 1 {
                value
            } else {
                format!("{count} x {value}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
