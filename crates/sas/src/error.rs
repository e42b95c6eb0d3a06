// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

/// Error type for the sas crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem lookup failure from the sysfs layer.
    #[error(transparent)]
    Sysfs(#[from] sysfs::Error),

    /// The device identification VPD page could not be decoded: either the
    /// descriptor length walk left the buffer, or no logical-unit NAA
    /// designator is present. Recovered by the `scsi_id` fallback.
    #[error("unusable VPD page 0x83 data: {0}")]
    MalformedVpd(&'static str),

    /// An external helper produced no parseable output. Recovered by
    /// yielding empty results, never retried.
    #[error("{command}: {reason}")]
    Collaborator {
        /// Helper binary name
        command: &'static str,
        /// What went wrong, for diagnostics
        reason: String,
    },

    /// Multipath slaves of one dm device disagree on their bay identifier;
    /// no meaningful alias can be built.
    #[error("inconsistent bay identifiers across multipath slaves: {0:?}")]
    InconsistentBays(Vec<u32>),
}

pub type Result<T> = std::result::Result<T, Error>;
