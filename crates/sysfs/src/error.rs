// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by sysfs lookups.
///
/// All three lookup variants are recoverable at the resolving layer: a
/// missing path can be skipped or defaulted, a missing attribute renders as
/// a placeholder, and a missing subsystem device simply means the feature
/// depending on it is absent. Only the CLI boundary turns them into a
/// diagnostic and a non-zero exit.
#[derive(Debug, Error)]
pub enum Error {
    /// A required path or glob pattern matched nothing.
    #[error("Not found: {}", .path.join(.pattern).display())]
    NotFound {
        /// Directory the lookup started from
        path: PathBuf,
        /// Pattern that matched nothing
        pattern: String,
    },

    /// A named attribute was never registered for this object, or its
    /// backing file could not be read.
    #[error("no such attribute: {name}")]
    AttributeNotFound {
        /// Attribute name as requested
        name: String,
    },

    /// A `<subsystem>/<pattern>` device resolution found no match.
    #[error("no {subsys}/{pattern} device under {}", .path.display())]
    DeviceNotFound {
        /// Parent device directory
        path: PathBuf,
        /// Subsystem directory name (e.g. `sas_device`)
        subsys: String,
        /// Device name pattern (e.g. `*[0-9]`)
        pattern: String,
    },

    /// Underlying I/O failure on an explicit write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
