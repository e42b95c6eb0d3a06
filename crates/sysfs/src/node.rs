// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{
    cmp::Ordering,
    fmt, fs,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use crate::{sanitize, Error};

/// Handle onto one directory in a sysfs-like tree.
///
/// Purely a path handle: construction never touches the filesystem, and the
/// node never mutates it except through explicit [`SysfsNode::write`] calls.
/// Identity is defined over the symlink-resolved path, because the same
/// physical device is reachable through several symlink paths (e.g.
/// `.../device` vs `.../subsystem/.../device`).
#[derive(Debug, Clone)]
pub struct SysfsNode {
    path: PathBuf,
}

impl SysfsNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this node was constructed from (symlinks not followed).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the node path, used as the default display name.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Symlink-resolved path; falls back to the raw path when resolution
    /// fails (e.g. the node disappeared mid-traversal).
    fn resolved(&self) -> PathBuf {
        fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    /// Immediate children that are directories (symlinks followed), in
    /// filesystem listing order. Callers sort when order matters.
    pub fn children(&self) -> Result<Vec<SysfsNode>, Error> {
        let entries = fs::read_dir(&self.path).map_err(|_| Error::NotFound {
            path: self.path.clone(),
            pattern: String::from("*"),
        })?;
        Ok(entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .map(SysfsNode::new)
            .collect())
    }

    fn glob_paths(&self, pattern: &str) -> Vec<PathBuf> {
        let full = self.path.join(pattern);
        match glob::glob(&full.to_string_lossy()) {
            // glob yields matches in alphabetical order
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(err) => {
                log::warn!("bad glob pattern {pattern:?} under {}: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    /// Pattern-matched children that are directories. Zero matches is not an
    /// error; this doubles as an existence probe.
    pub fn glob_dirs(&self, pattern: &str) -> Vec<SysfsNode> {
        self.glob_paths(pattern)
            .into_iter()
            .filter(|p| p.is_dir())
            .map(SysfsNode::new)
            .collect()
    }

    /// Names of pattern-matched children that are regular files.
    pub fn glob_files(&self, pattern: &str) -> Vec<String> {
        self.glob_paths(pattern)
            .into_iter()
            .filter(|p| p.is_file())
            .filter_map(|p| Some(p.file_name()?.to_str()?.to_owned()))
            .collect()
    }

    /// First directory child matching `pattern`.
    pub fn child(&self, pattern: &str) -> Result<SysfsNode, Error> {
        self.try_child(pattern).ok_or_else(|| Error::NotFound {
            path: self.path.clone(),
            pattern: pattern.to_owned(),
        })
    }

    pub fn try_child(&self, pattern: &str) -> Option<SysfsNode> {
        self.glob_dirs(pattern).into_iter().next()
    }

    /// Reads and sanitizes the content of the first readable file matching
    /// `pattern`. Unreadable matches count as missing, never as a crash.
    pub fn read(&self, pattern: &str) -> Result<String, Error> {
        self.read_bytes(pattern).map(|raw| sanitize(&raw))
    }

    pub fn try_read(&self, pattern: &str) -> Option<String> {
        self.read(pattern).ok()
    }

    pub fn read_or(&self, pattern: &str, default: &str) -> String {
        self.try_read(pattern).unwrap_or_else(|| default.to_owned())
    }

    /// Raw byte content of the first readable file matching `pattern`,
    /// unsanitized. Needed for binary attributes such as `vpd_pg83`.
    pub fn read_bytes(&self, pattern: &str) -> Result<Vec<u8>, Error> {
        self.glob_paths(pattern)
            .into_iter()
            .filter(|p| p.is_file())
            .find_map(|p| fs::read(p).ok())
            .ok_or_else(|| Error::NotFound {
                path: self.path.clone(),
                pattern: pattern.to_owned(),
            })
    }

    /// Target of the symlink named `name` under this node.
    pub fn read_link(&self, name: &str) -> Result<PathBuf, Error> {
        let path = self.path.join(name);
        fs::read_link(&path).map_err(|_| Error::NotFound {
            path: self.path.clone(),
            pattern: name.to_owned(),
        })
    }

    /// Writes `value` to every file matching `pattern`.
    ///
    /// With `ignore_errors`, both zero matches and per-file I/O failures are
    /// swallowed; otherwise zero matches is `NotFound` and the first write
    /// failure propagates.
    pub fn write(&self, pattern: &str, value: &str, ignore_errors: bool) -> Result<(), Error> {
        let mut found = false;
        for path in self.glob_paths(pattern) {
            found = true;
            if let Err(err) = fs::write(&path, value) {
                if !ignore_errors {
                    return Err(err.into());
                }
                log::warn!("write to {} failed: {err}", path.display());
            }
        }
        if !found && !ignore_errors {
            return Err(Error::NotFound {
                path: self.path.clone(),
                pattern: pattern.to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SysfsNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PartialEq for SysfsNode {
    fn eq(&self, other: &Self) -> bool {
        self.resolved() == other.resolved()
    }
}

impl Eq for SysfsNode {}

impl Hash for SysfsNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resolved().hash(state);
    }
}

impl Ord for SysfsNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.resolved().cmp(&other.resolved())
    }
}

impl PartialOrd for SysfsNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
