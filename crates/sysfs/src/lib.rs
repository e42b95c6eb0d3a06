// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A lazy, cached object model over Linux sysfs device trees.
//!
//! The kernel exposes device topology as a forest of directories, attribute
//! files and symlinks. This crate wraps one directory as a [`SysfsNode`]
//! path handle and builds domain entities ([`SysfsObject`], [`SysfsDevice`])
//! on top of it. Attribute file contents are discovered eagerly (a directory
//! listing) but read lazily, and cached per object.
//!
//! No global sysfs root: callers construct a root node explicitly (usually
//! `SysfsNode::new("/sys")`) and pass it down, which also makes the whole
//! model trivially testable against a generated directory tree.

mod attrs;
mod error;
mod node;
mod object;

pub use attrs::SysfsAttributes;
pub use error::Error;
pub use node::SysfsNode;
pub use object::{SysfsDevice, SysfsObject};

/// Sanitizes raw bytes read from a sysfs attribute file.
///
/// Hardware-reported strings (vendor, model, serial fields) routinely carry
/// NUL padding and non-UTF-8 garbage. NUL bytes are dropped, undecodable
/// sequences become U+FFFD, and surrounding whitespace is trimmed. The
/// function is idempotent: sanitizing an already-sanitized string returns
/// the same string.
pub fn sanitize(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != '\0')
        .collect::<String>()
        .trim()
        .to_owned()
}
