// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use crate::{Error, SysfsAttributes, SysfsNode};

/// Base domain entity: a sysfs node, a display name and its attribute map.
///
/// Construction lists the node's regular-file children and registers them as
/// attribute paths; no file content is read until an attribute is accessed.
#[derive(Debug, Clone)]
pub struct SysfsObject {
    node: SysfsNode,
    name: String,
    attrs: SysfsAttributes,
}

impl SysfsObject {
    pub fn new(node: SysfsNode) -> Self {
        let name = node.name().to_owned();
        Self::with_name(node, name)
    }

    pub fn with_name(node: SysfsNode, name: String) -> Self {
        let mut attrs = SysfsAttributes::default();
        for file in node.glob_files("*") {
            let path = node.path().join(&file);
            attrs.add_path(&file, path);
        }
        Self { node, name, attrs }
    }

    pub fn node(&self) -> &SysfsNode {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &SysfsAttributes {
        &self.attrs
    }
}

impl fmt::Display for SysfsObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for SysfsObject {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for SysfsObject {}

impl Hash for SysfsObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

impl Ord for SysfsObject {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.node.cmp(&other.node)
    }
}

impl PartialOrd for SysfsObject {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A domain entity resolved as "the device of subsystem X" under a parent
/// device node: the backing node is the single child matching
/// `<subsys>/<pattern>` (e.g. `sas_device/end_device-20:0:12`,
/// `block/sd*`). Ambiguous patterns resolve to the first glob match,
/// deterministically; zero matches is [`Error::DeviceNotFound`], a
/// recoverable, caller-visible condition.
#[derive(Debug, Clone)]
pub struct SysfsDevice {
    object: SysfsObject,
    device: SysfsNode,
}

impl SysfsDevice {
    /// Default device name pattern: `end_device-20:2:57`, `0:0:119:0`,
    /// `host19` all end with a digit.
    pub const DEFAULT_PATTERN: &'static str = "*[0-9]";

    pub fn new(device: &SysfsNode, subsys: &str) -> Result<Self, Error> {
        Self::with_pattern(device, subsys, Self::DEFAULT_PATTERN)
    }

    pub fn with_pattern(device: &SysfsNode, subsys: &str, pattern: &str) -> Result<Self, Error> {
        let node = device
            .try_child(subsys)
            .and_then(|sub| sub.try_child(pattern))
            .ok_or_else(|| Error::DeviceNotFound {
                path: device.path().to_path_buf(),
                subsys: subsys.to_owned(),
                pattern: pattern.to_owned(),
            })?;
        Ok(Self {
            object: SysfsObject::new(node),
            device: device.clone(),
        })
    }

    /// The parent device node this entity was resolved from.
    pub fn device(&self) -> &SysfsNode {
        &self.device
    }
}

impl Deref for SysfsDevice {
    type Target = SysfsObject;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl PartialEq for SysfsDevice {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl Eq for SysfsDevice {}

impl Hash for SysfsDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object.hash(state);
    }
}
