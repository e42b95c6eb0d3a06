// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
};

use crate::{sanitize, Error};

/// Attribute map of one [`crate::SysfsObject`].
///
/// Candidate attribute names are registered eagerly from a directory listing
/// at object construction; file contents are read on first access and cached
/// for the object's lifetime. Only successful reads are cached, so a read
/// that failed once (e.g. a permission error) is retried on the next access.
#[derive(Debug, Clone, Default)]
pub struct SysfsAttributes {
    paths: BTreeMap<String, PathBuf>,
    values: RefCell<HashMap<String, String>>,
}

impl SysfsAttributes {
    /// Registers a discoverable attribute without reading it.
    pub fn add_path(&mut self, name: &str, path: PathBuf) {
        self.paths.insert(name.to_owned(), path);
    }

    /// Cached attribute value, reading the backing file on first access.
    ///
    /// Fails with [`Error::AttributeNotFound`] when the name was never
    /// registered or the backing file cannot be read.
    pub fn get(&self, name: &str) -> Result<String, Error> {
        if let Some(value) = self.values.borrow().get(name) {
            return Ok(value.clone());
        }
        let path = self.paths.get(name).ok_or_else(|| Error::AttributeNotFound {
            name: name.to_owned(),
        })?;
        let raw = fs::read(path).map_err(|_| Error::AttributeNotFound {
            name: name.to_owned(),
        })?;
        let value = sanitize(&raw);
        self.values
            .borrow_mut()
            .insert(name.to_owned(), value.clone());
        Ok(value)
    }

    pub fn try_get(&self, name: &str) -> Option<String> {
        self.get(name).ok()
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.try_get(name).unwrap_or_else(|| default.to_owned())
    }

    /// Whether `name` was registered at construction.
    pub fn contains(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    /// Registered attribute names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Resolves every registered attribute, skipping unreadable ones.
    /// Used by verbose report modes that dump whole attribute sets.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.names()
            .map(str::to_owned)
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|name| {
                let value = self.try_get(&name)?;
                Some((name, value))
            })
            .collect()
    }
}
