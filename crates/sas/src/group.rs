// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Logical unit identity and enclosure grouping.
//!
//! Multipath fabrics expose the same logical unit through several SCSI
//! devices; devices are first collapsed by LU identity, then LUs are grouped
//! by the set of enclosures their paths traverse. Overlapping enclosure sets
//! merge transitively, so the result does not depend on enumeration order.

use std::collections::BTreeSet;

use crate::scsi::{EnclosureDevice, ScsiDevice};
use crate::topology::SasEndDevice;
use crate::{vpd, Error, Result};

/// Resolves the logical unit identity key for a SCSI device: sysfs
/// `vpd_pg83` bytes first, the `scsi_id` helper as fallback, and a
/// per-device placeholder when both fail. The placeholder embeds the device
/// name and error, so two unresolvable devices never collapse into one LU.
pub fn resolve_lu_key(device: &ScsiDevice) -> String {
    resolve_lu_key_with(device, vpd::scsi_id_page83_lu)
}

/// [`resolve_lu_key`] with an injectable fallback resolver.
pub fn resolve_lu_key_with<F>(device: &ScsiDevice, fallback: F) -> String
where
    F: FnOnce(&str) -> Result<String>,
{
    match try_resolve(device, fallback) {
        Ok(key) => key,
        Err(err) => {
            log::warn!("no logical unit identity for {}: {err}", device.name());
            format!("<unresolved:{}:{err}>", device.name())
        }
    }
}

fn try_resolve<F>(device: &ScsiDevice, fallback: F) -> Result<String>
where
    F: FnOnce(&str) -> Result<String>,
{
    let decoded = match device.node().read_bytes("vpd_pg83") {
        Ok(page) => decode_page(&page),
        Err(err) => {
            log::debug!("{}: no vpd_pg83 attribute ({err})", device.name());
            Err(Error::Sysfs(err))
        }
    };
    match decoded {
        Ok(lu) => Ok(lu),
        Err(err) => match device.block.as_deref() {
            Some(block) => fallback(block.name()),
            None => Err(err),
        },
    }
}

fn decode_page(page: &[u8]) -> Result<String> {
    vpd::decode_pg83_lu(page).ok_or(Error::MalformedVpd(
        "no logical-unit NAA designator in page 0x83",
    ))
}

/// One logical unit and the SCSI devices (paths) it was reached through.
/// Every member device carries a block device.
#[derive(Debug, Clone)]
pub struct LogicalUnit {
    pub key: String,
    pub devices: Vec<ScsiDevice>,
}

impl LogicalUnit {
    pub fn block_names(&self) -> Vec<&str> {
        self.devices
            .iter()
            .filter_map(|dev| dev.block.as_deref().map(|blk| blk.name()))
            .collect()
    }

    pub fn sg_names(&self) -> Vec<&str> {
        self.devices
            .iter()
            .map(|dev| dev.scsi_generic.sg_name.as_str())
            .collect()
    }

    /// Enclosures reachable from this LU's paths; paths without an
    /// enclosure link are logged and skipped.
    pub fn enclosures(&self) -> BTreeSet<EnclosureDevice> {
        let mut enclosures = BTreeSet::new();
        for device in &self.devices {
            let Some(block) = device.block.as_deref() else {
                continue;
            };
            match block.array_device() {
                Some(array) => {
                    enclosures.insert(array.enclosure.clone());
                }
                None => log::warn!(
                    "no enclosure set for {} in {}",
                    block.name(),
                    device.node().path().display()
                ),
            }
        }
        enclosures
    }
}

/// Collapses end devices into logical units keyed by LU identity, in
/// deterministic key order. End devices without a block device (enclosure
/// services processors, tapes) are ignored.
pub fn logical_units(end_devices: &[SasEndDevice]) -> Vec<LogicalUnit> {
    logical_units_with(end_devices, resolve_lu_key)
}

/// [`logical_units`] with an injectable key resolver.
pub fn logical_units_with<F>(end_devices: &[SasEndDevice], mut resolve: F) -> Vec<LogicalUnit>
where
    F: FnMut(&ScsiDevice) -> String,
{
    let mut units: Vec<LogicalUnit> = Vec::new();
    for end_device in end_devices {
        let Some(device) = end_device.scsi_device() else {
            continue;
        };
        if device.block.is_none() {
            continue;
        }
        let key = resolve(device);
        match units.iter_mut().find(|unit| unit.key == key) {
            Some(unit) => unit.devices.push(device.clone()),
            None => units.push(LogicalUnit {
                key,
                devices: vec![device.clone()],
            }),
        }
    }
    units.sort_by(|a, b| a.key.cmp(&b.key));
    units
}

/// A set of enclosures wired together by shared logical units, and the LUs
/// reachable through them.
#[derive(Debug, Clone)]
pub struct EnclosureGroup {
    pub enclosures: BTreeSet<EnclosureDevice>,
    pub units: Vec<LogicalUnit>,
}

impl EnclosureGroup {
    /// Highest path count among member LUs; the reference for the `*`
    /// partial-path marker.
    pub fn max_paths(&self) -> usize {
        self.units
            .iter()
            .map(|unit| unit.devices.len())
            .max()
            .unwrap_or(0)
    }
}

/// Result of [`group_by_enclosure`]: merged enclosure groups plus LUs with
/// no enclosure link at all.
#[derive(Debug, Clone, Default)]
pub struct GroupedDevices {
    pub groups: Vec<EnclosureGroup>,
    pub orphans: Vec<LogicalUnit>,
}

/// Partitions logical units into transitive enclosure groups and orphans.
pub fn group_by_enclosure(units: Vec<LogicalUnit>) -> GroupedDevices {
    let mut keyed = Vec::new();
    let mut orphans = Vec::new();
    for unit in units {
        let enclosures = unit.enclosures();
        if enclosures.is_empty() {
            orphans.push(unit);
        } else {
            keyed.push((enclosures, vec![unit]));
        }
    }

    let groups = merge_overlapping(keyed)
        .into_iter()
        .map(|(enclosures, units)| EnclosureGroup { enclosures, units })
        .collect();

    GroupedDevices { groups, orphans }
}

/// Merges every group of sets that share at least one element, transitively.
/// One new set overlapping two existing groups fuses all three.
fn merge_overlapping<T: Ord, U>(items: Vec<(BTreeSet<T>, Vec<U>)>) -> Vec<(BTreeSet<T>, Vec<U>)> {
    let mut groups: Vec<(BTreeSet<T>, Vec<U>)> = Vec::new();
    for (set, unit) in items {
        let mut merged_set = set;
        let mut merged_units = unit;
        // drain every existing group that overlaps the accumulated set
        let mut idx = 0;
        while idx < groups.len() {
            if groups[idx].0.is_disjoint(&merged_set) {
                idx += 1;
            } else {
                let (other_set, mut other_units) = groups.swap_remove(idx);
                merged_set.extend(other_set);
                merged_units.append(&mut other_units);
                // restart: the grown set may now overlap earlier groups
                idx = 0;
            }
        }
        groups.push((merged_set, merged_units));
    }
    groups
}

/// Presentation identity of a folded device row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FoldKey {
    pub vendor: String,
    pub model: String,
    pub rev: String,
    pub size_bytes: Option<u64>,
    pub paths: usize,
}

/// A folded table row: `count` logical units sharing one [`FoldKey`].
#[derive(Debug, Clone)]
pub struct FoldRow {
    pub key: FoldKey,
    pub count: usize,
    /// True when the row's path count falls short of the group maximum.
    pub partial: bool,
}

/// Presentation key of one logical unit, taken from its first path.
/// Display attributes degrade to `"N/A"`.
pub fn fold_key(unit: &LogicalUnit) -> FoldKey {
    let first = &unit.devices[0];
    FoldKey {
        vendor: first.attrs().get_or("vendor", "N/A"),
        model: first.attrs().get_or("model", "N/A"),
        rev: first.attrs().get_or("rev", "N/A"),
        size_bytes: first.block.as_deref().and_then(|blk| blk.size_bytes()),
        paths: unit.devices.len(),
    }
}

/// Folds logical units into deterministic, key-ordered rows; rows whose
/// path count is below `max_paths` are flagged partial.
pub fn fold_units(units: &[LogicalUnit], max_paths: usize) -> Vec<FoldRow> {
    let mut folded: std::collections::BTreeMap<FoldKey, usize> = std::collections::BTreeMap::new();
    for unit in units {
        *folded.entry(fold_key(unit)).or_insert(0) += 1;
    }
    folded
        .into_iter()
        .map(|(key, count)| {
            let partial = key.paths < max_paths;
            FoldRow { key, count, partial }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::testutil;
    use crate::topology::enumerate_end_devices;
    use sysfs::SysfsNode;

    fn int_sets(sets: &[&[u32]]) -> Vec<(BTreeSet<u32>, Vec<usize>)> {
        sets.iter()
            .enumerate()
            .map(|(idx, set)| (set.iter().copied().collect(), vec![idx]))
            .collect()
    }

    #[test]
    fn test_merge_overlapping_is_order_invariant() {
        // {A}, {B}, {A,B} must always collapse to a single group
        let perms: &[&[&[u32]]] = &[
            &[&[1], &[2], &[1, 2]],
            &[&[1], &[1, 2], &[2]],
            &[&[2], &[1], &[1, 2]],
            &[&[2], &[1, 2], &[1]],
            &[&[1, 2], &[1], &[2]],
            &[&[1, 2], &[2], &[1]],
        ];
        for perm in perms {
            let merged = merge_overlapping(int_sets(perm));
            assert_eq!(merged.len(), 1, "permutation {perm:?}");
            assert_eq!(merged[0].0, BTreeSet::from([1, 2]));
            assert_eq!(merged[0].1.len(), 3);
        }
    }

    #[test]
    fn test_merge_keeps_disjoint_groups_apart() {
        let merged = merge_overlapping(int_sets(&[&[1], &[2], &[3, 4]]));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_chained_overlap() {
        // {1,2} and {3,4} are disjoint until {2,3} bridges them
        let merged = merge_overlapping(int_sets(&[&[1, 2], &[3, 4], &[2, 3]]));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0, BTreeSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn test_scenario_a_single_group_folds() {
        let fake = testutil::scenario_a();
        let root = SysfsNode::new(fake.path());
        let end_devices = enumerate_end_devices(&root).unwrap();

        let units = logical_units(&end_devices);
        assert_eq!(units.len(), 2);

        let grouped = group_by_enclosure(units);
        assert!(grouped.orphans.is_empty());
        assert_eq!(grouped.groups.len(), 1);

        let group = &grouped.groups[0];
        assert_eq!(group.enclosures.len(), 1);
        assert_eq!(group.units.len(), 2);
        assert_eq!(group.max_paths(), 1);

        // identical presentation: one folded row covering both LUs
        let rows = fold_units(&group.units, group.max_paths());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert!(!rows[0].partial);
        assert_eq!(rows[0].key.vendor, "HGST");
        assert_eq!(rows[0].key.paths, 1);
        assert_eq!(rows[0].key.size_bytes, Some(512_000));
    }

    #[test]
    fn test_scenario_b_missing_enclosure_link_is_orphan() {
        let fake = testutil::scenario_b();
        let root = SysfsNode::new(fake.path());
        let end_devices = enumerate_end_devices(&root).unwrap();

        let units = logical_units(&end_devices);
        assert_eq!(units.len(), 1);

        let grouped = group_by_enclosure(units);
        assert!(grouped.groups.is_empty());
        assert_eq!(grouped.orphans.len(), 1);
        assert_eq!(grouped.orphans[0].block_names(), vec!["sda"]);
    }

    #[test]
    fn test_scenario_c_garbage_vpd_falls_back() {
        let fake = testutil::scenario_c();
        let root = SysfsNode::new(fake.path());
        let end_devices = enumerate_end_devices(&root).unwrap();

        let units = logical_units_with(&end_devices, |dev| {
            resolve_lu_key_with(dev, |blkdev| Ok(format!("fallback-{blkdev}")))
        });
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "fallback-sda");
    }

    #[test]
    fn test_unresolvable_devices_do_not_collapse() {
        let fake = testutil::scenario_c();
        let root = SysfsNode::new(fake.path());
        let end_devices = enumerate_end_devices(&root).unwrap();

        let failing = |dev: &ScsiDevice| {
            resolve_lu_key_with(dev, |_| {
                Err(Error::Collaborator {
                    command: "scsi_id",
                    reason: "unavailable".into(),
                })
            })
        };
        let units = logical_units_with(&end_devices, failing);
        assert_eq!(units.len(), 1);
        assert!(units[0].key.starts_with("<unresolved:0:0:1:0:"));
    }

    #[test]
    fn test_multipath_lu_and_partial_marker() {
        let fake = testutil::scenario_multipath();
        let root = SysfsNode::new(fake.path());
        let end_devices = enumerate_end_devices(&root).unwrap();

        let units = logical_units(&end_devices);
        // two paths to one LU, one path to the other
        assert_eq!(units.len(), 2);

        let grouped = group_by_enclosure(units);
        assert_eq!(grouped.groups.len(), 1);
        let group = &grouped.groups[0];
        assert_eq!(group.max_paths(), 2);

        let rows = fold_units(&group.units, group.max_paths());
        assert_eq!(rows.len(), 2);
        let partial = rows.iter().find(|row| row.key.paths == 1).unwrap();
        assert!(partial.partial);
        let full = rows.iter().find(|row| row.key.paths == 2).unwrap();
        assert!(!full.partial);
    }
}
