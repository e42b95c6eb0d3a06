// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! udev alias generators: `{nickname}-bay{NN}` from the SES enclosure
//! nickname and drive bay identifier.
//!
//! Intended for udev PROGRAM rules, e.g.
//! `KERNEL=="sd*", PROGRAM="/usr/bin/sas-tools sd-alias %k", SYMLINK+="%c"`,
//! the dm-multipath analog with `mpath-alias`, and the `st-`prefixed tape
//! variant with `st-alias`.

use sas::scsi::ArrayDevice;
use sas::{ses, SasBlockDevice, SasEndDevice, SasTapeDevice};
use sysfs::SysfsNode;

use crate::CmdResult;

#[derive(Debug, clap::Args)]
pub struct SdArgs {
    /// Kernel block device name (e.g. sdab, partitions accepted)
    pub blkdev: String,
}

#[derive(Debug, clap::Args)]
pub struct MpathArgs {
    /// Kernel device-mapper device name (e.g. dm-5)
    pub dmdev: String,
}

#[derive(Debug, clap::Args)]
pub struct StArgs {
    /// Kernel tape device name (e.g. st7)
    pub stdev: String,
}

pub fn run_sd(root: &SysfsNode, args: &SdArgs) -> CmdResult {
    // partition names alias to their whole disk
    let disk = args.blkdev.trim_end_matches(|c: char| c.is_ascii_digit());
    let device = root.child("block")?.child(disk)?.child("device")?;
    let blkdev = SasBlockDevice::new(&device)?;
    let (nickname, bay) = resolve_slot(
        blkdev.block.array_device(),
        &blkdev.end_device,
        blkdev.block.device(),
        disk,
    )?;
    println!("{}", format_alias(&nickname, bay));
    Ok(())
}

pub fn run_mpath(root: &SysfsNode, args: &MpathArgs) -> CmdResult {
    let slaves = root
        .child("block")?
        .child(&args.dmdev)?
        .child("slaves")?;
    let mut nodes = slaves.children()?;
    nodes.sort_by_key(|node| node.name().to_owned());

    let mut nicknames = Vec::new();
    let mut bays = Vec::new();
    for node in nodes {
        let blkdev = SasBlockDevice::new(&node.child("device")?)?;
        let (nickname, bay) = resolve_slot(
            blkdev.block.array_device(),
            &blkdev.end_device,
            blkdev.block.device(),
            &args.dmdev,
        )?;
        nicknames.push(nickname);
        bays.push(bay);
    }

    if let Some(alias) = build_alias(&nicknames, &bays)? {
        println!("{alias}");
    }
    Ok(())
}

pub fn run_st(root: &SysfsNode, args: &StArgs) -> CmdResult {
    let device = root
        .child("class")?
        .child("scsi_tape")?
        .child(&args.stdev)?
        .child("device")?;
    let tapedev = SasTapeDevice::new(&device)?;
    let (nickname, bay) = resolve_slot(
        tapedev.tape.array_device(),
        &tapedev.end_device,
        tapedev.tape.device(),
        &args.stdev,
    )?;
    println!("st-{}", format_alias(&nickname, bay));
    Ok(())
}

/// Enclosure nickname and bay identifier for one path. The nickname falls
/// back to the enclosure wwid, then to `<name>_unknown`, so the alias stays
/// usable on hardware without a SES nickname set.
fn resolve_slot(
    array: Option<&ArrayDevice>,
    end_device: &SasEndDevice,
    device_node: &SysfsNode,
    name: &str,
) -> Result<(String, u32), Box<dyn std::error::Error>> {
    let array = array.ok_or_else(|| sysfs::Error::NotFound {
        path: device_node.path().to_path_buf(),
        pattern: String::from("enclosure_device:*"),
    })?;
    let enclosure = &array.enclosure;

    let fallback = enclosure
        .attrs()
        .try_get("wwid")
        .unwrap_or_else(|| format!("{name}_unknown"));
    let nickname =
        ses::snic_nickname(&enclosure.scsi_generic.sg_name).unwrap_or(fallback);

    let bay = end_device
        .bay_identifier()
        .ok_or_else(|| sysfs::Error::AttributeNotFound {
            name: String::from("bay_identifier"),
        })?;
    Ok((nickname, bay))
}

/// Combines per-path nicknames and bay identifiers into one alias. Paths
/// must agree on the bay; nicknames are reduced to their common prefix
/// (multipath enclosures are commonly named `jbod3-left`/`jbod3-right`).
fn build_alias(nicknames: &[String], bays: &[u32]) -> Result<Option<String>, sas::Error> {
    let Some(&bay) = bays.first() else {
        return Ok(None);
    };
    if bays.iter().any(|&b| b != bay) {
        return Err(sas::Error::InconsistentBays(bays.to_vec()));
    }
    let nickname = common_prefix(nicknames)
        .trim_end_matches(['-', '_', ' '])
        .replace(' ', "_");
    Ok(Some(format_alias(&nickname, bay)))
}

fn format_alias(nickname: &str, bay: u32) -> String {
    format!("{nickname}-bay{bay:02}")
}

/// Longest common prefix, compared per character so the cut never lands
/// inside a multibyte sequence.
fn common_prefix(values: &[String]) -> &str {
    let Some(first) = values.first() else {
        return "";
    };
    let mut end = first.len();
    for value in &values[1..] {
        let mut common = 0;
        for ((idx, a), b) in first[..end].char_indices().zip(value.chars()) {
            if a != b {
                break;
            }
            common = idx + a.len_utf8();
        }
        end = common;
    }
    &first[..end]
}
