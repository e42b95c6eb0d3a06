// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Enclosure-grouped device table: logical units collapsed across multipath,
//! grouped by the enclosures their paths traverse, folded into one row per
//! identical presentation in non-verbose mode.

use itertools::Itertools;

use sas::group::{self, EnclosureGroup, LogicalUnit};
use sas::scsi::EnclosureDevice;
use sas::ses;
use sysfs::SysfsNode;

use crate::format::format_size;
use crate::CmdResult;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// List every logical unit instead of folding identical rows
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(root: &SysfsNode, args: &Args) -> CmdResult {
    let hosts = sas::enumerate_hosts(root)?;
    if args.verbose {
        println!(
            "Found {} SAS hosts: {}",
            hosts.len(),
            hosts.iter().map(|h| h.name()).join(",")
        );
    } else {
        println!("Found {} SAS hosts", hosts.len());
    }

    let expanders = sas::enumerate_expanders(root)?;
    if args.verbose {
        println!(
            "Found {} SAS expanders: {}",
            expanders.len(),
            expanders.iter().map(|e| e.name()).join(",")
        );
    } else {
        println!("Found {} SAS expanders", expanders.len());
    }

    let end_devices = sas::enumerate_end_devices(root)?;
    let units = group::logical_units(&end_devices);
    let grouped = group::group_by_enclosure(units);

    println!("Found {} enclosure groups", grouped.groups.len());
    if !grouped.orphans.is_empty() {
        println!("Found {} orphan devices", grouped.orphans.len());
    }

    for enclosure_group in &grouped.groups {
        print_group(enclosure_group, args);
    }

    if !grouped.orphans.is_empty() {
        println!("Orphan devices:");
        for unit in &grouped.orphans {
            print_unit_row(unit, None);
        }
    }
    Ok(())
}

fn print_group(enclosure_group: &EnclosureGroup, args: &Args) {
    let labels: String = enclosure_group
        .enclosures
        .iter()
        .map(describe_enclosure)
        .collect();
    println!("Enclosure group: {labels}");

    let max_paths = enclosure_group.max_paths();
    if args.verbose {
        for unit in &enclosure_group.units {
            print_unit_row(unit, Some(max_paths));
        }
    } else {
        println!(
            "NUM   {:>12} {:>16} {:>6} {:>8} {:>5}",
            "VENDOR", "MODEL", "REV", "SIZE", "PATHS"
        );
        for row in group::fold_units(&enclosure_group.units, max_paths) {
            let paths = if row.partial {
                format!("{}*", row.key.paths)
            } else {
                format!("{} ", row.key.paths)
            };
            println!(
                "{:3} x {:>12} {:>16} {:>6} {:>8} {:>5}",
                row.count,
                row.key.vendor,
                row.key.model,
                row.key.rev,
                row.key.size_bytes.map_or_else(|| "N/A".to_owned(), format_size),
                paths
            );
        }
    }
    println!(
        "Total: {} block devices in enclosure group",
        enclosure_group.units.len()
    );
}

/// `[nickname]` when SES has one, `[vendor model, addr: …]` otherwise.
fn describe_enclosure(enclosure: &EnclosureDevice) -> String {
    match ses::snic_nickname(&enclosure.scsi_generic.sg_name) {
        Some(snic) => format!("[{snic}]"),
        None => format!(
            "[{} {}, addr: {}]",
            enclosure.attrs().get_or("vendor", "N/A"),
            enclosure.attrs().get_or("model", "N/A"),
            enclosure.attrs().get_or("sas_address", "N/A")
        ),
    }
}

fn print_unit_row(unit: &LogicalUnit, max_paths: Option<usize>) {
    let key = group::fold_key(unit);
    let paths = match max_paths {
        Some(max) if unit.devices.len() < max => format!("{}*", unit.devices.len()),
        _ => format!("{}", unit.devices.len()),
    };
    println!(
        "  {:>18} {:>12} {:>12} {:<3} {:>12} {:>16} {:>6} {:>8}",
        unit.key,
        unit.block_names().join(","),
        unit.sg_names().join(","),
        paths,
        key.vendor,
        key.model,
        key.rev,
        key.size_bytes.map_or_else(|| "N/A".to_owned(), format_size),
    );
}
