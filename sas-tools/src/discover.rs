// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Fabric tree view: hosts, ports, expanders and end devices down to SCSI
//! targets, with progressively more detail per `-v` level. Homogeneous
//! end-device leaves are gathered into `N x <group>` rows at low verbosity
//! to keep large JBOD listings readable.

use itertools::Itertools;

use sas::scsi::{ScsiDevice, TYPE_ENCLOSURE};
use sas::{ses, SasEndDevice, SasExpander, SasHost, SasNode, SasPhy, SasPort};
use sysfs::SysfsNode;

use crate::format::{counted_summary, format_size};
use crate::CmdResult;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Verbosity level, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show SAS addresses
    #[arg(long)]
    pub addr: bool,

    /// Show associated sg devices
    #[arg(long)]
    pub devices: bool,

    /// Show SCSI I/O counters
    #[arg(long)]
    pub counters: bool,
}

impl Args {
    /// Extra per-device output disables leaf gathering.
    fn gathering(&self) -> bool {
        self.verbose < 2 && !self.addr && !self.devices && !self.counters
    }
}

pub fn run(root: &SysfsNode, args: &Args) -> CmdResult {
    let hosts = sas::enumerate_hosts(root)?;
    println!("{}", crate::short_hostname());
    let count = hosts.len();
    for (idx, host) in hosts.iter().enumerate() {
        render_host(host, "", idx == count - 1, args);
    }
    Ok(())
}

/// One tree row: the connector for this line and the prefix its children
/// inherit.
fn branch(prefix: &str, last: bool) -> (String, String) {
    let line = format!("{prefix}{}", if last { "`--" } else { "|--" });
    let child = format!("{prefix}{}", if last { "   " } else { "|  " });
    (line, child)
}

fn render_host(host: &SasHost, prefix: &str, last: bool, args: &Args) {
    let (line, child_prefix) = branch(prefix, last);
    println!("{line}{}", host_text(host, args));
    render_ports(host.ports(), &child_prefix, args);
}

fn host_text(host: &SasHost, args: &Args) -> String {
    let attrs = host.scsi_host.attrs();
    let mut info = Vec::new();
    if args.verbose > 1 {
        info.push(format!(
            "board: {} {} {}",
            attrs.get_or("board_name", "N/A"),
            attrs.get_or("board_assembly", "N/A"),
            attrs.get_or("board_tracer", "N/A")
        ));
        info.push(format!("product: {}", attrs.get_or("version_product", "N/A")));
        info.push(format!("bios: {}", attrs.get_or("version_bios", "N/A")));
        info.push(format!("fw: {}", attrs.get_or("version_fw", "N/A")));
    } else if args.verbose > 0 {
        info.push(attrs.get_or("board_name", "N/A"));
    }
    if args.addr {
        info.push(format!("addr: {}", attrs.get_or("host_sas_address", "N/A")));
    }
    if info.is_empty() {
        host.name().to_owned()
    } else {
        format!("{} {}", host.name(), info.join(", "))
    }
}

enum Child<'a> {
    Expander {
        expander: &'a SasExpander,
        nphys: usize,
        speed: String,
    },
    EndDevice {
        end_device: &'a SasEndDevice,
        nphys: usize,
        speed: String,
    },
}

fn render_ports(ports: &[SasPort], prefix: &str, args: &Args) {
    let mut children = Vec::new();
    for port in sorted_ports(ports) {
        let nphys = port.phys.len();
        let speed = linkrate_summary(&port.phys);
        for expander in &port.expanders {
            children.push(Child::Expander {
                expander,
                nphys,
                speed: speed.clone(),
            });
        }
        for end_device in &port.end_devices {
            children.push(Child::EndDevice {
                end_device,
                nphys,
                speed: speed.clone(),
            });
        }
    }

    if args.gathering() && !children.is_empty() && children.iter().all(|c| gatherable(c)) {
        render_gathered(&children, prefix, args);
        return;
    }

    let count = children.len();
    for (idx, child) in children.iter().enumerate() {
        let last = idx == count - 1;
        match child {
            Child::Expander {
                expander,
                nphys,
                speed,
            } => render_expander(expander, *nphys, speed, prefix, last, args),
            Child::EndDevice {
                end_device,
                nphys,
                speed,
            } => render_end_device(end_device, *nphys, speed, prefix, last, args),
        }
    }
}

/// Only single-target, non-enclosure end devices fold into gathered rows;
/// expanders and enclosure services devices always print in full.
fn gatherable(child: &Child) -> bool {
    match child {
        Child::Expander { .. } => false,
        Child::EndDevice { end_device, .. } => {
            end_device.targets.len() <= 1
                && end_device
                    .scsi_device()
                    .and_then(ScsiDevice::device_type)
                    != Some(TYPE_ENCLOSURE)
        }
    }
}

/// Group label of a gathered end device, e.g. `end_device -- disk`.
fn gather_label(end_device: &SasEndDevice) -> String {
    let device_type = end_device
        .sas_device
        .attrs()
        .get_or("device_type", "unknown")
        .replace(' ', "_");
    let target_label = match end_device.scsi_device() {
        Some(device) => device.type_label().into_owned(),
        None => end_device.name().to_owned(),
    };
    format!("{device_type} -- {target_label}")
}

fn render_gathered(children: &[Child], prefix: &str, args: &Args) {
    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
    for child in children {
        let Child::EndDevice {
            end_device, speed, ..
        } = child
        else {
            continue;
        };
        let label = gather_label(end_device);
        match groups.iter_mut().find(|(name, _)| *name == label) {
            Some((_, speeds)) => speeds.push(speed),
            None => groups.push((label, vec![speed])),
        }
    }
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let count = groups.len();
    for (idx, (label, speeds)) in groups.iter().enumerate() {
        let (line, _) = branch(prefix, idx == count - 1);
        let speed_info = if args.verbose > 0 {
            format!(
                " ({})",
                counted_summary(speeds.iter().map(|s| s.to_string()))
            )
        } else {
            String::new()
        };
        println!("{line} {:2} x {label}{speed_info}", speeds.len());
    }
}

fn render_expander(
    expander: &SasExpander,
    nphys: usize,
    speed: &str,
    prefix: &str,
    last: bool,
    args: &Args,
) {
    let (line, child_prefix) = branch(prefix, last);

    let mut text = format!("{nphys}x--{}", expander.name());
    if args.verbose > 1 {
        text.push_str(&format!(
            " vendor: {}, product: {}, rev: {}",
            expander.attrs().get_or("vendor_id", "N/A"),
            expander.attrs().get_or("product_id", "N/A"),
            expander.attrs().get_or("product_rev", "N/A")
        ));
    } else if args.verbose > 0 {
        text.push(' ');
        text.push_str(&expander.attrs().get_or("vendor_id", "N/A"));
    }
    if args.addr {
        text.push_str(&format!(
            " addr: {}",
            expander.sas_device.attrs().get_or("sas_address", "N/A")
        ));
    }
    if args.verbose > 0 {
        text.push_str(&format!(" ({speed})"));
    }
    println!("{line}{text}");

    render_ports(expander.ports(), &child_prefix, args);
}

fn render_end_device(
    end_device: &SasEndDevice,
    nphys: usize,
    speed: &str,
    prefix: &str,
    last: bool,
    args: &Args,
) {
    let (line, child_prefix) = branch(prefix, last);

    let mut text = format!("{nphys}x--{}", end_device.name());
    if args.verbose > 0 {
        text.push_str(&format!(" ({speed})"));
    }
    if args.verbose > 1 {
        if let Some(bay) = end_device.bay_identifier() {
            text.push_str(&format!(" bay: {bay}"));
        }
    }
    if args.addr {
        text.push_str(&format!(
            " addr: {}",
            end_device.sas_device.attrs().get_or("sas_address", "N/A")
        ));
    }
    println!("{line}{text}");

    let count = end_device.targets.len();
    for (idx, target) in end_device.targets.iter().enumerate() {
        render_scsi_device(target, &child_prefix, idx == count - 1, args);
    }
}

fn render_scsi_device(device: &ScsiDevice, prefix: &str, last: bool, args: &Args) {
    let (line, child_prefix) = branch(prefix, last);
    println!("{line}{}", scsi_text(device, args));

    // -vvv: dump block queue attributes as leaves
    if args.verbose > 2 {
        if let Some(block) = device.block.as_deref() {
            let entries = block.queue.attrs().entries();
            let count = entries.len();
            for (idx, (name, value)) in entries.iter().enumerate() {
                let (qline, _) = branch(&child_prefix, idx == count - 1);
                println!("{qline}queue.{name}: {value}");
            }
        }
    }
}

fn scsi_text(device: &ScsiDevice, args: &Args) -> String {
    let attrs = device.attrs();
    let mut type_info = device.type_label().into_owned();
    if device.device_type() == Some(TYPE_ENCLOSURE) && args.verbose > 0 {
        if let Some(snic) = ses::snic_nickname(&device.scsi_generic.sg_name) {
            type_info.push_str(&format!(" {snic}"));
        }
    }

    let mut parts = vec![type_info];
    if args.verbose == 1 {
        parts.push(attrs.get_or("vendor", "N/A"));
    } else if args.verbose > 1 {
        parts.push(format!(
            "vendor: {} model: {} rev: {}",
            attrs.get_or("vendor", "N/A"),
            attrs.get_or("model", "N/A"),
            attrs.get_or("rev", "N/A")
        ));
    }
    if args.addr {
        parts.push(format!("addr: {}", attrs.get_or("sas_address", "N/A")));
    }
    if args.counters {
        parts.push(format!(
            "IO:{{req: {} done: {} error: {}}}",
            crate::carbon::counter_value(&attrs.get_or("iorequest_cnt", "0")),
            crate::carbon::counter_value(&attrs.get_or("iodone_cnt", "0")),
            crate::carbon::counter_value(&attrs.get_or("ioerr_cnt", "0"))
        ));
    }
    if let Some(block) = device.block.as_deref() {
        if let Some(size) = block.size_bytes() {
            parts.push(format!("size: {}", format_size(size)));
        }
    }
    if args.devices {
        parts.push(format!("[{}]", device.scsi_generic.sg_name));
    }
    parts.join(" ")
}

/// Presentation order for ports: expanders first, then end devices by
/// descending SCSI device type code, then ascending bay identifier with
/// absent bays last.
pub(crate) fn sorted_ports(ports: &[SasPort]) -> Vec<&SasPort> {
    ports
        .iter()
        .sorted_by_key(|port| {
            port_sort_key(
                !port.expanders.is_empty(),
                port.end_devices
                    .first()
                    .and_then(|ed| ed.scsi_device().and_then(ScsiDevice::device_type)),
                port.end_devices.first().and_then(SasEndDevice::bay_identifier),
            )
        })
        .collect()
}

fn port_sort_key(
    has_expanders: bool,
    device_type: Option<u32>,
    bay: Option<u32>,
) -> (u8, i64, u64) {
    if has_expanders {
        return (0, 0, 0);
    }
    (
        1,
        -i64::from(device_type.unwrap_or(0)),
        bay.map_or(u64::MAX, u64::from),
    )
}

fn linkrate_summary(phys: &[SasPhy]) -> String {
    counted_summary(
        phys.iter()
            .map(|phy| phy.attrs().get_or("negotiated_linkrate", "N/A")),
    )
}
