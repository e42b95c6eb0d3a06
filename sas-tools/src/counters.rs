// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Phy error counters and SCSI I/O counters as Carbon metric lines, one
//! line per counter, keyed by position in the fabric:
//! `<prefix>.<host>.<board>.<addr>.<expander>.bays.<N>.<device>.<counter>`.

use sas::scsi::{ScsiDevice, TYPE_ENCLOSURE};
use sas::{ses, SasEndDevice, SasExpander, SasHost, SasNode, SasPhy, SasPort};
use sysfs::SysfsNode;

use crate::carbon;
use crate::discover::sorted_ports;
use crate::CmdResult;

const PHY_COUNTERS: [&str; 4] = [
    "invalid_dword_count",
    "loss_of_dword_sync_count",
    "phy_reset_problem_count",
    "running_disparity_error_count",
];

const IO_COUNTERS: [&str; 3] = ["ioerr_cnt", "iodone_cnt", "iorequest_cnt"];

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Carbon path prefix (example: "datacenter.cluster")
    #[arg(long, default_value = "sas_tools.counters")]
    pub prefix: String,
}

pub fn run(root: &SysfsNode, args: &Args) -> CmdResult {
    let timestamp = carbon::unix_now();
    let prefix = args.prefix.trim_matches('.');
    let hostname = crate::short_hostname();

    for host in sas::enumerate_hosts(root)? {
        let base = format!("{prefix}.{hostname}.{}", host_component(&host));
        emit_phy_counters(&base, host.phys(), timestamp);
        emit_ports(&base, host.ports(), timestamp);
    }
    Ok(())
}

fn emit_ports(base: &str, ports: &[SasPort], timestamp: u64) {
    for port in sorted_ports(ports) {
        for expander in &port.expanders {
            let expander_base = format!("{base}.{}", expander_component(expander));
            emit_phy_counters(&expander_base, expander.phys(), timestamp);
            emit_ports(&expander_base, expander.ports(), timestamp);
        }
        for end_device in &port.end_devices {
            let bay_base = format!("{base}.{}", bay_component(end_device));
            for target in &end_device.targets {
                let device_base = format!("{bay_base}.{}", device_component(target));
                for key in IO_COUNTERS {
                    match target.attrs().try_get(key) {
                        Some(value) => {
                            carbon::emit(&format!("{device_base}.{key}"), &value, timestamp);
                        }
                        None => log::warn!("{}: no {key} counter", target.name()),
                    }
                }
            }
        }
    }
}

fn emit_phy_counters(base: &str, phys: &[SasPhy], timestamp: u64) {
    for phy in phys {
        let id = phy.attrs().get_or("phy_identifier", "N/A");
        for key in PHY_COUNTERS {
            match phy.attrs().try_get(key) {
                Some(value) => {
                    carbon::emit(&format!("{base}.phys.{id}.{key}"), &value, timestamp);
                }
                None => log::warn!("{}: no {key} counter", phy.name()),
            }
        }
    }
}

fn host_component(host: &SasHost) -> String {
    let attrs = host.scsi_host.attrs();
    format!(
        "{}.{}",
        attrs.get_or("board_name", "UNKNOWN_BOARD"),
        attrs.get_or("host_sas_address", "UNKNOWN_ADDR")
    )
}

/// Expanders are keyed by product and, when their enclosure services device
/// carries a SES nickname, that nickname; the SAS address otherwise.
fn expander_component(expander: &SasExpander) -> String {
    let nickname = expander
        .end_devices_by_type(TYPE_ENCLOSURE)
        .iter()
        .filter_map(|ed| ed.scsi_device())
        .find_map(|dev| ses::snic_nickname(&dev.scsi_generic.sg_name))
        .unwrap_or_else(|| {
            format!(
                "expander_{}",
                expander.sas_device.attrs().get_or("sas_address", "UNKNOWN_ADDR")
            )
        });
    format!(
        "{}.{nickname}",
        expander.attrs().get_or("product_id", "UNKNOWN")
    )
}

fn bay_component(end_device: &SasEndDevice) -> String {
    match end_device.bay_identifier() {
        Some(bay) => format!("bays.{bay}"),
        None => format!("no-bay.{}", end_device.name()),
    }
}

fn device_component(device: &ScsiDevice) -> String {
    if device.device_type() == Some(TYPE_ENCLOSURE) {
        if let Some(snic) = ses::snic_nickname(&device.scsi_generic.sg_name) {
            return format!("{}.{snic}", device.attrs().get_or("model", "MODEL_UNKNOWN"));
        }
    }
    format!(
        "{}.{}",
        device.attrs().get_or("model", "MODEL_UNKNOWN"),
        device.attrs().get_or("sas_address", "UNKNOWN_ADDR")
    )
}
