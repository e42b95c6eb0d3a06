// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SES environment report per enclosure, as Carbon metric lines or one JSON
//! document keyed by enclosure nickname.

use serde_json::json;

use sas::scsi::TYPE_ENCLOSURE;
use sas::{ses, SasNode};
use sysfs::SysfsNode;

use crate::carbon;
use crate::CmdResult;

#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
pub struct Args {
    /// Output element descriptor metrics as Carbon lines
    #[arg(short, long, group = "mode")]
    pub carbon: bool,

    /// Output metrics and statuses as a JSON document
    #[arg(short, long, group = "mode")]
    pub json: bool,

    /// Carbon path prefix (example: "datacenter.cluster")
    #[arg(long, default_value = "sas_tools")]
    pub carbon_prefix: String,
}

pub fn run(root: &SysfsNode, args: &Args) -> CmdResult {
    let timestamp = carbon::unix_now();
    let prefix = args.carbon_prefix.trim_matches('.');
    let mut report = serde_json::Map::new();

    for expander in sas::enumerate_expanders(root)? {
        for end_device in expander.end_devices_by_type(TYPE_ENCLOSURE) {
            let Some(device) = end_device.scsi_device() else {
                continue;
            };
            let sg_name = &device.scsi_generic.sg_name;
            let nickname = enclosure_key(
                ses::snic_nickname(sg_name),
                &device.attrs().get_or("vendor", "N/A"),
                &device.attrs().get_or("sas_address", "N/A"),
            );

            if args.carbon {
                for metric in ses::enclosure_metrics(sg_name) {
                    let path = format!(
                        "{prefix}.{nickname}.{}.{}.{}_{}",
                        metric.element_type, metric.descriptor, metric.key, metric.unit
                    );
                    println!(
                        "{} {} {timestamp}",
                        carbon::sanitize_path(&path),
                        metric.value
                    );
                }
            } else {
                report.insert(
                    nickname,
                    json!({
                        "metrics": ses::enclosure_metrics(sg_name),
                        "status": ses::enclosure_status(sg_name),
                    }),
                );
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Report key for an enclosure: SES nickname when set, `vendor_sasaddress`
/// otherwise.
fn enclosure_key(snic: Option<String>, vendor: &str, sas_address: &str) -> String {
    match snic {
        Some(snic) => snic.replace(' ', "_"),
        None => format!("{}_{sas_address}", vendor.replace(' ', "-")),
    }
}
