// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SAS topology inventory front ends over one shared model: a fabric tree
//! view, an enclosure-grouped device table, error counter and SES
//! environment exports, and udev alias generators.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sysfs::SysfsNode;

mod alias;
mod carbon;
mod counters;
mod devices;
mod discover;
mod format;
mod ses_report;

pub(crate) type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(name = "sas-tools", about = "Serial Attached SCSI topology inventory tools", version)]
struct Cli {
    /// sysfs mount point (mainly for inspecting captured trees)
    #[arg(long, global = true, default_value = "/sys")]
    sysfs_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the SAS fabric as a tree
    Discover(discover::Args),
    /// List devices grouped by enclosure
    Devices(devices::Args),
    /// Export phy and SCSI I/O error counters as Carbon metric lines
    Counters(counters::Args),
    /// Report SES enclosure environment metrics and status
    SesReport(ses_report::Args),
    /// Print the enclosure/bay udev alias for a block device
    SdAlias(alias::SdArgs),
    /// Print the enclosure/bay udev alias for a dm-multipath device
    MpathAlias(alias::MpathArgs),
    /// Print the enclosure/bay udev alias for a SAS tape drive
    StAlias(alias::StArgs),
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let root = SysfsNode::new(&cli.sysfs_root);

    let result = match &cli.command {
        Command::Discover(args) => discover::run(&root, args),
        Command::Devices(args) => devices::run(&root, args),
        Command::Counters(args) => counters::run(&root, args),
        Command::SesReport(args) => ses_report::run(&root, args),
        Command::SdAlias(args) => alias::run_sd(&root, args),
        Command::MpathAlias(args) => alias::run_mpath(&root, args),
        Command::StAlias(args) => alias::run_st(&root, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Short hostname, used as the tree root and Carbon path component.
pub(crate) fn short_hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .as_deref()
        .map(str::trim)
        .and_then(|name| name.split('.').next())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| String::from("localhost"))
}
