// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SAS/SCSI/block topology model and resolvers built on [`sysfs`].
//!
//! The kernel's SAS transport layer exposes the fabric as nested sysfs
//! directories: a host has `port-*` children, each port fans out into
//! `phy-*`, `expander-*` and `end_device-*` directories, and expanders
//! recurse into ports of their own. This crate walks those conventions into
//! a typed object graph ([`SasHost`] down to [`scsi::BlockDevice`]) and
//! provides the resolvers shared by the report tools: logical-unit identity
//! ([`group::resolve_lu_key`]), enclosure grouping ([`group`]) and the
//! `sg_ses`/`scsi_id`/`smp_discover` collaborators ([`ses`], [`vpd`],
//! [`smp`]).

mod error;
pub mod group;
pub mod scsi;
pub mod ses;
pub mod smp;
mod topology;
pub mod vpd;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
pub use topology::{
    enumerate_end_devices, enumerate_expanders, enumerate_hosts, SasBlockDevice, SasDevice,
    SasEndDevice, SasExpander, SasHost, SasNode, SasPhy, SasPort, SasTapeDevice,
};
