// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SAS fabric entities, composed by walking sysfs directory conventions.
//!
//! Structural failures in one subtree (a port that lost its `sas_port`
//! subsystem mid-traversal, a target that vanished) are logged and the
//! subtree skipped; they never abort the whole walk. Attributes needed only
//! for display degrade at render time instead.

use std::ops::Deref;

use sysfs::{SysfsDevice, SysfsNode};

use crate::scsi::{ScsiDevice, ScsiHost};

/// A single physical SAS link lane; carries link-rate and error counter
/// attributes.
#[derive(Debug, Clone)]
pub struct SasPhy(SysfsDevice);

impl SasPhy {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        Ok(Self(SysfsDevice::new(device, "sas_phy")?))
    }
}

impl Deref for SasPhy {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// SAS transport identity (address, bay, device type) of an expander or end
/// device.
#[derive(Debug, Clone)]
pub struct SasDevice(SysfsDevice);

impl SasDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        Ok(Self(SysfsDevice::new(device, "sas_device")?))
    }
}

impl Deref for SasDevice {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A wide or narrow SAS port: the phys it bundles and whatever sits on the
/// other end (expanders or end devices).
#[derive(Debug, Clone)]
pub struct SasPort {
    device: SysfsDevice,
    pub phys: Vec<SasPhy>,
    pub expanders: Vec<SasExpander>,
    pub end_devices: Vec<SasEndDevice>,
}

impl SasPort {
    pub fn new(port: &SysfsNode) -> Result<Self, sysfs::Error> {
        let device = SysfsDevice::new(port, "sas_port")?;

        let phys = discover_phys(port);

        let mut end_devices = Vec::new();
        for node in port.glob_dirs("end_device-*") {
            match SasEndDevice::new(&node) {
                Ok(end_device) => end_devices.push(end_device),
                Err(err) => log::warn!("skipping end device {node}: {err}"),
            }
        }

        let mut expanders = Vec::new();
        for node in port.glob_dirs("expander-*") {
            match SasExpander::new(&node) {
                Ok(expander) => expanders.push(expander),
                Err(err) => log::warn!("skipping expander {node}: {err}"),
            }
        }

        Ok(Self {
            device,
            phys,
            expanders,
            end_devices,
        })
    }
}

impl Deref for SasPort {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

/// Common surface of the two port-bearing entities (hosts and expanders).
pub trait SasNode {
    fn ports(&self) -> &[SasPort];
    fn phys(&self) -> &[SasPhy];

    /// Direct-child end devices whose primary SCSI target has the given
    /// peripheral device type.
    fn end_devices_by_type(&self, device_type: u32) -> Vec<&SasEndDevice> {
        self.ports()
            .iter()
            .flat_map(|port| port.end_devices.iter())
            .filter(|end_device| {
                end_device
                    .scsi_device()
                    .and_then(ScsiDevice::device_type)
                    == Some(device_type)
            })
            .collect()
    }
}

/// A SAS initiator (HBA) host, the root of one fabric tree.
#[derive(Debug, Clone)]
pub struct SasHost {
    device: SysfsDevice,
    pub scsi_host: ScsiHost,
    pub ports: Vec<SasPort>,
    pub phys: Vec<SasPhy>,
}

impl SasHost {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let host = SysfsDevice::new(device, "sas_host")?;
        let scsi_host = ScsiHost::new(device)?;
        let (ports, phys) = discover_ports(device);
        Ok(Self {
            device: host,
            scsi_host,
            ports,
            phys,
        })
    }
}

impl Deref for SasHost {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl SasNode for SasHost {
    fn ports(&self) -> &[SasPort] {
        &self.ports
    }

    fn phys(&self) -> &[SasPhy] {
        &self.phys
    }
}

/// A SAS expander: behaves like a host (its own ports and phys) with an
/// upstream [`SasDevice`] identity.
#[derive(Debug, Clone)]
pub struct SasExpander {
    device: SysfsDevice,
    pub sas_device: SasDevice,
    pub ports: Vec<SasPort>,
    pub phys: Vec<SasPhy>,
}

impl SasExpander {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let expander = SysfsDevice::new(device, "sas_expander")?;
        let sas_device = SasDevice::new(device)?;
        let (ports, phys) = discover_ports(device);
        Ok(Self {
            device: expander,
            sas_device,
            ports,
            phys,
        })
    }
}

impl Deref for SasExpander {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl SasNode for SasExpander {
    fn ports(&self) -> &[SasPort] {
        &self.ports
    }

    fn phys(&self) -> &[SasPhy] {
        &self.phys
    }
}

/// A terminal SAS-attached target: disk, tape or enclosure services
/// processor. Bridges into SCSI addressing through its `target*/*[0-9]`
/// children.
#[derive(Debug, Clone)]
pub struct SasEndDevice {
    device: SysfsDevice,
    pub sas_device: SasDevice,
    /// SCSI targets in glob-sorted order. More than one is a malformed
    /// topology; it is kept (and warned about) rather than made fatal, and
    /// callers treat the first as primary.
    pub targets: Vec<ScsiDevice>,
}

impl SasEndDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let end_device = SysfsDevice::new(device, "sas_end_device")?;
        let sas_device = SasDevice::new(device)?;

        let target_nodes = device.glob_dirs("target*/*[0-9]");
        if target_nodes.len() > 1 {
            log::warn!(
                "{device}: {} SCSI targets under one end device, keeping all",
                target_nodes.len()
            );
        }
        let mut targets = Vec::new();
        for node in target_nodes {
            match ScsiDevice::new(node.clone()) {
                Ok(target) => targets.push(target),
                Err(err) => log::warn!("skipping target {node}: {err}"),
            }
        }

        Ok(Self {
            device: end_device,
            sas_device,
            targets,
        })
    }

    /// Primary SCSI target.
    pub fn scsi_device(&self) -> Option<&ScsiDevice> {
        self.targets.first()
    }

    pub fn bay_identifier(&self) -> Option<u32> {
        self.sas_device.attrs().try_get("bay_identifier")?.parse().ok()
    }
}

impl Deref for SasEndDevice {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

/// SAS-aware block device: from a SCSI device node, resolves both the block
/// layer view and the owning [`SasEndDevice`] (four levels up from the
/// block node). Entry point for the udev alias tools.
#[derive(Debug, Clone)]
pub struct SasBlockDevice {
    pub block: crate::scsi::BlockDevice,
    pub end_device: SasEndDevice,
}

impl SasBlockDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let block = crate::scsi::BlockDevice::new(device)?;
        let end_node = block.node().child("../../../..")?;
        let end_device = SasEndDevice::new(&end_node)?;
        Ok(Self { block, end_device })
    }
}

/// SAS-aware tape drive: the same back-walk as [`SasBlockDevice`], from the
/// `scsi_tape` child of a SCSI device node.
#[derive(Debug, Clone)]
pub struct SasTapeDevice {
    pub tape: crate::scsi::TapeDevice,
    pub end_device: SasEndDevice,
}

impl SasTapeDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let tape = crate::scsi::TapeDevice::new(device)?;
        let end_node = tape.node().child("../../../..")?;
        let end_device = SasEndDevice::new(&end_node)?;
        Ok(Self { tape, end_device })
    }
}

fn discover_phys(node: &SysfsNode) -> Vec<SasPhy> {
    let mut phys = Vec::new();
    for phy_node in node.glob_dirs("phy-*") {
        match SasPhy::new(&phy_node) {
            Ok(phy) => phys.push(phy),
            Err(err) => log::warn!("skipping phy {phy_node}: {err}"),
        }
    }
    phys
}

fn discover_ports(node: &SysfsNode) -> (Vec<SasPort>, Vec<SasPhy>) {
    let mut ports = Vec::new();
    for port_node in node.glob_dirs("port-*") {
        match SasPort::new(&port_node) {
            Ok(port) => ports.push(port),
            Err(err) => log::warn!("skipping port {port_node}: {err}"),
        }
    }
    (ports, discover_phys(node))
}

fn class_devices(root: &SysfsNode, class: &str) -> Result<Vec<SysfsNode>, sysfs::Error> {
    let class_node = root.child("class")?.child(class)?;
    let mut entries = class_node.children()?;
    entries.sort_by_key(|node| node.name().to_owned());

    let mut devices = Vec::new();
    for entry in entries {
        match entry.child("device") {
            Ok(device) => devices.push(device),
            Err(err) => log::warn!("skipping {class} entry {entry}: {err}"),
        }
    }
    Ok(devices)
}

/// Every SAS host on the system, from the `class/sas_host` enumeration
/// entry point.
pub fn enumerate_hosts(root: &SysfsNode) -> Result<Vec<SasHost>, sysfs::Error> {
    let mut hosts = Vec::new();
    for device in class_devices(root, "sas_host")? {
        match SasHost::new(&device) {
            Ok(host) => hosts.push(host),
            Err(err) => log::warn!("skipping host {device}: {err}"),
        }
    }
    Ok(hosts)
}

/// Flattened enumeration of every expander, regardless of tree position.
pub fn enumerate_expanders(root: &SysfsNode) -> Result<Vec<SasExpander>, sysfs::Error> {
    let mut expanders = Vec::new();
    for device in class_devices(root, "sas_expander")? {
        match SasExpander::new(&device) {
            Ok(expander) => expanders.push(expander),
            Err(err) => log::warn!("skipping expander {device}: {err}"),
        }
    }
    Ok(expanders)
}

/// Flattened enumeration of every end device, regardless of tree position.
pub fn enumerate_end_devices(root: &SysfsNode) -> Result<Vec<SasEndDevice>, sysfs::Error> {
    let mut end_devices = Vec::new();
    for device in class_devices(root, "sas_end_device")? {
        match SasEndDevice::new(&device) {
            Ok(end_device) => end_devices.push(end_device),
            Err(err) => log::warn!("skipping end device {device}: {err}"),
        }
    }
    Ok(end_devices)
}
