// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SCSI and block layer entities attached to a SAS end device.

use std::{
    borrow::Cow,
    cell::OnceCell,
    hash::{Hash, Hasher},
    ops::Deref,
};

use phf::phf_map;
use sysfs::{SysfsDevice, SysfsNode, SysfsObject};

pub const TYPE_DISK: u32 = 0x00;
pub const TYPE_TAPE: u32 = 0x01;
pub const TYPE_MEDIUM_CHANGER: u32 = 0x08;
pub const TYPE_ENCLOSURE: u32 = 0x0d;

/// SCSI Peripheral Device Type codes, as exposed by the `type` attribute.
static TYPE_LABELS: phf::Map<u32, &'static str> = phf_map! {
    0x00u32 => "disk",
    0x01u32 => "tape",
    0x02u32 => "printer",
    0x03u32 => "processor",
    0x04u32 => "worm",
    0x05u32 => "cdrom",
    0x06u32 => "scanner",
    0x07u32 => "optical",
    0x08u32 => "changer",
    0x09u32 => "comm",
    0x0cu32 => "raid",
    0x0du32 => "enclosure",
    0x0eu32 => "rbc",
    0x11u32 => "osd",
};

/// Human label for a peripheral device type code; unknown codes render as
/// `unknown[<code>]` rather than failing.
pub fn type_label(code: u32) -> Cow<'static, str> {
    match TYPE_LABELS.get(&code) {
        Some(label) => Cow::Borrowed(label),
        None => Cow::Owned(format!("unknown[{code}]")),
    }
}

/// Maps an absent subsystem (`DeviceNotFound`/`NotFound`) to `None`; a SCSI
/// device without e.g. a `scsi_disk` subtype is legitimately absent.
fn optional<T>(result: Result<T, sysfs::Error>) -> Result<Option<T>, sysfs::Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(sysfs::Error::DeviceNotFound { .. }) | Err(sysfs::Error::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// The `scsi_host` sibling view of a SAS host device.
#[derive(Debug, Clone)]
pub struct ScsiHost(SysfsDevice);

impl ScsiHost {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        Ok(Self(SysfsDevice::new(device, "scsi_host")?))
    }
}

impl Deref for ScsiHost {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `scsi_disk` subtype; absent for non-disk device types.
#[derive(Debug, Clone)]
pub struct ScsiDisk(SysfsDevice);

impl ScsiDisk {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        Ok(Self(SysfsDevice::new(device, "scsi_disk")?))
    }
}

impl Deref for ScsiDisk {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `scsi_generic` pass-through device; present for every SCSI device.
#[derive(Debug, Clone)]
pub struct ScsiGeneric {
    device: SysfsDevice,
    /// Kernel sg device name (e.g. `sg4`), used to address `sg_ses`.
    pub sg_name: String,
}

impl ScsiGeneric {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let device = SysfsDevice::new(device, "scsi_generic")?;
        let sg_name = device.name().to_owned();
        Ok(Self { device, sg_name })
    }
}

impl Deref for ScsiGeneric {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

/// A SCSI logical unit front-end: the `host:channel:target:lun` node.
///
/// Owns the always-present [`ScsiGeneric`], and the optional [`ScsiDisk`]
/// and [`BlockDevice`] (absent for non-disk device types such as enclosure
/// services processors).
#[derive(Debug, Clone)]
pub struct ScsiDevice {
    object: SysfsObject,
    pub scsi_generic: ScsiGeneric,
    pub scsi_disk: Option<ScsiDisk>,
    pub block: Option<Box<BlockDevice>>,
}

impl ScsiDevice {
    pub fn new(node: SysfsNode) -> Result<Self, sysfs::Error> {
        let object = SysfsObject::new(node);
        let scsi_generic = ScsiGeneric::new(object.node())?;
        let scsi_disk = optional(ScsiDisk::new(object.node()))?;
        let block = optional(BlockDevice::new(object.node()))?.map(Box::new);
        Ok(Self {
            object,
            scsi_generic,
            scsi_disk,
            block,
        })
    }

    /// Peripheral device type code from the `type` attribute.
    pub fn device_type(&self) -> Option<u32> {
        self.attrs().try_get("type")?.parse().ok()
    }

    pub fn type_label(&self) -> Cow<'static, str> {
        match self.device_type() {
            Some(code) => type_label(code),
            None => Cow::Borrowed("unknown scsi type"),
        }
    }
}

impl Deref for ScsiDevice {
    type Target = SysfsObject;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl PartialEq for ScsiDevice {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl Eq for ScsiDevice {}

impl Hash for ScsiDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object.hash(state);
    }
}

impl Ord for ScsiDevice {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.object.cmp(&other.object)
    }
}

impl PartialOrd for ScsiDevice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A managed enclosure services device (peripheral type 0x0d).
///
/// Same shape as [`ScsiDevice`]; the distinct type marks the semantic role
/// and carries the identity used by enclosure grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnclosureDevice(ScsiDevice);

impl EnclosureDevice {
    pub fn new(node: SysfsNode) -> Result<Self, sysfs::Error> {
        Ok(Self(ScsiDevice::new(node)?))
    }
}

impl Deref for EnclosureDevice {
    type Target = ScsiDevice;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The drive-bay slot a block device is installed in, reached through the
/// `enclosure_device:*` symlink; resolves the containing [`EnclosureDevice`]
/// through the slot's parent `device` link.
#[derive(Debug, Clone)]
pub struct ArrayDevice {
    object: SysfsObject,
    pub enclosure: EnclosureDevice,
}

impl ArrayDevice {
    pub fn new(node: SysfsNode) -> Result<Self, sysfs::Error> {
        let enclosure = EnclosureDevice::new(node.child("../device")?)?;
        Ok(Self {
            object: SysfsObject::new(node),
            enclosure,
        })
    }
}

impl Deref for ArrayDevice {
    type Target = SysfsObject;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

/// Block layer view of a SCSI disk.
///
/// Backed by the `block/sd*` child of the SCSI device node. Owns the
/// `queue` attribute object; the array-device and SCSI-device relations are
/// back-references resolved on demand (the former cached, the latter
/// re-resolved), never ownership.
#[derive(Debug, Clone)]
pub struct BlockDevice {
    device: SysfsDevice,
    pub queue: SysfsObject,
    array_device: OnceCell<Option<ArrayDevice>>,
}

impl BlockDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let device = SysfsDevice::with_pattern(device, "block", "sd*")?;
        let queue = SysfsObject::new(device.node().child("queue")?);
        Ok(Self {
            device,
            queue,
            array_device: OnceCell::new(),
        })
    }

    /// Size in bytes: `size * queue/logical_block_size`, exact since block
    /// counts and block sizes are integral.
    pub fn size_bytes(&self) -> Option<u64> {
        let size: u64 = self.attrs().try_get("size")?.parse().ok()?;
        let block_size: u64 = self.queue.attrs().try_get("logical_block_size")?.parse().ok()?;
        Some(size * block_size)
    }

    /// The bay slot this device is installed in, if the kernel exposed an
    /// `enclosure_device:*` symlink. Absence is a valid state (orphan
    /// device), not an error.
    pub fn array_device(&self) -> Option<&ArrayDevice> {
        self.array_device
            .get_or_init(|| lookup_array_device(self.device(), self.name()))
            .as_ref()
    }

    /// Fresh view of the owning SCSI device.
    pub fn scsi_device(&self) -> Result<ScsiDevice, sysfs::Error> {
        ScsiDevice::new(self.device().clone())
    }
}

impl Deref for BlockDevice {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

fn lookup_array_device(parent: &SysfsNode, name: &str) -> Option<ArrayDevice> {
    let node = parent.try_child("enclosure_device:*")?;
    match ArrayDevice::new(node) {
        Ok(array) => Some(array),
        Err(err) => {
            log::warn!("unusable enclosure link for {name}: {err}");
            None
        }
    }
}

/// Tape drive view of a SCSI device, backed by the `scsi_tape/st*` child.
/// Same bay back-reference shape as [`BlockDevice`].
#[derive(Debug, Clone)]
pub struct TapeDevice {
    device: SysfsDevice,
    array_device: OnceCell<Option<ArrayDevice>>,
}

impl TapeDevice {
    pub fn new(device: &SysfsNode) -> Result<Self, sysfs::Error> {
        let device = SysfsDevice::with_pattern(device, "scsi_tape", "st*")?;
        Ok(Self {
            device,
            array_device: OnceCell::new(),
        })
    }

    pub fn array_device(&self) -> Option<&ArrayDevice> {
        self.array_device
            .get_or_init(|| lookup_array_device(self.device(), self.name()))
            .as_ref()
    }
}

impl Deref for TapeDevice {
    type Target = SysfsDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
