// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Generated fake sysfs trees for tests, shaped after the kernel's SAS
//! transport layout: `class/sas_*` enumeration entries with `device`
//! symlinks into a `devices/` hierarchy of hosts, ports, expanders and end
//! devices.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub(crate) struct FakeSysfs {
    tmp: TempDir,
}

impl FakeSysfs {
    pub(crate) fn new() -> Self {
        Self {
            tmp: TempDir::new().expect("create fake sysfs root"),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub(crate) fn dir(&self, rel: &str) -> PathBuf {
        let path = self.tmp.path().join(rel);
        fs::create_dir_all(&path).expect("create dir");
        path
    }

    pub(crate) fn file(&self, rel: &str, content: &str) {
        self.file_bytes(rel, content.as_bytes());
    }

    pub(crate) fn file_bytes(&self, rel: &str, content: &[u8]) {
        let path = self.tmp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write file");
    }

    /// Symlink at `rel` pointing to `target` (both root-relative); the link
    /// is created with an absolute target.
    pub(crate) fn link(&self, rel: &str, target: &str) {
        let path = self.tmp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        symlink(self.tmp.path().join(target), path).expect("create symlink");
    }
}

/// Minimal valid device identification page: one NAA logical-unit
/// designator wrapping the given 8 bytes.
pub(crate) fn vpd_pg83_naa(designator: &[u8]) -> Vec<u8> {
    assert_eq!(designator.len(), 8);
    let mut page = vec![0x00, 0x83, 0x00, 0x0c];
    page.extend_from_slice(&[0x01, 0x03, 0x00, 0x08]);
    page.extend_from_slice(designator);
    page
}

const HOST: &str = "devices/host0";
const EXPANDER: &str = "devices/host0/port-0:0/expander-0:0";

fn add_host(fake: &FakeSysfs) {
    fake.dir(&format!("{HOST}/sas_host/host0"));
    fake.file(&format!("{HOST}/scsi_host/host0/board_name"), "SAS9300-8e\n");
    fake.file(
        &format!("{HOST}/scsi_host/host0/host_sas_address"),
        "0x5000ccab0200947e\n",
    );
    fake.file(&format!("{HOST}/scsi_host/host0/version_fw"), "10.00.03.00\n");

    for j in 0..4 {
        add_phy(fake, HOST, &format!("phy-0:{j}"), j);
        fake.link(
            &format!("{HOST}/port-0:0/phy-0:{j}"),
            &format!("{HOST}/phy-0:{j}"),
        );
    }
    fake.file(&format!("{HOST}/port-0:0/sas_port/port-0:0/num_phys"), "4\n");

    fake.link("class/sas_host/host0/device", HOST);
}

fn add_phy(fake: &FakeSysfs, parent: &str, name: &str, identifier: u32) {
    let base = format!("{parent}/{name}/sas_phy/{name}");
    fake.file(&format!("{base}/negotiated_linkrate"), "12.0 Gbit\n");
    fake.file(&format!("{base}/phy_identifier"), &format!("{identifier}\n"));
    fake.file(&format!("{base}/invalid_dword_count"), "0\n");
    fake.file(&format!("{base}/running_disparity_error_count"), "0\n");
    fake.file(&format!("{base}/loss_of_dword_sync_count"), "2\n");
    fake.file(&format!("{base}/phy_reset_problem_count"), "0\n");
}

fn add_expander(fake: &FakeSysfs) {
    fake.file(
        &format!("{EXPANDER}/sas_expander/expander-0:0/vendor_id"),
        "NEWISYS\n",
    );
    fake.file(
        &format!("{EXPANDER}/sas_expander/expander-0:0/product_id"),
        "NDS-4600-JD\n",
    );
    fake.file(
        &format!("{EXPANDER}/sas_expander/expander-0:0/product_rev"),
        "0608\n",
    );
    fake.file(
        &format!("{EXPANDER}/sas_device/expander-0:0/sas_address"),
        "0x5000ccab02009400\n",
    );
    fake.file(
        &format!("{EXPANDER}/sas_device/expander-0:0/device_type"),
        "edge expander\n",
    );
    fake.link("class/sas_expander/expander-0:0/device", EXPANDER);
}

struct DiskSpec<'a> {
    /// `port-0:0:<idx>`, `end_device-0:0:<idx>`, bay identifier, sg number
    idx: u32,
    blkdev: &'a str,
    naa: [u8; 8],
    /// Slot name inside `devices/enclosure0`; `None` leaves the device
    /// without an `enclosure_device:*` link.
    slot: Option<&'a str>,
    /// Raw bytes written to `vpd_pg83` instead of a valid page.
    garbage_vpd: Option<&'a [u8]>,
}

fn add_disk(fake: &FakeSysfs, parent: &str, spec: &DiskSpec) {
    let idx = spec.idx;
    let ed = format!("{parent}/port-0:0:{idx}/end_device-0:0:{idx}");
    fake.file(
        &format!("{parent}/port-0:0:{idx}/sas_port/port-0:0:{idx}/num_phys"),
        "1\n",
    );
    fake.dir(&format!("{ed}/sas_end_device/end_device-0:0:{idx}"));
    fake.file(
        &format!("{ed}/sas_device/end_device-0:0:{idx}/sas_address"),
        &format!("0x5000ccab020094{idx:02x}\n"),
    );
    fake.file(
        &format!("{ed}/sas_device/end_device-0:0:{idx}/device_type"),
        "end device\n",
    );
    fake.file(
        &format!("{ed}/sas_device/end_device-0:0:{idx}/bay_identifier"),
        &format!("{idx}\n"),
    );

    let scsi = format!("{ed}/target0:0:{idx}/0:0:{idx}:0");
    fake.file(&format!("{scsi}/type"), "0\n");
    fake.file(&format!("{scsi}/vendor"), "HGST\n");
    fake.file(&format!("{scsi}/model"), "HUH728080AL4200\n");
    fake.file(&format!("{scsi}/rev"), "A21D\n");
    fake.file(
        &format!("{scsi}/sas_address"),
        &format!("0x5000ccab020094{idx:02x}\n"),
    );
    fake.file(&format!("{scsi}/ioerr_cnt"), "0x0\n");
    fake.file(&format!("{scsi}/iodone_cnt"), "0x33\n");
    fake.file(&format!("{scsi}/iorequest_cnt"), "0x35\n");
    match spec.garbage_vpd {
        Some(bytes) => fake.file_bytes(&format!("{scsi}/vpd_pg83"), bytes),
        None => fake.file_bytes(&format!("{scsi}/vpd_pg83"), &vpd_pg83_naa(&spec.naa)),
    }

    fake.dir(&format!("{scsi}/scsi_generic/sg{idx}"));
    fake.dir(&format!("{scsi}/scsi_disk/0:0:{idx}:0"));

    let blkdev = spec.blkdev;
    let block = format!("{scsi}/block/{blkdev}");
    fake.file(&format!("{block}/size"), "1000\n");
    fake.file(&format!("{block}/queue/logical_block_size"), "512\n");
    fake.file(&format!("{block}/queue/nr_requests"), "256\n");
    fake.link(&format!("{block}/device"), &scsi);

    if let Some(slot) = spec.slot {
        fake.link(
            &format!("{scsi}/enclosure_device:{slot}"),
            &format!("devices/enclosure0/{slot}"),
        );
    }

    fake.link(
        &format!("class/sas_end_device/end_device-0:0:{idx}/device"),
        &ed,
    );
    fake.link(&format!("block/{blkdev}"), &block);
}

/// Enclosure services end device at port index 30 plus the
/// `devices/enclosure0` slot directory it backs.
fn add_enclosure(fake: &FakeSysfs, parent: &str, slots: &[&str]) {
    let ed = format!("{parent}/port-0:0:30/end_device-0:0:30");
    fake.file(
        &format!("{parent}/port-0:0:30/sas_port/port-0:0:30/num_phys"),
        "1\n",
    );
    fake.dir(&format!("{ed}/sas_end_device/end_device-0:0:30"));
    fake.file(
        &format!("{ed}/sas_device/end_device-0:0:30/sas_address"),
        "0x5000ccab0200943e\n",
    );
    fake.file(
        &format!("{ed}/sas_device/end_device-0:0:30/device_type"),
        "end device\n",
    );

    let scsi = format!("{ed}/target0:0:30/0:0:30:0");
    fake.file(&format!("{scsi}/type"), "13\n");
    fake.file(&format!("{scsi}/vendor"), "NEWISYS\n");
    fake.file(&format!("{scsi}/model"), "NDS-4600\n");
    fake.file(&format!("{scsi}/rev"), "0608\n");
    fake.file(&format!("{scsi}/sas_address"), "0x5000ccab0200943e\n");
    fake.dir(&format!("{scsi}/scsi_generic/sg30"));

    for slot in slots {
        fake.dir(&format!("devices/enclosure0/{slot}"));
    }
    fake.link("devices/enclosure0/device", &scsi);

    fake.link("class/sas_end_device/end_device-0:0:30/device", &ed);
}

/// One host, one wide port, one expander fanning out to two disks (distinct
/// LU identities, identical presentation) in the same enclosure, plus the
/// enclosure services device itself.
pub(crate) fn scenario_a() -> FakeSysfs {
    let fake = FakeSysfs::new();
    add_host(&fake);
    add_expander(&fake);
    add_enclosure(&fake, EXPANDER, &["Slot 01", "Slot 02"]);
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 1,
            blkdev: "sda",
            naa: [0x50, 0x00, 0xcc, 0xab, 0x02, 0x00, 0x94, 0x01],
            slot: Some("Slot 01"),
            garbage_vpd: None,
        },
    );
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 2,
            blkdev: "sdb",
            naa: [0x50, 0x00, 0xcc, 0xab, 0x02, 0x00, 0x94, 0x02],
            slot: Some("Slot 02"),
            garbage_vpd: None,
        },
    );
    fake
}

/// One disk whose `enclosure_device:*` symlink is absent (orphan).
pub(crate) fn scenario_b() -> FakeSysfs {
    let fake = FakeSysfs::new();
    add_host(&fake);
    add_expander(&fake);
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 1,
            blkdev: "sda",
            naa: [0x50, 0x00, 0xcc, 0xab, 0x02, 0x00, 0x94, 0x01],
            slot: None,
            garbage_vpd: None,
        },
    );
    fake
}

/// One disk whose `vpd_pg83` content does not decode, forcing the external
/// fallback path.
pub(crate) fn scenario_c() -> FakeSysfs {
    let fake = FakeSysfs::new();
    add_host(&fake);
    add_expander(&fake);
    add_enclosure(&fake, EXPANDER, &["Slot 01"]);
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 1,
            blkdev: "sda",
            naa: [0; 8],
            slot: Some("Slot 01"),
            garbage_vpd: Some(&[0xff, 0xff, 0xff]),
        },
    );
    fake
}

/// Three paths in one enclosure: two block devices sharing one LU identity
/// plus a third on its own, to exercise multipath folding and the partial
/// path marker.
pub(crate) fn scenario_multipath() -> FakeSysfs {
    let fake = FakeSysfs::new();
    add_host(&fake);
    add_expander(&fake);
    add_enclosure(&fake, EXPANDER, &["Slot 01", "Slot 02", "Slot 03"]);
    let shared = [0x50, 0x00, 0xcc, 0xab, 0x02, 0x00, 0x94, 0x77];
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 1,
            blkdev: "sda",
            naa: shared,
            slot: Some("Slot 01"),
            garbage_vpd: None,
        },
    );
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 2,
            blkdev: "sdb",
            naa: shared,
            slot: Some("Slot 02"),
            garbage_vpd: None,
        },
    );
    add_disk(
        &fake,
        EXPANDER,
        &DiskSpec {
            idx: 3,
            blkdev: "sdc",
            naa: [0x50, 0x00, 0xcc, 0xab, 0x02, 0x00, 0x94, 0x78],
            slot: Some("Slot 03"),
            garbage_vpd: None,
        },
    );
    fake
}
