// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Device identification VPD page (0x83) decoding, with `scsi_id` fallbacks
//! for kernels that do not expose `vpd_pg83` in sysfs.

use std::process::Command;

use crate::{Error, Result};

const VPD_ASSOC_LU: u8 = 0;
const VPD_DESIG_NAA: u8 = 3;

/// Extracts the logical unit NAA identifier from a raw `vpd_pg83` page
/// buffer: the first descriptor with designator type 3 (NAA) and logical
/// unit association, rendered as `0x` plus sixteen lowercase hex digits.
///
/// `None` when the descriptor walk runs off the buffer or no qualifying
/// descriptor exists; callers recover via [`scsi_id_page83_lu`].
pub fn decode_pg83_lu(pagebuf: &[u8]) -> Option<String> {
    let sz = pagebuf.len();
    let mut offset = 4usize;

    while offset + 4 <= sz {
        let d = pagebuf[offset + 1];
        let design_type = d & 0xf;
        let assoc = (d >> 4) & 0x3;
        let length = pagebuf[offset + 3] as usize;
        let next_offset = offset + length + 4;
        if next_offset > sz {
            return None;
        }

        if design_type == VPD_DESIG_NAA && assoc == VPD_ASSOC_LU {
            let designator = pagebuf.get(offset + 4..offset + 12)?;
            let hex: String = designator.iter().map(|b| format!("{b:02x}")).collect();
            return Some(format!("0x{hex}"));
        }
        offset = next_offset;
    }
    None
}

fn scsi_id(page: &str, blkdev: &str) -> Result<String> {
    let output = Command::new("scsi_id")
        .arg(format!("--page={page}"))
        .arg("--whitelisted")
        .arg(format!("--device=/dev/{blkdev}"))
        .output()
        .map_err(|err| Error::Collaborator {
            command: "scsi_id",
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::Collaborator {
            command: "scsi_id",
            reason: format!("exited with {}", output.status),
        });
    }
    Ok(sysfs::sanitize(&output.stdout))
}

/// Page 0x83 logical unit identifier via the `scsi_id` helper.
pub fn scsi_id_page83_lu(blkdev: &str) -> Result<String> {
    let id = scsi_id("0x83", blkdev)?;
    if id.is_empty() {
        return Err(Error::Collaborator {
            command: "scsi_id",
            reason: format!("no page 0x83 identifier for {blkdev}"),
        });
    }
    Ok(id)
}

/// Page 0x80 unit serial number via the `scsi_id` helper; last
/// whitespace-separated field of the output.
pub fn scsi_id_page80_sn(blkdev: &str) -> Result<String> {
    let output = scsi_id("0x80", blkdev)?;
    output
        .split_whitespace()
        .last()
        .map(str::to_owned)
        .ok_or_else(|| Error::Collaborator {
            command: "scsi_id",
            reason: format!("no page 0x80 serial for {blkdev}"),
        })
}
