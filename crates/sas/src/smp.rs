// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SMP DISCOVER results for an expander, through the `smp_discover` helper
//! (smp_utils). Reports per-phy attachment state below the level sysfs
//! exposes, including phys with nothing attached.

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

/// An expander phy with something attached on the far end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyDesc {
    pub phy: u32,
    /// Routing attribute letter (D direct, S subtractive, T/U table).
    pub routing: char,
    /// SAS address of the attached device, `0x`-prefixed.
    pub addr: String,
    /// Phy index on the attached device.
    pub rphy: u32,
    /// `exp` (expander), `V` (virtual) or `phy` (plain physical device).
    pub devtype: String,
    /// Initiator protocols, e.g. `SSP+STP+SMP`.
    pub iproto: Option<String>,
    /// Target protocols.
    pub tproto: Option<String>,
    pub speed_gbps: u32,
}

/// An expander phy with no attachment (disabled or disconnected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedPhy {
    pub phy: u32,
    pub routing: char,
    pub state: String,
}

/// Parsed SMP DISCOVER response for one expander, phys in index order.
#[derive(Debug, Clone, Default)]
pub struct SmpDiscovery {
    pub attached: Vec<PhyDesc>,
    pub detached: Vec<DetachedPhy>,
}

/// Runs `smp_discover` against a bsg device. `bsg` may be an absolute path
/// or a bare name under `/dev/bsg` (e.g. `expander-16:0`).
pub fn discover(bsg: &str) -> Result<SmpDiscovery> {
    let device = if bsg.starts_with('/') {
        bsg.to_owned()
    } else {
        format!("/dev/bsg/{bsg}")
    };
    let output = Command::new("smp_discover")
        .arg(&device)
        .output()
        .map_err(|err| Error::Collaborator {
            command: "smp_discover",
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::Collaborator {
            command: "smp_discover",
            reason: format!("{device}: exited with {}", output.status),
        });
    }
    Ok(parse_discover(&String::from_utf8_lossy(&output.stdout)))
}

// attached phy lines:
//   phy  12:U:attached:[5001636001a42e3f:13 exp t(SMP)]  12 Gbps
//   phy  28:U:attached:[500605b00ab06f40:07  i(SSP+STP+SMP)]  12 Gbps
//   phy  48:D:attached:[50012be000083c7d:00  V i(SMP) t(SSP)]  12 Gbps
fn attached_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*phy\s+(\d+):([A-Z]):attached:\[([0-9a-fA-F]+):(\d+)\s+(?:(\w+)\s+)?(?:i\(([A-Za-z+]+)\))?\s*(?:t\(([A-Za-z+]+)\))?\]\s+(\d+)\s+Gbps",
        )
        .unwrap()
    })
}

// everything else, e.g. "phy   0:T:phy disabled"
fn detached_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*phy\s+(\d+):([A-Z]):([\w\s]+?)\s*$").unwrap())
}

pub(crate) fn parse_discover(output: &str) -> SmpDiscovery {
    let mut attached = Vec::new();
    for caps in attached_re().captures_iter(output) {
        let (Ok(phy), Ok(rphy), Ok(speed_gbps)) = (
            caps[1].parse(),
            caps[4].parse(),
            caps[8].parse(),
        ) else {
            continue;
        };
        let addr = &caps[3];
        attached.push(PhyDesc {
            phy,
            routing: caps[2].chars().next().unwrap_or('?'),
            addr: if addr.starts_with("0x") {
                addr.to_owned()
            } else {
                format!("0x{addr}")
            },
            rphy,
            devtype: caps
                .get(5)
                .map_or_else(|| String::from("phy"), |m| m.as_str().to_owned()),
            iproto: caps.get(6).map(|m| m.as_str().to_owned()),
            tproto: caps.get(7).map(|m| m.as_str().to_owned()),
            speed_gbps,
        });
    }
    attached.sort_by_key(|desc| desc.phy);

    let mut detached = Vec::new();
    for caps in detached_re().captures_iter(output) {
        let Ok(phy) = caps[1].parse() else { continue };
        detached.push(DetachedPhy {
            phy,
            routing: caps[2].chars().next().unwrap_or('?'),
            state: caps[3].trim().to_owned(),
        });
    }
    detached.sort_by_key(|desc| desc.phy);

    SmpDiscovery { attached, detached }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOVER_OUTPUT: &str = "\
  phy   0:T:phy disabled
  phy   1:T:phy disabled
  phy  12:U:attached:[5001636001a42e3f:13 exp t(SMP)]  12 Gbps
  phy  28:U:attached:[500605b00ab06f40:07  i(SSP+STP+SMP)]  12 Gbps
  phy  48:D:attached:[50012be000083c7d:00  V i(SMP) t(SSP)]  12 Gbps
";

    #[test]
    fn test_parse_attached_expander() {
        let disco = parse_discover(DISCOVER_OUTPUT);
        let phy = &disco.attached[0];
        assert_eq!(phy.phy, 12);
        assert_eq!(phy.routing, 'U');
        assert_eq!(phy.addr, "0x5001636001a42e3f");
        assert_eq!(phy.rphy, 13);
        assert_eq!(phy.devtype, "exp");
        assert_eq!(phy.iproto, None);
        assert_eq!(phy.tproto.as_deref(), Some("SMP"));
        assert_eq!(phy.speed_gbps, 12);
    }

    #[test]
    fn test_parse_attached_initiator_defaults_to_phy() {
        let disco = parse_discover(DISCOVER_OUTPUT);
        let phy = &disco.attached[1];
        assert_eq!(phy.phy, 28);
        assert_eq!(phy.devtype, "phy");
        assert_eq!(phy.iproto.as_deref(), Some("SSP+STP+SMP"));
        assert_eq!(phy.tproto, None);
    }

    #[test]
    fn test_parse_attached_virtual() {
        let disco = parse_discover(DISCOVER_OUTPUT);
        let phy = &disco.attached[2];
        assert_eq!(phy.devtype, "V");
        assert_eq!(phy.iproto.as_deref(), Some("SMP"));
        assert_eq!(phy.tproto.as_deref(), Some("SSP"));
    }

    #[test]
    fn test_parse_detached() {
        let disco = parse_discover(DISCOVER_OUTPUT);
        assert_eq!(disco.attached.len(), 3);
        assert_eq!(disco.detached.len(), 2);
        assert_eq!(disco.detached[0].phy, 0);
        assert_eq!(disco.detached[0].routing, 'T');
        assert_eq!(disco.detached[0].state, "phy disabled");
    }

    #[test]
    fn test_parse_empty() {
        let disco = parse_discover("");
        assert!(disco.attached.is_empty());
        assert!(disco.detached.is_empty());
    }
}
