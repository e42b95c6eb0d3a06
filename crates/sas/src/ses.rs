// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SCSI Enclosure Services queries through the `sg_ses` helper.
//!
//! Nicknames and element descriptors are not exposed in sysfs, so this
//! module shells out to `sg_ses` and scrapes its line output. Parsing is
//! kept separate from process invocation so it can be exercised on canned
//! text. Every query degrades to an empty result when the helper is missing
//! or fails; enclosures without SES support are a normal sight.

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::{Error, Result};

/// One environment metric from the element descriptor page, e.g.
/// `("Temperature sensor", "Temperature sensor 1", "Temperature", "C", 28.0)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementMetric {
    pub element_type: String,
    pub descriptor: String,
    pub key: String,
    pub unit: String,
    pub value: f64,
}

/// Summary status of one element descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementStatus {
    pub element_type: String,
    pub descriptor: String,
    pub status: String,
}

fn sg_ses(args: &[&str], sg_name: &str) -> Result<String> {
    let device = format!("/dev/{sg_name}");
    let output = Command::new("sg_ses")
        .args(args)
        .arg(&device)
        .output()
        .map_err(|err| Error::Collaborator {
            command: "sg_ses",
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::Collaborator {
            command: "sg_ses",
            reason: format!("{device}: exited with {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Subenclosure nickname (SES-2), if one has been assigned; `None` when
/// unset or when `sg_ses` is unavailable.
pub fn snic_nickname(sg_name: &str) -> Option<String> {
    match sg_ses(&["--page=snic", "-I0"], sg_name) {
        Ok(output) => parse_snic(&output),
        Err(err) => {
            log::debug!("no SES nickname for {sg_name}: {err}");
            None
        }
    }
}

/// Environment metrics (temperatures, voltages, currents, fan speeds) from
/// the joined element descriptor page; empty on any failure.
pub fn enclosure_metrics(sg_name: &str) -> Vec<ElementMetric> {
    match sg_ses(&["--page=ed", "--join"], sg_name) {
        Ok(output) => parse_metrics(&output),
        Err(err) => {
            log::warn!("no SES metrics for {sg_name}: {err}");
            Vec::new()
        }
    }
}

/// Per-element summary statuses from the joined element descriptor page;
/// empty on any failure.
pub fn enclosure_status(sg_name: &str) -> Vec<ElementStatus> {
    match sg_ses(&["--page=ed", "--join"], sg_name) {
        Ok(output) => parse_status(&output),
        Err(err) => {
            log::warn!("no SES status for {sg_name}: {err}");
            Vec::new()
        }
    }
}

fn snic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s+nickname:\s*(\S+)").unwrap())
}

// element block header, e.g.
//   "Temperature sensor 1 [4,0]  Element type: Temperature sensor"
fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\S.*?)\s+\[-?\d+,-?\d+\]\s+Element type: (.+?)\s*$").unwrap()
    })
}

// numeric reading with a unit, e.g. "Temperature=28 C", "Voltage: 5.02 volts"
fn metric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s+([A-Za-z][A-Za-z ]*?)\s*[=:]\s*([-+]?\d+(?:\.\d+)?)\s+([A-Za-z%]+)\s*$")
            .unwrap()
    })
}

// summary status, folded into a flag line: "..., status: OK"
fn status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"status:\s*([A-Za-z][A-Za-z ,/]*?)\s*$").unwrap())
}

pub(crate) fn parse_snic(output: &str) -> Option<String> {
    let nickname = snic_re().captures(output)?.get(1)?.as_str().to_owned();
    Some(nickname)
}

pub(crate) fn parse_metrics(output: &str) -> Vec<ElementMetric> {
    let mut metrics = Vec::new();
    let mut element: Option<(String, String)> = None;

    for line in output.lines() {
        if let Some(caps) = header_re().captures(line) {
            element = Some((caps[2].to_owned(), caps[1].to_owned()));
            continue;
        }
        let Some((element_type, descriptor)) = element.as_ref() else {
            continue;
        };
        if let Some(caps) = metric_re().captures(line) {
            if let Ok(value) = caps[2].parse::<f64>() {
                metrics.push(ElementMetric {
                    element_type: element_type.clone(),
                    descriptor: descriptor.clone(),
                    key: caps[1].to_owned(),
                    unit: caps[3].to_owned(),
                    value,
                });
            }
        }
    }
    metrics
}

pub(crate) fn parse_status(output: &str) -> Vec<ElementStatus> {
    let mut statuses = Vec::new();
    let mut element: Option<(String, String)> = None;

    for line in output.lines() {
        if let Some(caps) = header_re().captures(line) {
            element = Some((caps[2].to_owned(), caps[1].to_owned()));
            continue;
        }
        let Some((element_type, descriptor)) = element.take() else {
            continue;
        };
        match status_re().captures(line) {
            Some(caps) => statuses.push(ElementStatus {
                element_type,
                descriptor,
                status: caps[1].to_owned(),
            }),
            // keep looking inside the same element block
            None => element = Some((element_type, descriptor)),
        }
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNIC_OUTPUT: &str = "\
  NEWISYS   NDS-4600  0608
  Subenclosure nickname status page:
    number of secondary subenclosures: 0
    generation code: 0x0
    subenclosure identifier: 0 (primary)
      nickname status: 0
      nickname additional status: 0
      nickname: io1-jbod3
";

    const ED_JOIN_OUTPUT: &str = "\
  NEWISYS   NDS-4600  0608
    Primary enclosure logical identifier (hex): 5000ccab02009400
SLOT 00,3EG6R1WV [0,0]  Element type: Array device slot
  Enclosure Status:
    Predicted failure=0, Disabled=0, Swap=0, status: OK
    Ident=0, Report=0, Fault sensed=0, Fault requested=0
Temperature sensor 1 [4,0]  Element type: Temperature sensor
  Enclosure Status:
    Predicted failure=0, Disabled=0, Swap=0, status: OK
    Ident=0, Fail=0, OT failure=0, OT warning=0
    Temperature=28 C
Voltage 5V [9,1]  Element type: Voltage sensor
  Enclosure Status:
    Predicted failure=0, Disabled=0, Swap=0, status: Critical
    Ident=0, Fail=0, Warn Over=0, Warn Under=0
    Voltage: 5.02 volts
Fan 3 [3,2]  Element type: Cooling
  Enclosure Status:
    Predicted failure=0, Disabled=0, Swap=0, status: OK
    Ident=0, Hot swap=0, Fail=0, Requested on=1
    Actual speed=7980 rpm
";

    #[test]
    fn test_parse_snic() {
        assert_eq!(parse_snic(SNIC_OUTPUT).as_deref(), Some("io1-jbod3"));
        assert_eq!(parse_snic("sg_ses failed: Inquiry failed\n"), None);
        assert_eq!(parse_snic(""), None);
    }

    #[test]
    fn test_parse_metrics() {
        let metrics = parse_metrics(ED_JOIN_OUTPUT);
        assert_eq!(
            metrics,
            vec![
                ElementMetric {
                    element_type: "Temperature sensor".into(),
                    descriptor: "Temperature sensor 1".into(),
                    key: "Temperature".into(),
                    unit: "C".into(),
                    value: 28.0,
                },
                ElementMetric {
                    element_type: "Voltage sensor".into(),
                    descriptor: "Voltage 5V".into(),
                    key: "Voltage".into(),
                    unit: "volts".into(),
                    value: 5.02,
                },
                ElementMetric {
                    element_type: "Cooling".into(),
                    descriptor: "Fan 3".into(),
                    key: "Actual speed".into(),
                    unit: "rpm".into(),
                    value: 7980.0,
                },
            ]
        );
    }

    #[test]
    fn test_parse_status_one_per_element() {
        let statuses = parse_status(ED_JOIN_OUTPUT);
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0].descriptor, "SLOT 00,3EG6R1WV");
        assert_eq!(statuses[0].element_type, "Array device slot");
        assert_eq!(statuses[0].status, "OK");
        assert_eq!(statuses[2].status, "Critical");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_metrics("").is_empty());
        assert!(parse_status("").is_empty());
    }

    #[test]
    fn test_metric_flag_lines_are_not_metrics() {
        // flag assignments carry no unit word and must not leak in
        let out = "X [0,0]  Element type: Cooling\n    Ident=0, Fail=0\n";
        assert!(parse_metrics(out).is_empty());
    }

    #[test]
    fn test_serialize_metric() {
        let metric = ElementMetric {
            element_type: "Cooling".into(),
            descriptor: "Fan 3".into(),
            key: "Actual speed".into(),
            unit: "rpm".into(),
            value: 7980.0,
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["unit"], "rpm");
        assert_eq!(json["value"], 7980.0);
    }
}
