// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Unit (controller) entries of the configuration file

use log::warn;
use serde::{Deserialize, Serialize};

use super::ScanConfig;
use crate::scan::Unit;

/// Port as written in the configuration.
///
/// Integers and numeric strings are ports. Any other scalar (a float, a
/// boolean) is kept as written and resolves to the default port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(i64),
    Text(String),
    Other(serde_yml::Value),
}

impl PortField {
    /// The port, or `None` when it is not a valid TCP port.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Number(n) => u16::try_from(*n).ok().filter(|p| *p > 0),
            Self::Text(s) => s.trim().parse::<u16>().ok().filter(|p| *p > 0),
            Self::Other(_) => None,
        }
    }
}

/// A controller entry.
///
/// ```yaml
/// - name: Tank 1
///   address: 10.0.0.21
///   port: 502
///   reference: tank.yaml
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortField>,

    /// Reference file checked against this unit.
    #[serde(default, alias = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl UnitConfig {
    /// Apply the address and port defaults of `scan`.
    pub fn to_unit(&self, scan: &ScanConfig) -> Unit {
        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&scan.default_address);

        let port = match &self.port {
            None => scan.default_port,
            Some(field) => field.port().unwrap_or_else(|| {
                warn!(
                    "Invalid port {:?} for {}, using {}",
                    field, self.name, scan.default_port
                );
                scan.default_port
            }),
        };

        let reference = self
            .reference
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        Unit::new(self.name.clone(), address, port, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(yaml: &str) -> Unit {
        let config: UnitConfig = serde_yml::from_str(yaml).unwrap();
        config.to_unit(&ScanConfig::default())
    }

    #[test]
    fn test_defaults_applied() {
        let unit = unit("name: Tank 1\n");
        assert_eq!(unit.address, "127.0.0.1");
        assert_eq!(unit.port, 502);
        assert_eq!(unit.reference_set_name, "");
    }

    #[test]
    fn test_port_forms() {
        assert_eq!(unit("{name: A, port: 1502}").port, 1502);
        assert_eq!(unit("{name: A, port: \"1503\"}").port, 1503);
        assert_eq!(unit("{name: A, port: \"modbus\"}").port, 502);
        assert_eq!(unit("{name: A, port: 70000}").port, 502);
        assert_eq!(unit("{name: A, port: 502.5}").port, 502);
        assert_eq!(unit("{name: A, port: 1502.0}").port, 502);
        assert_eq!(unit("{name: A, port: true}").port, 502);
        assert_eq!(unit("{name: A, port: ~}").port, 502);
        assert_eq!(unit("name: A\nport:\n").port, 502);
    }

    #[test]
    fn test_null_address_uses_default() {
        let unit = unit("{name: A, address: ~, port: 1502, ref: ~}");
        assert_eq!(unit.address, "127.0.0.1");
        assert_eq!(unit.port, 1502);
        assert_eq!(unit.reference_set_name, "");
    }

    #[test]
    fn test_ref_alias() {
        let unit = unit("{name: A, address: 10.0.0.9, ref: tank.yaml}");
        assert_eq!(unit.address, "10.0.0.9");
        assert_eq!(unit.reference_set_name, "tank.yaml");
    }
}
