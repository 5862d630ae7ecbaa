// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./ctrl_check --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is "localhost".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port**: the default port must be non-zero
/// - **Timeout**: the timeout must be non-zero
/// - **Units**: names must be non-empty and unique
/// - **Addresses**: non-IP addresses are only reported, as they may be host names
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.scan.default_port == 0 {
        anyhow::bail!("Invalid default port number: 0");
    }

    if config.scan.timeout_ms == 0 {
        anyhow::bail!("Timeout must be greater than zero");
    }

    if config.scan.max_parallel == 0 {
        anyhow::bail!("max_parallel must be at least 1");
    }

    if !is_valid_ip_address(&config.scan.default_address) {
        debug!(
            "Potentially invalid default address format: {}",
            config.scan.default_address
        );
    }

    let mut names = HashSet::new();
    for unit in &config.units {
        if unit.name.trim().is_empty() {
            anyhow::bail!("Unit names cannot be empty");
        }
        if !names.insert(unit.name.as_str()) {
            anyhow::bail!("Unit {} is defined more than once", unit.name);
        }
        if let Some(address) = &unit.address {
            if !is_valid_ip_address(address) {
                debug!("Unit {} uses host name {}", unit.name, address);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;

    fn unit(name: &str) -> UnitConfig {
        UnitConfig {
            name: name.to_string(),
            address: None,
            port: None,
            reference: None,
        }
    }

    #[test]
    fn test_ip_addresses() {
        assert!(is_valid_ip_address("10.0.0.21"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("tank-1.plant"));
    }

    #[test]
    fn test_duplicate_units_rejected() {
        let mut config = Config::default();
        config.units = vec![unit("Tank 1"), unit("Tank 2")];
        assert!(validate_specific_rules(&config).is_ok());

        config.units.push(unit("Tank 1"));
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.scan.timeout_ms = 0;
        assert!(validate_specific_rules(&config).is_err());
    }
}
