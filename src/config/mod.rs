// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the controller checker
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `scan`: connection defaults, timeout and scan policy
//! - `register_map`: register map file describing the controllers
//! - `reference_dir`: directory holding the reference files
//! - `units`: the controllers to check
//!
//! Relative paths are resolved against the directory of the configuration
//! file.
//!
//! ## Usage
//!
//! ```no_run
//! use ctrl_check::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("10.0.0.1".to_string()), // Default address
//!     Some(1502),                   // Default port
//!     Some(500),                    // Timeout in milliseconds
//!     Some(4),                      // Parallel scans
//!     true,                         // Strict booleans
//! );
//!
//! println!("Units configured: {}", config.units.len());
//! ```

pub mod scan;
pub mod unit;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use scan::ScanConfig;
pub use unit::{PortField, UnitConfig};
pub use utils::{is_valid_ip_address, output_config_schema};

use crate::scan::Unit;

/// Embedded JSON schema of the configuration file.
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the configuration
/// file, allowing for minimal configuration when custom settings are not required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection defaults and scan policy.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Register map of the controllers, relative to the configuration file.
    #[serde(default = "default_register_map")]
    pub register_map: PathBuf,

    /// Directory holding the reference files, relative to the configuration file.
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,

    /// Controllers to check, in report order.
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

fn default_register_map() -> PathBuf {
    PathBuf::from("register_map.yaml")
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from("ref")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            register_map: default_register_map(),
            reference_dir: default_reference_dir(),
            units: Vec::new(),
        }
    }
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Check raw YAML against the embedded JSON schema.
    fn check_schema(contents: &str) -> Result<()> {
        let document: serde_json::Value =
            serde_yml::from_str(contents).context("Configuration is not valid YAML")?;
        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;
        validator
            .validate(&document)
            .map_err(|error| anyhow::anyhow!("Configuration validation failed: {}", error))
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = Self::check_schema(&contents) {
            error!("Configuration {} does not match the schema", path.display());
            Self::create_sample_config(path)?;
            return Err(error.context(format!("Invalid configuration {}", path.display())));
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `default_address` - Address used for units without one
    /// * `default_port` - Port used for units without a valid one
    /// * `timeout_ms` - Connect and request timeout in milliseconds
    /// * `max_parallel` - Number of units scanned at the same time
    /// * `strict_booleans` - If true, reject unrecognised boolean reference text
    pub fn apply_args(
        &mut self,
        default_address: Option<String>,
        default_port: Option<u16>,
        timeout_ms: Option<u64>,
        max_parallel: Option<usize>,
        strict_booleans: bool,
    ) {
        if let Some(address) = default_address {
            debug!("Overriding default address from command line: {}", address);
            self.scan.default_address = address;
        }
        if let Some(port) = default_port {
            debug!("Overriding default port from command line: {}", port);
            self.scan.default_port = port;
        }
        if let Some(timeout) = timeout_ms {
            debug!("Overriding timeout from command line: {} ms", timeout);
            self.scan.timeout_ms = timeout;
        }
        if let Some(parallel) = max_parallel {
            debug!("Overriding parallel scans from command line: {}", parallel);
            self.scan.max_parallel = parallel.max(1);
        }
        if strict_booleans {
            self.scan.strict_booleans = true;
        }
    }

    /// Resolve `path` against the directory holding the configuration file.
    pub fn resolve_path<P: AsRef<Path>>(config_path: P, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match config_path.as_ref().parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Units with the address and port defaults applied.
    pub fn units(&self) -> Vec<Unit> {
        self.units.iter().map(|unit| unit.to_unit(&self.scan)).collect()
    }
}
