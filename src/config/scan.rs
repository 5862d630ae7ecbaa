// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scan policy configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modbus::ModbusSettings;
use crate::register::{BooleanPolicy, WordOrder};
use crate::scan::{ScanOptions, DEFAULT_ADDRESS, DEFAULT_PORT};

/// Connection defaults and comparison policy shared by every unit.
///
/// # Example
///
/// ```
/// use ctrl_check::config::ScanConfig;
///
/// let scan = ScanConfig {
///     default_port: 1502,
///     max_parallel: 4,
///     ..ScanConfig::default()
/// };
/// assert_eq!(scan.scan_options().max_parallel, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Address used for units that do not specify one. Default is "127.0.0.1".
    pub default_address: String,

    /// Port used for units whose port is missing or unparsable. Default is 502,
    /// the standard Modbus TCP port.
    pub default_port: u16,

    /// Connect and per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Modbus unit identifier addressed on every controller.
    pub slave_id: u8,

    /// Number of units scanned at the same time. 1 scans sequentially.
    pub max_parallel: usize,

    /// Reject reference booleans other than 1/true/on/0/false/off.
    pub strict_booleans: bool,

    /// Order of the words of 32 and 64-bit values.
    pub word_order: WordOrder,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_address: DEFAULT_ADDRESS.to_string(),
            default_port: DEFAULT_PORT,
            timeout_ms: 2000,
            slave_id: 1,
            max_parallel: 1,
            strict_booleans: false,
            word_order: WordOrder::HighWordFirst,
        }
    }
}

impl ScanConfig {
    pub fn boolean_policy(&self) -> BooleanPolicy {
        if self.strict_booleans {
            BooleanPolicy::Strict
        } else {
            BooleanPolicy::Lenient
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_parallel: self.max_parallel.max(1),
            boolean_policy: self.boolean_policy(),
        }
    }

    pub fn modbus_settings(&self) -> ModbusSettings {
        ModbusSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            slave_id: self.slave_id,
            word_order: self.word_order,
        }
    }
}
