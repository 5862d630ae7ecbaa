// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scan orchestration
//!
//! A scan walks a list of configured [`Unit`]s, opens a transport session per
//! unit, compares the controller against its reference set and collects one
//! [`UnitScanResult`] per unit into a fresh [`ScanReport`].
//!
//! ## Per-unit outcome
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | unit has no reference name | [`ScanOutcome::NoReferenceConfigured`] |
//! | reference name not loaded | [`ScanOutcome::ReferenceNotLoaded`] |
//! | open fails / refresh reports an error | [`ScanOutcome::CommunicationFailure`] |
//! | otherwise | [`ScanOutcome::Connected`] with the mismatches |
//!
//! A failure on one unit never stops the scan of the next one.

pub mod scanner;

pub use scanner::{CancelFlag, ScanOptions, Scanner};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::Mismatch;

/// Default Modbus TCP service port.
pub const DEFAULT_PORT: u16 = 502;

/// Default controller address when a unit does not name one.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// One controller to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Name of the reference set; empty when none is configured.
    pub reference_set_name: String,
}

impl Unit {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        reference_set_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            reference_set_name: reference_set_name.into(),
        }
    }
}

/// Terminal state of one unit's scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Connected { mismatches: Vec<Mismatch> },
    CommunicationFailure { reason: String },
    NoReferenceConfigured,
    ReferenceNotLoaded,
}

impl ScanOutcome {
    pub fn mismatches(&self) -> &[Mismatch] {
        match self {
            Self::Connected { mismatches } => mismatches,
            _ => &[],
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitScanResult {
    pub unit: Unit,
    pub outcome: ScanOutcome,
}

/// Results of one scan invocation, in the order the units were given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<UnitScanResult>,
    /// Set when the scan was interrupted before every unit was visited.
    #[serde(default)]
    pub cancelled: bool,
}

impl ScanReport {
    pub fn new(results: Vec<UnitScanResult>) -> Self {
        Self {
            timestamp: Utc::now(),
            results,
            cancelled: false,
        }
    }

    pub fn total_mismatches(&self) -> usize {
        self.results.iter().map(|r| r.outcome.mismatches().len()).sum()
    }

    /// Units that were not compared, whatever the reason.
    pub fn failed_units(&self) -> Vec<&Unit> {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_connected())
            .map(|r| &r.unit)
            .collect()
    }
}

/// "No differences found", "1 difference found", "N differences found".
pub fn describe_count(count: usize) -> String {
    match count {
        0 => "No differences found".to_string(),
        1 => "1 difference found".to_string(),
        n => format!("{} differences found", n),
    }
}
