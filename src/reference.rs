// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Reference baselines
//!
//! A reference set is an ordered list of `(register name, value text)` rows
//! captured from a controller known to be correctly configured. Reference
//! sets are loaded once into a [`ReferenceStore`] and shared read-only by
//! every scan; the order of the rows is the order of the mismatch report.
//!
//! Reference files are YAML:
//!
//! ```yaml
//! registers:
//!   - name: setpoint
//!     value: "72.5"
//!   - name: alarmEnabled
//!     value: "on"
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::register::RegisterValue;
use crate::scan::Unit;

/// One baseline row. The text is kept verbatim (trimmed); its type is only
/// known once the controller declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRegister {
    pub name: String,
    pub raw_text: String,
}

impl ReferenceRegister {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_text: raw_text.into().trim().to_string(),
        }
    }
}

/// Named reference sets, loaded once and never mutated afterwards.
#[derive(Debug, Default, Clone)]
pub struct ReferenceStore {
    sets: HashMap<String, Arc<[ReferenceRegister]>>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rows` under `name`.
    ///
    /// Loading a name that is already present is a no-op: the first rows win.
    /// Returns `true` when the rows were stored.
    pub fn load<I>(&mut self, name: &str, rows: I) -> bool
    where
        I: IntoIterator<Item = ReferenceRegister>,
    {
        if self.sets.contains_key(name) {
            debug!("Reference {} already loaded, keeping existing rows", name);
            return false;
        }
        let rows: Arc<[ReferenceRegister]> = rows.into_iter().collect();
        debug!("Reference {} loaded with {} registers", name, rows.len());
        self.sets.insert(name.to_string(), rows);
        true
    }

    /// Rows of the reference set `name`, in file order.
    pub fn get(&self, name: &str) -> Option<&[ReferenceRegister]> {
        self.sets.get(name).map(|rows| rows.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Names of the loaded reference sets, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Load every distinct reference file named by `units` from `dir`.
    ///
    /// Units without a reference are skipped. When `skip_missing` is set,
    /// unreadable files are logged and left unloaded so the affected units
    /// report the reference as not loaded; otherwise the first failure is
    /// returned.
    pub fn load_for_units<P: AsRef<Path>>(
        &mut self,
        units: &[Unit],
        dir: P,
        skip_missing: bool,
    ) -> Result<()> {
        let dir = dir.as_ref();
        for unit in units {
            let name = unit.reference_set_name.as_str();
            if name.is_empty() || self.contains(name) {
                continue;
            }

            let path = dir.join(name);
            match ReferenceFile::from_file(&path) {
                Ok(file) => {
                    self.load(name, file.into_rows());
                    info!("Reference file {} loaded", name);
                }
                Err(err) if skip_missing => {
                    warn!("Unable to load reference file {}: {:#}", path.display(), err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

/// On-disk form of a reference set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceFile {
    #[serde(default)]
    pub registers: Vec<ReferenceEntry>,
}

/// One row of a reference file.
///
/// Values are kept as the literal text of the YAML scalar, so `1.10` stays
/// `1.10`. A null or missing value reads as empty text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl ReferenceEntry {
    /// Entry holding a value read from a controller.
    pub fn captured(name: impl Into<String>, value: &RegisterValue) -> Self {
        let text = match value {
            RegisterValue::Boolean(v) => v.to_string(),
            other => other.to_string(),
        };
        Self {
            name: name.into(),
            value: Some(text),
        }
    }
}

impl ReferenceFile {
    /// Read a reference file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference file at {:?}", path))?;
        serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse reference file {:?}", path))
    }

    /// Write the reference file as YAML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yml::to_string(self).context("Failed to serialize reference to YAML")?;
        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create reference file at {:?}", path.as_ref()))?;
        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write reference to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn into_rows(self) -> Vec<ReferenceRegister> {
        self.registers
            .into_iter()
            .map(|entry| ReferenceRegister::new(entry.name, entry.value.unwrap_or_default()))
            .collect()
    }
}

impl FromIterator<(String, String)> for ReferenceFile {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            registers: iter
                .into_iter()
                .map(|(name, value)| ReferenceEntry {
                    name,
                    value: Some(value),
                })
                .collect(),
        }
    }
}
