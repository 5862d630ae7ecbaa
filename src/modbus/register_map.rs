// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Controller register map
//!
//! The Modbus backend learns the name, location, type and description of
//! every register from a YAML register map:
//!
//! ```yaml
//! registers:
//!   - name: setpoint
//!     area: holding
//!     address: 100
//!     type: float
//!     description: Tank temperature setpoint
//!   - name: alarmEnabled
//!     area: coil
//!     address: 5
//!     type: bool
//! ```
//!
//! `words` overrides the register width for numeric and text registers.
//! `value` is only read by the simulated controller.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::register::RegisterType;

/// Modbus data table holding a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterArea {
    Holding,
    Input,
    Coil,
    Discrete,
}

impl RegisterArea {
    /// Coils and discrete inputs hold single bits.
    pub fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::Discrete)
    }
}

/// One entry of the register map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDefinition {
    pub name: String,
    pub area: RegisterArea,
    pub address: u16,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterMapFile {
    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,
}

/// A resolved register location.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterSpec {
    pub name: String,
    pub area: RegisterArea,
    pub address: u16,
    pub register_type: RegisterType,
    /// Width in words for register areas, always 1 for bit areas.
    pub width: u16,
    pub description: String,
    pub simulated_value: Option<String>,
}

/// The register schema of one kind of controller.
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    registers: Vec<RegisterSpec>,
    index: HashMap<String, usize>,
}

impl RegisterMap {
    /// Load and validate a register map file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading register map from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read register map at {:?}", path))?;
        let file: RegisterMapFile = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse register map {:?}", path))?;
        Self::from_definitions(file.registers)
            .with_context(|| format!("Invalid register map {:?}", path))
    }

    /// Resolve definitions, rejecting duplicates and impossible widths.
    pub fn from_definitions(definitions: Vec<RegisterDefinition>) -> Result<Self> {
        let mut map = Self::default();
        for definition in definitions {
            let spec = resolve(definition)?;
            if map.index.contains_key(&spec.name) {
                anyhow::bail!("Register {} is defined more than once", spec.name);
            }
            map.index.insert(spec.name.clone(), map.registers.len());
            map.registers.push(spec);
        }
        debug!("Register map holds {} registers", map.registers.len());
        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&RegisterSpec> {
        self.index.get(name).map(|i| &self.registers[*i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterSpec> {
        self.registers.iter()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

fn resolve(definition: RegisterDefinition) -> Result<RegisterSpec> {
    let register_type = RegisterType::from_tag_or_text(&definition.type_tag);
    let width = if definition.area.is_bit() {
        1
    } else {
        let width = definition.words.unwrap_or_else(|| register_type.default_words());
        let valid = match register_type {
            RegisterType::Integer | RegisterType::UnsignedInteger => matches!(width, 1 | 2 | 4),
            RegisterType::Float => matches!(width, 2 | 4),
            RegisterType::Boolean => width == 1,
            RegisterType::Text => (1..=123).contains(&width),
        };
        if !valid {
            anyhow::bail!(
                "Register {} cannot be a {} of {} words",
                definition.name,
                register_type,
                width
            );
        }
        width
    };

    if definition.address as u32 + width as u32 > u16::MAX as u32 + 1 {
        anyhow::bail!(
            "Register {} at address {} overflows the address space",
            definition.name,
            definition.address
        );
    }

    Ok(RegisterSpec {
        name: definition.name,
        area: definition.area,
        address: definition.address,
        register_type,
        width,
        description: definition.description.unwrap_or_default(),
        simulated_value: definition.value,
    })
}
