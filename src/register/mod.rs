// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register model
//!
//! A controller exposes a flat map of named registers. Each register has a
//! semantic [`RegisterType`] declared by the controller's own schema, and a
//! current value held as a [`RegisterValue`].
//!
//! The [`decoder`] submodule turns raw protocol data and reference text into
//! typed values.

pub mod decoder;

pub use decoder::{coerce_reference, decode, encode, round4, BooleanPolicy, DecodeError, RawValue, WordOrder};

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// Semantic type of a register, as declared by the controller schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    Integer,
    UnsignedInteger,
    Float,
    Boolean,
    Text,
}

impl RegisterType {
    /// Parse a schema type tag.
    ///
    /// Returns `None` for tags that do not name a known type.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "i16" | "i32" | "signed" => Some(Self::Integer),
            "uint" | "unsigned" | "u16" | "u32" | "unsigned_integer" => Some(Self::UnsignedInteger),
            "float" | "real" | "f32" | "f64" => Some(Self::Float),
            "bool" | "boolean" | "coil" => Some(Self::Boolean),
            "str" | "string" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Parse a schema type tag, falling back to [`RegisterType::Text`].
    ///
    /// Unrecognised tags are compared as plain text rather than failing the
    /// whole controller.
    pub fn from_tag_or_text(tag: &str) -> Self {
        Self::from_tag(tag).unwrap_or_else(|| {
            warn!("Unknown register type '{}', comparing as text", tag);
            Self::Text
        })
    }

    /// Number of 16-bit words used when the schema does not say otherwise.
    pub fn default_words(&self) -> u16 {
        match self {
            Self::Integer | Self::UnsignedInteger | Self::Boolean => 1,
            Self::Float => 2,
            Self::Text => 8,
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Integer => "int",
            Self::UnsignedInteger => "uint",
            Self::Float => "float",
            Self::Boolean => "bool",
            Self::Text => "str",
        };
        f.write_str(tag)
    }
}

/// A typed register value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RegisterValue {
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl RegisterValue {
    /// The type tag of this value.
    pub fn register_type(&self) -> RegisterType {
        match self {
            Self::Integer(_) => RegisterType::Integer,
            Self::UnsignedInteger(_) => RegisterType::UnsignedInteger,
            Self::Float(_) => RegisterType::Float,
            Self::Boolean(_) => RegisterType::Boolean,
            Self::Text(_) => RegisterType::Text,
        }
    }

    /// Compare two values under the comparison rule of their type.
    ///
    /// Floats are equal when they agree once rounded to 4 fractional digits.
    /// Values of different types are compared through their text form.
    pub fn matches(&self, other: &RegisterValue) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::UnsignedInteger(a), Self::UnsignedInteger(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => round4(*a) == round4(*b),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (a, b) => a.to_string() == b.to_string(),
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::UnsignedInteger(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(v) => f.write_str(if *v { "On" } else { "Off" }),
            Self::Text(v) => f.write_str(v),
        }
    }
}
