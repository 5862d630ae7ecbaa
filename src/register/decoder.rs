// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register decoder
//!
//! Pure conversions between raw protocol data, reference text and typed
//! [`RegisterValue`]s:
//!
//! - [`decode`] turns words or bits read from a controller into a value of the
//!   declared type. It never fails: the transport already knows the type.
//! - [`coerce_reference`] parses the textual baseline captured in a reference
//!   file into the type the controller declares for that register.
//! - [`encode`] is the inverse of [`decode`], used to serve register images.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{RegisterType, RegisterValue};

/// Raw data as read from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// One or more 16-bit holding/input registers.
    Words(Vec<u16>),
    /// A single coil or discrete input.
    Bit(bool),
}

/// Order of 16-bit words inside multi-word values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    /// Most significant word at the lowest address.
    #[default]
    HighWordFirst,
    /// Least significant word at the lowest address.
    LowWordFirst,
}

/// How reference text is coerced into a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanPolicy {
    /// `1`, `true` and `on` are true, anything else is false.
    #[default]
    Lenient,
    /// `1`, `true`, `on` are true, `0`, `false`, `off` are false, anything
    /// else is a [`DecodeError`].
    Strict,
}

/// Reference text that cannot be coerced into the controller-declared type.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("invalid reference '{text}' for {expected} register: {reason}")]
    InvalidReference {
        text: String,
        expected: RegisterType,
        reason: String,
    },

    #[error("unrecognized boolean '{text}' in reference")]
    UnrecognizedBoolean { text: String },
}

const TRUE_TOKENS: [&str; 3] = ["1", "true", "on"];
const FALSE_TOKENS: [&str; 3] = ["0", "false", "off"];

/// Round to 4 fractional digits, the float comparison tolerance.
///
/// Values too large to scale are returned unchanged; they carry no
/// fractional digits anyway.
pub fn round4(value: f64) -> f64 {
    let scaled = value * 10_000.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 10_000.0
}

/// Decode a raw controller value into the declared type.
pub fn decode(raw: &RawValue, register_type: RegisterType, order: WordOrder) -> RegisterValue {
    match raw {
        RawValue::Bit(bit) => decode_bit(*bit, register_type),
        RawValue::Words(words) => decode_words(words, register_type, order),
    }
}

fn decode_bit(bit: bool, register_type: RegisterType) -> RegisterValue {
    match register_type {
        RegisterType::Integer => RegisterValue::Integer(bit as i64),
        RegisterType::UnsignedInteger => RegisterValue::UnsignedInteger(bit as u64),
        RegisterType::Float => RegisterValue::Float(if bit { 1.0 } else { 0.0 }),
        RegisterType::Boolean => RegisterValue::Boolean(bit),
        RegisterType::Text => RegisterValue::Text(if bit { "1" } else { "0" }.to_string()),
    }
}

fn decode_words(words: &[u16], register_type: RegisterType, order: WordOrder) -> RegisterValue {
    match register_type {
        RegisterType::Integer => match words.len() {
            0 | 1 => RegisterValue::Integer(combine(words, 1, order) as u16 as i16 as i64),
            2 => RegisterValue::Integer(combine(words, 2, order) as u32 as i32 as i64),
            _ => RegisterValue::Integer(combine(words, 4, order) as i64),
        },
        RegisterType::UnsignedInteger => {
            let width = match words.len() {
                0 | 1 => 1,
                2 => 2,
                _ => 4,
            };
            RegisterValue::UnsignedInteger(combine(words, width, order))
        }
        RegisterType::Float => {
            if words.len() <= 2 {
                RegisterValue::Float(f32::from_bits(combine(words, 2, order) as u32) as f64)
            } else {
                RegisterValue::Float(f64::from_bits(combine(words, 4, order)))
            }
        }
        RegisterType::Boolean => RegisterValue::Boolean(words.iter().any(|w| *w != 0)),
        RegisterType::Text => {
            let bytes: Vec<u8> = words
                .iter()
                .flat_map(|w| w.to_be_bytes())
                .take_while(|b| *b != 0)
                .collect();
            RegisterValue::Text(String::from_utf8_lossy(&bytes).trim().to_string())
        }
    }
}

/// Fold `width` words into an integer, zero-padding short input.
fn combine(words: &[u16], width: usize, order: WordOrder) -> u64 {
    let mut padded: Vec<u16> = words.iter().copied().take(width).collect();
    padded.resize(width, 0);
    if order == WordOrder::LowWordFirst {
        padded.reverse();
    }
    padded.iter().fold(0u64, |acc, w| (acc << 16) | *w as u64)
}

fn split(value: u64, width: usize, order: WordOrder) -> Vec<u16> {
    let mut words: Vec<u16> = (0..width)
        .rev()
        .map(|i| (value >> (16 * i)) as u16)
        .collect();
    if order == WordOrder::LowWordFirst {
        words.reverse();
    }
    words
}

/// Encode a typed value into `words` registers.
pub fn encode(value: &RegisterValue, words: u16, order: WordOrder) -> Vec<u16> {
    let width = words.max(1) as usize;
    match value {
        RegisterValue::Integer(v) => match width {
            1 => vec![*v as i16 as u16],
            2 => split(*v as i32 as u32 as u64, 2, order),
            _ => split(*v as u64, 4, order),
        },
        RegisterValue::UnsignedInteger(v) => split(*v, width.min(4), order),
        RegisterValue::Float(v) => {
            if width <= 2 {
                split((*v as f32).to_bits() as u64, 2, order)
            } else {
                split(v.to_bits(), 4, order)
            }
        }
        RegisterValue::Boolean(v) => {
            let mut out = vec![0; width];
            out[width - 1] = *v as u16;
            out
        }
        RegisterValue::Text(text) => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(width * 2, 0);
            bytes
                .chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect()
        }
    }
}

/// Coerce reference text into the type the controller declares.
pub fn coerce_reference(
    raw_text: &str,
    register_type: RegisterType,
    policy: BooleanPolicy,
) -> Result<RegisterValue, DecodeError> {
    let text = raw_text.trim();
    let invalid = |reason: String| DecodeError::InvalidReference {
        text: text.to_string(),
        expected: register_type,
        reason,
    };

    match register_type {
        RegisterType::Integer => text
            .parse::<i64>()
            .map(RegisterValue::Integer)
            .map_err(|e| invalid(e.to_string())),
        RegisterType::UnsignedInteger => text
            .parse::<u64>()
            .map(RegisterValue::UnsignedInteger)
            .map_err(|e| invalid(e.to_string())),
        RegisterType::Float => text
            .parse::<f64>()
            .map(RegisterValue::Float)
            .map_err(|e| invalid(e.to_string())),
        RegisterType::Boolean => {
            let token = text.to_ascii_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Ok(RegisterValue::Boolean(true))
            } else if policy == BooleanPolicy::Lenient || FALSE_TOKENS.contains(&token.as_str()) {
                Ok(RegisterValue::Boolean(false))
            } else {
                Err(DecodeError::UnrecognizedBoolean {
                    text: text.to_string(),
                })
            }
        }
        RegisterType::Text => Ok(RegisterValue::Text(text.to_string())),
    }
}
