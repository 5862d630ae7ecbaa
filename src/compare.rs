// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Comparison of a controller snapshot against a reference set
//!
//! The reference rows are walked in stored order. For each row the controller
//! supplies the declared type and the live value, the reference text is
//! coerced to that type and the two values are compared with
//! [`RegisterValue::matches`]. Only discrepancies are returned.
//!
//! Nothing in here fails: an unknown register or reference text that does not
//! fit the declared type becomes a [`Mismatch`] of its own kind, and the walk
//! continues with the next row.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceRegister;
use crate::register::{coerce_reference, BooleanPolicy, DecodeError, RegisterValue};
use crate::transport::RegisterCatalog;

/// Why a register was reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchKind {
    /// Live and reference values differ.
    ValueDiffers,
    /// The reference text could not be coerced to the declared type.
    InvalidReference { error: DecodeError },
    /// The controller does not know the register.
    Unresolved,
}

/// A register whose live value differs from its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub register_name: String,
    /// `None` when the controller could not resolve the register.
    pub controller_value: Option<RegisterValue>,
    pub reference_value: RegisterValue,
    pub description: String,
    pub kind: MismatchKind,
}

impl Mismatch {
    pub fn is_value_difference(&self) -> bool {
        self.kind == MismatchKind::ValueDiffers
    }
}

/// Type-aware comparison of snapshots against reference sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    boolean_policy: BooleanPolicy,
}

impl Comparator {
    pub fn new(boolean_policy: BooleanPolicy) -> Self {
        Self { boolean_policy }
    }

    /// Compare `controller` against `references`, returning mismatches in
    /// reference order.
    pub fn compare<C>(
        &self,
        unit_name: &str,
        controller: &C,
        references: &[ReferenceRegister],
    ) -> Vec<Mismatch>
    where
        C: RegisterCatalog + ?Sized,
    {
        let mismatches: Vec<Mismatch> = references
            .iter()
            .filter_map(|reference| self.compare_register(controller, reference))
            .collect();
        debug!(
            "{}: {} of {} registers differ",
            unit_name,
            mismatches.len(),
            references.len()
        );
        mismatches
    }

    fn compare_register<C>(&self, controller: &C, reference: &ReferenceRegister) -> Option<Mismatch>
    where
        C: RegisterCatalog + ?Sized,
    {
        let name = reference.name.as_str();
        let unresolved = || Mismatch {
            register_name: name.to_string(),
            controller_value: None,
            reference_value: RegisterValue::Text(reference.raw_text.clone()),
            description: format!("Register {} is not known to the controller", name),
            kind: MismatchKind::Unresolved,
        };

        let (Some(register_type), Some(live)) =
            (controller.register_type(name), controller.read_value(name))
        else {
            return Some(unresolved());
        };

        match coerce_reference(&reference.raw_text, register_type, self.boolean_policy) {
            Ok(expected) if live.matches(&expected) => None,
            Ok(expected) => Some(Mismatch {
                register_name: name.to_string(),
                controller_value: Some(live),
                reference_value: expected,
                description: controller.describe(name),
                kind: MismatchKind::ValueDiffers,
            }),
            Err(error) => Some(Mismatch {
                register_name: name.to_string(),
                controller_value: Some(live),
                reference_value: RegisterValue::Text(reference.raw_text.clone()),
                description: controller.describe(name),
                kind: MismatchKind::InvalidReference { error },
            }),
        }
    }
}

/// Compare with the default (lenient) boolean policy.
pub fn compare<C>(unit_name: &str, controller: &C, references: &[ReferenceRegister]) -> Vec<Mismatch>
where
    C: RegisterCatalog + ?Sized,
{
    Comparator::default().compare(unit_name, controller, references)
}
