// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Controller configuration checker
//!
//! This library reads the configuration registers of networked controllers
//! and reports every register whose value differs from a stored reference.

pub mod compare;
pub mod config;
pub mod modbus;
pub mod reference;
pub mod register;
pub mod report;
pub mod scan;
pub mod transport;

pub use compare::{Comparator, Mismatch, MismatchKind};
pub use reference::{ReferenceRegister, ReferenceStore};
pub use register::{RegisterType, RegisterValue};
pub use scan::{ScanOutcome, ScanReport, Scanner, Unit, UnitScanResult};
