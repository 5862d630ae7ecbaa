// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP backend
//!
//! This module implements the transport boundary for controllers exposing
//! their configuration as Modbus registers.
//!
//! ## Key Components
//!
//! - [`RegisterMap`]: name, table, address, type and description of every
//!   register, loaded from YAML.
//! - [`plan_reads`]: coalesces registers into bounded read requests.
//! - [`ModbusSession`]: the [`crate::transport::TransportSession`] used by scans.
//! - [`simulator`]: a Modbus TCP server standing in for a controller.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ctrl_check::modbus::{ModbusSession, ModbusSettings, RegisterMap};
//! use ctrl_check::transport::{RegisterCatalog, TransportSession};
//!
//! let map = Arc::new(RegisterMap::from_file("register_map.yaml").unwrap());
//! let mut session = ModbusSession::new(map, ModbusSettings::default());
//! session.open("10.0.0.21", 502).unwrap();
//! session.service();
//! if !session.has_error() {
//!     println!("setpoint = {:?}", session.read_value("setpoint"));
//! }
//! session.close();
//! ```

pub mod planner;
pub mod register_map;
pub mod session;
pub mod simulator;

pub use planner::{plan_reads, ReadBlock};
pub use register_map::{RegisterArea, RegisterDefinition, RegisterMap, RegisterMapFile, RegisterSpec};
pub use session::{ModbusSession, ModbusSettings};
pub use simulator::{ControllerImage, SharedImage, SimulatedController};

use std::sync::Arc;

/// Creates [`ModbusSession`]s sharing one register map and read plan.
#[derive(Debug, Clone)]
pub struct ModbusSessionFactory {
    map: Arc<RegisterMap>,
    plan: Arc<[ReadBlock]>,
    settings: ModbusSettings,
}

impl ModbusSessionFactory {
    pub fn new(map: Arc<RegisterMap>, settings: ModbusSettings) -> Self {
        let plan: Arc<[ReadBlock]> = plan_reads(&map).into();
        Self { map, plan, settings }
    }
}

impl crate::transport::SessionFactory for ModbusSessionFactory {
    type Session = ModbusSession;

    fn create(&self) -> ModbusSession {
        ModbusSession::with_plan(Arc::clone(&self.map), Arc::clone(&self.plan), self.settings)
    }
}
