// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP transport session
//!
//! Connects to one controller with the synchronous tokio-modbus client,
//! reads every register of the [`RegisterMap`] in planned blocks and exposes
//! the decoded snapshot through [`RegisterCatalog`].

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio_modbus::client::sync::{self, Reader};
use tokio_modbus::Slave;

use super::planner::{plan_reads, ReadBlock};
use super::register_map::{RegisterArea, RegisterMap};
use crate::register::{decode, RawValue, RegisterType, RegisterValue, WordOrder};
use crate::transport::{RegisterCatalog, TransportError, TransportSession};

/// Connection parameters shared by every session of a scan.
#[derive(Debug, Clone, Copy)]
pub struct ModbusSettings {
    /// Applied to the TCP connect and to every request.
    pub timeout: Duration,
    pub slave_id: u8,
    pub word_order: WordOrder,
}

impl Default for ModbusSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            slave_id: 1,
            word_order: WordOrder::HighWordFirst,
        }
    }
}

enum BlockData {
    Words(Vec<u16>),
    Bits(Vec<bool>),
}

/// A Modbus TCP connection to one controller.
pub struct ModbusSession {
    map: Arc<RegisterMap>,
    plan: Arc<[ReadBlock]>,
    settings: ModbusSettings,
    ctx: Option<sync::Context>,
    snapshot: HashMap<String, RegisterValue>,
    error: bool,
}

impl ModbusSession {
    pub fn new(map: Arc<RegisterMap>, settings: ModbusSettings) -> Self {
        let plan: Arc<[ReadBlock]> = plan_reads(&map).into();
        Self::with_plan(map, plan, settings)
    }

    /// Build a session reusing an already computed read plan.
    pub fn with_plan(map: Arc<RegisterMap>, plan: Arc<[ReadBlock]>, settings: ModbusSettings) -> Self {
        Self {
            map,
            plan,
            settings,
            ctx: None,
            snapshot: HashMap::new(),
            error: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    /// Decoded values of the last refresh cycle.
    pub fn snapshot(&self) -> &HashMap<String, RegisterValue> {
        &self.snapshot
    }

    fn resolve(address: &str, port: u16) -> Result<SocketAddr, TransportError> {
        let invalid = || TransportError::InvalidAddress {
            address: address.to_string(),
            port,
        };
        (address, port)
            .to_socket_addrs()
            .map_err(|_| invalid())?
            .next()
            .ok_or_else(invalid)
    }

    fn read_block(ctx: &mut sync::Context, block: &ReadBlock) -> Result<BlockData, TransportError> {
        match block.area {
            RegisterArea::Holding => {
                flatten(ctx.read_holding_registers(block.start, block.count)).map(BlockData::Words)
            }
            RegisterArea::Input => {
                flatten(ctx.read_input_registers(block.start, block.count)).map(BlockData::Words)
            }
            RegisterArea::Coil => {
                flatten(ctx.read_coils(block.start, block.count)).map(BlockData::Bits)
            }
            RegisterArea::Discrete => {
                flatten(ctx.read_discrete_inputs(block.start, block.count)).map(BlockData::Bits)
            }
        }
    }

    fn store_block(&mut self, block: &ReadBlock, data: &BlockData) {
        for name in &block.members {
            let Some(spec) = self.map.get(name) else {
                continue;
            };
            let offset = (spec.address - block.start) as usize;
            let raw = match data {
                BlockData::Words(words) => {
                    let end = (offset + spec.width as usize).min(words.len());
                    RawValue::Words(words.get(offset..end).unwrap_or_default().to_vec())
                }
                BlockData::Bits(bits) => RawValue::Bit(bits.get(offset).copied().unwrap_or(false)),
            };
            let value = decode(&raw, spec.register_type, self.settings.word_order);
            self.snapshot.insert(spec.name.clone(), value);
        }
    }
}

/// Collapse a tokio-modbus `Result<Result<T, Exception>, Error>`.
fn flatten<T, X: Display, E: Display>(result: Result<Result<T, X>, E>) -> Result<T, TransportError> {
    match result {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(exception)) => Err(TransportError::Exception(exception.to_string())),
        Err(err) => Err(TransportError::Request(err.to_string())),
    }
}

impl TransportSession for ModbusSession {
    fn open(&mut self, address: &str, port: u16) -> Result<(), TransportError> {
        self.close();
        let socket_addr = Self::resolve(address, port)?;
        debug!("Connecting to controller at {}", socket_addr);

        let ctx = sync::tcp::connect_slave_with_timeout(
            socket_addr,
            Slave(self.settings.slave_id),
            Some(self.settings.timeout),
        )
        .map_err(|source| TransportError::Connect {
            address: address.to_string(),
            port,
            source,
        })?;

        self.ctx = Some(ctx);
        self.error = false;
        Ok(())
    }

    fn service(&mut self) {
        self.snapshot.clear();
        let Some(mut ctx) = self.ctx.take() else {
            warn!("Refresh requested on a closed session");
            self.error = true;
            return;
        };

        self.error = false;
        let plan = Arc::clone(&self.plan);
        for block in plan.iter() {
            match Self::read_block(&mut ctx, block) {
                Ok(data) => self.store_block(block, &data),
                Err(err) => {
                    warn!(
                        "Reading {} {:?} registers at {} failed: {}",
                        block.count, block.area, block.start, err
                    );
                    self.error = true;
                    break;
                }
            }
        }
        self.ctx = Some(ctx);
        debug!("Refreshed {} registers", self.snapshot.len());
    }

    fn has_error(&self) -> bool {
        self.error
    }

    fn close(&mut self) {
        if self.ctx.take().is_some() {
            debug!("Controller connection closed");
        }
    }
}

impl RegisterCatalog for ModbusSession {
    fn register_type(&self, name: &str) -> Option<RegisterType> {
        self.map.get(name).map(|spec| spec.register_type)
    }

    fn read_value(&self, name: &str) -> Option<RegisterValue> {
        self.snapshot.get(name).cloned()
    }

    fn describe(&self, name: &str) -> String {
        self.map
            .get(name)
            .map(|spec| spec.description.clone())
            .unwrap_or_default()
    }
}

impl Drop for ModbusSession {
    fn drop(&mut self) {
        self.close();
    }
}
