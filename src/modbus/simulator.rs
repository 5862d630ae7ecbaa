// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated controller
//!
//! A Modbus TCP server answering from an in-memory register image built from
//! a [`RegisterMap`]. It stands in for a real controller in tests and demos.
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The simulated controller is the server,
//! the checker is the client.
//!
//! Supported requests:
//!
//! - 0x01 Read Coils, 0x02 Read Discrete Inputs
//! - 0x03 Read Holding Registers, 0x04 Read Input Registers
//! - 0x06 Write Single Register, 0x10 Write Multiple Registers
//!
//! Reading an address that is not part of the image answers
//! `IllegalDataAddress`; any other function answers `IllegalFunction`.

use std::{
    collections::HashMap,
    future, io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use super::register_map::{RegisterArea, RegisterMap, RegisterSpec};
use crate::register::{coerce_reference, encode, BooleanPolicy, RegisterValue, WordOrder};

/// Register tables of a simulated controller.
#[derive(Debug, Default, Clone)]
pub struct ControllerImage {
    pub holding_registers: HashMap<u16, u16>,
    pub input_registers: HashMap<u16, u16>,
    pub coils: HashMap<u16, bool>,
    pub discrete_inputs: HashMap<u16, bool>,
    word_order: WordOrder,
}

impl ControllerImage {
    /// Build an image holding the `value` of every map entry.
    ///
    /// Entries without a value are served as zero.
    pub fn from_register_map(map: &RegisterMap, word_order: WordOrder) -> Result<Self> {
        let mut image = Self {
            word_order,
            ..Self::default()
        };
        for spec in map.iter() {
            let text = spec.simulated_value.as_deref().unwrap_or("0");
            let value = coerce_reference(text, spec.register_type, BooleanPolicy::Lenient)
                .with_context(|| format!("Invalid simulated value for {}", spec.name))?;
            image.write_value(spec, &value);
        }
        Ok(image)
    }

    /// Store `value` at the location of `spec`.
    pub fn write_value(&mut self, spec: &RegisterSpec, value: &RegisterValue) {
        match spec.area {
            RegisterArea::Coil | RegisterArea::Discrete => {
                let bit = match value {
                    RegisterValue::Boolean(b) => *b,
                    RegisterValue::Integer(v) => *v != 0,
                    RegisterValue::UnsignedInteger(v) => *v != 0,
                    RegisterValue::Float(v) => *v != 0.0,
                    RegisterValue::Text(v) => !v.is_empty() && v != "0",
                };
                let table = if spec.area == RegisterArea::Coil {
                    &mut self.coils
                } else {
                    &mut self.discrete_inputs
                };
                table.insert(spec.address, bit);
            }
            RegisterArea::Holding | RegisterArea::Input => {
                let words = encode(value, spec.width, self.word_order);
                let table = if spec.area == RegisterArea::Holding {
                    &mut self.holding_registers
                } else {
                    &mut self.input_registers
                };
                for (i, word) in words.into_iter().enumerate() {
                    table.insert(spec.address + i as u16, word);
                }
            }
        }
    }
}

/// Image shared between the server and whoever drives the simulation.
pub type SharedImage = Arc<Mutex<ControllerImage>>;

/// Modbus service answering requests from a [`SharedImage`].
pub struct SimulatedController {
    image: SharedImage,
}

impl SimulatedController {
    pub fn new(image: SharedImage) -> Self {
        Self { image }
    }
}

impl tokio_modbus::server::Service for SimulatedController {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let Ok(mut image) = self.image.lock() else {
            error!("Controller image lock poisoned");
            return future::ready(Err(ExceptionCode::ServerDeviceFailure));
        };

        let res = match req {
            Request::ReadCoils(addr, cnt) => bit_read(&image.coils, addr, cnt).map(Response::ReadCoils),
            Request::ReadDiscreteInputs(addr, cnt) => {
                bit_read(&image.discrete_inputs, addr, cnt).map(Response::ReadDiscreteInputs)
            }
            Request::ReadInputRegisters(addr, cnt) => {
                register_read(&image.input_registers, addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&image.holding_registers, addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                register_write(&mut image.holding_registers, addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => register_write(
                &mut image.holding_registers,
                addr,
                std::slice::from_ref(&value),
            )
            .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => {
                error!("Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            debug!("Modbus request error: {:?}", e);
        }
        future::ready(res)
    }
}

fn register_read(registers: &HashMap<u16, u16>, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
    (0..cnt)
        .map(|i| {
            addr.checked_add(i)
                .and_then(|reg_addr| registers.get(&reg_addr).copied())
                .ok_or(ExceptionCode::IllegalDataAddress)
        })
        .collect()
}

fn bit_read(bits: &HashMap<u16, bool>, addr: u16, cnt: u16) -> Result<Vec<bool>, ExceptionCode> {
    (0..cnt)
        .map(|i| {
            addr.checked_add(i)
                .and_then(|bit_addr| bits.get(&bit_addr).copied())
                .ok_or(ExceptionCode::IllegalDataAddress)
        })
        .collect()
}

/// Write holding registers. Every target address must already exist.
fn register_write(registers: &mut HashMap<u16, u16>, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
    for i in 0..values.len() {
        let reg_addr = addr
            .checked_add(i as u16)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        if !registers.contains_key(&reg_addr) {
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }
    for (i, value) in values.iter().enumerate() {
        registers.insert(addr + i as u16, *value);
    }
    Ok(())
}

/// Serve `image` on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, image: SharedImage) -> io::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Simulated controller listening on {}", local_addr);

    let server = Server::new(listener);
    let on_connected = move |stream, socket_addr: SocketAddr| {
        let image = Arc::clone(&image);
        async move {
            debug!("Client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(SimulatedController::new(Arc::clone(&image))))
            })
        }
    };
    let on_process_error = |err| {
        error!("Simulated controller error: {}", err);
    };
    server.serve(&on_connected, on_process_error).await
}
