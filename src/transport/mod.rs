// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Controller transport boundary
//!
//! The scan engine never speaks a wire protocol itself. It drives a
//! [`TransportSession`] per controller and queries the register schema and
//! snapshot through [`RegisterCatalog`], which each backend implements from
//! whatever it learns about the controller at runtime.
//!
//! The Modbus TCP backend lives in [`crate::modbus`].

use thiserror::Error;

use crate::register::{RegisterType, RegisterValue};

/// Capability queries over a controller's register schema and its last
/// refreshed snapshot.
pub trait RegisterCatalog {
    /// Declared type of `name`, or `None` when the controller does not know it.
    fn register_type(&self, name: &str) -> Option<RegisterType>;

    /// Value of `name` from the last refresh cycle.
    fn read_value(&self, name: &str) -> Option<RegisterValue>;

    /// Human-readable description of `name`.
    fn describe(&self, name: &str) -> String;
}

/// A connection to one controller.
///
/// A session is owned by a single scan; concurrent scans each get their own.
pub trait TransportSession: RegisterCatalog {
    /// Connect to the controller at `address:port`.
    fn open(&mut self, address: &str, port: u16) -> Result<(), TransportError>;

    /// Perform one full refresh of every register.
    fn service(&mut self);

    /// Whether the last refresh cycle failed.
    fn has_error(&self) -> bool;

    /// Disconnect. Calling it on a closed session does nothing.
    fn close(&mut self);
}

/// Creates a fresh session for every unit to scan.
pub trait SessionFactory: Sync {
    type Session: TransportSession;

    fn create(&self) -> Self::Session;
}

impl<F, S> SessionFactory for F
where
    F: Fn() -> S + Sync,
    S: TransportSession,
{
    type Session = S;

    fn create(&self) -> S {
        self()
    }
}

/// Failures talking to a controller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid controller address {address}:{port}")]
    InvalidAddress { address: String, port: u16 },

    #[error("Unable to connect to {address}:{port}: {source}")]
    Connect {
        address: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is not open")]
    NotOpen,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Controller answered with exception {0}")]
    Exception(String),
}
