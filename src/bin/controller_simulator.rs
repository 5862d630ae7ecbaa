// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server serving the register values of a register map
//!
//! Every register answers with the `value` given in the map (zero when
//! absent), so a reference file can be checked without real hardware:
//!
//! ```bash
//! controller_simulator --map demo/register_map.yaml --port 1502
//! ```

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use ctrl_check::modbus::{simulator, ControllerImage, RegisterMap};
use ctrl_check::register::WordOrder;

/// Simulated controller answering Modbus TCP requests
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Register map holding the simulated values
    #[arg(long, default_value = "register_map.yaml")]
    map: String,

    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Listen port
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Store 32 and 64-bit values low word first
    #[arg(long)]
    low_word_first: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let map = RegisterMap::from_file(&args.map)?;
    let word_order = if args.low_word_first {
        WordOrder::LowWordFirst
    } else {
        WordOrder::HighWordFirst
    };
    let image = ControllerImage::from_register_map(&map, word_order)?;
    info!("Serving {} registers from {}", map.len(), args.map);

    let socket_addr = format!("{}:{}", args.address, args.port);
    let listener = TcpListener::bind(&socket_addr)
        .await
        .with_context(|| format!("Unable to listen on {}", socket_addr))?;

    let shared = Arc::new(Mutex::new(image));
    tokio::select! {
        result = simulator::serve(listener, shared) => {
            result.context("Simulated controller stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down simulated controller");
        }
    }
    Ok(())
}
