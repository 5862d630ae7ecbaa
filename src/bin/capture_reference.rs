// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture the current configuration of a controller as a reference file
//!
//! ```bash
//! capture_reference --map register_map.yaml --address 10.0.0.21 --output ref/tank.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use ctrl_check::modbus::{ModbusSession, ModbusSettings, RegisterMap};
use ctrl_check::reference::{ReferenceEntry, ReferenceFile};
use ctrl_check::register::WordOrder;
use ctrl_check::transport::{RegisterCatalog, TransportSession};

/// Read every register of a controller and write them as a reference file
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Register map of the controller
    #[arg(long, default_value = "register_map.yaml")]
    map: PathBuf,

    /// Controller address
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Controller port
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Modbus unit identifier
    #[arg(long, default_value_t = 1)]
    slave_id: u8,

    /// Connect and request timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// 32 and 64-bit values are stored low word first
    #[arg(long)]
    low_word_first: bool,

    /// Only capture these registers, in this order
    #[arg(long = "register", value_name = "NAME")]
    registers: Vec<String>,

    /// Reference file to write; printed to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let map = Arc::new(RegisterMap::from_file(&args.map)?);
    let settings = ModbusSettings {
        timeout: Duration::from_millis(args.timeout_ms),
        slave_id: args.slave_id,
        word_order: if args.low_word_first {
            WordOrder::LowWordFirst
        } else {
            WordOrder::HighWordFirst
        },
    };

    let names: Vec<String> = if args.registers.is_empty() {
        map.iter().map(|spec| spec.name.clone()).collect()
    } else {
        args.registers.clone()
    };

    info!("Connecting to controller at {}:{}", args.address, args.port);
    let mut session = ModbusSession::new(Arc::clone(&map), settings);
    session
        .open(&args.address, args.port)
        .with_context(|| format!("Unable to open {}:{}", args.address, args.port))?;
    session.service();
    if session.has_error() {
        session.close();
        bail!("Communications error with {}:{}", args.address, args.port);
    }

    let mut registers = Vec::with_capacity(names.len());
    for name in names {
        match session.read_value(&name) {
            Some(value) => registers.push(ReferenceEntry::captured(name, &value)),
            None => warn!("Register {} is not in the register map, skipped", name),
        }
    }
    session.close();

    let reference = ReferenceFile { registers };
    match &args.output {
        Some(path) => {
            reference.save_to_file(path)?;
            info!(
                "{} registers saved to {}",
                reference.registers.len(),
                path.display()
            );
        }
        None => {
            let yaml = serde_yml::to_string(&reference)
                .context("Failed to serialize reference to YAML")?;
            print!("{}", yaml);
        }
    }

    Ok(())
}
