// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the controller configuration checker

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};

use ctrl_check::config::{self, Config};
use ctrl_check::modbus::{ModbusSessionFactory, RegisterMap};
use ctrl_check::reference::ReferenceStore;
use ctrl_check::report::{JsonReport, ReportSink, TextReport};
use ctrl_check::scan::{CancelFlag, Scanner, Unit};

/// Exit status after a second Ctrl-C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Check controller configuration registers against reference files
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Ctrl-C stops the scan once the controllers in progress are read and \
                  prints a partial report. A second Ctrl-C exits at once without a report."
)]
struct Args {
    /// Configuration file (created with defaults when missing)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Controller to scan, may be repeated
    #[arg(short, long = "unit", value_name = "NAME")]
    units: Vec<String>,

    /// Scan every configured controller (the default without --unit)
    #[arg(long, conflicts_with = "units")]
    all: bool,

    /// Default controller address, overrides the configuration
    #[arg(long)]
    address: Option<String>,

    /// Default controller port, overrides the configuration
    #[arg(long)]
    port: Option<u16>,

    /// Connect and request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of controllers scanned at the same time
    #[arg(long)]
    parallel: Option<usize>,

    /// Report reference booleans other than 1/true/on/0/false/off as invalid
    #[arg(long)]
    strict_booleans: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep scanning when a reference file cannot be loaded
    #[arg(long)]
    skip_missing_references: bool,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    if args.show_config_schema {
        config::output_config_schema()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.address.clone(),
        args.port,
        args.timeout_ms,
        args.parallel,
        args.strict_booleans,
    );

    let units = config.units();
    if units.is_empty() {
        warn!("No controllers configured in {}", args.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    let selected: Vec<Unit> = if args.units.is_empty() {
        debug!("Scanning all {} controllers", units.len());
        units
    } else {
        units
            .into_iter()
            .filter(|unit| args.units.contains(&unit.name))
            .collect()
    };

    let reference_dir = Config::resolve_path(&args.config, &config.reference_dir);
    let mut references = ReferenceStore::new();
    references
        .load_for_units(&selected, &reference_dir, args.skip_missing_references)
        .context("Failed to load reference files")?;
    info!("{} reference files loaded", references.len());

    let map_path = Config::resolve_path(&args.config, &config.register_map);
    let map = Arc::new(RegisterMap::from_file(&map_path)?);
    debug!("Register map {} has {} registers", map_path.display(), map.len());

    let factory = ModbusSessionFactory::new(map, config.scan.modbus_settings());
    let cancel = CancelFlag::new();
    install_ctrl_c_handler(cancel.clone());
    let scanner =
        Scanner::new(factory, config.scan.scan_options()).with_cancel_flag(cancel);

    let report = if args.units.is_empty() {
        scanner.scan_many(&selected, &references)
    } else {
        scanner.scan_selected(&selected, &args.units, &references)
    };

    let out: Box<dyn Write> = match &args.output {
        Some(path) => {
            info!("Saving report to {}", path.display());
            Box::new(BufWriter::new(File::create(path).with_context(|| {
                format!("Failed to create report file at {:?}", path)
            })?))
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut sink: Box<dyn ReportSink> = match args.format {
        ReportFormat::Text => Box::new(TextReport::new(out)),
        ReportFormat::Json => Box::new(JsonReport::new(out)),
    };
    sink.emit(&report)?;

    if report.total_mismatches() == 0 && report.failed_units().is_empty() && !report.cancelled {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Raise `cancel` on the first Ctrl-C. Units already being read finish
/// first. A second Ctrl-C exits without a report.
fn install_ctrl_c_handler(cancel: CancelFlag) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Unable to start signal handler: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Interrupted, finishing the controllers in progress (Ctrl-C again to abort)");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    error!("Interrupted again, exiting without a report");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            });
        });
    if let Err(err) = spawned {
        error!("Unable to spawn signal handler thread: {}", err);
    }
}
