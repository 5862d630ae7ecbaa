// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use super::{describe_count, ScanOutcome, ScanReport, Unit, UnitScanResult};
use crate::compare::Comparator;
use crate::reference::ReferenceStore;
use crate::register::BooleanPolicy;
use crate::transport::{SessionFactory, TransportSession};

/// Shared flag used to interrupt a batch scan between units.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning of a scan run.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Number of units scanned at the same time; 1 scans sequentially.
    pub max_parallel: usize,
    pub boolean_policy: BooleanPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            boolean_policy: BooleanPolicy::Lenient,
        }
    }
}

/// Drives transport sessions and the comparator over a list of units.
pub struct Scanner<F: SessionFactory> {
    factory: F,
    options: ScanOptions,
    comparator: Comparator,
    cancel: CancelFlag,
}

impl<F: SessionFactory> Scanner<F> {
    pub fn new(factory: F, options: ScanOptions) -> Self {
        Self {
            factory,
            options,
            comparator: Comparator::new(options.boolean_policy),
            cancel: CancelFlag::new(),
        }
    }

    /// Use an externally owned cancel flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Scan a single unit against its reference set.
    pub fn scan_one(&self, unit: &Unit, references: &ReferenceStore) -> UnitScanResult {
        let outcome = self.run_unit(unit, references);
        UnitScanResult {
            unit: unit.clone(),
            outcome,
        }
    }

    fn run_unit(&self, unit: &Unit, references: &ReferenceStore) -> ScanOutcome {
        let reference_name = unit.reference_set_name.as_str();
        if reference_name.is_empty() {
            warn!("Controller {} has no reference file specified", unit.name);
            return ScanOutcome::NoReferenceConfigured;
        }

        let Some(rows) = references.get(reference_name) else {
            warn!("Reference {} not loaded for {}", reference_name, unit.name);
            return ScanOutcome::ReferenceNotLoaded;
        };

        info!("Check config for {} against {}...", unit.name, reference_name);

        let mut session = self.factory.create();
        if let Err(err) = session.open(&unit.address, unit.port) {
            warn!("Unable to open {}: {}", unit.name, err);
            return ScanOutcome::CommunicationFailure {
                reason: err.to_string(),
            };
        }

        session.service();
        let outcome = if session.has_error() {
            warn!("Communications error with {}", unit.name);
            ScanOutcome::CommunicationFailure {
                reason: "register read failed".to_string(),
            }
        } else {
            info!("{} configuration read", unit.name);
            let mismatches = self.comparator.compare(&unit.name, &session, rows);
            for mismatch in &mismatches {
                info!(
                    "{}: {} controller={} reference={}",
                    unit.name,
                    mismatch.register_name,
                    mismatch
                        .controller_value
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "?".to_string()),
                    mismatch.reference_value
                );
            }
            info!("{}: {}", unit.name, describe_count(mismatches.len()));
            ScanOutcome::Connected { mismatches }
        };
        session.close();
        outcome
    }

    /// Scan `units` in order into a fresh report.
    ///
    /// When the cancel flag is raised the remaining units are abandoned and
    /// the partial report is returned with `cancelled` set.
    pub fn scan_many(&self, units: &[Unit], references: &ReferenceStore) -> ScanReport {
        let workers = self.options.max_parallel.clamp(1, units.len().max(1));
        let results = if workers == 1 {
            self.scan_sequential(units, references)
        } else {
            self.scan_parallel(units, references, workers)
        };

        let mut report = ScanReport::new(results);
        report.cancelled = report.results.len() < units.len();
        if report.cancelled {
            warn!(
                "Scan cancelled after {} of {} units",
                report.results.len(),
                units.len()
            );
        } else {
            info!("Scan of {} units complete", units.len());
        }
        report
    }

    /// Scan only the units whose names appear in `names`, in unit order.
    pub fn scan_selected(
        &self,
        units: &[Unit],
        names: &[String],
        references: &ReferenceStore,
    ) -> ScanReport {
        for name in names {
            if !units.iter().any(|unit| &unit.name == name) {
                warn!("No controller named {}", name);
            }
        }
        let selected: Vec<Unit> = units
            .iter()
            .filter(|unit| names.contains(&unit.name))
            .cloned()
            .collect();
        self.scan_many(&selected, references)
    }

    fn scan_sequential(&self, units: &[Unit], references: &ReferenceStore) -> Vec<UnitScanResult> {
        let mut results = Vec::with_capacity(units.len());
        for unit in units {
            if self.cancel.is_cancelled() {
                break;
            }
            results.push(self.scan_one(unit, references));
        }
        results
    }

    /// Bounded worker pool; every worker owns the session it creates.
    fn scan_parallel(
        &self,
        units: &[Unit],
        references: &ReferenceStore,
        workers: usize,
    ) -> Vec<UnitScanResult> {
        let (job_tx, job_rx) = mpsc::channel::<usize>();
        let job_rx = Mutex::new(job_rx);
        let (result_tx, result_rx) = mpsc::channel::<(usize, UnitScanResult)>();

        for index in 0..units.len() {
            // The receiver outlives this loop, sending cannot fail.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        debug!("Scanning {} units with {} workers", units.len(), workers);
        thread::scope(|scope| {
            for _ in 0..workers {
                let result_tx = result_tx.clone();
                let job_rx = &job_rx;
                scope.spawn(move || loop {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let next = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(index) = next else {
                        break;
                    };
                    let result = self.scan_one(&units[index], references);
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<UnitScanResult>> = vec![None; units.len()];
        for (index, result) in result_rx {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}
