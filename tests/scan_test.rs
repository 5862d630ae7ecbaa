// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scan orchestration against mocked transport sessions

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ctrl_check::compare::MismatchKind;
use ctrl_check::reference::{ReferenceRegister, ReferenceStore};
use ctrl_check::register::{BooleanPolicy, RegisterType, RegisterValue};
use ctrl_check::scan::{CancelFlag, ScanOptions, ScanOutcome, Scanner, Unit};
use ctrl_check::transport::{RegisterCatalog, TransportError, TransportSession};
use mockall::{mock, Sequence};

mock! {
    pub Session {}

    impl RegisterCatalog for Session {
        fn register_type(&self, name: &str) -> Option<RegisterType>;
        fn read_value(&self, name: &str) -> Option<RegisterValue>;
        fn describe(&self, name: &str) -> String;
    }

    impl TransportSession for Session {
        fn open(&mut self, address: &str, port: u16) -> Result<(), TransportError>;
        fn service(&mut self);
        fn has_error(&self) -> bool;
        fn close(&mut self);
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tank_controller() -> HashMap<&'static str, (RegisterType, RegisterValue)> {
    HashMap::from([
        ("setpoint", (RegisterType::Float, RegisterValue::Float(72.0))),
        ("pumpEnable", (RegisterType::Boolean, RegisterValue::Boolean(true))),
        ("mode", (RegisterType::Integer, RegisterValue::Integer(3))),
    ])
}

/// Answer catalog queries from the tank registers.
fn with_tank_catalog(session: &mut MockSession) {
    let registers = Arc::new(tank_controller());
    let types = Arc::clone(&registers);
    session
        .expect_register_type()
        .returning(move |name| types.get(name).map(|(t, _)| *t));
    session
        .expect_read_value()
        .returning(move |name| registers.get(name).map(|(_, v)| v.clone()));
    session
        .expect_describe()
        .returning(|name| format!("{} of tank", name));
}

/// A session that connects, reads the tank registers and expects one close.
fn healthy_session() -> MockSession {
    let mut session = MockSession::new();
    let mut seq = Sequence::new();

    session
        .expect_open()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    session
        .expect_service()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    session
        .expect_has_error()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(false);
    session
        .expect_close()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    with_tank_catalog(&mut session);
    session
}

/// A session whose connection attempt fails. Nothing else may be called.
fn unreachable_session() -> MockSession {
    let mut session = MockSession::new();
    session.expect_open().times(1).returning(|address, port| {
        Err(TransportError::Connect {
            address: address.to_string(),
            port,
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        })
    });
    session.expect_service().never();
    session.expect_close().never();
    session
}

fn references() -> ReferenceStore {
    let mut store = ReferenceStore::new();
    store.load(
        "tank.yaml",
        vec![
            ReferenceRegister::new("setpoint", "72.5"),
            ReferenceRegister::new("pumpEnable", "1"),
            ReferenceRegister::new("mode", "3"),
        ],
    );
    store
}

#[test]
fn test_connected_unit_reports_mismatches_in_reference_order() {
    init_logger();
    let scanner = Scanner::new(healthy_session, ScanOptions::default());
    let unit = Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml");

    let result = scanner.scan_one(&unit, &references());

    assert_eq!(result.unit, unit);
    let mismatches = result.outcome.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].register_name, "setpoint");
    assert_eq!(mismatches[0].controller_value, Some(RegisterValue::Float(72.0)));
    assert_eq!(mismatches[0].reference_value, RegisterValue::Float(72.5));
    assert_eq!(mismatches[0].description, "setpoint of tank");
    assert_eq!(mismatches[0].kind, MismatchKind::ValueDiffers);
}

#[test]
fn test_open_receives_unit_address() {
    init_logger();
    let factory = || {
        let mut session = MockSession::new();
        session
            .expect_open()
            .withf(|address, port| address.to_string() == "10.0.0.42" && *port == 1502)
            .times(1)
            .returning(|_, _| Ok(()));
        session.expect_service().times(1).return_const(());
        session.expect_has_error().times(1).return_const(false);
        session.expect_close().times(1).return_const(());
        session.expect_register_type().return_const(None::<RegisterType>);
        session.expect_read_value().return_const(None::<RegisterValue>);
        session.expect_describe().return_const(String::new());
        session
    };
    let scanner = Scanner::new(factory, ScanOptions::default());
    let unit = Unit::new("Tank 9", "10.0.0.42", 1502, "tank.yaml");

    let result = scanner.scan_one(&unit, &references());

    let mismatches = result.outcome.mismatches();
    assert_eq!(mismatches.len(), 3);
    assert!(mismatches
        .iter()
        .all(|m| m.kind == MismatchKind::Unresolved && m.controller_value.is_none()));
}

#[test]
fn test_communication_failure_does_not_stop_batch() {
    init_logger();
    let created = AtomicUsize::new(0);
    let factory = || {
        if created.fetch_add(1, Ordering::SeqCst) == 0 {
            unreachable_session()
        } else {
            healthy_session()
        }
    };
    let scanner = Scanner::new(factory, ScanOptions::default());
    let units = vec![
        Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"),
        Unit::new("Tank 2", "10.0.0.22", 502, "tank.yaml"),
    ];

    let report = scanner.scan_many(&units, &references());

    assert!(!report.cancelled);
    assert_eq!(report.results.len(), 2);
    assert!(matches!(
        report.results[0].outcome,
        ScanOutcome::CommunicationFailure { .. }
    ));
    assert!(report.results[1].outcome.is_connected());
    assert_eq!(report.total_mismatches(), 1);
    assert_eq!(report.failed_units(), vec![&units[0]]);
}

#[test]
fn test_refresh_error_closes_session() {
    init_logger();
    let factory = || {
        let mut session = MockSession::new();
        let mut seq = Sequence::new();
        session
            .expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        session
            .expect_service()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        session
            .expect_has_error()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        session
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        session.expect_read_value().never();
        session
    };
    let scanner = Scanner::new(factory, ScanOptions::default());
    let unit = Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml");

    let result = scanner.scan_one(&unit, &references());

    assert!(matches!(
        result.outcome,
        ScanOutcome::CommunicationFailure { .. }
    ));
}

#[test]
fn test_reference_problems_skip_transport() {
    init_logger();
    let factory = || -> MockSession { panic!("no session may be created") };
    let scanner = Scanner::new(factory, ScanOptions::default());
    let units = vec![
        Unit::new("Spare", "10.0.0.30", 502, ""),
        Unit::new("Pond", "10.0.0.31", 502, "pond.yaml"),
    ];

    let report = scanner.scan_many(&units, &references());

    assert_eq!(report.results[0].outcome, ScanOutcome::NoReferenceConfigured);
    assert_eq!(report.results[1].outcome, ScanOutcome::ReferenceNotLoaded);
    assert_eq!(report.failed_units().len(), 2);
    assert_eq!(report.total_mismatches(), 0);
}

#[test]
fn test_strict_booleans_report_invalid_reference() {
    init_logger();
    let scanner = Scanner::new(
        healthy_session,
        ScanOptions {
            boolean_policy: BooleanPolicy::Strict,
            ..ScanOptions::default()
        },
    );
    let mut store = ReferenceStore::new();
    store.load(
        "tank.yaml",
        vec![
            ReferenceRegister::new("pumpEnable", "yes"),
            ReferenceRegister::new("mode", "3"),
        ],
    );

    let result = scanner.scan_one(&Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"), &store);

    let mismatches = result.outcome.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].register_name, "pumpEnable");
    assert!(matches!(
        mismatches[0].kind,
        MismatchKind::InvalidReference { .. }
    ));
}

#[test]
fn test_scan_selected_keeps_unit_order() {
    init_logger();
    let scanner = Scanner::new(healthy_session, ScanOptions::default());
    let units = vec![
        Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"),
        Unit::new("Tank 2", "10.0.0.22", 502, "tank.yaml"),
        Unit::new("Tank 3", "10.0.0.23", 502, "tank.yaml"),
    ];
    let names = vec![
        "Tank 3".to_string(),
        "Ghost".to_string(),
        "Tank 1".to_string(),
    ];

    let report = scanner.scan_selected(&units, &names, &references());

    let scanned: Vec<&str> = report.results.iter().map(|r| r.unit.name.as_str()).collect();
    assert_eq!(scanned, ["Tank 1", "Tank 3"]);
}

#[test]
fn test_cancel_between_units() {
    init_logger();
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    let factory = move || {
        // Raised while the first unit is in flight; it still completes.
        trigger.cancel();
        healthy_session()
    };
    let scanner = Scanner::new(factory, ScanOptions::default()).with_cancel_flag(cancel);
    let units = vec![
        Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"),
        Unit::new("Tank 2", "10.0.0.22", 502, "tank.yaml"),
        Unit::new("Tank 3", "10.0.0.23", 502, "tank.yaml"),
    ];

    let report = scanner.scan_many(&units, &references());

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].unit.name, "Tank 1");
    assert!(report.results[0].outcome.is_connected());
}

#[test]
fn test_parallel_scan_preserves_order() {
    init_logger();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let factory = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move || {
            let mut session = MockSession::new();
            let (flight, top) = (Arc::clone(&in_flight), Arc::clone(&peak));
            session.expect_open().times(1).returning(move |_, port| {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                top.fetch_max(now, Ordering::SeqCst);
                // Later units answer faster than earlier ones.
                thread::sleep(Duration::from_millis(u64::from(60 - (port - 500) * 10)));
                Ok(())
            });
            session.expect_service().times(1).return_const(());
            session.expect_has_error().times(1).return_const(false);
            let flight = Arc::clone(&in_flight);
            session.expect_close().times(1).returning(move || {
                flight.fetch_sub(1, Ordering::SeqCst);
            });

            with_tank_catalog(&mut session);
            session
        }
    };

    let scanner = Scanner::new(
        factory,
        ScanOptions {
            max_parallel: 3,
            ..ScanOptions::default()
        },
    );
    let units: Vec<Unit> = (0..5)
        .map(|i| Unit::new(format!("Tank {}", i + 1), "10.0.0.21", 500 + i, "tank.yaml"))
        .collect();

    let report = scanner.scan_many(&units, &references());

    assert!(!report.cancelled);
    let scanned: Vec<&Unit> = report.results.iter().map(|r| &r.unit).collect();
    assert_eq!(scanned, units.iter().collect::<Vec<_>>());
    assert_eq!(report.total_mismatches(), 5);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[test]
fn test_parallel_cancel_keeps_input_order() {
    init_logger();
    let cancel = CancelFlag::new();
    let opened = Arc::new(AtomicUsize::new(0));

    let factory = {
        let trigger = cancel.clone();
        let opened = Arc::clone(&opened);
        move || {
            let count = opened.fetch_add(1, Ordering::SeqCst) + 1;
            if count == 1 {
                // The first unit finishes after the second one.
                thread::sleep(Duration::from_millis(50));
            }
            if count == 2 {
                trigger.cancel();
            }
            healthy_session()
        }
    };

    let scanner = Scanner::new(
        factory,
        ScanOptions {
            max_parallel: 2,
            ..ScanOptions::default()
        },
    )
    .with_cancel_flag(cancel);
    let units: Vec<Unit> = (0..6)
        .map(|i| Unit::new(format!("Tank {}", i + 1), "10.0.0.21", 502, "tank.yaml"))
        .collect();

    let report = scanner.scan_many(&units, &references());

    assert!(report.cancelled);
    // Units already handed to a worker finish; nothing new starts.
    assert!(report.results.len() >= 2, "{:?}", report.results);
    assert!(report.results.len() < units.len());
    assert_eq!(report.results.len(), opened.load(Ordering::SeqCst));

    let positions: Vec<usize> = report
        .results
        .iter()
        .map(|r| units.iter().position(|u| *u == r.unit).unwrap())
        .collect();
    assert!(
        positions.windows(2).all(|pair| pair[0] < pair[1]),
        "results out of input order: {:?}",
        positions
    );
    assert!(report.results.iter().all(|r| r.outcome.is_connected()));
}
