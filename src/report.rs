// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ctrl-check project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Report sinks
//!
//! A [`ReportSink`] consumes a finished [`ScanReport`]. [`TextReport`] renders
//! the human readable report, [`JsonReport`] serialises the report as is.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;

use crate::compare::Mismatch;
use crate::register::RegisterValue;
use crate::scan::{describe_count, ScanOutcome, ScanReport, UnitScanResult};

const TABLE_HEADER: &str = "  Register               Controller   Reference        Description";
const TABLE_RULE: &str =
    "  -------------------------------------------------------------------------------------------";

/// Consumer of finished scan reports.
pub trait ReportSink {
    fn emit(&mut self, report: &ScanReport) -> Result<()>;
}

/// Plain text report, one block per unit.
///
/// ```text
/// Controller Configuration Report
///   2025-06-01 10:42:17
///
/// Check config for Tank 1 against tank.yaml...
///   Register               Controller   Reference        Description
///   -------------------------------------------------------------------------------------------
///   setpoint                    72.00 ≠ 72.50            Temperature setpoint
///   1 difference found
/// ```
pub struct TextReport<W: Write> {
    out: W,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_unit(&mut self, result: &UnitScanResult) -> std::io::Result<()> {
        let unit = &result.unit;
        match &result.outcome {
            ScanOutcome::NoReferenceConfigured => {
                writeln!(self.out, "Controller {} has no reference file specified.", unit.name)
            }
            ScanOutcome::ReferenceNotLoaded => writeln!(
                self.out,
                "Reference {} not loaded for {}",
                unit.reference_set_name, unit.name
            ),
            ScanOutcome::CommunicationFailure { reason } => {
                writeln!(
                    self.out,
                    "Check config for {} against {}...",
                    unit.name, unit.reference_set_name
                )?;
                writeln!(
                    self.out,
                    "  Communications error with {} ({})",
                    unit.name, reason
                )?;
                writeln!(self.out)
            }
            ScanOutcome::Connected { mismatches } => {
                writeln!(
                    self.out,
                    "Check config for {} against {}...",
                    unit.name, unit.reference_set_name
                )?;
                if !mismatches.is_empty() {
                    writeln!(self.out, "{}", TABLE_HEADER)?;
                    writeln!(self.out, "{}", TABLE_RULE)?;
                    for mismatch in mismatches {
                        writeln!(self.out, "{}", format_row(mismatch))?;
                    }
                }
                writeln!(self.out, "  {}", describe_count(mismatches.len()))?;
                writeln!(self.out)
            }
        }
    }
}

impl<W: Write> ReportSink for TextReport<W> {
    fn emit(&mut self, report: &ScanReport) -> Result<()> {
        let local = report.timestamp.with_timezone(&Local);
        writeln!(self.out, "Controller Configuration Report")?;
        writeln!(self.out, "  {}", local.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(self.out)?;

        for result in &report.results {
            self.write_unit(result)
                .with_context(|| format!("Failed to write report for {}", result.unit.name))?;
        }

        if report.cancelled {
            writeln!(
                self.out,
                "Scan cancelled after {} units",
                report.results.len()
            )?;
        }
        self.out.flush().context("Failed to flush report")?;
        Ok(())
    }
}

/// One table row: name, controller value, reference value, description.
fn format_row(mismatch: &Mismatch) -> String {
    let controller = mismatch
        .controller_value
        .as_ref()
        .map(format_value)
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  {:<16} {:>16} ≠ {:<16} {}",
        mismatch.register_name,
        controller,
        format_value(&mismatch.reference_value),
        mismatch.description
    )
    .trim_end()
    .to_string()
}

fn format_value(value: &RegisterValue) -> String {
    match value {
        RegisterValue::Float(f) => format!("{:.2}", f),
        other => other.to_string(),
    }
}

/// JSON rendering of the whole report.
pub struct JsonReport<W: Write> {
    out: W,
    pretty: bool,
}

impl<W: Write> JsonReport<W> {
    pub fn new(out: W) -> Self {
        Self { out, pretty: true }
    }

    /// Single-line output, one report per line.
    pub fn compact(out: W) -> Self {
        Self { out, pretty: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonReport<W> {
    fn emit(&mut self, report: &ScanReport) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, report)
        } else {
            serde_json::to_writer(&mut self.out, report)
        }
        .context("Failed to serialize scan report")?;
        writeln!(self.out)?;
        self.out.flush().context("Failed to flush report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::MismatchKind;
    use crate::scan::Unit;

    fn mismatch(name: &str, controller: RegisterValue, reference: RegisterValue) -> Mismatch {
        Mismatch {
            register_name: name.to_string(),
            controller_value: Some(controller),
            reference_value: reference,
            description: format!("{} description", name),
            kind: MismatchKind::ValueDiffers,
        }
    }

    fn render(report: &ScanReport) -> String {
        let mut sink = TextReport::new(Vec::new());
        sink.emit(report).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_text_report_layout() {
        let report = ScanReport::new(vec![
            UnitScanResult {
                unit: Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"),
                outcome: ScanOutcome::Connected {
                    mismatches: vec![
                        mismatch("setpoint", RegisterValue::Float(72.0), RegisterValue::Float(72.5)),
                        mismatch("pumpEnable", RegisterValue::Boolean(false), RegisterValue::Boolean(true)),
                    ],
                },
            },
            UnitScanResult {
                unit: Unit::new("Tank 2", "10.0.0.22", 502, "tank.yaml"),
                outcome: ScanOutcome::Connected { mismatches: vec![] },
            },
            UnitScanResult {
                unit: Unit::new("Tank 3", "10.0.0.23", 502, ""),
                outcome: ScanOutcome::NoReferenceConfigured,
            },
        ]);

        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Controller Configuration Report");
        assert_eq!(lines[3], "Check config for Tank 1 against tank.yaml...");
        assert_eq!(lines[4], TABLE_HEADER);
        assert_eq!(lines[5], TABLE_RULE);
        assert_eq!(
            lines[6],
            "  setpoint                    72.00 ≠ 72.50            setpoint description"
        );
        assert_eq!(
            lines[7],
            "  pumpEnable                    Off ≠ On               pumpEnable description"
        );
        assert_eq!(lines[8], "  2 differences found");
        assert!(text.contains("Check config for Tank 2 against tank.yaml...\n  No differences found\n"));
        assert!(text.contains("Controller Tank 3 has no reference file specified."));
        assert_eq!(text.matches(TABLE_HEADER).count(), 1);
    }

    #[test]
    fn test_text_report_failures() {
        let mut report = ScanReport::new(vec![
            UnitScanResult {
                unit: Unit::new("Tank 4", "10.0.0.24", 502, "tank.yaml"),
                outcome: ScanOutcome::CommunicationFailure {
                    reason: "connection refused".to_string(),
                },
            },
            UnitScanResult {
                unit: Unit::new("Tank 5", "10.0.0.25", 502, "missing.yaml"),
                outcome: ScanOutcome::ReferenceNotLoaded,
            },
        ]);
        report.cancelled = true;

        let text = render(&report);
        assert!(text.contains("  Communications error with Tank 4 (connection refused)"));
        assert!(text.contains("Reference missing.yaml not loaded for Tank 5"));
        assert!(text.ends_with("Scan cancelled after 2 units\n"));
        assert!(!text.contains("No differences found"));
    }

    #[test]
    fn test_unresolved_register_row() {
        let row = format_row(&Mismatch {
            register_name: "ghost".to_string(),
            controller_value: None,
            reference_value: RegisterValue::Text("5".to_string()),
            description: "Register ghost is not known to the controller".to_string(),
            kind: MismatchKind::Unresolved,
        });
        assert!(row.starts_with("  ghost"));
        assert!(row.contains("? ≠ 5"));
    }

    #[test]
    fn test_json_report() {
        let report = ScanReport::new(vec![UnitScanResult {
            unit: Unit::new("Tank 1", "10.0.0.21", 502, "tank.yaml"),
            outcome: ScanOutcome::Connected {
                mismatches: vec![mismatch(
                    "flowRate",
                    RegisterValue::Integer(12),
                    RegisterValue::Integer(15),
                )],
            },
        }]);

        let mut sink = JsonReport::compact(Vec::new());
        sink.emit(&report).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();

        assert_eq!(json["cancelled"], false);
        assert_eq!(json["results"][0]["unit"]["name"], "Tank 1");
        assert_eq!(json["results"][0]["outcome"]["status"], "connected");
        assert_eq!(
            json["results"][0]["outcome"]["mismatches"][0]["register_name"],
            "flowRate"
        );

        let back: ScanReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
