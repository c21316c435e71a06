//! Table output using comfy-table.
//!
//! One table per test with columns:
//! Parameters | Time | CPU | CPU-GPU | GB/s | GFLOPS | Errors

use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::harness::{PlannedRun, SuiteReport, TestReport};
use crate::plan::Resolution;
use crate::results::ResultRecord;

fn format_ns(ns: f64) -> String {
    if ns >= 1_000_000.0 {
        format!("{:.3} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.2} us", ns / 1_000.0)
    } else {
        format!("{:.0} ns", ns)
    }
}

fn optional(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn errors_cell(record: &ResultRecord) -> Cell {
    match record.validation_errors {
        None => Cell::new("-"),
        Some(0) => Cell::new("0").fg(Color::Green),
        Some(n) => Cell::new(n).fg(Color::Red),
    }
}

/// Build the table for one test's records.
pub fn test_table(report: &TestReport) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&[
            "Parameters",
            "Time",
            "CPU",
            "CPU-GPU",
            "GB/s",
            "GFLOPS",
            "Errors",
        ]));

    for r in &report.records {
        let time = format!(
            "{}{}",
            format_ns(r.time_ns),
            if r.time_source == crate::timing::TimeSource::Host { "*" } else { "" }
        );
        table.add_row(vec![
            Cell::new(r.params.to_string()),
            Cell::new(time).set_alignment(CellAlignment::Right),
            Cell::new(format_ns(r.cpu_ns)).set_alignment(CellAlignment::Right),
            Cell::new(format_ns(r.cpugpu_delta)).set_alignment(CellAlignment::Right),
            Cell::new(optional(r.bandwidth)).set_alignment(CellAlignment::Right),
            Cell::new(optional(r.gflops)).set_alignment(CellAlignment::Right),
            errors_cell(r).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Print every test of a suite report.
pub fn render_report(report: &SuiteReport) {
    if report.tests.is_empty() {
        println!("No results to display.");
        return;
    }
    println!("Device: {} ({})", report.device.name, report.device.backend);
    for test in &report.tests {
        println!(
            "\n=== {} / {} === ({} records, {} skipped)",
            test.category,
            test.test,
            test.records.len(),
            test.skipped
        );
        println!("{}", test_table(test));
    }
    println!("* host time; device timestamps unavailable");
}

/// Print the planned configurations of one test.
pub fn render_plan(test_name: &str, runs: &[PlannedRun]) {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Parameters", "Geometry", "Trials", "Status"]));
    for run in runs {
        let (geometry, trials, status) = match &run.resolution {
            Resolution::Ready(plan) => (
                plan.geometry.to_string(),
                plan.trials.to_string(),
                Cell::new("run").fg(Color::Green),
            ),
            Resolution::Skip(reason) => (
                "-".to_string(),
                "-".to_string(),
                Cell::new(format!("skip: {reason}")).fg(Color::Yellow),
            ),
        };
        table.add_row(vec![
            Cell::new(run.params.to_string()),
            Cell::new(geometry),
            Cell::new(trials).set_alignment(CellAlignment::Right),
            status,
        ]);
    }
    println!("\n=== {} ===", test_name);
    println!("{table}");
}
