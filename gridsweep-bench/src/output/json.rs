//! JSON output for benchmark results.
//!
//! Serializes the finalized suite report (records and plot series per test)
//! with a device header and timestamp.

use std::fs;
use std::path::Path;

use serde::Serialize;

use gridsweep_primitives::DeviceInfo;

use crate::error::BenchError;
use crate::harness::{SuiteReport, TestReport};

/// JSON output wrapper with device metadata.
#[derive(Serialize)]
struct JsonReport<'a> {
    device: &'a DeviceInfo,
    profile: &'a str,
    timestamp: String,
    tests: &'a [TestReport],
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), BenchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Render a suite report as pretty-printed JSON.
pub fn to_json(report: &SuiteReport, profile: &str) -> Result<String, BenchError> {
    let json = JsonReport {
        device: &report.device,
        profile,
        timestamp: chrono::Utc::now().to_rfc3339(),
        tests: &report.tests,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Write a suite report to a JSON file.
pub fn write_json(path: &str, report: &SuiteReport, profile: &str) -> Result<(), BenchError> {
    let json = to_json(report, profile)?;
    let path = Path::new(path);
    ensure_parent(path)?;
    fs::write(path, json)?;
    tracing::info!("JSON results written to: {}", path.display());
    Ok(())
}
