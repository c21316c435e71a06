//! CSV output for benchmark results.
//!
//! One row per record with columns:
//! category,test,params,memsrc_size,workgroup_size,time_ns,cpu_ns,cpugpu_delta,
//! time_source,bandwidth,bandwidth_cpu,gflops,validation_errors
//!
//! `params` is `key=value` pairs joined by `;`.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::BenchError;
use crate::harness::SuiteReport;
use crate::output::json::ensure_parent;
use crate::results::ResultRecord;

const HEADER: &str = "category,test,params,memsrc_size,workgroup_size,time_ns,cpu_ns,cpugpu_delta,time_source,bandwidth,bandwidth_cpu,gflops,validation_errors";

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn row(r: &ResultRecord) -> String {
    let params: Vec<String> = r.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(
        "{},{},{},{},{},{:.2},{:.2},{:.2},{},{},{},{},{}",
        r.category,
        r.test,
        params.join(";"),
        r.memsrc_size,
        r.workgroup_size,
        r.time_ns,
        r.cpu_ns,
        r.cpugpu_delta,
        match r.time_source {
            crate::timing::TimeSource::Device => "device",
            crate::timing::TimeSource::Host => "host",
        },
        opt(r.bandwidth.map(|v| format!("{v:.3}"))),
        opt(r.bandwidth_cpu.map(|v| format!("{v:.3}"))),
        opt(r.gflops.map(|v| format!("{v:.3}"))),
        opt(r.validation_errors),
    )
}

/// Write every record of a suite report to `out`.
pub fn write_rows(out: &mut impl Write, report: &SuiteReport) -> Result<(), BenchError> {
    writeln!(out, "{HEADER}")?;
    for r in report.records() {
        writeln!(out, "{}", row(r))?;
    }
    Ok(())
}

/// Write a suite report to a CSV file.
pub fn write_csv(path: &str, report: &SuiteReport) -> Result<(), BenchError> {
    let path = Path::new(path);
    ensure_parent(path)?;
    let mut file = fs::File::create(path)?;
    write_rows(&mut file, report)?;
    tracing::info!("CSV results written to: {}", path.display());
    Ok(())
}
