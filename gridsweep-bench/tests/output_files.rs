//! Result writers over a real host-emulated sweep.

use gridsweep_bench::output::{csv, json};
use gridsweep_bench::params::keys;
use gridsweep_bench::results::{copy_bytes, MetricHooks};
use gridsweep_bench::suite::identity_reference;
use gridsweep_bench::{run_suite, BenchTest, ParameterSpace, RunOptions, SuiteReport};
use gridsweep_primitives::host::HostDevice;

fn sweep() -> SuiteReport {
    let device = HostDevice::new().with_dispatch_ns(100);
    let test = BenchTest::new("host", "copy", |_, _| "host kernel".to_string())
        .trials(2)
        .parameters(ParameterSpace::new().option(keys::MEMSRC_SIZE, [64u64, 128]))
        .reference(identity_reference)
        .metrics(MetricHooks {
            bytes_transferred: Some(copy_bytes),
            ..MetricHooks::default()
        });
    pollster::block_on(run_suite(&device, &[test], &RunOptions::default(), None)).unwrap()
}

#[test]
fn json_file_holds_records_and_device() {
    let report = sweep();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("results.json");
    json::write_json(path.to_str().unwrap(), &report, "quick").unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["profile"], "quick");
    assert_eq!(value["device"]["name"], "host emulator");
    let records = value["tests"][0]["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["time_source"], "device");
    assert_eq!(records[0]["validation_errors"], 0);
    // (64 + 64) f32 elements in 100 ns
    assert_eq!(records[0]["bandwidth"], 5.12);
}

#[test]
fn csv_file_has_one_row_per_record() {
    let report = sweep();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    csv::write_csv(path.to_str().unwrap(), &report).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("category,test,params"));
    assert!(lines[1].starts_with("host,copy,memsrc_size=64;"));
    assert!(lines[1].ends_with(",0"));
}
