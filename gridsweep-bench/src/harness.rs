//! Suite driver: sweeps each test's parameter space through plan,
//! allocation, execution and validation, then joins the pending result
//! records before anything reads them.

use futures::FutureExt;

use gridsweep_primitives::{ComputeDevice, DeviceInfo, DeviceLimits};

use crate::buffers::{binding_violation, Allocation, BufferSet};
use crate::error::BenchError;
use crate::executor::execute;
use crate::params::ParameterSet;
use crate::plan::{Resolution, RunPlan};
use crate::plot::PlotSeries;
use crate::results::{ResultCollector, ResultRecord};
use crate::suite::{BenchTest, ReferenceInput};
use crate::timing::TimingSample;
use crate::validate::validate;

/// Run-wide overrides applied on top of each test's declarations.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub trials: Option<u32>,
    /// Configurations with a larger `memsrc_size` are skipped.
    pub max_size: Option<u64>,
}

/// Finalized results of one test.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TestReport {
    pub category: String,
    pub test: String,
    pub records: Vec<ResultRecord>,
    pub plots: Vec<PlotSeries>,
    pub skipped: usize,
    pub validation_errors: usize,
}

/// Finalized results of a suite run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SuiteReport {
    pub device: DeviceInfo,
    pub tests: Vec<TestReport>,
}

impl SuiteReport {
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.tests.iter().flat_map(|t| t.records.iter())
    }
}

/// Sweep events passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    /// A configuration passed planning and allocation and is about to run.
    Launch { test: &'a str, memsrc_size: u64 },
    /// Every record of a test has been joined.
    TestDone { test: &'a str, records: usize },
}

impl RunOptions {
    /// Trial count for `test`. Correctness-only tests declaring zero trials
    /// stay at zero whatever the override.
    pub fn trials_for(&self, test: &BenchTest) -> u32 {
        match (test.trials, self.trials) {
            (0, _) => 0,
            (_, Some(n)) => n,
            (declared, None) => declared,
        }
    }
}

fn report_progress(progress_cb: Option<&dyn Fn(Progress<'_>)>, event: Progress<'_>) {
    if let Some(cb) = progress_cb {
        cb(event);
    }
}

/// Run every configuration of `test`.
///
/// Configurations execute strictly one after another and each one's buffers
/// are released before the next allocates. Record construction waits on the
/// device timer and is joined once the sweep finishes.
pub async fn run_test<D: ComputeDevice>(
    device: &D,
    test: &BenchTest,
    options: &RunOptions,
    progress_cb: Option<&dyn Fn(Progress<'_>)>,
) -> Result<TestReport, BenchError> {
    let trials = options.trials_for(test);
    let mut collector = ResultCollector::new();
    let mut skipped = 0;
    let mut validation_errors = 0;

    for params in &test.parameters {
        let plan = match RunPlan::resolve(test, &params, trials, device.limits())? {
            Resolution::Ready(plan) => plan,
            Resolution::Skip(reason) => {
                tracing::warn!(test = test.name, %params, "skipped: {reason}");
                skipped += 1;
                continue;
            }
        };
        if options.max_size.is_some_and(|max| plan.memsrc_size > max) {
            tracing::debug!(test = test.name, %params, "over profile size cap");
            skipped += 1;
            continue;
        }

        let buffers = match BufferSet::allocate(device, &plan, test.uses_debug())? {
            Allocation::Ready(buffers) => buffers,
            Allocation::Skipped(reason) => {
                tracing::warn!(test = test.name, %params, "skipped: {reason}");
                skipped += 1;
                continue;
            }
        };

        report_progress(
            progress_cb,
            Progress::Launch {
                test: test.name,
                memsrc_size: plan.memsrc_size,
            },
        );
        tracing::info!(
            test = test.name,
            memsrc_size = plan.memsrc_size,
            memdest_size = plan.memdest_size,
            workgroup_size = plan.workgroup_size,
            workgroup_count = plan.workgroup_count,
            geometry = %plan.geometry,
            datatype = %plan.datatype,
            trials = plan.trials,
            "launching"
        );

        let run = execute(device, test, &plan, &buffers).await?;

        let errors = match test.reference {
            Some(reference) => {
                let input = ReferenceInput {
                    source: buffers.source_data().for_kind(plan.datatype),
                    plan: &plan,
                    debug: run.debug.as_deref(),
                };
                let report = validate(reference, &input, &run.output)
                    .map_err(|e| BenchError::malformed(test.name, e.to_string()))?;
                if report.is_ok() {
                    tracing::info!(test = test.name, checked = report.checked, "no errors");
                } else {
                    tracing::warn!(
                        test = test.name,
                        %params,
                        errors = report.error_count,
                        "validation mismatches\n{report}"
                    );
                }
                validation_errors += report.error_count;
                Some(report.error_count)
            }
            None => None,
        };
        drop(buffers);

        let host_ns = run.host_ns;
        let timer = run.timer;
        let category = test.category;
        let name = test.name;
        let hooks = test.metrics;
        collector.push(
            async move {
                let device_ns = match timer {
                    Some(timer) => device.resolve_timer(timer).await,
                    None => 0,
                };
                let timing = TimingSample {
                    device_ns,
                    host_ns,
                    trials: plan.trials,
                }
                .reconcile();
                ResultRecord::build(category, name, &plan, timing, errors, &hooks)
            }
            .boxed_local(),
        );
    }

    let records = collector.join().await;
    let plots = test
        .plots
        .iter()
        .map(|p| p.series(test.category, test.name, &records))
        .collect();
    report_progress(
        progress_cb,
        Progress::TestDone {
            test: test.name,
            records: records.len(),
        },
    );
    Ok(TestReport {
        category: test.category.to_string(),
        test: test.name.to_string(),
        records,
        plots,
        skipped,
        validation_errors,
    })
}

/// Run `tests` in order on `device`.
///
/// Tests needing missing device features are skipped. Compilation,
/// allocation, readback and configuration errors abort only their own test;
/// reports already gathered are kept. Losing the device ends the run.
pub async fn run_suite<D: ComputeDevice>(
    device: &D,
    tests: &[BenchTest],
    options: &RunOptions,
    progress_cb: Option<&dyn Fn(Progress<'_>)>,
) -> Result<SuiteReport, BenchError> {
    let mut reports = Vec::new();
    for test in tests {
        let missing = device.info().features.missing(test.required_features);
        if !missing.is_empty() {
            tracing::warn!(
                test = test.name,
                "skipping test, device lacks {}",
                missing.join(", ")
            );
            continue;
        }
        match run_test(device, test, options, progress_cb).await {
            Ok(report) => reports.push(report),
            Err(e) if !e.is_fatal() => {
                tracing::error!(test = test.name, "test aborted: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(SuiteReport {
        device: device.info().clone(),
        tests: reports,
    })
}

/// A configuration as it would be run, without touching the device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun {
    pub params: ParameterSet,
    pub resolution: Resolution,
}

/// Expand and plan every configuration of `test` against `limits`,
/// applying the same skip rules as [`run_test`].
pub fn plan_test(
    test: &BenchTest,
    options: &RunOptions,
    limits: &DeviceLimits,
) -> Result<Vec<PlannedRun>, BenchError> {
    let trials = options.trials_for(test);
    test.parameters
        .iter()
        .map(|params| {
            let resolution = match RunPlan::resolve(test, &params, trials, limits)? {
                Resolution::Ready(plan) => {
                    if options.max_size.is_some_and(|max| plan.memsrc_size > max) {
                        Resolution::Skip("over profile size cap".to_string())
                    } else if let Some(reason) =
                        binding_violation(&plan, test.uses_debug(), limits)
                    {
                        Resolution::Skip(reason)
                    } else {
                        Resolution::Ready(plan)
                    }
                }
                skip => skip,
            };
            Ok(PlannedRun { params, resolution })
        })
        .collect()
}

/// Format a size number for display (e.g., 1048576 -> "1M").
pub fn format_size(size: u64) -> String {
    const K: u64 = 1 << 10;
    const M: u64 = 1 << 20;
    if size >= M && size % M == 0 {
        format!("{}M", size / M)
    } else if size >= K && size % K == 0 {
        format!("{}K", size / K)
    } else {
        format!("{}", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_override_keeps_zero_trial_tests() {
        fn kernel(_: &ParameterSet, _: u64) -> String {
            String::new()
        }
        let options = RunOptions {
            trials: Some(2),
            max_size: None,
        };
        let timed = BenchTest::new("c", "timed", kernel).trials(50);
        let check = BenchTest::new("c", "check", kernel).trials(0);
        assert_eq!(options.trials_for(&timed), 2);
        assert_eq!(options.trials_for(&check), 0);
        assert_eq!(RunOptions::default().trials_for(&timed), 50);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1 << 20), "1M");
        assert_eq!(format_size(64 << 20), "64M");
        assert_eq!(format_size(256), "256");
        assert_eq!(format_size(4096), "4K");
        assert_eq!(format_size(1000), "1000");
    }
}
