//! Result records, derived metrics and the per-test result join.

use futures::future::{join_all, LocalBoxFuture};
use serde::Serialize;

use crate::params::ParameterSet;
use crate::plan::RunPlan;
use crate::timing::{ReconciledTiming, TimeSource};

/// Sizes a metric formula can use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricInput<'a> {
    pub params: &'a ParameterSet,
    /// Source length in elements.
    pub memsrc_size: u64,
    /// Destination length in elements.
    pub memdest_size: u64,
    pub element_bytes: u64,
    pub workgroup_size: u32,
    pub workgroup_count: u64,
}

impl<'a> MetricInput<'a> {
    pub fn from_plan(plan: &'a RunPlan) -> Self {
        Self {
            params: &plan.params,
            memsrc_size: plan.memsrc_size,
            memdest_size: plan.memdest_size,
            element_bytes: plan.datatype.size_bytes(),
            workgroup_size: plan.workgroup_size,
            workgroup_count: plan.workgroup_count,
        }
    }
}

pub type MetricFn = fn(&MetricInput<'_>) -> f64;

/// Optional metric formulas a test declares.
///
/// Bandwidth is derived whenever `bytes_transferred` is present; GFLOPS
/// whenever both `thread_count` and `flops_per_thread` are.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricHooks {
    pub bytes_transferred: Option<MetricFn>,
    pub thread_count: Option<MetricFn>,
    pub flops_per_thread: Option<MetricFn>,
}

/// Bytes read from the source plus bytes written to the destination.
pub fn copy_bytes(m: &MetricInput<'_>) -> f64 {
    ((m.memsrc_size + m.memdest_size) * m.element_bytes) as f64
}

/// One thread per source element.
pub fn thread_per_source_element(m: &MetricInput<'_>) -> f64 {
    m.memsrc_size as f64
}

/// One finished configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub category: String,
    pub test: String,
    pub params: ParameterSet,
    pub memsrc_size: u64,
    pub memdest_size: u64,
    pub workgroup_size: u32,
    pub workgroup_count: u64,
    /// Canonical per-trial time in nanoseconds.
    pub time_ns: f64,
    pub cpu_ns: f64,
    pub cpugpu_delta: f64,
    pub time_source: TimeSource,
    pub validation_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_transferred: Option<f64>,
    /// Bytes per device nanosecond, i.e. GB/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_cpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flops_per_thread: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gflops: Option<f64>,
}

fn per_ns(amount: f64, ns: f64) -> Option<f64> {
    (ns > 0.0).then(|| amount / ns)
}

impl ResultRecord {
    /// Build a record and apply whichever metric formulas `hooks` declares.
    pub fn build(
        category: &str,
        test: &str,
        plan: &RunPlan,
        timing: ReconciledTiming,
        validation_errors: Option<usize>,
        hooks: &MetricHooks,
    ) -> Self {
        let input = MetricInput::from_plan(plan);
        let bytes_transferred = hooks.bytes_transferred.map(|f| f(&input));
        let thread_count = hooks.thread_count.map(|f| f(&input));
        let flops_per_thread = hooks.flops_per_thread.map(|f| f(&input));
        let gflops = match (thread_count, flops_per_thread) {
            (Some(t), Some(f)) => per_ns(t * f, timing.time_ns),
            _ => None,
        };

        Self {
            category: category.to_string(),
            test: test.to_string(),
            params: plan.params.clone(),
            memsrc_size: plan.memsrc_size,
            memdest_size: plan.memdest_size,
            workgroup_size: plan.workgroup_size,
            workgroup_count: plan.workgroup_count,
            time_ns: timing.time_ns,
            cpu_ns: timing.cpu_ns,
            cpugpu_delta: timing.cpugpu_delta,
            time_source: timing.source,
            validation_errors,
            bytes_transferred,
            bandwidth: bytes_transferred.and_then(|b| per_ns(b, timing.time_ns)),
            bandwidth_cpu: bytes_transferred.and_then(|b| per_ns(b, timing.cpu_ns)),
            thread_count,
            flops_per_thread,
            gflops,
        }
    }

    /// Numeric value of a record field or parameter by name.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        match field {
            "memsrc_size" => Some(self.memsrc_size as f64),
            "memdest_size" => Some(self.memdest_size as f64),
            "workgroup_size" => Some(self.workgroup_size as f64),
            "workgroup_count" => Some(self.workgroup_count as f64),
            "time_ns" | "time" => Some(self.time_ns),
            "cpu_ns" | "cpuns" => Some(self.cpu_ns),
            "cpugpu_delta" => Some(self.cpugpu_delta),
            "validation_errors" => self.validation_errors.map(|e| e as f64),
            "bytes_transferred" => self.bytes_transferred,
            "bandwidth" => self.bandwidth,
            "bandwidth_cpu" => self.bandwidth_cpu,
            "thread_count" => self.thread_count,
            "flops_per_thread" => self.flops_per_thread,
            "gflops" => self.gflops,
            other => self.params.get(other).and_then(|v| v.as_f64()),
        }
    }

    /// Display value of a record field or parameter by name.
    pub fn label(&self, field: &str) -> Option<String> {
        match field {
            "category" => Some(self.category.clone()),
            "test" | "testname" => Some(self.test.clone()),
            other => self
                .params
                .get(other)
                .map(|v| v.to_string())
                .or_else(|| self.numeric(other).map(|v| v.to_string())),
        }
    }
}

/// Pending record futures for one test, joined before the records are read.
pub struct ResultCollector<'a> {
    pending: Vec<LocalBoxFuture<'a, ResultRecord>>,
}

impl Default for ResultCollector<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ResultCollector<'a> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, record: LocalBoxFuture<'a, ResultRecord>) {
        self.pending.push(record);
    }

    /// Wait for every pending record. Records come back in push order.
    pub async fn join(self) -> Vec<ResultRecord> {
        join_all(self.pending).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::keys;
    use futures::FutureExt;
    use gridsweep_primitives::{DispatchGeometry, ElementKind};

    fn plan() -> RunPlan {
        RunPlan {
            params: ParameterSet::new().with(keys::MEMSRC_SIZE, 1000u64),
            datatype: ElementKind::F32,
            memsrc_size: 1000,
            memdest_size: 1000,
            workgroup_size: 64,
            workgroup_count: 16,
            geometry: DispatchGeometry::xy(16, 1),
            trials: 10,
        }
    }

    fn timing(time_ns: f64, cpu_ns: f64) -> ReconciledTiming {
        ReconciledTiming {
            time_ns,
            cpu_ns,
            cpugpu_delta: cpu_ns - time_ns,
            source: TimeSource::Device,
        }
    }

    #[test]
    fn test_no_hooks_no_metrics() {
        let r = ResultRecord::build("c", "t", &plan(), timing(10.0, 12.0), Some(0), &MetricHooks::default());
        assert!(r.bandwidth.is_none());
        assert!(r.gflops.is_none());
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("bandwidth").is_none());
        assert_eq!(json["params"]["memsrc_size"], 1000);
    }

    #[test]
    fn test_bandwidth_from_both_clocks() {
        let hooks = MetricHooks {
            bytes_transferred: Some(copy_bytes),
            ..MetricHooks::default()
        };
        let r = ResultRecord::build("c", "t", &plan(), timing(800.0, 1600.0), None, &hooks);
        assert_eq!(r.bytes_transferred, Some(8000.0));
        assert_eq!(r.bandwidth, Some(10.0));
        assert_eq!(r.bandwidth_cpu, Some(5.0));
    }

    #[test]
    fn test_gflops_needs_both_hooks() {
        let only_threads = MetricHooks {
            thread_count: Some(thread_per_source_element),
            ..MetricHooks::default()
        };
        let r = ResultRecord::build("c", "t", &plan(), timing(100.0, 100.0), None, &only_threads);
        assert!(r.gflops.is_none());

        let both = MetricHooks {
            thread_count: Some(thread_per_source_element),
            flops_per_thread: Some(|_| 4.0),
            ..MetricHooks::default()
        };
        let r = ResultRecord::build("c", "t", &plan(), timing(100.0, 100.0), None, &both);
        assert_eq!(r.gflops, Some(40.0));
    }

    #[test]
    fn test_zero_time_yields_no_rate() {
        let hooks = MetricHooks {
            bytes_transferred: Some(copy_bytes),
            ..MetricHooks::default()
        };
        let r = ResultRecord::build("c", "t", &plan(), timing(0.0, 0.0), None, &hooks);
        assert!(r.bandwidth.is_none());
    }

    #[test]
    fn test_numeric_falls_back_to_params() {
        let r = ResultRecord::build("c", "t", &plan(), timing(1.0, 1.0), None, &MetricHooks::default());
        assert_eq!(r.numeric("time"), Some(1.0));
        assert_eq!(r.numeric(keys::MEMSRC_SIZE), Some(1000.0));
        assert_eq!(r.numeric("missing"), None);
        assert_eq!(r.label("test").as_deref(), Some("t"));
    }

    #[test]
    fn test_join_returns_in_push_order() {
        let mut collector = ResultCollector::new();
        let p = plan();
        for i in 0..3 {
            let p = p.clone();
            collector.push(
                async move {
                    ResultRecord::build("c", &format!("t{i}"), &p, timing(1.0, 1.0), None, &MetricHooks::default())
                }
                .boxed_local(),
            );
        }
        let records = pollster::block_on(collector.join());
        let names: Vec<_> = records.iter().map(|r| r.test.as_str()).collect();
        assert_eq!(names, vec!["t0", "t1", "t2"]);
    }
}
