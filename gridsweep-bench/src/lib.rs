//! Parameter-sweep benchmark engine for compute kernels.
//!
//! A [`suite::BenchTest`] declares a parameter space, a kernel factory and
//! optional reference, metric and plot capabilities. [`harness::run_suite`]
//! expands each space, plans dispatch geometry under the device limits,
//! allocates buffers, runs the warm-up and timed passes, validates the
//! output and joins the result records per test.

pub mod buffers;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod harness;
pub mod output;
pub mod params;
pub mod plan;
pub mod plot;
pub mod results;
pub mod suite;
pub mod suites;
pub mod timing;
pub mod validate;

pub use error::BenchError;
pub use harness::{plan_test, run_suite, run_test, Progress, RunOptions, SuiteReport, TestReport};
pub use params::{ParamValue, ParameterSet, ParameterSpace};
pub use plan::{Resolution, RunPlan};
pub use results::{ResultCollector, ResultRecord};
pub use suite::BenchTest;
