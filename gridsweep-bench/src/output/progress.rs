//! Sweep progress on stderr via indicatif.
//!
//! The bar length is the number of selected configurations; tests skipped
//! for missing features or planning skips simply never advance it.

use indicatif::{ProgressBar, ProgressStyle};

use crate::harness::{format_size, Progress};
use crate::suite::BenchTest;

pub struct BenchProgress {
    bar: ProgressBar,
}

impl BenchProgress {
    /// Progress over every configuration of `tests`.
    pub fn new(tests: &[BenchTest]) -> Self {
        let total: usize = tests.iter().map(|t| t.parameters.len()).sum();
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{elapsed}] {pos}/{len} configs {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Callback for [`crate::harness::run_suite`].
    pub fn callback(&self) -> impl Fn(Progress<'_>) + '_ {
        move |event: Progress<'_>| match event {
            Progress::Launch { test, memsrc_size } => {
                self.bar.inc(1);
                self.bar
                    .set_message(format!("{test} @ {}", format_size(memsrc_size)));
            }
            Progress::TestDone { test, records } => {
                self.bar.println(format!("{test}: {records} records"));
            }
        }
    }
}
