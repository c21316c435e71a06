//! Reconciliation of device and host timings into one per-trial duration.

use serde::{Deserialize, Serialize};

/// Which clock the canonical time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    Device,
    Host,
}

/// Raw batch timings for one timed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    /// Device timestamp interval over all trials; 0 when unsupported.
    pub device_ns: u64,
    /// Host wall-clock interval around submit and completion.
    pub host_ns: u64,
    pub trials: u32,
}

/// Per-trial timing attached to a result record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTiming {
    /// Canonical per-trial time.
    pub time_ns: f64,
    /// Host per-trial time.
    pub cpu_ns: f64,
    /// `cpu_ns - time_ns`. Diagnostic only; zero after a host fallback.
    pub cpugpu_delta: f64,
    pub source: TimeSource,
}

impl TimingSample {
    /// Normalize both clocks by the trial count (at least 1) and pick the
    /// canonical time. A zero device time falls back to the host time.
    pub fn reconcile(&self) -> ReconciledTiming {
        let divisor = self.trials.max(1) as f64;
        let device = self.device_ns as f64 / divisor;
        let cpu_ns = self.host_ns as f64 / divisor;
        let (time_ns, source) = if self.device_ns == 0 {
            (cpu_ns, TimeSource::Host)
        } else {
            (device, TimeSource::Device)
        };
        ReconciledTiming {
            time_ns,
            cpu_ns,
            cpugpu_delta: cpu_ns - time_ns,
            source,
        }
    }
}
