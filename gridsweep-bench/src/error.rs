use gridsweep_primitives::{DeviceError, PlanError};

/// Error type for suite execution.
///
/// Only a missing or lost device is fatal to the whole run. Every other
/// error aborts the test it came from and the sweep moves on.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("dispatch planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("malformed configuration in '{test}': {reason}")]
    MalformedConfiguration { test: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub fn malformed(test: &str, reason: impl Into<String>) -> Self {
        BenchError::MalformedConfiguration {
            test: test.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error ends the whole run rather than one test.
    pub fn is_fatal(&self) -> bool {
        match self {
            BenchError::Device(e) => e.is_device_unusable(),
            BenchError::Plan(_) | BenchError::MalformedConfiguration { .. } => false,
            BenchError::Io(_) | BenchError::Json(_) => true,
        }
    }
}
