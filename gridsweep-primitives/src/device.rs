//! Compute device abstraction consumed by the benchmark engine.
//!
//! The engine never selects adapters or negotiates features itself. It is
//! handed something implementing [`ComputeDevice`] together with the limits
//! that device reports, and drives buffers, kernels and submissions through
//! this narrow surface. [`crate::wgpu_ctx::WgpuContext`] is the real device;
//! the `host-device` feature adds a CPU emulation for tests.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchGeometry;

/// Device limits the engine plans against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLimits {
    pub max_buffer_size: u64,
    pub max_storage_buffer_binding_size: u64,
    pub max_compute_workgroups_per_dimension: u32,
    pub max_compute_invocations_per_workgroup: u32,
}

impl Default for DeviceLimits {
    /// WebGPU baseline limits.
    fn default() -> Self {
        Self {
            max_buffer_size: 256 << 20,
            max_storage_buffer_binding_size: 128 << 20,
            max_compute_workgroups_per_dimension: 65_535,
            max_compute_invocations_per_workgroup: 256,
        }
    }
}

/// Optional capabilities a benchmark may rely on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    /// Instrumented timestamps around compute passes.
    pub timestamp_query: bool,
    /// Subgroup builtins and shuffle operations in kernels.
    pub subgroups: bool,
}

impl DeviceFeatures {
    /// Names of features in `required` that are missing here.
    pub fn missing(&self, required: DeviceFeatures) -> Vec<&'static str> {
        let mut out = Vec::new();
        if required.timestamp_query && !self.timestamp_query {
            out.push("timestamp-query");
        }
        if required.subgroups && !self.subgroups {
            out.push("subgroups");
        }
        out
    }
}

/// Read-only description of the device a suite runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub backend: String,
    pub limits: DeviceLimits,
    pub features: DeviceFeatures,
}

/// What a buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Device-resident storage: bindable, writable from the host, copyable.
    Storage,
    /// Host-mappable target of copies from storage buffers.
    Readback,
}

/// Buffer allocation request.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

/// One compute pass: the kernel dispatched `dispatches` times with the same
/// bindings and geometry, followed by buffer-to-buffer copies.
///
/// When `timer` is set, the pass is bracketed by device timestamps.
pub struct PassDesc<'a, D: ComputeDevice + ?Sized> {
    pub label: &'a str,
    pub kernel: &'a D::Kernel,
    /// `(binding index, buffer)` pairs for bind group 0.
    pub bindings: &'a [(u32, &'a D::Buffer)],
    pub geometry: DispatchGeometry,
    pub dispatches: u32,
    /// `(source, destination)` full-buffer copies recorded after the pass.
    pub copies: &'a [(&'a D::Buffer, &'a D::Buffer)],
    pub timer: Option<&'a D::Timer>,
}

/// Error type for device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no compatible compute adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    DeviceRequest(String),
    #[error("device lost: {0}")]
    Lost(String),
    #[error("shader compilation failed for '{label}': {message}")]
    ShaderCompilation { label: String, message: String },
    #[error("failed to map buffer for reading: {0}")]
    BufferMap(String),
    #[error("buffer '{label}' of {size} bytes exceeds device maximum of {max} bytes")]
    BufferTooLarge { label: String, size: u64, max: u64 },
}

impl DeviceError {
    /// Whether the device is unusable for any further work.
    pub fn is_device_unusable(&self) -> bool {
        matches!(
            self,
            DeviceError::NoAdapter | DeviceError::DeviceRequest(_) | DeviceError::Lost(_)
        )
    }
}

/// Narrow interface over a compute device.
///
/// Every async method is a suspension point of the single-threaded driver;
/// none of them are required to be `Send`.
pub trait ComputeDevice {
    type Buffer;
    type Kernel;
    type Commands;
    type Timer;

    fn info(&self) -> &DeviceInfo;

    fn limits(&self) -> &DeviceLimits {
        &self.info().limits
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<Self::Buffer, DeviceError>;

    /// Upload `data` to the start of a storage buffer.
    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]);

    fn destroy_buffer(&self, buffer: &Self::Buffer);

    /// Compile kernel source into a dispatchable pipeline.
    fn compile_kernel(
        &self,
        label: &str,
        source: &str,
    ) -> impl Future<Output = Result<Self::Kernel, DeviceError>>;

    /// `None` when the device cannot timestamp compute passes.
    fn create_timer(&self) -> Option<Self::Timer>;

    fn encode(&self, pass: &PassDesc<'_, Self>) -> Self::Commands;

    fn submit(&self, commands: Self::Commands);

    /// Resolves once everything submitted so far has completed.
    fn work_done(&self) -> impl Future<Output = ()>;

    /// Map a readback buffer, copy its bytes out and unmap it.
    fn read_buffer(
        &self,
        buffer: &Self::Buffer,
    ) -> impl Future<Output = Result<Vec<u8>, DeviceError>>;

    /// Elapsed device nanoseconds recorded by `timer`, or 0 when no samples
    /// were produced.
    fn resolve_timer(&self, timer: Self::Timer) -> impl Future<Output = u64>;
}
