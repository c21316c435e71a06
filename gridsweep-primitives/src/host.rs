//! CPU emulation of [`ComputeDevice`].
//!
//! Buffers are byte vectors, a "kernel" is a closure run once per dispatch
//! over the bound buffers ordered by binding index, and submissions execute
//! synchronously. Counters let tests check teardown and whether anything was
//! launched at all.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::device::{
    BufferDesc, BufferUsage, ComputeDevice, DeviceError, DeviceFeatures, DeviceInfo,
    DeviceLimits, PassDesc,
};

/// Host kernel body: receives the bound buffers in binding-index order.
pub type HostKernelFn = Rc<dyn Fn(&mut [Vec<u8>])>;

/// Handle to an emulated buffer.
#[derive(Debug)]
pub struct HostBuffer {
    id: usize,
    size: u64,
    usage: BufferUsage,
}

impl HostBuffer {
    pub fn size(&self) -> u64 {
        self.size
    }
}

pub struct HostKernel {
    label: String,
    body: HostKernelFn,
}

impl std::fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKernel")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Accumulates emulated device time for one timed pass.
pub struct HostTimer {
    elapsed_ns: Rc<Cell<u64>>,
}

enum Op {
    Dispatch {
        body: HostKernelFn,
        buffers: Vec<usize>,
        count: u32,
        timer: Option<Rc<Cell<u64>>>,
    },
    Copy {
        src: usize,
        dst: usize,
    },
}

pub struct HostCommands {
    ops: Vec<Op>,
}

/// Snapshot of the emulator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub buffers_created: usize,
    pub buffers_live: usize,
    pub compilations: usize,
    pub dispatches: u64,
    pub submissions: usize,
}

/// Default kernel: copy binding 1 into binding 0.
pub fn identity_kernel() -> HostKernelFn {
    Rc::new(|buffers: &mut [Vec<u8>]| {
        if let [dst, src, ..] = buffers {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }
    })
}

pub struct HostDevice {
    info: DeviceInfo,
    kernels: HashMap<String, HostKernelFn>,
    default_kernel: HostKernelFn,
    dispatch_ns: Option<u64>,
    storage: RefCell<HashMap<usize, Vec<u8>>>,
    next_id: Cell<usize>,
    stats: Cell<HostStats>,
    lost: Cell<bool>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Emulator with baseline limits, no optional features and the identity
    /// kernel.
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "host emulator".to_string(),
                backend: "Host".to_string(),
                limits: DeviceLimits::default(),
                features: DeviceFeatures::default(),
            },
            kernels: HashMap::new(),
            default_kernel: identity_kernel(),
            dispatch_ns: None,
            storage: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            stats: Cell::new(HostStats::default()),
            lost: Cell::new(false),
        }
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.info.limits = limits;
        self
    }

    pub fn with_features(mut self, features: DeviceFeatures) -> Self {
        self.info.features = features;
        self
    }

    /// Kernel used for every compilation without a label-specific body.
    pub fn with_kernel(mut self, body: impl Fn(&mut [Vec<u8>]) + 'static) -> Self {
        self.default_kernel = Rc::new(body);
        self
    }

    /// Kernel used when compiling under `label`.
    pub fn with_kernel_for(
        mut self,
        label: &str,
        body: impl Fn(&mut [Vec<u8>]) + 'static,
    ) -> Self {
        self.kernels.insert(label.to_string(), Rc::new(body));
        self
    }

    /// Report `ns` device nanoseconds per timed dispatch. Also enables the
    /// timestamp feature.
    pub fn with_dispatch_ns(mut self, ns: u64) -> Self {
        self.dispatch_ns = Some(ns);
        self.info.features.timestamp_query = true;
        self
    }

    /// Simulate device loss: later compilations and readbacks fail with
    /// [`DeviceError::Lost`].
    pub fn lose(&self) {
        self.lost.set(true);
    }

    fn ensure_alive(&self) -> Result<(), DeviceError> {
        if self.lost.get() {
            return Err(DeviceError::Lost("host device lost".to_string()));
        }
        Ok(())
    }

    pub fn stats(&self) -> HostStats {
        self.stats.get()
    }

    /// Current contents of a buffer, if it is still live.
    pub fn contents(&self, buffer: &HostBuffer) -> Option<Vec<u8>> {
        self.storage.borrow().get(&buffer.id).cloned()
    }

    fn update(&self, f: impl FnOnce(&mut HostStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    fn run_dispatch(&self, body: &HostKernelFn, ids: &[usize]) {
        let mut storage = self.storage.borrow_mut();
        let mut bound: Vec<Vec<u8>> = ids
            .iter()
            .map(|id| storage.remove(id).unwrap_or_default())
            .collect();
        body(&mut bound);
        for (id, bytes) in ids.iter().zip(bound) {
            storage.insert(*id, bytes);
        }
    }

    fn run_copy(&self, src: usize, dst: usize) {
        let mut storage = self.storage.borrow_mut();
        let Some(data) = storage.get(&src).cloned() else {
            return;
        };
        if let Some(target) = storage.get_mut(&dst) {
            let n = target.len().min(data.len());
            target[..n].copy_from_slice(&data[..n]);
        }
    }
}

impl ComputeDevice for HostDevice {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;
    type Commands = HostCommands;
    type Timer = HostTimer;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<HostBuffer, DeviceError> {
        let max = self.info.limits.max_buffer_size;
        if desc.size > max {
            return Err(DeviceError::BufferTooLarge {
                label: desc.label.to_string(),
                size: desc.size,
                max,
            });
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.storage
            .borrow_mut()
            .insert(id, vec![0u8; desc.size as usize]);
        self.update(|s| {
            s.buffers_created += 1;
            s.buffers_live += 1;
        });
        Ok(HostBuffer {
            id,
            size: desc.size,
            usage: desc.usage,
        })
    }

    fn write_buffer(&self, buffer: &HostBuffer, data: &[u8]) {
        if let Some(bytes) = self.storage.borrow_mut().get_mut(&buffer.id) {
            let n = bytes.len().min(data.len());
            bytes[..n].copy_from_slice(&data[..n]);
        }
    }

    fn destroy_buffer(&self, buffer: &HostBuffer) {
        if self.storage.borrow_mut().remove(&buffer.id).is_some() {
            self.update(|s| s.buffers_live -= 1);
        }
    }

    async fn compile_kernel(&self, label: &str, source: &str) -> Result<HostKernel, DeviceError> {
        self.ensure_alive()?;
        if source.trim().is_empty() {
            return Err(DeviceError::ShaderCompilation {
                label: label.to_string(),
                message: "empty kernel source".to_string(),
            });
        }
        self.update(|s| s.compilations += 1);
        let body = self
            .kernels
            .get(label)
            .cloned()
            .unwrap_or_else(|| self.default_kernel.clone());
        Ok(HostKernel {
            label: label.to_string(),
            body,
        })
    }

    fn create_timer(&self) -> Option<HostTimer> {
        self.dispatch_ns.map(|_| HostTimer {
            elapsed_ns: Rc::new(Cell::new(0)),
        })
    }

    fn encode(&self, pass: &PassDesc<'_, Self>) -> HostCommands {
        let mut bindings: Vec<(u32, usize)> =
            pass.bindings.iter().map(|(i, b)| (*i, b.id)).collect();
        bindings.sort_by_key(|(i, _)| *i);

        let mut ops = vec![Op::Dispatch {
            body: pass.kernel.body.clone(),
            buffers: bindings.into_iter().map(|(_, id)| id).collect(),
            count: pass.dispatches,
            timer: pass.timer.map(|t| t.elapsed_ns.clone()),
        }];
        ops.extend(pass.copies.iter().map(|(src, dst)| Op::Copy {
            src: src.id,
            dst: dst.id,
        }));
        tracing::trace!(kernel = %pass.kernel.label, ops = ops.len(), "host pass encoded");
        HostCommands { ops }
    }

    fn submit(&self, commands: HostCommands) {
        self.update(|s| s.submissions += 1);
        for op in commands.ops {
            match op {
                Op::Dispatch {
                    body,
                    buffers,
                    count,
                    timer,
                } => {
                    for _ in 0..count {
                        self.run_dispatch(&body, &buffers);
                    }
                    self.update(|s| s.dispatches += count as u64);
                    if let (Some(cell), Some(ns)) = (timer, self.dispatch_ns) {
                        cell.set(cell.get() + ns * count as u64);
                    }
                }
                Op::Copy { src, dst } => self.run_copy(src, dst),
            }
        }
    }

    async fn work_done(&self) {}

    async fn read_buffer(&self, buffer: &HostBuffer) -> Result<Vec<u8>, DeviceError> {
        self.ensure_alive()?;
        if buffer.usage != BufferUsage::Readback {
            return Err(DeviceError::BufferMap(format!(
                "buffer {} is not mappable",
                buffer.id
            )));
        }
        self.contents(buffer)
            .ok_or_else(|| DeviceError::BufferMap(format!("buffer {} was destroyed", buffer.id)))
    }

    async fn resolve_timer(&self, timer: HostTimer) -> u64 {
        timer.elapsed_ns.get()
    }
}
