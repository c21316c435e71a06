//! Per-configuration buffer lifecycle.
//!
//! A [`BufferSet`] owns every device buffer one configuration uses: one
//! patterned source buffer per element kind, the destination buffer, its
//! readback mirror and an optional debug buffer pair. Buffers are released
//! when the set is dropped, on every exit path.

use gridsweep_primitives::{
    BufferDesc, BufferUsage, ComputeDevice, DeviceError, DeviceLimits, ElementKind, HostArray,
};

use crate::plan::RunPlan;

/// Role a buffer plays in a kernel's binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// Destination the kernel writes; read back after the warm-up pass.
    Output,
    /// Source buffer matching the run's element kind.
    Input,
    /// u32 scratch the kernel may fill with device facts.
    Debug,
}

const F32_PATTERN_MASK: u32 = (1 << 22) - 1;

/// Reproducible source contents for one run.
///
/// `u32[i] = i` and `f32[i] = (i & (2^22 - 1)) as f32`. The mask keeps the
/// float values exactly representable.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceData {
    u32_data: HostArray,
    f32_data: HostArray,
}

impl SourceData {
    pub fn patterned(len: usize) -> Self {
        let u: Vec<u32> = (0..len).map(|i| i as u32).collect();
        let f: Vec<f32> = u.iter().map(|&i| (i & F32_PATTERN_MASK) as f32).collect();
        Self {
            u32_data: HostArray::U32(u),
            f32_data: HostArray::F32(f),
        }
    }

    pub fn for_kind(&self, kind: ElementKind) -> &HostArray {
        match kind {
            ElementKind::U32 => &self.u32_data,
            ElementKind::F32 => &self.f32_data,
        }
    }
}

/// Result of [`BufferSet::allocate`].
pub enum Allocation<'d, D: ComputeDevice> {
    Ready(BufferSet<'d, D>),
    /// Some buffer would exceed the binding-size limit; nothing was
    /// allocated.
    Skipped(String),
}

/// Byte sizes a plan needs, by buffer.
fn requested_sizes(plan: &RunPlan, with_debug: bool) -> Vec<(&'static str, u64)> {
    let src = plan.memsrc_size * ElementKind::U32.size_bytes();
    let dst = plan.memdest_size * plan.datatype.size_bytes();
    let mut sizes = vec![
        ("memsrc-u32", src),
        ("memsrc-f32", src),
        ("memdest", dst),
        ("mappable", dst),
    ];
    if with_debug {
        sizes.push(("debug", dst));
        sizes.push(("debug-mappable", dst));
    }
    sizes
}

/// First buffer that would not fit in a storage binding, if any.
pub fn binding_violation(
    plan: &RunPlan,
    with_debug: bool,
    limits: &DeviceLimits,
) -> Option<String> {
    let max = limits.max_storage_buffer_binding_size;
    requested_sizes(plan, with_debug)
        .into_iter()
        .find(|(_, size)| *size > max)
        .map(|(label, size)| {
            format!("{label} needs {size} bytes, max storage binding is {max} bytes")
        })
}

pub struct BufferSet<'d, D: ComputeDevice> {
    device: &'d D,
    buffers: Vec<D::Buffer>,
    sources: Vec<(ElementKind, usize)>,
    output: usize,
    readback: usize,
    debug: Option<(usize, usize)>,
    source_data: SourceData,
}

impl<'d, D: ComputeDevice> BufferSet<'d, D> {
    /// Check binding limits, then allocate and populate every buffer `plan`
    /// needs. The check happens before any allocation.
    pub fn allocate(
        device: &'d D,
        plan: &RunPlan,
        with_debug: bool,
    ) -> Result<Allocation<'d, D>, DeviceError> {
        if let Some(reason) = binding_violation(plan, with_debug, device.limits()) {
            return Ok(Allocation::Skipped(reason));
        }

        let mut set = BufferSet {
            device,
            buffers: Vec::new(),
            sources: Vec::new(),
            output: 0,
            readback: 0,
            debug: None,
            source_data: SourceData::patterned(plan.memsrc_size as usize),
        };
        let mut sizes = requested_sizes(plan, with_debug).into_iter();
        let mut next = |set: &mut BufferSet<'d, D>, usage| -> Result<usize, DeviceError> {
            let (label, size) = sizes.next().unwrap_or(("unnamed", 0));
            let buffer = device.create_buffer(&BufferDesc { label, size, usage })?;
            set.buffers.push(buffer);
            Ok(set.buffers.len() - 1)
        };

        // Order matches requested_sizes.
        for kind in ElementKind::ALL {
            let idx = next(&mut set, BufferUsage::Storage)?;
            device.write_buffer(&set.buffers[idx], set.source_data.for_kind(kind).as_bytes());
            set.sources.push((kind, idx));
        }
        set.output = next(&mut set, BufferUsage::Storage)?;
        set.readback = next(&mut set, BufferUsage::Readback)?;
        if with_debug {
            let storage = next(&mut set, BufferUsage::Storage)?;
            let readback = next(&mut set, BufferUsage::Readback)?;
            set.debug = Some((storage, readback));
        }

        tracing::debug!(
            buffers = set.buffers.len(),
            memsrc = plan.memsrc_size,
            memdest = plan.memdest_size,
            "buffers allocated"
        );
        Ok(Allocation::Ready(set))
    }

    /// Source buffer holding `kind` elements.
    pub fn source(&self, kind: ElementKind) -> &D::Buffer {
        let idx = self
            .sources
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, idx)| *idx)
            .unwrap_or(self.sources[0].1);
        &self.buffers[idx]
    }

    pub fn source_data(&self) -> &SourceData {
        &self.source_data
    }

    pub fn output(&self) -> &D::Buffer {
        &self.buffers[self.output]
    }

    pub fn readback(&self) -> &D::Buffer {
        &self.buffers[self.readback]
    }

    pub fn debug_readback(&self) -> Option<&D::Buffer> {
        self.debug.map(|(_, rb)| &self.buffers[rb])
    }

    /// `(binding index, buffer)` pairs for `roles`, with the input role
    /// resolved to the source buffer for `kind`.
    pub fn bindings(&self, roles: &[BufferRole], kind: ElementKind) -> Vec<(u32, &D::Buffer)> {
        roles
            .iter()
            .enumerate()
            .filter_map(|(binding, role)| {
                let buffer = match role {
                    BufferRole::Output => self.output(),
                    BufferRole::Input => self.source(kind),
                    BufferRole::Debug => &self.buffers[self.debug?.0],
                };
                Some((binding as u32, buffer))
            })
            .collect()
    }

    /// Storage-to-mappable copies recorded after the warm-up dispatch.
    pub fn readback_copies(&self) -> Vec<(&D::Buffer, &D::Buffer)> {
        let mut copies = vec![(self.output(), self.readback())];
        if let Some((storage, readback)) = self.debug {
            copies.push((&self.buffers[storage], &self.buffers[readback]));
        }
        copies
    }
}

impl<D: ComputeDevice> Drop for BufferSet<'_, D> {
    fn drop(&mut self) {
        for buffer in &self.buffers {
            self.device.destroy_buffer(buffer);
        }
        tracing::trace!(count = self.buffers.len(), "buffers released");
    }
}
