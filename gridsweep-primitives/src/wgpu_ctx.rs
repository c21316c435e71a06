//! wgpu device initialization and the [`ComputeDevice`] implementation
//! benchmarks run on.

use std::sync::{Arc, Mutex};

use crate::device::{
    BufferDesc, BufferUsage, ComputeDevice, DeviceError, DeviceFeatures, DeviceInfo,
    DeviceLimits, PassDesc,
};
use crate::timing::GpuTimer;

/// A compiled compute pipeline. Bind group 0 layout is derived from the
/// shader.
pub struct WgpuKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

/// Core GPU state: device, queue and the capabilities negotiated for them.
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    info: DeviceInfo,
    lost: Arc<Mutex<Option<String>>>,
}

impl WgpuContext {
    /// Blocking wrapper around [`WgpuContext::new_async`].
    pub fn new() -> Result<Self, DeviceError> {
        pollster::block_on(Self::new_async())
    }

    /// Pick a high-performance adapter and open a device on it.
    ///
    /// Timestamp queries and subgroups are requested only when the adapter
    /// offers them. The adapter's own limits are requested so large buffers
    /// and binding sizes are usable.
    pub async fn new_async() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(DeviceError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter_name = %adapter_info.name,
            backend = ?adapter_info.backend,
            "wgpu adapter selected"
        );

        let wanted = wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::SUBGROUP;
        let features = adapter.features() & wanted;
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gridsweep"),
                    required_features: features,
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| DeviceError::DeviceRequest(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            tracing::error!("uncaptured wgpu error: {err}");
        }));
        let lost = Arc::new(Mutex::new(None));
        let lost_slot = Arc::clone(&lost);
        device.set_device_lost_callback(
            move |reason: wgpu::DeviceLostReason, message: String| {
                tracing::error!(?reason, "wgpu device lost: {message}");
                if let Ok(mut slot) = lost_slot.lock() {
                    *slot = Some(message);
                }
            },
        );

        let info = DeviceInfo {
            name: adapter_info.name.clone(),
            backend: format!("{:?}", adapter_info.backend),
            limits: DeviceLimits {
                max_buffer_size: limits.max_buffer_size,
                max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
                max_compute_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
                max_compute_invocations_per_workgroup: limits
                    .max_compute_invocations_per_workgroup,
            },
            features: DeviceFeatures {
                timestamp_query: features.contains(wgpu::Features::TIMESTAMP_QUERY),
                subgroups: features.contains(wgpu::Features::SUBGROUP),
            },
        };
        tracing::debug!(?info.limits, ?info.features, "device opened");

        Ok(Self {
            device,
            queue,
            info,
            lost,
        })
    }

    fn ensure_alive(&self) -> Result<(), DeviceError> {
        match self.lost.lock().ok().and_then(|slot| slot.clone()) {
            Some(message) => Err(DeviceError::Lost(message)),
            None => Ok(()),
        }
    }
}

impl ComputeDevice for WgpuContext {
    type Buffer = wgpu::Buffer;
    type Kernel = WgpuKernel;
    type Commands = wgpu::CommandBuffer;
    type Timer = GpuTimer;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<wgpu::Buffer, DeviceError> {
        let max = self.info.limits.max_buffer_size;
        if desc.size > max {
            return Err(DeviceError::BufferTooLarge {
                label: desc.label.to_string(),
                size: desc.size,
                max,
            });
        }
        let usage = match desc.usage {
            BufferUsage::Storage => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
            BufferUsage::Readback => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        };
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage,
            mapped_at_creation: false,
        }))
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, data: &[u8]) {
        self.queue.write_buffer(buffer, 0, data);
    }

    fn destroy_buffer(&self, buffer: &wgpu::Buffer) {
        buffer.destroy();
    }

    async fn compile_kernel(&self, label: &str, source: &str) -> Result<WgpuKernel, DeviceError> {
        self.ensure_alive()?;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &module,
                entry_point: None,
                compilation_options: Default::default(),
                cache: None,
            });
        if let Some(err) = self.device.pop_error_scope().await {
            return Err(DeviceError::ShaderCompilation {
                label: label.to_string(),
                message: err.to_string(),
            });
        }
        let layout = pipeline.get_bind_group_layout(0);
        tracing::debug!(kernel = label, "pipeline compiled");
        Ok(WgpuKernel { pipeline, layout })
    }

    fn create_timer(&self) -> Option<GpuTimer> {
        GpuTimer::new(&self.device, &self.queue)
    }

    fn encode(&self, pass: &PassDesc<'_, Self>) -> wgpu::CommandBuffer {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = pass
            .bindings
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass.label),
            layout: &pass.kernel.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pass.label),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(pass.label),
                timestamp_writes: pass.timer.map(GpuTimer::pass_writes),
            });
            cpass.set_pipeline(&pass.kernel.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let g = pass.geometry;
            for _ in 0..pass.dispatches {
                cpass.dispatch_workgroups(g.x, g.y, g.z);
            }
        }
        if let Some(timer) = pass.timer {
            timer.encode_resolve(&mut encoder);
        }
        for (src, dst) in pass.copies {
            let size = src.size().min(dst.size());
            encoder.copy_buffer_to_buffer(src, 0, dst, 0, size);
        }
        encoder.finish()
    }

    fn submit(&self, commands: wgpu::CommandBuffer) {
        self.queue.submit(Some(commands));
    }

    async fn work_done(&self) {
        let (tx, rx) = futures::channel::oneshot::channel();
        self.queue.on_submitted_work_done(move || {
            let _ = tx.send(());
        });
        self.device.poll(wgpu::Maintain::Wait);
        let _ = rx.await;
    }

    async fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, DeviceError> {
        let slice = buffer.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        let mapped = rx.await;
        self.ensure_alive()?;
        mapped
            .map_err(|_| DeviceError::BufferMap("map callback dropped".into()))?
            .map_err(|e| DeviceError::BufferMap(e.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(bytes)
    }

    async fn resolve_timer(&self, timer: GpuTimer) -> u64 {
        timer.resolve(&self.device).await
    }
}
