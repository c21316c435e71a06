//! Timing utilities for benchmark measurement.
//!
//! [`BenchTimer`] brackets host wall-clock time; [`GpuTimer`] records a pair
//! of device timestamps around one compute pass.

use std::time::Instant;

/// Simple wall-clock timer for benchmarking.
#[derive(Debug, Clone, Copy)]
pub struct BenchTimer {
    start: Instant,
}

impl BenchTimer {
    /// Start the timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in nanoseconds.
    pub fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

const QUERY_COUNT: u32 = 2;
const QUERY_BYTES: u64 = QUERY_COUNT as u64 * std::mem::size_of::<u64>() as u64;

/// Begin/end timestamp pair for one compute pass.
///
/// The pass writes query 0 at its beginning and query 1 at its end;
/// [`GpuTimer::encode_resolve`] must be recorded into the same command
/// encoder after the pass ends.
pub struct GpuTimer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    period_ns: f32,
}

impl GpuTimer {
    /// `None` when the device was not created with `TIMESTAMP_QUERY`.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Self> {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            return None;
        }
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("gridsweep-timer"),
            ty: wgpu::QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gridsweep-timer-resolve"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gridsweep-timer-readback"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Some(Self {
            query_set,
            resolve,
            readback,
            period_ns: queue.get_timestamp_period(),
        })
    }

    /// Timestamp writes to attach to the timed compute pass.
    pub fn pass_writes(&self) -> wgpu::ComputePassTimestampWrites<'_> {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    /// Resolve both queries and stage them for mapping.
    pub fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..QUERY_COUNT, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.readback, 0, QUERY_BYTES);
    }

    /// Map the staged timestamps and convert the interval to nanoseconds.
    ///
    /// Returns 0 when mapping fails or the end timestamp does not follow
    /// the start.
    pub async fn resolve(self, device: &wgpu::Device) -> u64 {
        let slice = self.readback.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        let ns = match rx.await {
            Ok(Ok(())) => {
                let ticks = {
                    let data = slice.get_mapped_range();
                    let stamps: Vec<u64> = bytemuck::pod_collect_to_vec(&data[..]);
                    stamps[1].saturating_sub(stamps[0])
                };
                self.readback.unmap();
                ticks_to_ns(ticks, self.period_ns)
            }
            Ok(Err(e)) => {
                tracing::warn!("timestamp readback failed: {e}");
                0
            }
            Err(_) => {
                tracing::warn!("timestamp readback callback dropped");
                0
            }
        };
        self.resolve.destroy();
        self.readback.destroy();
        ns
    }
}

fn ticks_to_ns(ticks: u64, period_ns: f32) -> u64 {
    (ticks as f64 * period_ns as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures_positive() {
        let timer = BenchTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_ns();
        assert!(elapsed >= 5_000_000, "Timer should measure at least ~10ms (got {elapsed}ns)");
    }

    #[test]
    fn test_ticks_to_ns_scales_by_period() {
        assert_eq!(ticks_to_ns(1000, 1.0), 1000);
        assert_eq!(ticks_to_ns(1000, 41.666_668), 41_667);
        assert_eq!(ticks_to_ns(0, 83.3), 0);
    }
}
