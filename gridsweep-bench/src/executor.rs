//! Warm-up and timed execution of one configuration.
//!
//! Order is fixed: compile, bind, one untimed dispatch followed by the
//! readback copies, then a fresh pass of `trials` back-to-back dispatches
//! bracketed by the device timer and the host clock, then readback.

use gridsweep_primitives::{BenchTimer, ComputeDevice, HostArray, PassDesc};

use crate::buffers::BufferSet;
use crate::error::BenchError;
use crate::plan::RunPlan;
use crate::suite::BenchTest;

/// Host-side results of one configuration.
///
/// The device timer is returned unresolved so its readback can complete
/// after the buffers are gone.
pub struct Execution<T> {
    /// Destination contents after the warm-up dispatch.
    pub output: HostArray,
    pub debug: Option<Vec<u32>>,
    /// Host wall-clock nanoseconds around the timed submission.
    pub host_ns: u64,
    pub timer: Option<T>,
}

pub async fn execute<D: ComputeDevice>(
    device: &D,
    test: &BenchTest,
    plan: &RunPlan,
    buffers: &BufferSet<'_, D>,
) -> Result<Execution<D::Timer>, BenchError> {
    let source = (test.kernel)(&plan.params, plan.memsrc_size);
    let kernel = device.compile_kernel(test.name, &source).await?;

    let bindings = buffers.bindings(test.bindings, plan.datatype);
    let copies = buffers.readback_copies();

    // Warm-up: one dispatch, then stage output for readback.
    let warmup = device.encode(&PassDesc {
        label: test.name,
        kernel: &kernel,
        bindings: &bindings,
        geometry: plan.geometry,
        dispatches: 1,
        copies: &copies,
        timer: None,
    });
    device.submit(warmup);
    device.work_done().await;

    let timer = device.create_timer();
    let timed = device.encode(&PassDesc {
        label: test.name,
        kernel: &kernel,
        bindings: &bindings,
        geometry: plan.geometry,
        dispatches: plan.trials,
        copies: &[],
        timer: timer.as_ref(),
    });
    device.work_done().await;
    let clock = BenchTimer::start();
    device.submit(timed);
    device.work_done().await;
    let host_ns = clock.elapsed_ns();

    let bytes = device.read_buffer(buffers.readback()).await?;
    let expected_bytes = plan.memdest_size * plan.datatype.size_bytes();
    if bytes.len() as u64 != expected_bytes {
        return Err(BenchError::malformed(
            test.name,
            format!(
                "readback holds {} bytes but {} elements need {expected_bytes}",
                bytes.len(),
                plan.memdest_size
            ),
        ));
    }
    let output = HostArray::from_bytes(plan.datatype, &bytes).ok_or_else(|| {
        BenchError::malformed(test.name, "readback is not a whole number of elements")
    })?;

    let debug = match buffers.debug_readback() {
        Some(buffer) => {
            let bytes = device.read_buffer(buffer).await?;
            Some(bytemuck::pod_collect_to_vec::<u8, u32>(&bytes))
        }
        None => None,
    };

    Ok(Execution {
        output,
        debug,
        host_ns,
        timer,
    })
}
