//! Fused multiply-add throughput.
//!
//! Each thread applies `fma(f, 1, 1)` then `fma(f, 1, -1)` to its element
//! `ops_per_thread / 2` times. Source values stay below 2^22, so both steps
//! are exact and the output equals the input.

use super::{io_bindings, workgroup_size};
use crate::params::{keys, ParameterSet, ParameterSpace};
use crate::plot::{Axis, PlotSpec};
use crate::results::{thread_per_source_element, MetricHooks, MetricInput};
use crate::suite::{identity_reference, BenchTest};

pub const OPS_PER_THREAD: &str = "ops_per_thread";

fn ops_per_thread(params: &ParameterSet) -> u64 {
    params.get_u64(OPS_PER_THREAD).unwrap_or(2)
}

fn kernel(params: &ParameterSet, _threads: u64) -> String {
    let wg = workgroup_size(params);
    let pairs = ops_per_thread(params) / 2;
    format!(
        "{bindings}
@compute @workgroup_size({wg}, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3u,
        @builtin(num_workgroups) nwg: vec3u) {{
    let i = id.y * nwg.x * {wg}u + id.x;
    if (i < arrayLength(&memdest)) {{
        var f = memsrc[i];
        for (var k = 0u; k < {pairs}u; k++) {{
            f = fma(f, 1.0, 1.0);
            f = fma(f, 1.0, -1.0);
        }}
        memdest[i] = f;
    }}
}}
",
        bindings = io_bindings("f32"),
    )
}

/// Two floating-point operations per fma.
fn flops_per_thread(m: &MetricInput<'_>) -> f64 {
    2.0 * (ops_per_thread(m.params) / 2 * 2) as f64
}

pub fn madd_test() -> BenchTest {
    BenchTest::new("compute", "madd", kernel)
        .description("Chains of exact fused multiply-adds per thread")
        .trials(10)
        .parameters(
            ParameterSpace::new()
                .pow2_option(keys::MEMSRC_SIZE, 20, 22)
                .option(OPS_PER_THREAD, [16u64, 64, 256])
                .option(keys::WORKGROUP_SIZE, [64u64, 256]),
        )
        .reference(identity_reference)
        .metrics(MetricHooks {
            thread_count: Some(thread_per_source_element),
            flops_per_thread: Some(flops_per_thread),
            ..MetricHooks::default()
        })
        .plot(
            PlotSpec::new(
                "FMA throughput",
                Axis::new(OPS_PER_THREAD, "FMAs per thread"),
                Axis::new("gflops", "GFLOPS"),
            )
            .stroke(keys::WORKGROUP_SIZE)
            .facet(keys::MEMSRC_SIZE),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RunPlan;
    use gridsweep_primitives::{DispatchGeometry, ElementKind};

    #[test]
    fn test_flops_count_two_per_fma() {
        let plan = RunPlan {
            params: ParameterSet::new().with(OPS_PER_THREAD, 64u64),
            datatype: ElementKind::F32,
            memsrc_size: 16,
            memdest_size: 16,
            workgroup_size: 16,
            workgroup_count: 1,
            geometry: DispatchGeometry::xy(1, 1),
            trials: 1,
        };
        assert_eq!(flops_per_thread(&MetricInput::from_plan(&plan)), 128.0);
    }

    #[test]
    fn test_exactness_of_host_emulation() {
        // The same chain on the host leaves every patterned value unchanged.
        for v in [0.0f32, 1.0, 4_194_303.0] {
            let mut f = v;
            for _ in 0..8 {
                f = f.mul_add(1.0, 1.0);
                f = f.mul_add(1.0, -1.0);
            }
            assert_eq!(f, v);
        }
    }

    #[test]
    fn test_kernel_loop_count() {
        let p = ParameterSet::new().with(OPS_PER_THREAD, 16u64);
        assert!(kernel(&p, 64).contains("k < 8u"));
    }
}
