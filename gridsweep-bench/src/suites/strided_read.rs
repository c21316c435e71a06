//! Strided reads: thread `i` reads `memsrc[(i * stride) & (n - 1)]`.
//!
//! The access pattern does not suit the default 1-D fold, so the dispatch is
//! laid out as a near-square 2-D grid.

use gridsweep_primitives::{DispatchGeometry, ElementKind, HostArray};

use super::{io_bindings, workgroup_size};
use crate::params::{keys, ParameterSet, ParameterSpace};
use crate::plot::{Axis, PlotSpec};
use crate::results::{copy_bytes, MetricHooks};
use crate::suite::{BenchTest, GeometryInput, GeometryStrategy, ReferenceInput};

pub const STRIDE: &str = "stride";

fn stride(params: &ParameterSet) -> u64 {
    params.get_u64(STRIDE).unwrap_or(1)
}

fn kernel(params: &ParameterSet, threads: u64) -> String {
    let wg = workgroup_size(params);
    let stride = stride(params);
    // memsrc sizes are powers of two, so the mask wraps reads in bounds.
    let mask = threads.saturating_sub(1);
    format!(
        "{bindings}
@compute @workgroup_size({wg}, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3u,
        @builtin(num_workgroups) nwg: vec3u) {{
    let i = id.y * nwg.x * {wg}u + id.x;
    if (i < arrayLength(&memdest)) {{
        memdest[i] = memsrc[(i * {stride}u) & {mask}u];
    }}
}}
",
        bindings = io_bindings("u32"),
    )
}

/// Near-square grid covering `workgroup_count` workgroups.
fn square_geometry(input: &GeometryInput<'_>) -> DispatchGeometry {
    let count = input.workgroup_count.max(1);
    let side = ((count as f64).sqrt().ceil() as u64).min(input.max_per_dimension as u64);
    let y = count.div_ceil(side);
    DispatchGeometry::xy(side as u32, u32::try_from(y).unwrap_or(u32::MAX))
}

fn reference(input: &ReferenceInput<'_>) -> HostArray {
    let src = input.source.as_u32().unwrap_or(&[]);
    let n = src.len() as u64;
    let mask = n.saturating_sub(1);
    let stride = stride(input.params());
    let out = (0..input.plan.memdest_size)
        .map(|i| src[(i.wrapping_mul(stride) & mask) as usize])
        .collect();
    HostArray::U32(out)
}

pub fn strided_read_test() -> BenchTest {
    BenchTest::new("memory", "strided-read", kernel)
        .description("Read the source with a power-of-two stride, write densely")
        .trials(10)
        .datatype(ElementKind::U32)
        .parameters(
            ParameterSpace::new()
                .pow2_option(keys::MEMSRC_SIZE, 20, 24)
                .pow2_option(STRIDE, 0, 5)
                .option(keys::WORKGROUP_SIZE, [256u64]),
        )
        .geometry(GeometryStrategy::Custom(square_geometry))
        .reference(reference)
        .metrics(MetricHooks {
            bytes_transferred: Some(copy_bytes),
            ..MetricHooks::default()
        })
        .plot(
            PlotSpec::new(
                "Strided read bandwidth",
                Axis::new(STRIDE, "Stride (elements)"),
                Axis::new("bandwidth", "Achieved bandwidth (GB/s)"),
            )
            .stroke(keys::MEMSRC_SIZE),
        )
}
