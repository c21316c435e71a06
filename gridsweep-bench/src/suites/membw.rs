//! Copy bandwidth: every thread copies one element from source to
//! destination.

use super::{datatype, io_bindings, workgroup_size};
use crate::params::{keys, ParameterSet, ParameterSpace};
use crate::plot::{Axis, PlotSpec};
use crate::results::{copy_bytes, MetricHooks};
use crate::suite::{identity_reference, BenchTest};

fn kernel(params: &ParameterSet, _threads: u64) -> String {
    let wg = workgroup_size(params);
    format!(
        "{bindings}
@compute @workgroup_size({wg}, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3u,
        @builtin(num_workgroups) nwg: vec3u) {{
    let i = id.y * nwg.x * {wg}u + id.x;
    if (i < arrayLength(&memdest)) {{
        memdest[i] = memsrc[i];
    }}
}}
",
        bindings = io_bindings(datatype(params)),
    )
}

pub fn membw_test() -> BenchTest {
    BenchTest::new("membw", "membw", kernel)
        .description("Copy one element per thread, source to destination")
        .trials(10)
        .parameters(
            ParameterSpace::new()
                .pow2_option(keys::MEMSRC_SIZE, 16, 26)
                .option(keys::WORKGROUP_SIZE, [64u64, 128, 256]),
        )
        .reference(identity_reference)
        .metrics(MetricHooks {
            bytes_transferred: Some(copy_bytes),
            ..MetricHooks::default()
        })
        .plot(
            PlotSpec::new(
                "Memory bandwidth (copy)",
                Axis::new(keys::MEMSRC_SIZE, "Copied elements"),
                Axis::new("bandwidth", "Achieved bandwidth (GB/s)"),
            )
            .stroke(keys::WORKGROUP_SIZE)
            .caption("Lines are workgroup sizes"),
        )
        .plot(
            PlotSpec::new(
                "Host vs device timing (copy)",
                Axis::new(keys::MEMSRC_SIZE, "Copied elements"),
                Axis::new("cpugpu_delta", "Host minus device time (ns)"),
            )
            .stroke(keys::WORKGROUP_SIZE),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_shape() {
        let t = membw_test();
        assert_eq!(t.parameters.len(), 11 * 3);
        let first = t.parameters.iter().next().unwrap();
        assert_eq!(first.get_u64(keys::MEMSRC_SIZE), Some(1 << 16));
    }

    #[test]
    fn test_kernel_text() {
        let p = ParameterSet::new()
            .with(keys::WORKGROUP_SIZE, 128u64)
            .with(keys::DATATYPE, "f32");
        let src = kernel(&p, 1024);
        assert!(src.contains("array<f32>"));
        assert!(src.contains("id.y * nwg.x * 128u + id.x"));
    }
}
