//! Subgroup shuffle correctness regressions.
//!
//! Thread 0 stores the subgroup size in `debug[0]`; the references read it
//! back to know how lanes group. These run with zero trials, so only the
//! warm-up dispatch executes.

use gridsweep_primitives::{DeviceFeatures, HostArray};

use super::{datatype, workgroup_size};
use crate::buffers::BufferRole;
use crate::params::{keys, ParameterSet, ParameterSpace};
use crate::plot::{Axis, PlotSpec};
use crate::suite::{BenchTest, ReferenceInput};

const BINDINGS: &[BufferRole] = &[BufferRole::Output, BufferRole::Input, BufferRole::Debug];

fn kernel(params: &ParameterSet, op: &str) -> String {
    let wg = workgroup_size(params);
    let ty = datatype(params);
    format!(
        "@group(0) @binding(0)
var<storage, read_write> outputBuffer: array<{ty}>;

@group(0) @binding(1)
var<storage, read> inputBuffer: array<{ty}>;

@group(0) @binding(2)
var<storage, read_write> debugBuffer: array<u32>;

@compute @workgroup_size({wg}, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3u,
        @builtin(num_workgroups) nwg: vec3u,
        @builtin(subgroup_size) sgsz: u32) {{
    let gid = id.y * nwg.x * {wg}u + id.x;
    {op}
    if (gid == 0u) {{
        debugBuffer[0] = sgsz;
    }}
}}
"
    )
}

fn neighbor_kernel(params: &ParameterSet, _threads: u64) -> String {
    kernel(
        params,
        "outputBuffer[gid] = subgroupShuffle(inputBuffer[gid], (gid ^ 1u) & (sgsz - 1u));",
    )
}

fn rotate_kernel(params: &ParameterSet, _threads: u64) -> String {
    kernel(
        params,
        "outputBuffer[gid] = subgroupShuffle(inputBuffer[gid], (gid + 1u) & (sgsz - 1u));",
    )
}

/// Subgroup size the device reported, or 1 if nothing was written.
fn subgroup_size(input: &ReferenceInput<'_>) -> usize {
    input
        .debug
        .and_then(|d| d.first().copied())
        .filter(|&s| s > 0)
        .unwrap_or(1) as usize
}

fn gather(source: &HostArray, len: usize, index: impl Fn(usize) -> usize) -> HostArray {
    match source {
        HostArray::U32(v) => HostArray::U32((0..len).map(|i| v[index(i) % v.len()]).collect()),
        HostArray::F32(v) => HostArray::F32((0..len).map(|i| v[index(i) % v.len()]).collect()),
    }
}

fn neighbor_reference(input: &ReferenceInput<'_>) -> HostArray {
    gather(input.source, input.plan.memdest_size as usize, |i| i ^ 1)
}

fn rotate_reference(input: &ReferenceInput<'_>) -> HostArray {
    let sgsz = subgroup_size(input);
    gather(input.source, input.plan.memdest_size as usize, |i| {
        let base = i & !(sgsz - 1);
        base + ((i + 1) & (sgsz - 1))
    })
}

fn parameters() -> ParameterSpace {
    ParameterSpace::new()
        .pow2_option(keys::MEMSRC_SIZE, 8, 10)
        .pow2_option(keys::WORKGROUP_SIZE, 5, 8)
        .option(keys::DATATYPE, ["f32", "u32"])
}

fn plot() -> PlotSpec {
    PlotSpec::new(
        "Shuffle errors",
        Axis::new(keys::MEMSRC_SIZE, "Input length"),
        Axis::new("validation_errors", "Mismatched elements"),
    )
    .stroke(keys::WORKGROUP_SIZE)
    .facet(keys::DATATYPE)
}

fn subgroup_test(name: &'static str, kernel: crate::suite::KernelFactory) -> BenchTest {
    BenchTest::new("subgroups", name, kernel)
        .trials(0)
        .parameters(parameters())
        .bindings(BINDINGS)
        .plot(plot())
        .requires(DeviceFeatures {
            subgroups: true,
            ..DeviceFeatures::default()
        })
}

/// Swap with the neighbouring lane, even <-> odd.
pub fn shuffle_neighbor_test() -> BenchTest {
    subgroup_test("subgroup-shuffle-neighbor", neighbor_kernel)
        .description("subgroupShuffle with lane ^ 1")
        .reference(neighbor_reference)
}

/// Rotate by one lane within each subgroup.
pub fn shuffle_rotate_test() -> BenchTest {
    subgroup_test("subgroup-shuffle-rotate", rotate_kernel)
        .description("subgroupShuffle with lane + 1, wrapping in the subgroup")
        .reference(rotate_reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RunPlan;
    use gridsweep_primitives::{DispatchGeometry, ElementKind};

    fn plan(n: u64) -> RunPlan {
        RunPlan {
            params: ParameterSet::new(),
            datatype: ElementKind::U32,
            memsrc_size: n,
            memdest_size: n,
            workgroup_size: 32,
            workgroup_count: 1,
            geometry: DispatchGeometry::xy(1, 1),
            trials: 0,
        }
    }

    #[test]
    fn test_neighbor_reference_swaps_pairs() {
        let source = HostArray::U32((0..6).collect());
        let p = plan(6);
        let out = neighbor_reference(&ReferenceInput {
            source: &source,
            plan: &p,
            debug: None,
        });
        assert_eq!(out, HostArray::U32(vec![1, 0, 3, 2, 5, 4]));
    }

    #[test]
    fn test_rotate_reference_wraps_within_subgroup() {
        let source = HostArray::U32((0..8).collect());
        let p = plan(8);
        let debug = [4u32, 0, 0, 0, 0, 0, 0, 0];
        let out = rotate_reference(&ReferenceInput {
            source: &source,
            plan: &p,
            debug: Some(&debug),
        });
        assert_eq!(out, HostArray::U32(vec![1, 2, 3, 0, 5, 6, 7, 4]));
    }

    #[test]
    fn test_requires_subgroups() {
        let t = shuffle_rotate_test();
        assert!(t.required_features.subgroups);
        assert!(t.uses_debug());
        assert_eq!(t.trials, 0);
        assert_eq!(t.parameters.len(), 3 * 4 * 2);
    }

    #[test]
    fn test_kernel_writes_subgroup_size() {
        let p = ParameterSet::new()
            .with(keys::WORKGROUP_SIZE, 64u64)
            .with(keys::DATATYPE, "u32");
        let src = neighbor_kernel(&p, 256);
        assert!(src.contains("debugBuffer[0] = sgsz"));
        assert!(src.contains("array<u32>"));
        assert!(src.contains("(gid ^ 1u)"));
    }
}
