//! Subgroup builtins and reductions.
//!
//! The sweep is over workgroup count and size with one thread per source
//! element. Thread 0 stores the subgroup size in `debug[0]` so the
//! references know how lanes are grouped. Lanes are assumed to be assigned
//! in local-invocation order, `local_index / sgsz` picking the subgroup.

use gridsweep_primitives::{DeviceFeatures, ElementKind, HostArray};

use super::workgroup_size;
use crate::buffers::BufferRole;
use crate::params::{keys, ParameterSet, ParameterSpace};
use crate::plot::{Axis, PlotSpec};
use crate::results::{copy_bytes, thread_per_source_element, MetricHooks};
use crate::suite::{BenchTest, ReferenceInput, SizingHooks};

const BINDINGS: &[BufferRole] = &[BufferRole::Output, BufferRole::Input, BufferRole::Debug];

fn memsrc_size(params: &ParameterSet) -> u64 {
    params.get_u64(keys::WORKGROUP_COUNT).unwrap_or(1) * workgroup_size(params)
}

fn kernel(params: &ParameterSet, ty: &str, prelude: &str, body: &str) -> String {
    let wg = workgroup_size(params);
    format!(
        "@group(0) @binding(0)
var<storage, read_write> memdest: array<{ty}>;

@group(0) @binding(1)
var<storage, read> memsrc: array<{ty}>;

@group(0) @binding(2)
var<storage, read_write> debugBuffer: array<u32>;
{prelude}
@compute @workgroup_size({wg}, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3u,
        @builtin(local_invocation_id) lid: vec3u,
        @builtin(num_workgroups) nwg: vec3u,
        @builtin(subgroup_size) sgsz: u32,
        @builtin(subgroup_invocation_id) sgid: u32) {{
    let i = id.y * nwg.x * {wg}u + id.x;
    {body}
    if (i == 0u) {{
        debugBuffer[0] = sgsz;
    }}
}}
"
    )
}

fn id_kernel(params: &ParameterSet, _threads: u64) -> String {
    kernel(
        params,
        "u32",
        "",
        "if (i < arrayLength(&memsrc)) {
        memdest[i] = (sgsz << 16u) | sgid;
    }",
    )
}

fn subgroup_sum_kernel(params: &ParameterSet, _threads: u64) -> String {
    kernel(params, "f32", "", "memdest[i] = subgroupAdd(memsrc[i]);")
}

/// Lanes of the first subgroup fold in the rest of the workgroup, then that
/// subgroup's total is broadcast to every thread.
fn workgroup_sum_kernel(params: &ParameterSet, _threads: u64) -> String {
    let wg = workgroup_size(params);
    kernel(
        params,
        "f32",
        &format!("\nvar<workgroup> temp: array<f32, {wg}>;\n"),
        &format!(
            "var sum = memsrc[i];
    temp[lid.x] = sum;
    workgroupBarrier();
    if (lid.x < sgsz) {{
        for (var j = lid.x + sgsz; j < {wg}u; j += sgsz) {{
            sum += temp[j];
        }}
    }}
    temp[lid.x] = subgroupAdd(sum);
    workgroupBarrier();
    memdest[i] = temp[0];"
        ),
    )
}

/// Subgroup size the device reported, or 1 if nothing was written.
fn reported_subgroup_size(input: &ReferenceInput<'_>) -> usize {
    input
        .debug
        .and_then(|d| d.first().copied())
        .filter(|&s| s > 0)
        .unwrap_or(1) as usize
}

fn id_reference(input: &ReferenceInput<'_>) -> HostArray {
    let sgsz = reported_subgroup_size(input);
    let wg = input.plan.workgroup_size as usize;
    let n = input.plan.memdest_size as usize;
    HostArray::U32(
        (0..n)
            .map(|i| ((sgsz as u32) << 16) | ((i % wg) % sgsz) as u32)
            .collect(),
    )
}

/// Sum of `source` over consecutive groups of `group` elements, broadcast
/// back to each member. Source values are small integers, so the f32 sums
/// are exact in any order.
fn group_sums(input: &ReferenceInput<'_>, group: usize) -> HostArray {
    let n = input.plan.memdest_size as usize;
    let src = match input.source {
        HostArray::F32(v) => v.clone(),
        HostArray::U32(v) => v.iter().map(|&x| x as f32).collect(),
    };
    let group = group.max(1);
    let mut out = vec![0f32; n];
    for (dst, chunk) in out.chunks_mut(group).zip(src.chunks(group)) {
        dst.fill(chunk.iter().sum());
    }
    HostArray::F32(out)
}

fn subgroup_sum_reference(input: &ReferenceInput<'_>) -> HostArray {
    let wg = input.plan.workgroup_size as usize;
    group_sums(input, reported_subgroup_size(input).min(wg))
}

fn workgroup_sum_reference(input: &ReferenceInput<'_>) -> HostArray {
    group_sums(input, input.plan.workgroup_size as usize)
}

fn parameters() -> ParameterSpace {
    ParameterSpace::new()
        .pow2_option(keys::WORKGROUP_COUNT, 0, 6)
        .pow2_option(keys::WORKGROUP_SIZE, 0, 6)
}

fn reduce_test(name: &'static str, kernel: crate::suite::KernelFactory) -> BenchTest {
    BenchTest::new("subgroups", name, kernel)
        .trials(10)
        .parameters(parameters())
        .sizing(SizingHooks {
            memsrc_size: Some(memsrc_size),
            ..SizingHooks::default()
        })
        .bindings(BINDINGS)
        .metrics(MetricHooks {
            bytes_transferred: Some(copy_bytes),
            thread_count: Some(thread_per_source_element),
            ..MetricHooks::default()
        })
        .plot(
            PlotSpec::new(
                "Subgroup kernel time",
                Axis::new(keys::MEMSRC_SIZE, "Threads"),
                Axis::new("time_ns", "Time per dispatch (ns)"),
            )
            .stroke(keys::WORKGROUP_SIZE),
        )
        .requires(DeviceFeatures {
            subgroups: true,
            ..DeviceFeatures::default()
        })
}

/// Each thread packs `(subgroup_size << 16) | subgroup_invocation_id`.
pub fn subgroup_id_test() -> BenchTest {
    reduce_test("subgroup-id", id_kernel)
        .description("Subgroup ID and size")
        .datatype(ElementKind::U32)
        .reference(id_reference)
}

pub fn subgroup_sum_test() -> BenchTest {
    reduce_test("subgroup-sum", subgroup_sum_kernel)
        .description("subgroupAdd within each subgroup")
        .datatype(ElementKind::F32)
        .reference(subgroup_sum_reference)
}

pub fn workgroup_sum_test() -> BenchTest {
    reduce_test("workgroup-sum", workgroup_sum_kernel)
        .description("Workgroup sum via strided fold and subgroupAdd")
        .datatype(ElementKind::F32)
        .reference(workgroup_sum_reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RunPlan;
    use gridsweep_primitives::DispatchGeometry;

    fn plan(n: u64, wg: u32, datatype: ElementKind) -> RunPlan {
        RunPlan {
            params: ParameterSet::new(),
            datatype,
            memsrc_size: n,
            memdest_size: n,
            workgroup_size: wg,
            workgroup_count: n / wg as u64,
            geometry: DispatchGeometry::xy((n / wg as u64) as u32, 1),
            trials: 10,
        }
    }

    #[test]
    fn test_id_reference_packs_size_and_lane() {
        let source = HostArray::U32((0..8).collect());
        let p = plan(8, 4, ElementKind::U32);
        let out = id_reference(&ReferenceInput {
            source: &source,
            plan: &p,
            debug: Some(&[2]),
        });
        let two = 2u32 << 16;
        assert_eq!(
            out,
            HostArray::U32(vec![two, two | 1, two, two | 1, two, two | 1, two, two | 1])
        );
    }

    #[test]
    fn test_subgroup_wider_than_workgroup() {
        // Lanes restart at every workgroup when sgsz > wg.
        let source = HostArray::F32((0..6).map(|i| i as f32).collect());
        let p = plan(6, 2, ElementKind::F32);
        let out = subgroup_sum_reference(&ReferenceInput {
            source: &source,
            plan: &p,
            debug: Some(&[32]),
        });
        assert_eq!(out, HostArray::F32(vec![1.0, 1.0, 5.0, 5.0, 9.0, 9.0]));
    }

    #[test]
    fn test_workgroup_sum_broadcasts_total() {
        let source = HostArray::F32((0..8).map(|i| i as f32).collect());
        let p = plan(8, 4, ElementKind::F32);
        let out = workgroup_sum_reference(&ReferenceInput {
            source: &source,
            plan: &p,
            debug: Some(&[2]),
        });
        assert_eq!(out, HostArray::F32(vec![6.0, 6.0, 6.0, 6.0, 22.0, 22.0, 22.0, 22.0]));
    }

    #[test]
    fn test_threads_follow_workgroup_grid() {
        let p = ParameterSet::new()
            .with(keys::WORKGROUP_COUNT, 8u64)
            .with(keys::WORKGROUP_SIZE, 16u64);
        assert_eq!(memsrc_size(&p), 128);
        assert_eq!(subgroup_id_test().parameters.len(), 49);
    }

    #[test]
    fn test_workgroup_sum_kernel_sizes_scratch() {
        let p = ParameterSet::new().with(keys::WORKGROUP_SIZE, 32u64);
        let src = workgroup_sum_kernel(&p, 256);
        assert!(src.contains("array<f32, 32>"));
        assert!(src.contains("subgroupAdd(sum)"));
        assert!(src.contains("@workgroup_size(32, 1, 1)"));
    }
}
