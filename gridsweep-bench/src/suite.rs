//! Typed benchmark test descriptor.
//!
//! Every capability a test may or may not supply (sizing hooks, geometry
//! override, reference function, metric formulas, plots, required
//! features) is an explicit field, fixed when the test is registered.

use gridsweep_primitives::{DeviceFeatures, DispatchGeometry, ElementKind, HostArray};

use crate::buffers::BufferRole;
use crate::params::{ParameterSet, ParameterSpace};
use crate::plan::RunPlan;
use crate::plot::PlotSpec;
use crate::results::MetricHooks;

/// Produces WGSL for a parameter set and thread count (`memsrc_size`).
pub type KernelFactory = fn(&ParameterSet, u64) -> String;

/// Host-side recomputation of the expected output.
pub type ReferenceFn = fn(&ReferenceInput<'_>) -> HostArray;

/// Per-size hooks consulted when the parameter set omits a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizingHooks {
    pub memsrc_size: Option<fn(&ParameterSet) -> u64>,
    pub memdest_size: Option<fn(&ParameterSet) -> u64>,
    pub workgroup_size: Option<fn(&ParameterSet) -> u64>,
    pub workgroup_count: Option<fn(&ParameterSet) -> u64>,
}

/// What a custom geometry function gets to work with.
pub struct GeometryInput<'a> {
    pub params: &'a ParameterSet,
    pub workgroup_size: u32,
    pub workgroup_count: u64,
    pub max_per_dimension: u32,
}

/// How the dispatch geometry is derived.
#[derive(Debug, Clone, Copy)]
pub enum GeometryStrategy {
    /// Fold `workgroup_count` into two dimensions under the device limit.
    Fold,
    /// Test-specific geometry. Results over the limit skip the run.
    Custom(fn(&GeometryInput<'_>) -> DispatchGeometry),
}

/// Inputs to a test's reference function.
pub struct ReferenceInput<'a> {
    /// Source elements of the run's datatype.
    pub source: &'a HostArray,
    pub plan: &'a RunPlan,
    /// Debug buffer contents, when the test binds one.
    pub debug: Option<&'a [u32]>,
}

impl ReferenceInput<'_> {
    pub fn params(&self) -> &ParameterSet {
        &self.plan.params
    }
}

/// A registered benchmark test.
#[derive(Clone)]
pub struct BenchTest {
    pub category: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub trials: u32,
    /// Element kind used when the parameter set has no `datatype`.
    pub datatype: ElementKind,
    pub parameters: ParameterSpace,
    pub sizing: SizingHooks,
    pub kernel: KernelFactory,
    /// Buffer role per binding index.
    pub bindings: &'static [BufferRole],
    pub geometry: GeometryStrategy,
    pub reference: Option<ReferenceFn>,
    pub metrics: MetricHooks,
    pub plots: Vec<PlotSpec>,
    pub required_features: DeviceFeatures,
}

impl BenchTest {
    /// Test with an output/input binding layout, f32 data, default geometry,
    /// ten trials and no optional capabilities.
    pub fn new(category: &'static str, name: &'static str, kernel: KernelFactory) -> Self {
        Self {
            category,
            name,
            description: "",
            trials: 10,
            datatype: ElementKind::F32,
            parameters: ParameterSpace::new(),
            sizing: SizingHooks::default(),
            kernel,
            bindings: &[BufferRole::Output, BufferRole::Input],
            geometry: GeometryStrategy::Fold,
            reference: None,
            metrics: MetricHooks::default(),
            plots: Vec::new(),
            required_features: DeviceFeatures::default(),
        }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn trials(mut self, trials: u32) -> Self {
        self.trials = trials;
        self
    }

    pub fn datatype(mut self, datatype: ElementKind) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn parameters(mut self, parameters: ParameterSpace) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn sizing(mut self, sizing: SizingHooks) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn bindings(mut self, bindings: &'static [BufferRole]) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn geometry(mut self, geometry: GeometryStrategy) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn reference(mut self, reference: ReferenceFn) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn metrics(mut self, metrics: MetricHooks) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn plot(mut self, plot: PlotSpec) -> Self {
        self.plots.push(plot);
        self
    }

    pub fn requires(mut self, features: DeviceFeatures) -> Self {
        self.required_features = features;
        self
    }

    /// Whether the binding layout includes a debug buffer.
    pub fn uses_debug(&self) -> bool {
        self.bindings.contains(&BufferRole::Debug)
    }
}

impl std::fmt::Debug for BenchTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchTest")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("trials", &self.trials)
            .field("datatype", &self.datatype)
            .field("combinations", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

/// Identity reference: expected output equals the source, truncated or
/// zero-padded to the destination length.
///
/// Only meaningful when `memdest_size <= memsrc_size`. A kernel reading past
/// the end of its source gets whatever robust buffer access yields (WGSL
/// allows a clamped index), not zero, so the padded tail would not match.
pub fn identity_reference(input: &ReferenceInput<'_>) -> HostArray {
    let n = input.plan.memdest_size as usize;
    match input.source {
        HostArray::U32(v) => {
            let mut out = vec![0u32; n];
            let m = n.min(v.len());
            out[..m].copy_from_slice(&v[..m]);
            HostArray::U32(out)
        }
        HostArray::F32(v) => {
            let mut out = vec![0f32; n];
            let m = n.min(v.len());
            out[..m].copy_from_slice(&v[..m]);
            HostArray::F32(out)
        }
    }
}
