//! Resolution of a ParameterSet into a concrete run plan.
//!
//! Sizes follow a fixed hierarchy: a value present in the parameter set
//! wins, then the test's sizing hook, then the default. Hooks see the
//! parameter set with every previously resolved size filled in, so a
//! `memdest_size` hook can read `memsrc_size`.

use gridsweep_primitives::{
    fold_workgroups, workgroups_for, DeviceLimits, DispatchGeometry, ElementKind, PlanError,
};

use crate::error::BenchError;
use crate::params::{keys, ParameterSet};
use crate::suite::{BenchTest, GeometryInput, GeometryStrategy};

pub const DEFAULT_WORKGROUP_SIZE: u32 = 64;

/// Everything needed to allocate, launch and validate one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    /// Declared parameters plus every resolved size.
    pub params: ParameterSet,
    pub datatype: ElementKind,
    /// Source length in elements; also the kernel's thread count.
    pub memsrc_size: u64,
    /// Destination length in elements.
    pub memdest_size: u64,
    pub workgroup_size: u32,
    pub workgroup_count: u64,
    pub geometry: DispatchGeometry,
    pub trials: u32,
}

/// Outcome of planning one configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(RunPlan),
    /// The configuration cannot run within the device limits.
    Skip(String),
}

fn resolve_size(
    params: &ParameterSet,
    key: &str,
    hook: Option<fn(&ParameterSet) -> u64>,
) -> Option<u64> {
    params.get_u64(key).or_else(|| hook.map(|h| h(params)))
}

impl RunPlan {
    /// Apply the resolution hierarchy and plan the dispatch geometry.
    ///
    /// Zero sizes and unparseable datatypes are malformed configurations.
    /// A workgroup larger than the device allows, or a geometry that cannot
    /// fit the per-dimension limit, is a skip.
    pub fn resolve(
        test: &BenchTest,
        params: &ParameterSet,
        trials: u32,
        limits: &DeviceLimits,
    ) -> Result<Resolution, BenchError> {
        let name = test.name;
        let hooks = &test.sizing;
        let mut resolved = params.clone();

        let memsrc_size = resolve_size(&resolved, keys::MEMSRC_SIZE, hooks.memsrc_size)
            .ok_or_else(|| BenchError::malformed(name, "memsrc_size is not defined"))?;
        if memsrc_size == 0 {
            return Err(BenchError::malformed(name, "memsrc_size must be non-zero"));
        }
        resolved.insert(keys::MEMSRC_SIZE, memsrc_size);

        let memdest_size =
            resolve_size(&resolved, keys::MEMDEST_SIZE, hooks.memdest_size).unwrap_or(memsrc_size);
        if memdest_size == 0 {
            return Err(BenchError::malformed(name, "memdest_size must be non-zero"));
        }
        resolved.insert(keys::MEMDEST_SIZE, memdest_size);

        let workgroup_size =
            resolve_size(&resolved, keys::WORKGROUP_SIZE, hooks.workgroup_size)
                .unwrap_or(DEFAULT_WORKGROUP_SIZE as u64);
        let workgroup_size = u32::try_from(workgroup_size).map_err(|_| {
            BenchError::malformed(name, format!("workgroup_size {workgroup_size} overflows u32"))
        })?;
        if workgroup_size == 0 {
            return Err(PlanError::ZeroWorkgroupSize.into());
        }
        resolved.insert(keys::WORKGROUP_SIZE, workgroup_size);

        let workgroup_count = match resolve_size(&resolved, keys::WORKGROUP_COUNT, hooks.workgroup_count) {
            Some(count) => count,
            None => workgroups_for(memsrc_size, workgroup_size)?,
        };
        resolved.insert(keys::WORKGROUP_COUNT, workgroup_count);

        let datatype = match resolved.get_str(keys::DATATYPE) {
            Some(text) => text
                .parse::<ElementKind>()
                .map_err(|reason| BenchError::malformed(name, reason))?,
            None => test.datatype,
        };
        resolved.insert(keys::DATATYPE, datatype.wgsl());

        if workgroup_size > limits.max_compute_invocations_per_workgroup {
            return Ok(Resolution::Skip(format!(
                "workgroup size {workgroup_size} exceeds device maximum of {}",
                limits.max_compute_invocations_per_workgroup
            )));
        }

        let max_dim = limits.max_compute_workgroups_per_dimension;
        let geometry = match test.geometry {
            GeometryStrategy::Fold => match fold_workgroups(workgroup_count, max_dim) {
                Ok(g) => g,
                Err(PlanError::Unrepresentable { .. }) => {
                    return Ok(Resolution::Skip(format!(
                        "{workgroup_count} workgroups do not fit a {max_dim}-per-dimension dispatch"
                    )));
                }
                Err(e) => return Err(e.into()),
            },
            GeometryStrategy::Custom(f) => {
                let g = f(&GeometryInput {
                    params: &resolved,
                    workgroup_size,
                    workgroup_count,
                    max_per_dimension: max_dim,
                });
                if !g.fits(max_dim) {
                    return Ok(Resolution::Skip(format!(
                        "custom geometry {g} exceeds {max_dim} workgroups per dimension"
                    )));
                }
                g
            }
        };
        tracing::debug!(test = name, %geometry, workgroup_count, "dispatch planned");

        Ok(Resolution::Ready(RunPlan {
            params: resolved,
            datatype,
            memsrc_size,
            memdest_size,
            workgroup_size,
            workgroup_count,
            geometry,
            trials,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSpace;
    use crate::suite::{BenchTest, KernelFactory};

    const KERNEL: KernelFactory = |_, _| "@compute @workgroup_size(64) fn main() {}".to_string();

    fn test_desc() -> BenchTest {
        BenchTest::new("unit", "plan", KERNEL).parameters(ParameterSpace::new())
    }

    fn ready(r: Resolution) -> RunPlan {
        match r {
            Resolution::Ready(p) => p,
            Resolution::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_defaults_fill_in() {
        let params = ParameterSet::new().with(keys::MEMSRC_SIZE, 1_000_000u64);
        let limits = DeviceLimits {
            max_compute_invocations_per_workgroup: 1024,
            ..DeviceLimits::default()
        };
        let plan = ready(
            RunPlan::resolve(
                &test_desc(),
                &params.clone().with(keys::WORKGROUP_SIZE, 256u64),
                4,
                &limits,
            )
            .unwrap(),
        );
        assert_eq!(plan.memdest_size, 1_000_000);
        assert_eq!(plan.workgroup_count, 3907);
        assert_eq!(plan.geometry, DispatchGeometry::xy(3907, 1));
        assert_eq!(plan.datatype, ElementKind::F32);
        assert_eq!(plan.params.get_u64(keys::MEMDEST_SIZE), Some(1_000_000));

        let plan = ready(RunPlan::resolve(&test_desc(), &params, 4, &limits).unwrap());
        assert_eq!(plan.workgroup_size, DEFAULT_WORKGROUP_SIZE);
    }

    #[test]
    fn test_param_beats_hook() {
        let mut t = test_desc();
        t.sizing.memdest_size = Some(|p| p.get_u64(keys::MEMSRC_SIZE).unwrap_or(0) / 2);
        let limits = DeviceLimits::default();

        let p = ParameterSet::new().with(keys::MEMSRC_SIZE, 64u64);
        let plan = ready(RunPlan::resolve(&t, &p, 1, &limits).unwrap());
        assert_eq!(plan.memdest_size, 32);

        let p = p.with(keys::MEMDEST_SIZE, 10u64);
        let plan = ready(RunPlan::resolve(&t, &p, 1, &limits).unwrap());
        assert_eq!(plan.memdest_size, 10);
    }

    #[test]
    fn test_datatype_from_params() {
        let p = ParameterSet::new()
            .with(keys::MEMSRC_SIZE, 16u64)
            .with(keys::DATATYPE, "u32");
        let plan = ready(RunPlan::resolve(&test_desc(), &p, 1, &DeviceLimits::default()).unwrap());
        assert_eq!(plan.datatype, ElementKind::U32);

        let p = p.with(keys::DATATYPE, "f64");
        let err = RunPlan::resolve(&test_desc(), &p, 1, &DeviceLimits::default()).unwrap_err();
        assert!(matches!(err, BenchError::MalformedConfiguration { .. }));
    }

    #[test]
    fn test_zero_sizes_are_malformed() {
        let p = ParameterSet::new().with(keys::MEMSRC_SIZE, 0u64);
        let err = RunPlan::resolve(&test_desc(), &p, 1, &DeviceLimits::default()).unwrap_err();
        assert!(!err.is_fatal());
        let err = RunPlan::resolve(&test_desc(), &ParameterSet::new(), 1, &DeviceLimits::default())
            .unwrap_err();
        assert!(matches!(err, BenchError::MalformedConfiguration { .. }));
    }

    #[test]
    fn test_oversized_workgroup_skips() {
        let p = ParameterSet::new()
            .with(keys::MEMSRC_SIZE, 1024u64)
            .with(keys::WORKGROUP_SIZE, 512u64);
        let r = RunPlan::resolve(&test_desc(), &p, 1, &DeviceLimits::default()).unwrap();
        assert!(matches!(r, Resolution::Skip(_)));
    }

    #[test]
    fn test_custom_geometry_over_limit_skips() {
        let t = test_desc().geometry(GeometryStrategy::Custom(|g| {
            DispatchGeometry::xy(g.max_per_dimension + 1, 1)
        }));
        let p = ParameterSet::new().with(keys::MEMSRC_SIZE, 1024u64);
        let r = RunPlan::resolve(&t, &p, 1, &DeviceLimits::default()).unwrap();
        assert!(matches!(r, Resolution::Skip(_)));
    }
}
