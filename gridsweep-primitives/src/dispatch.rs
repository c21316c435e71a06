//! Dispatch geometry planning under per-dimension device limits.
//!
//! A kernel launch needs `ceil(N / W)` workgroups, but devices cap the
//! workgroup count of every dimension. The default planner folds an
//! over-long first dimension into the second one until it fits.

use serde::{Deserialize, Serialize};

/// Per-dimension workgroup counts for one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchGeometry {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchGeometry {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Two-dimensional geometry with `z = 1`.
    pub const fn xy(x: u32, y: u32) -> Self {
        Self { x, y, z: 1 }
    }

    /// Total number of workgroups launched.
    pub fn total_workgroups(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Whether every dimension is within `limit`.
    pub fn fits(&self, limit: u32) -> bool {
        self.x <= limit && self.y <= limit && self.z <= limit
    }
}

impl std::fmt::Display for DispatchGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Error type for geometry planning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("workgroup size must be non-zero")]
    ZeroWorkgroupSize,
    #[error("per-dimension dispatch limit must be non-zero")]
    ZeroLimit,
    #[error("{workgroups} workgroups cannot be folded into two dimensions of at most {limit}")]
    Unrepresentable { workgroups: u64, limit: u32 },
}

/// Number of workgroups of size `workgroup_size` needed to cover `elements`.
pub fn workgroups_for(elements: u64, workgroup_size: u32) -> Result<u64, PlanError> {
    if workgroup_size == 0 {
        return Err(PlanError::ZeroWorkgroupSize);
    }
    Ok(elements.div_ceil(workgroup_size as u64))
}

/// Default 1-D fold: start at `(count, 1)` and, while the first dimension
/// exceeds `limit`, halve it (rounding up) and double the second.
///
/// Guarantees `x <= limit` and `x * y >= count`. The fold assumes
/// power-of-two friendly counts; other counts are covered but can
/// over-dispatch by up to a factor of two.
pub fn fold_workgroups(count: u64, limit: u32) -> Result<DispatchGeometry, PlanError> {
    if limit == 0 {
        return Err(PlanError::ZeroLimit);
    }
    let limit64 = limit as u64;
    let (mut x, mut y) = (count, 1u64);
    while x > limit64 {
        x = x.div_ceil(2);
        y *= 2;
    }
    match u32::try_from(y) {
        Ok(y) if y <= limit => Ok(DispatchGeometry::xy(x as u32, y)),
        _ => Err(PlanError::Unrepresentable {
            workgroups: count,
            limit,
        }),
    }
}

/// Plan the default dispatch for `elements` threads in workgroups of
/// `workgroup_size`, honouring `max_per_dimension`.
pub fn plan_dispatch(
    elements: u64,
    workgroup_size: u32,
    max_per_dimension: u32,
) -> Result<DispatchGeometry, PlanError> {
    let count = workgroups_for(elements, workgroup_size)?;
    fold_workgroups(count, max_per_dimension)
}
