pub mod device;
pub mod dispatch;
#[cfg(feature = "host-device")]
pub mod host;
pub mod timing;
pub mod types;
pub mod wgpu_ctx;

pub use device::{
    BufferDesc, BufferUsage, ComputeDevice, DeviceError, DeviceFeatures, DeviceInfo,
    DeviceLimits, PassDesc,
};
pub use dispatch::{fold_workgroups, plan_dispatch, workgroups_for, DispatchGeometry, PlanError};
#[cfg(feature = "host-device")]
pub use host::{HostDevice, HostStats};
pub use timing::BenchTimer;
pub use timing::GpuTimer;
pub use types::{Element, ElementKind, HostArray};
pub use wgpu_ctx::WgpuContext;
