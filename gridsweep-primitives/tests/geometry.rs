use proptest::prelude::*;

use gridsweep_primitives::{
    fold_workgroups, plan_dispatch, DeviceFeatures, DeviceLimits, DispatchGeometry, ElementKind,
    HostArray, PlanError,
};

const BASELINE: u32 = 65_535;

#[test]
fn baseline_limits_plan_a_million_elements() {
    let limits = DeviceLimits::default();
    let g = plan_dispatch(1 << 20, 64, limits.max_compute_workgroups_per_dimension).unwrap();
    assert_eq!(g, DispatchGeometry::xy(16_384, 1));
}

#[test]
fn oversized_launch_folds_into_second_dimension() {
    // 2^26 elements at 64 per workgroup is 2^20 workgroups.
    let g = plan_dispatch(1 << 26, 64, BASELINE).unwrap();
    assert!(g.fits(BASELINE));
    assert!(g.y > 1);
    assert!(g.total_workgroups() >= 1 << 20);
    assert_eq!(g.to_string(), format!("({}, {}, 1)", g.x, g.y));
}

#[test]
fn unrepresentable_count_is_an_error() {
    let limit = 4;
    let err = fold_workgroups(17, limit).unwrap_err();
    assert_eq!(
        err,
        PlanError::Unrepresentable {
            workgroups: 17,
            limit
        }
    );
}

#[test]
fn readback_bytes_decode_by_kind() {
    let bytes: Vec<u8> = [1u32, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
    let arr = HostArray::from_bytes(ElementKind::U32, &bytes).unwrap();
    assert_eq!(arr.as_u32().unwrap(), &[1, 2, 3]);
    assert_eq!(arr.as_bytes(), bytes.as_slice());
    assert!(HostArray::from_bytes(ElementKind::F32, &bytes[..5]).is_none());
}

#[test]
fn missing_features_are_named() {
    let have = DeviceFeatures {
        timestamp_query: true,
        subgroups: false,
    };
    let want = DeviceFeatures {
        timestamp_query: true,
        subgroups: true,
    };
    assert_eq!(have.missing(want), vec!["subgroups"]);
}

proptest! {
    #[test]
    fn folded_geometry_covers_every_element(
        elements in 1u64..(1 << 28),
        wg_exp in 0u32..=8,
        limit in 1024u32..=BASELINE,
    ) {
        let wg = 1u32 << wg_exp;
        let needed = elements.div_ceil(wg as u64);
        match plan_dispatch(elements, wg, limit) {
            Ok(g) => {
                prop_assert!(g.fits(limit));
                prop_assert!(g.total_workgroups() >= needed);
                prop_assert_eq!(g.z, 1);
            }
            Err(PlanError::Unrepresentable { workgroups, .. }) => {
                prop_assert_eq!(workgroups, needed);
                prop_assert!(needed > limit as u64);
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }
}
