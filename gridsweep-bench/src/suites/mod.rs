//! Built-in benchmark tests and the registry over them.
//!
//! Every kernel here binds the destination at binding 0 and the source at
//! binding 1, and linearizes its 2-D dispatch as
//! `id.y * num_workgroups.x * WORKGROUP_SIZE + id.x`.

pub mod madd;
pub mod membw;
pub mod strided_read;
pub mod subgroup_reduce;
pub mod subgroups;

use crate::params::{keys, ParameterSet};
use crate::plan::DEFAULT_WORKGROUP_SIZE;
use crate::suite::BenchTest;

/// Registry of all built-in tests, in run order.
pub fn all_tests() -> Vec<BenchTest> {
    vec![
        membw::membw_test(),
        strided_read::strided_read_test(),
        madd::madd_test(),
        subgroups::shuffle_neighbor_test(),
        subgroups::shuffle_rotate_test(),
        subgroup_reduce::subgroup_id_test(),
        subgroup_reduce::subgroup_sum_test(),
        subgroup_reduce::workgroup_sum_test(),
    ]
}

/// Tests whose name or category matches one of `names`; "all" or an empty
/// list selects everything. Unknown names are returned separately.
pub fn select_tests(names: &[String]) -> (Vec<BenchTest>, Vec<String>) {
    let all = all_tests();
    if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
        return (all, Vec::new());
    }
    let unknown = names
        .iter()
        .filter(|n| !all.iter().any(|t| t.name == n.as_str() || t.category == n.as_str()))
        .cloned()
        .collect();
    let selected = all
        .into_iter()
        .filter(|t| names.iter().any(|n| t.name == n.as_str() || t.category == n.as_str()))
        .collect();
    (selected, unknown)
}

pub(crate) fn workgroup_size(params: &ParameterSet) -> u64 {
    params
        .get_u64(keys::WORKGROUP_SIZE)
        .unwrap_or(DEFAULT_WORKGROUP_SIZE as u64)
}

pub(crate) fn datatype(params: &ParameterSet) -> &str {
    params.get_str(keys::DATATYPE).unwrap_or("f32")
}

/// Destination and source bindings for element type `ty`.
pub(crate) fn io_bindings(ty: &str) -> String {
    format!(
        "@group(0) @binding(0)
var<storage, read_write> memdest: array<{ty}>;

@group(0) @binding(1)
var<storage, read> memsrc: array<{ty}>;
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_unique() {
        let tests = all_tests();
        let mut names: Vec<_> = tests.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tests.len());
    }

    #[test]
    fn test_every_test_has_parameters_and_plots() {
        for t in all_tests() {
            assert!(!t.parameters.is_empty(), "{} sweeps nothing", t.name);
            assert!(!t.plots.is_empty() || t.trials == 0, "{} has no plot", t.name);
        }
    }

    #[test]
    fn test_select_by_name_and_category() {
        let (tests, unknown) = select_tests(&["membw".to_string(), "subgroups".to_string()]);
        let names: Vec<_> = tests.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "membw",
                "subgroup-shuffle-neighbor",
                "subgroup-shuffle-rotate",
                "subgroup-id",
                "subgroup-sum",
                "workgroup-sum",
            ]
        );
        assert!(unknown.is_empty());

        let (_, unknown) = select_tests(&["nope".to_string()]);
        assert_eq!(unknown, vec!["nope".to_string()]);

        let (tests, _) = select_tests(&["all".to_string()]);
        assert_eq!(tests.len(), all_tests().len());
    }

    #[test]
    fn test_kernels_declare_workgroup_size() {
        for t in all_tests() {
            for params in t.parameters.iter().take(2) {
                let src = (t.kernel)(&params, 1024);
                let wg = workgroup_size(&params);
                assert!(src.contains(&format!("@workgroup_size({wg}")), "{}", t.name);
                assert!(src.contains("fn main"));
            }
        }
    }
}
