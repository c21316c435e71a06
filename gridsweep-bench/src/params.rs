//! Parameter sets and the cartesian-product combinator over declared options.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Names of parameters the run planner interprets.
pub mod keys {
    pub const MEMSRC_SIZE: &str = "memsrc_size";
    pub const MEMDEST_SIZE: &str = "memdest_size";
    pub const WORKGROUP_SIZE: &str = "workgroup_size";
    pub const WORKGROUP_COUNT: &str = "workgroup_count";
    pub const DATATYPE: &str = "datatype";
}

/// One concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as u64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Concrete assignment of a value to every declared option, in declaration
/// order. Serializes as a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an existing value under the same name.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(ParamValue::as_u64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Named option lists whose cartesian product drives a test's sweep.
///
/// The first-declared option is the outermost loop. An option with an empty
/// list makes the product empty; a space with no options yields exactly one
/// empty set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpace {
    options: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option. Re-declaring a name replaces its list in place.
    pub fn option<V: Into<ParamValue>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.options.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = values,
            None => self.options.push((name.to_string(), values)),
        }
        self
    }

    /// Powers of two `2^lo ..= 2^hi`.
    pub fn pow2_option(self, name: &str, lo: u32, hi: u32) -> Self {
        self.option(name, (lo..=hi).map(|e| 1u64 << e))
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of parameter sets the product yields.
    pub fn len(&self) -> usize {
        self.options.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily enumerate the product. Each call starts from the beginning.
    pub fn iter(&self) -> Combinations<'_> {
        Combinations {
            space: self,
            cursor: vec![0; self.options.len()],
            done: self.options.iter().any(|(_, v)| v.is_empty()),
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = ParameterSet;
    type IntoIter = Combinations<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer over a [`ParameterSpace`]; the last option turns fastest.
pub struct Combinations<'a> {
    space: &'a ParameterSpace,
    cursor: Vec<usize>,
    done: bool,
}

impl Iterator for Combinations<'_> {
    type Item = ParameterSet;

    fn next(&mut self) -> Option<ParameterSet> {
        if self.done {
            return None;
        }
        let entries = self
            .space
            .options
            .iter()
            .zip(&self.cursor)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();

        self.done = true;
        for (slot, (_, values)) in self.cursor.iter_mut().zip(&self.space.options).rev() {
            *slot += 1;
            if *slot < values.len() {
                self.done = false;
                break;
            }
            *slot = 0;
        }
        Some(ParameterSet { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_sizes_one_workgroup() {
        let space = ParameterSpace::new()
            .option("size", [1u64, 2])
            .option("wgSize", [4u64]);
        let sets: Vec<_> = space.iter().collect();
        assert_eq!(
            sets,
            vec![
                ParameterSet::new().with("size", 1u64).with("wgSize", 4u64),
                ParameterSet::new().with("size", 2u64).with("wgSize", 4u64),
            ]
        );
    }

    #[test]
    fn test_first_option_is_outer_loop() {
        let space = ParameterSpace::new()
            .option("a", [1u64, 2])
            .option("b", ["x", "y"]);
        let rendered: Vec<String> = space.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["a=1, b=x", "a=1, b=y", "a=2, b=x", "a=2, b=y"]);
    }

    #[test]
    fn test_empty_list_yields_nothing() {
        let space = ParameterSpace::new()
            .option("a", [1u64, 2])
            .option::<u64>("b", []);
        assert_eq!(space.iter().count(), 0);
        assert!(space.is_empty());
    }

    #[test]
    fn test_no_options_yields_one_empty_set() {
        let space = ParameterSpace::new();
        let sets: Vec<_> = space.iter().collect();
        assert_eq!(sets, vec![ParameterSet::new()]);
    }

    #[test]
    fn test_restartable() {
        let space = ParameterSpace::new().pow2_option("n", 2, 4);
        let first: Vec<_> = space.iter().collect();
        let second: Vec<_> = space.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].get_u64("n"), Some(16));
    }

    #[test]
    fn test_insert_replaces() {
        let mut p = ParameterSet::new().with("a", 1u64);
        p.insert("a", 5u64);
        assert_eq!(p.len(), 1);
        assert_eq!(p.get_u64("a"), Some(5));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let p = ParameterSet::new()
            .with(keys::WORKGROUP_SIZE, 64u64)
            .with(keys::DATATYPE, "f32");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"workgroup_size":64,"datatype":"f32"}"#);
    }

    proptest! {
        #[test]
        fn prop_product_size_and_distinct(lens in proptest::collection::vec(0usize..4, 0..4)) {
            let mut space = ParameterSpace::new();
            for (i, len) in lens.iter().enumerate() {
                space = space.option(&format!("opt{i}"), (0..*len as u64).collect::<Vec<_>>());
            }
            let sets: Vec<_> = space.iter().collect();
            let expected: usize = lens.iter().product();
            prop_assert_eq!(sets.len(), expected);
            for w in sets.windows(2) {
                prop_assert_ne!(&w[0], &w[1]);
            }
            // product order: index tuples are strictly increasing lexicographically
            let tuples: Vec<Vec<u64>> = sets
                .iter()
                .map(|s| s.iter().filter_map(|(_, v)| v.as_u64()).collect())
                .collect();
            for w in tuples.windows(2) {
                prop_assert!(w[0] < w[1]);
            }
        }
    }
}
