//! Elementwise validation of device output against a host reference.

use std::fmt;

use gridsweep_primitives::{Element, HostArray};

use crate::suite::{ReferenceFn, ReferenceInput};

/// Detailed mismatches kept per report; counting continues past it.
pub const MAX_REPORTED_MISMATCHES: usize = 5;

/// One element that differs from the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: Element,
    pub actual: Element,
    /// Source element at the same index, if the source is that long.
    pub input: Option<Element>,
    pub debug: Option<u32>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Element {}: expected {}, instead saw {}",
            self.index, self.expected, self.actual
        )?;
        if let Some(input) = self.input {
            write!(f, " (input {})", input.hex())?;
        }
        if let Some(debug) = self.debug {
            write!(f, ". debug[{}] = {}", self.index, debug)?;
        }
        f.write_str(".")
    }
}

/// Outcome of comparing one output array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub checked: usize,
    pub error_count: usize,
    pub last_mismatch: Option<Mismatch>,
    /// At most [`MAX_REPORTED_MISMATCHES`] leading mismatches.
    pub examples: Vec<Mismatch>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.error_count == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.examples {
            writeln!(f, "{m}")?;
        }
        if self.error_count > self.examples.len() {
            writeln!(
                f,
                "... {} more errors not shown",
                self.error_count - self.examples.len()
            )?;
        }
        if let Some(last) = &self.last_mismatch {
            writeln!(f, "Last error: {last}")?;
        }
        if self.is_ok() {
            write!(f, "Output size: {} | No errors!", self.checked)
        } else {
            write!(
                f,
                "Output size: {} | Errors: {}",
                self.checked, self.error_count
            )
        }
    }
}

/// Arrays that cannot be compared element by element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("reference has {expected} elements but output has {actual}")]
    Length { expected: usize, actual: usize },
    #[error("reference is {expected} but output is {actual}")]
    Kind {
        expected: gridsweep_primitives::ElementKind,
        actual: gridsweep_primitives::ElementKind,
    },
}

fn scan<T: Copy + PartialEq>(
    expected: &[T],
    actual: &[T],
    wrap: fn(T) -> Element,
    source: &HostArray,
    debug: Option<&[u32]>,
) -> ValidationReport {
    let mut report = ValidationReport {
        checked: expected.len(),
        ..ValidationReport::default()
    };
    for (index, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        // Strict equality, floats included.
        if e == a {
            continue;
        }
        let mismatch = Mismatch {
            index,
            expected: wrap(e),
            actual: wrap(a),
            input: source.get(index),
            debug: debug.and_then(|d| d.get(index).copied()),
        };
        report.error_count += 1;
        if report.examples.len() < MAX_REPORTED_MISMATCHES {
            report.examples.push(mismatch.clone());
        }
        report.last_mismatch = Some(mismatch);
    }
    report
}

/// Compare `actual` against `expected` element by element.
pub fn compare(
    expected: &HostArray,
    actual: &HostArray,
    source: &HostArray,
    debug: Option<&[u32]>,
) -> Result<ValidationReport, ShapeError> {
    if expected.len() != actual.len() {
        return Err(ShapeError::Length {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    match (expected, actual) {
        (HostArray::U32(e), HostArray::U32(a)) => Ok(scan(e, a, Element::U32, source, debug)),
        (HostArray::F32(e), HostArray::F32(a)) => Ok(scan(e, a, Element::F32, source, debug)),
        _ => Err(ShapeError::Kind {
            expected: expected.kind(),
            actual: actual.kind(),
        }),
    }
}

/// Run `reference` over `input` and compare the result with `actual`.
pub fn validate(
    reference: ReferenceFn,
    input: &ReferenceInput<'_>,
    actual: &HostArray,
) -> Result<ValidationReport, ShapeError> {
    let expected = reference(input);
    compare(&expected, actual, input.source, input.debug)
}
