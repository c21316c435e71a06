//! Plot specifications and series extraction.
//!
//! Rendering is left to whatever consumes the JSON report. This module only
//! selects finalized records for each plot and pulls out the declared
//! fields.

use serde::Serialize;

use crate::results::ResultRecord;

/// A named record field or parameter, with an axis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Axis {
    pub field: &'static str,
    pub label: &'static str,
}

impl Axis {
    pub const fn new(field: &'static str, label: &'static str) -> Self {
        Self { field, label }
    }
}

/// Which records a plot draws.
#[derive(Debug, Clone, Copy)]
pub enum RowFilter {
    /// Records of the owning test (same category and test name).
    SameTest,
    Custom(fn(&ResultRecord) -> bool),
}

#[derive(Debug, Clone)]
pub struct PlotSpec {
    pub title: &'static str,
    pub x: Axis,
    pub y: Axis,
    /// Field splitting records into separately drawn series.
    pub stroke: Option<&'static str>,
    /// Field splitting records into separate panels.
    pub facet: Option<&'static str>,
    pub caption: Option<&'static str>,
    pub filter: RowFilter,
}

impl PlotSpec {
    pub fn new(title: &'static str, x: Axis, y: Axis) -> Self {
        Self {
            title,
            x,
            y,
            stroke: None,
            facet: None,
            caption: None,
            filter: RowFilter::SameTest,
        }
    }

    pub fn stroke(mut self, field: &'static str) -> Self {
        self.stroke = Some(field);
        self
    }

    pub fn facet(mut self, field: &'static str) -> Self {
        self.facet = Some(field);
        self
    }

    pub fn caption(mut self, caption: &'static str) -> Self {
        self.caption = Some(caption);
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }

    fn selects(&self, category: &str, test: &str, record: &ResultRecord) -> bool {
        match self.filter {
            RowFilter::SameTest => record.category == category && record.test == test,
            RowFilter::Custom(f) => f(record),
        }
    }

    /// Extract this plot's points from `records`.
    ///
    /// Records missing a numeric x or y value are dropped.
    pub fn series(&self, category: &str, test: &str, records: &[ResultRecord]) -> PlotSeries {
        let points = records
            .iter()
            .filter(|r| self.selects(category, test, r))
            .filter_map(|r| {
                Some(PlotPoint {
                    x: r.numeric(self.x.field)?,
                    y: r.numeric(self.y.field)?,
                    stroke: self.stroke.and_then(|f| r.label(f)),
                    facet: self.facet.and_then(|f| r.label(f)),
                })
            })
            .collect();
        PlotSeries {
            title: self.title,
            x: self.x,
            y: self.y,
            stroke: self.stroke,
            facet: self.facet,
            caption: self.caption,
            points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
}

/// Plot data handed to the rendering consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub title: &'static str,
    pub x: Axis,
    pub y: Axis,
    pub stroke: Option<&'static str>,
    pub facet: Option<&'static str>,
    pub caption: Option<&'static str>,
    pub points: Vec<PlotPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{keys, ParameterSet};
    use crate::plan::RunPlan;
    use crate::results::MetricHooks;
    use crate::timing::{ReconciledTiming, TimeSource};
    use gridsweep_primitives::{DispatchGeometry, ElementKind};

    fn record(test: &str, size: u64, wg: u32, time: f64) -> ResultRecord {
        let plan = RunPlan {
            params: ParameterSet::new()
                .with(keys::MEMSRC_SIZE, size)
                .with(keys::WORKGROUP_SIZE, wg),
            datatype: ElementKind::U32,
            memsrc_size: size,
            memdest_size: size,
            workgroup_size: wg,
            workgroup_count: size / wg as u64,
            geometry: DispatchGeometry::xy(1, 1),
            trials: 1,
        };
        let timing = ReconciledTiming {
            time_ns: time,
            cpu_ns: time,
            cpugpu_delta: 0.0,
            source: TimeSource::Host,
        };
        ResultRecord::build("cat", test, &plan, timing, Some(0), &MetricHooks::default())
    }

    #[test]
    fn test_default_filter_keeps_same_test() {
        let records = vec![
            record("a", 1024, 64, 5.0),
            record("b", 1024, 64, 6.0),
            record("a", 2048, 128, 7.0),
        ];
        let spec = PlotSpec::new(
            "time",
            Axis::new(keys::MEMSRC_SIZE, "Source elements"),
            Axis::new("time", "ns"),
        )
        .stroke(keys::WORKGROUP_SIZE);
        let series = spec.series("cat", "a", &records);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[1].x, 2048.0);
        assert_eq!(series.points[1].y, 7.0);
        assert_eq!(series.points[1].stroke.as_deref(), Some("128"));
        assert!(series.points[0].facet.is_none());
    }

    #[test]
    fn test_custom_filter() {
        let records = vec![record("a", 1024, 64, 5.0), record("b", 4096, 64, 6.0)];
        let spec = PlotSpec::new("all", Axis::new("memsrc_size", "n"), Axis::new("time", "ns"))
            .filter(RowFilter::Custom(|r| r.memsrc_size > 2000));
        let series = spec.series("cat", "a", &records);
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].y, 6.0);
    }

    #[test]
    fn test_missing_y_field_drops_point() {
        let records = vec![record("a", 1024, 64, 5.0)];
        let spec = PlotSpec::new("bw", Axis::new("memsrc_size", "n"), Axis::new("bandwidth", "GB/s"));
        assert!(spec.series("cat", "a", &records).points.is_empty());
    }
}
