//! In-memory metrics harness.
//!
//! Wraps an [`SdkMeterProvider`] whose only reader exports into an
//! [`InMemoryMetricExporter`]. [`MetricsHarness::snapshot`] forces a flush
//! and flattens the cumulative export into plain data points.

use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{self, ResourceMetrics};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::metrics::InMemoryMetricExporter;

/// Meter provider backed by an in-memory exporter.
pub struct MetricsHarness {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricsHarness {
    /// Creates a harness with cumulative temporality.
    ///
    /// The reader runs on its own current-thread runtime, so flushing from
    /// inside a `#[tokio::test]` does not deadlock.
    #[must_use]
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::TokioCurrentThread).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self { exporter, provider }
    }

    /// A meter from the harness provider.
    #[must_use]
    pub fn meter(&self) -> Meter {
        self.provider.meter("test-harness")
    }

    /// Flushes and returns every data point exported so far.
    ///
    /// # Panics
    ///
    /// Panics if the flush or the export read fails.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.exporter.reset();
        self.provider
            .force_flush()
            .expect("metrics flush failed");
        let exports = self
            .exporter
            .get_finished_metrics()
            .expect("reading exported metrics failed");

        exports
            .last()
            .map(MetricsSnapshot::from_export)
            .unwrap_or_default()
    }
}

impl Default for MetricsHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of one exported data point.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    /// Unsigned sum or gauge
    U64(u64),
    /// Signed sum or gauge
    I64(i64),
    /// Floating sum or gauge
    F64(f64),
    /// Histogram summary
    Histogram {
        /// Number of observations
        count: u64,
        /// Sum of observations
        sum: f64,
    },
}

/// One exported data point.
#[derive(Debug, Clone)]
pub struct Point {
    /// Metric name
    pub name: String,
    /// Metric unit
    pub unit: String,
    /// Attribute set
    pub attributes: Vec<KeyValue>,
    /// Value
    pub value: PointValue,
}

impl Point {
    /// True when every attribute in `subset` is present on this point.
    #[must_use]
    pub fn has_attributes(&self, subset: &[KeyValue]) -> bool {
        subset.iter().all(|kv| self.attributes.contains(kv))
    }

    /// True when the attribute set equals `attributes`, ignoring order.
    #[must_use]
    pub fn has_exact_attributes(&self, attributes: &[KeyValue]) -> bool {
        self.attributes.len() == attributes.len() && self.has_attributes(attributes)
    }
}

/// Flattened view of one export.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    points: Vec<Point>,
}

impl MetricsSnapshot {
    fn from_export(export: &ResourceMetrics) -> Self {
        let mut points = Vec::new();
        for scope in &export.scope_metrics {
            for metric in &scope.metrics {
                flatten(metric, &mut points);
            }
        }
        Self { points }
    }

    /// All points for `name`.
    pub fn points<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Point> + 'a {
        self.points.iter().filter(move |p| p.name == name)
    }

    /// True when `name` was exported at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.points(name).next().is_some()
    }

    /// Unit of `name`, if exported.
    #[must_use]
    pub fn unit<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.points(name).next().map(|p| p.unit.as_str())
    }

    /// Sum of `u64` points for `name` whose attributes include `subset`.
    #[must_use]
    pub fn sum_u64(&self, name: &str, subset: &[KeyValue]) -> u64 {
        self.points(name)
            .filter(|p| p.has_attributes(subset))
            .map(|p| match p.value {
                PointValue::U64(v) => v,
                _ => 0,
            })
            .sum()
    }

    /// Sum of `i64` points for `name` whose attributes include `subset`.
    #[must_use]
    pub fn sum_i64(&self, name: &str, subset: &[KeyValue]) -> i64 {
        self.points(name)
            .filter(|p| p.has_attributes(subset))
            .map(|p| match p.value {
                PointValue::I64(v) => v,
                _ => 0,
            })
            .sum()
    }

    /// Value of the `u64` point for `name` with exactly `attributes`.
    #[must_use]
    pub fn gauge_u64(&self, name: &str, attributes: &[KeyValue]) -> Option<u64> {
        self.points(name)
            .find(|p| p.has_exact_attributes(attributes))
            .and_then(|p| match p.value {
                PointValue::U64(v) => Some(v),
                _ => None,
            })
    }

    /// Total observation count of histogram points for `name` whose
    /// attributes include `subset`.
    #[must_use]
    pub fn histogram_count(&self, name: &str, subset: &[KeyValue]) -> u64 {
        self.points(name)
            .filter(|p| p.has_attributes(subset))
            .map(|p| match p.value {
                PointValue::Histogram { count, .. } => count,
                _ => 0,
            })
            .sum()
    }

    /// Total observation sum of histogram points for `name` whose attributes
    /// include `subset`.
    #[must_use]
    pub fn histogram_sum(&self, name: &str, subset: &[KeyValue]) -> f64 {
        self.points(name)
            .filter(|p| p.has_attributes(subset))
            .map(|p| match p.value {
                PointValue::Histogram { sum, .. } => sum,
                _ => 0.0,
            })
            .sum()
    }
}

fn flatten(metric: &data::Metric, out: &mut Vec<Point>) {
    let name = metric.name.to_string();
    let unit = metric.unit.to_string();
    let any = metric.data.as_any();
    let mut push = |attributes: &[KeyValue], value: PointValue| {
        out.push(Point {
            name: name.clone(),
            unit: unit.clone(),
            attributes: attributes.to_vec(),
            value,
        });
    };

    if let Some(sum) = any.downcast_ref::<data::Sum<u64>>() {
        for dp in &sum.data_points {
            push(&dp.attributes, PointValue::U64(dp.value));
        }
    } else if let Some(sum) = any.downcast_ref::<data::Sum<i64>>() {
        for dp in &sum.data_points {
            push(&dp.attributes, PointValue::I64(dp.value));
        }
    } else if let Some(sum) = any.downcast_ref::<data::Sum<f64>>() {
        for dp in &sum.data_points {
            push(&dp.attributes, PointValue::F64(dp.value));
        }
    } else if let Some(gauge) = any.downcast_ref::<data::Gauge<u64>>() {
        for dp in &gauge.data_points {
            push(&dp.attributes, PointValue::U64(dp.value));
        }
    } else if let Some(gauge) = any.downcast_ref::<data::Gauge<i64>>() {
        for dp in &gauge.data_points {
            push(&dp.attributes, PointValue::I64(dp.value));
        }
    } else if let Some(gauge) = any.downcast_ref::<data::Gauge<f64>>() {
        for dp in &gauge.data_points {
            push(&dp.attributes, PointValue::F64(dp.value));
        }
    } else if let Some(hist) = any.downcast_ref::<data::Histogram<f64>>() {
        for dp in &hist.data_points {
            push(
                &dp.attributes,
                PointValue::Histogram {
                    count: dp.count,
                    sum: dp.sum,
                },
            );
        }
    } else if let Some(hist) = any.downcast_ref::<data::Histogram<u64>>() {
        for dp in &hist.data_points {
            push(
                &dp.attributes,
                PointValue::Histogram {
                    count: dp.count,
                    sum: dp.sum as f64,
                },
            );
        }
    }
}
