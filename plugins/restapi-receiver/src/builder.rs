//! Accumulation of gauge measurements, grouped by resource.
//!
//! A [`MetricsBuilder`] lives for one collection cycle. Every monitored entity
//! (a cluster, a node, ...) is identified by an [`AttributeSet`]. The builder
//! creates one [`ResourceMetrics`] per distinct attribute set, with a single
//! scope, and appends gauges to it.
//!
//! # Example
//! ```
//! use std::time::SystemTime;
//! use plugin_restapi_receiver::builder::{AttributeSet, MetricsBuilder};
//!
//! let mut builder = MetricsBuilder::new();
//! let attrs = AttributeSet::from_iter([("cluster_name".to_string(), "cluster1".into())]);
//! let cluster = builder.get_or_create_resource(&attrs, "my_scope", "1.0.0").unwrap();
//! builder.add_gauge_int(cluster, "total_capacity", "KiBy", 1024, SystemTime::now());
//!
//! let metrics = builder.finish();
//! assert_eq!(metrics.resource_metrics().len(), 1);
//! ```

use std::fmt;
use std::time::SystemTime;

use rustc_hash::FxHashMap;

/// The attributes that identify a resource.
///
/// The iteration order of the map is unspecified.
pub type AttributeSet = FxHashMap<String, AttributeValue>;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Double(d) => write!(f, "{d}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Error returned when a resource is created without any attribute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no attributes were provided for resource")]
pub struct InvalidResourceError;

/// Name and version of the instrumentation scope that produced some metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
}

/// The kind of a metric. Only gauges are produced by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
}

/// The value of a [`DataPoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

/// A timestamped scalar sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub value: NumberValue,
    pub timestamp: SystemTime,
}

/// A named and unit-tagged series.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub unit: String,
    pub metric_type: MetricType,
    pub data_points: Vec<DataPoint>,
}

/// The metrics of a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeMetrics {
    pub scope: InstrumentationScope,
    pub metrics: Vec<Metric>,
}

/// The metrics of a resource.
///
/// There is exactly one scope per resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMetrics {
    pub attributes: AttributeSet,
    pub scope_metrics: ScopeMetrics,
}

/// The accumulated metrics, with resources in order of creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    resource_metrics: Vec<ResourceMetrics>,
}

impl Metrics {
    pub fn resource_metrics(&self) -> &[ResourceMetrics] {
        &self.resource_metrics
    }

    pub fn is_empty(&self) -> bool {
        self.resource_metrics.is_empty()
    }

    /// Returns the total number of data points.
    pub fn data_point_count(&self) -> usize {
        self.resource_metrics
            .iter()
            .flat_map(|r| &r.scope_metrics.metrics)
            .map(|m| m.data_points.len())
            .sum()
    }
}

/// Handle to a resource created by a [`MetricsBuilder`].
///
/// A handle is only meaningful for the builder that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(usize);

/// Accumulates gauges for one collection cycle.
///
/// The builder is not synchronized: use one builder per cycle, or protect it with a lock.
#[derive(Debug, Default)]
pub struct MetricsBuilder {
    metrics: Metrics,
    resource_lookup: FxHashMap<String, ResourceId>,
}

impl MetricsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resource identified by `attributes`, creating it if needed.
    ///
    /// On creation, the attributes are copied and a scope is created with the given name and version.
    /// If the resource already exists, it is returned as is: its scope keeps the name and version
    /// given on creation.
    ///
    /// Fails if `attributes` is empty.
    pub fn get_or_create_resource(
        &mut self,
        attributes: &AttributeSet,
        scope_name: &str,
        scope_version: &str,
    ) -> Result<ResourceId, InvalidResourceError> {
        let key = resource_key(attributes);
        if key.is_empty() {
            return Err(InvalidResourceError);
        }
        if let Some(id) = self.resource_lookup.get(&key) {
            let scope = &self.metrics.resource_metrics[id.0].scope_metrics.scope;
            if scope.name != scope_name || scope.version != scope_version {
                log::warn!(
                    "resource {key} already exists with scope {}/{}, ignoring scope {scope_name}/{scope_version}",
                    scope.name,
                    scope.version
                );
            }
            return Ok(*id);
        }

        let id = ResourceId(self.metrics.resource_metrics.len());
        self.metrics.resource_metrics.push(ResourceMetrics {
            attributes: attributes.clone(),
            scope_metrics: ScopeMetrics {
                scope: InstrumentationScope {
                    name: scope_name.to_owned(),
                    version: scope_version.to_owned(),
                },
                metrics: Vec::new(),
            },
        });
        log::trace!("created resource {key}");
        self.resource_lookup.insert(key, id);
        Ok(id)
    }

    /// Appends a new integer gauge to the resource.
    ///
    /// # Panics
    /// Panics if `resource` has not been returned by this builder.
    pub fn add_gauge_int(&mut self, resource: ResourceId, name: &str, unit: &str, value: i64, timestamp: SystemTime) {
        self.push_gauge(resource, name, unit, NumberValue::Int(value), timestamp);
    }

    /// Appends a new floating-point gauge to the resource.
    ///
    /// # Panics
    /// Panics if `resource` has not been returned by this builder.
    pub fn add_gauge_double(
        &mut self,
        resource: ResourceId,
        name: &str,
        unit: &str,
        value: f64,
        timestamp: SystemTime,
    ) {
        self.push_gauge(resource, name, unit, NumberValue::Double(value), timestamp);
    }

    // Gauges with the same name are not merged, each call creates a new metric.
    fn push_gauge(&mut self, resource: ResourceId, name: &str, unit: &str, value: NumberValue, timestamp: SystemTime) {
        let scope_metrics = &mut self.metrics.resource_metrics[resource.0].scope_metrics;
        scope_metrics.metrics.push(Metric {
            name: name.to_owned(),
            unit: unit.to_owned(),
            metric_type: MetricType::Gauge,
            data_points: vec![DataPoint { value, timestamp }],
        });
    }

    /// Returns the resource behind a handle.
    ///
    /// # Panics
    /// Panics if `resource` has not been returned by this builder.
    pub fn resource(&self, resource: ResourceId) -> &ResourceMetrics {
        &self.metrics.resource_metrics[resource.0]
    }

    /// Returns the metrics accumulated so far.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Consumes the builder and returns the accumulated metrics.
    pub fn finish(self) -> Metrics {
        self.metrics
    }
}

/// Computes the deduplication key of a resource.
///
/// The key is made of the `key:value` pairs sorted by key and joined with `_`,
/// which does not depend on the order of the map.
/// Returns an empty string if there is no attribute.
pub fn resource_key(attributes: &AttributeSet) -> String {
    if attributes.is_empty() {
        return String::new();
    }
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort_unstable();

    let mut res = String::new();
    for (i, k) in keys.into_iter().enumerate() {
        if i > 0 {
            res.push('_');
        }
        res.push_str(k);
        res.push(':');
        res.push_str(&attributes[k].to_string());
    }
    res
}
