//! Conversion of the accumulated [`Metrics`] to OpenTelemetry protobuf messages.

use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    common::v1::{AnyValue, InstrumentationScope, KeyValue, any_value},
    metrics::v1::{self as proto, Gauge, NumberDataPoint, metric::Data, number_data_point},
    resource::v1::Resource,
};

use crate::builder::{AttributeSet, AttributeValue, DataPoint, Metric, MetricType, Metrics, NumberValue};

/// Builds the request that an OTLP exporter would send for these metrics.
pub fn export_request(metrics: &Metrics) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: to_resource_metrics(metrics),
    }
}

/// Converts each resource to a `ResourceMetrics` with a single scope, in insertion order.
pub fn to_resource_metrics(metrics: &Metrics) -> Vec<proto::ResourceMetrics> {
    metrics
        .resource_metrics()
        .iter()
        .map(|rm| proto::ResourceMetrics {
            resource: Some(Resource {
                attributes: key_values(&rm.attributes),
                ..Default::default()
            }),
            scope_metrics: vec![proto::ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: rm.scope_metrics.scope.name.clone(),
                    version: rm.scope_metrics.scope.version.clone(),
                    ..Default::default()
                }),
                metrics: rm.scope_metrics.metrics.iter().map(metric).collect(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .collect()
}

fn metric(m: &Metric) -> proto::Metric {
    let data = match m.metric_type {
        MetricType::Gauge => Data::Gauge(Gauge {
            data_points: m.data_points.iter().map(data_point).collect(),
        }),
    };
    proto::Metric {
        name: m.name.clone(),
        unit: m.unit.clone(),
        data: Some(data),
        ..Default::default()
    }
}

fn data_point(dp: &DataPoint) -> NumberDataPoint {
    let value = match dp.value {
        NumberValue::Int(v) => number_data_point::Value::AsInt(v),
        NumberValue::Double(v) => number_data_point::Value::AsDouble(v),
    };
    NumberDataPoint {
        time_unix_nano: unix_nanos(dp.timestamp),
        value: Some(value),
        ..Default::default()
    }
}

fn key_values(attributes: &AttributeSet) -> Vec<KeyValue> {
    let mut kvs: Vec<KeyValue> = attributes
        .iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: Some(to_any_value(v)),
        })
        .collect();
    kvs.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    kvs
}

fn to_any_value(value: &AttributeValue) -> AnyValue {
    let value = match value {
        AttributeValue::String(s) => any_value::Value::StringValue(s.clone()),
        AttributeValue::Int(i) => any_value::Value::IntValue(*i),
        AttributeValue::Double(d) => any_value::Value::DoubleValue(*d),
        AttributeValue::Bool(b) => any_value::Value::BoolValue(*b),
    };
    AnyValue { value: Some(value) }
}

/// Nanoseconds since the epoch, saturated to the `u64` range.
fn unix_nanos(t: SystemTime) -> u64 {
    let nanos = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX)
}
