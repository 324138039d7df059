// Alumet source that scrapes the REST API and turns the gauges into measurement points.

use std::borrow::Cow;
use std::time::SystemTime;

use alumet::{
    measurement::{AttributeValue as PointAttribute, MeasurementAccumulator, MeasurementPoint, Timestamp},
    metrics::TypedMetricId,
    pipeline::elements::{error::PollError, source::Source},
    resources::{Resource, ResourceConsumer},
};
use rustc_hash::FxHashMap;

use crate::builder::{AttributeValue, Metrics, NumberValue, resource_key};
use crate::scraper::RestApiScraper;

const RESOURCE_KIND: &str = "restapi";

pub struct RestApiSource {
    scraper: RestApiScraper,
    /// Alumet metrics, by gauge name.
    metrics: FxHashMap<String, TypedMetricId<u64>>,
}

impl RestApiSource {
    pub fn new(scraper: RestApiScraper, metrics: FxHashMap<String, TypedMetricId<u64>>) -> Self {
        Self { scraper, metrics }
    }

    fn push_points(&self, scraped: &Metrics, measurements: &mut MeasurementAccumulator) {
        for resource_metrics in scraped.resource_metrics() {
            let resource = Resource::Custom {
                kind: Cow::Borrowed(RESOURCE_KIND),
                id: Cow::Owned(resource_key(&resource_metrics.attributes)),
            };

            let mut attributes: Vec<(&String, &AttributeValue)> = resource_metrics.attributes.iter().collect();
            attributes.sort_unstable_by_key(|(k, _)| *k);

            for metric in &resource_metrics.scope_metrics.metrics {
                let Some(&metric_id) = self.metrics.get(&metric.name) else {
                    log::warn!("unknown metric {}, its data points are ignored", metric.name);
                    continue;
                };
                for data_point in &metric.data_points {
                    let timestamp = Timestamp::from(data_point.timestamp);
                    let Some(value) = as_u64(data_point.value) else {
                        log::warn!(
                            "value {:?} of metric {} is not a valid u64, the data point is ignored",
                            data_point.value,
                            metric.name
                        );
                        continue;
                    };
                    let consumer = ResourceConsumer::LocalMachine;
                    let point = MeasurementPoint::new(timestamp, metric_id, resource.clone(), consumer, value);
                    let point = attributes
                        .iter()
                        .fold(point, |p, (k, v)| p.with_attr((*k).clone(), point_attribute(v)));
                    measurements.push(point);
                }
            }
        }
    }
}

impl Source for RestApiSource {
    fn poll(&mut self, measurements: &mut MeasurementAccumulator, timestamp: Timestamp) -> Result<(), PollError> {
        let scraped = self
            .scraper
            .scrape(SystemTime::from(timestamp))
            .map_err(|e| PollError::CanRetry(e.context("failed to scrape the REST API")))?;
        self.push_points(&scraped, measurements);
        Ok(())
    }
}

fn as_u64(value: NumberValue) -> Option<u64> {
    match value {
        NumberValue::Int(v) => u64::try_from(v).ok(),
        NumberValue::Double(_) => None,
    }
}

fn point_attribute(value: &AttributeValue) -> PointAttribute {
    match value {
        AttributeValue::String(s) => PointAttribute::String(s.clone()),
        AttributeValue::Int(i) => match u64::try_from(*i) {
            Ok(u) => PointAttribute::U64(u),
            Err(_) => PointAttribute::String(i.to_string()),
        },
        AttributeValue::Double(d) => PointAttribute::F64(*d),
        AttributeValue::Bool(b) => PointAttribute::Bool(*b),
    }
}
