// Scraping of the REST API.

use std::time::SystemTime;

use crate::builder::{AttributeSet, InvalidResourceError, Metrics, MetricsBuilder};
use crate::http::ApiClient;

pub const SCOPE_NAME: &str = "alumet/restapi-receiver";
pub const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const METRIC_TOTAL_CAPACITY: &str = "total_capacity";
pub const METRIC_USED_CAPACITY: &str = "used_capacity";
pub const UNIT_KIBIBYTE: &str = "KiBy";

const ATTR_CLUSTER_NAME: &str = "cluster_name";
const ATTR_NODE_NAME: &str = "node_name";
const ATTR_IP: &str = "ip";

pub struct RestApiScraper {
    client: ApiClient,
    endpoint: String,
}

impl RestApiScraper {
    pub fn new(client: ApiClient, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// Collects the metrics of one cycle.
    ///
    /// The request to the endpoint is prepared but not sent yet: the scraper
    /// returns the measurements of [`example_metrics`].
    pub fn scrape(&mut self, timestamp: SystemTime) -> anyhow::Result<Metrics> {
        let request = self.client.new_get_request(&self.endpoint)?;
        log::trace!("prepared {request:?}");
        log::warn!("scraping {} is not implemented, returning example metrics", self.endpoint);
        let metrics = example_metrics(timestamp)?;
        log::debug!(
            "scraped {} data points on {} resources",
            metrics.data_point_count(),
            metrics.resource_metrics().len()
        );
        Ok(metrics)
    }
}

/// Example capacity measurements of a cluster made of two nodes (in KiB).
pub fn example_metrics(timestamp: SystemTime) -> Result<Metrics, InvalidResourceError> {
    let cluster_name = "cluster1";
    let nodes: [(&str, &str, i64, i64); 2] = [
        ("node1", "10.10.1.20", 2 * 1024 * 1024 * 1024, 67 * 1024 * 1024),
        ("node2", "10.10.1.21", 1024 * 1024 * 1024, 25 * 1024 * 1024),
    ];
    let cluster_capacity: i64 = nodes.iter().map(|n| n.2).sum();
    let cluster_usage: i64 = nodes.iter().map(|n| n.3).sum();

    let mut builder = MetricsBuilder::new();

    let cluster_attrs = AttributeSet::from_iter([(ATTR_CLUSTER_NAME.to_owned(), cluster_name.into())]);
    let cluster = builder.get_or_create_resource(&cluster_attrs, SCOPE_NAME, SCOPE_VERSION)?;
    builder.add_gauge_int(cluster, METRIC_TOTAL_CAPACITY, UNIT_KIBIBYTE, cluster_capacity, timestamp);
    builder.add_gauge_int(cluster, METRIC_USED_CAPACITY, UNIT_KIBIBYTE, cluster_usage, timestamp);

    for (node_name, ip, capacity, usage) in nodes {
        let node_attrs = AttributeSet::from_iter([
            (ATTR_CLUSTER_NAME.to_owned(), cluster_name.into()),
            (ATTR_NODE_NAME.to_owned(), node_name.into()),
            (ATTR_IP.to_owned(), ip.into()),
        ]);
        let node = builder.get_or_create_resource(&node_attrs, SCOPE_NAME, SCOPE_VERSION)?;
        builder.add_gauge_int(node, METRIC_TOTAL_CAPACITY, UNIT_KIBIBYTE, capacity, timestamp);
        builder.add_gauge_int(node, METRIC_USED_CAPACITY, UNIT_KIBIBYTE, usage, timestamp);
    }

    Ok(builder.finish())
}
