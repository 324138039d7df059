use std::time::Duration;

use alumet::{
    agent::{
        self,
        plugin::{PluginInfo, PluginSet},
    },
    measurement::MeasurementPoint,
    pipeline::naming::SourceName,
    plugin::PluginMetadata,
    resources::Resource,
    test::{RuntimeExpectations, StartupExpectations},
    units::Unit,
};
use plugin_restapi_receiver::{RestApiReceiverPlugin, config::Config};

const TIMEOUT: Duration = Duration::from_secs(5);
const PLUGIN_NAME: &str = "restapi-receiver";
const SOURCE_NAME: &str = "scraper";
const METRIC_TOTAL: &str = "total_capacity";
const METRIC_USED: &str = "used_capacity";

const MEBI: u64 = 1024 * 1024;
const GIBI: u64 = 1024 * 1024 * 1024;

fn kibibyte() -> Unit {
    Unit::Custom {
        unique_name: String::from("KiBy"),
        display_name: String::from("KiB"),
    }
}

fn plugins_with_config(config: &Config) -> PluginSet {
    let mut plugins = PluginSet::new();
    plugins.add_plugin(PluginInfo {
        metadata: PluginMetadata::from_static::<RestApiReceiverPlugin>(),
        enabled: true,
        config: Some(config_to_toml_table(config)),
    });
    plugins
}

fn attribute(point: &MeasurementPoint, key: &str) -> Option<String> {
    point.attributes().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
}

fn resource_id(point: &MeasurementPoint) -> &str {
    match &point.resource {
        Resource::Custom { kind, id } => {
            assert_eq!(kind, "restapi");
            id
        }
        other => panic!("unexpected resource {other:?}"),
    }
}

#[test]
fn scrape_example_cluster() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Config {
        poll_interval: Duration::from_secs(1),
        endpoint: String::from("http://localhost:8080/stats"),
        auth_token: Some(String::from("Bearer token")),
        username: None,
        password: None,
    };
    let plugins = plugins_with_config(&config);

    let startup_expectation = StartupExpectations::new()
        .expect_metric::<u64>(METRIC_TOTAL, kibibyte())
        .expect_metric::<u64>(METRIC_USED, kibibyte())
        .expect_source(PLUGIN_NAME, SOURCE_NAME);

    let runtime_expectation = RuntimeExpectations::new().test_source(
        SourceName::from_str(PLUGIN_NAME, SOURCE_NAME),
        || {},
        |ctx| {
            let m = ctx.measurements();
            assert_eq!(m.len(), 6);

            let value_of = |metric_name: &str, resource: &str| {
                let metric = ctx.metrics().by_name(metric_name).unwrap().0;
                let p = m
                    .iter()
                    .find(|p| p.metric == metric && resource_id(p) == resource)
                    .unwrap_or_else(|| panic!("no {metric_name} for resource {resource}"));
                p.value.as_u64()
            };

            let cluster = "cluster_name:cluster1";
            let node1 = "cluster_name:cluster1_ip:10.10.1.20_node_name:node1";
            let node2 = "cluster_name:cluster1_ip:10.10.1.21_node_name:node2";
            assert_eq!(value_of(METRIC_TOTAL, cluster), 3 * GIBI);
            assert_eq!(value_of(METRIC_USED, cluster), 92 * MEBI);
            assert_eq!(value_of(METRIC_TOTAL, node1), 2 * GIBI);
            assert_eq!(value_of(METRIC_USED, node1), 67 * MEBI);
            assert_eq!(value_of(METRIC_TOTAL, node2), GIBI);
            assert_eq!(value_of(METRIC_USED, node2), 25 * MEBI);

            for p in m.iter() {
                assert_eq!(attribute(p, "cluster_name").as_deref(), Some("cluster1"));
                match resource_id(p) {
                    id if id == node1 => {
                        assert_eq!(attribute(p, "node_name").as_deref(), Some("node1"));
                        assert_eq!(attribute(p, "ip").as_deref(), Some("10.10.1.20"));
                    }
                    id if id == node2 => {
                        assert_eq!(attribute(p, "node_name").as_deref(), Some("node2"));
                        assert_eq!(attribute(p, "ip").as_deref(), Some("10.10.1.21"));
                    }
                    _ => assert_eq!(p.attributes_len(), 1),
                }
            }
        },
    );

    let agent = agent::Builder::new(plugins)
        .with_expectations(startup_expectation)
        .with_expectations(runtime_expectation)
        .build_and_start()
        .unwrap();

    agent.wait_for_shutdown(TIMEOUT).unwrap();
}

#[test]
fn plugin_without_credentials() {
    let config = Config {
        poll_interval: Duration::from_secs(1),
        endpoint: String::from("http://localhost:8080/stats"),
        auth_token: None,
        username: Some(String::from("user")),
        password: None,
    };
    let plugins = plugins_with_config(&config);

    let agent = agent::Builder::new(plugins).build_and_start();
    assert!(agent.is_err(), "the plugin should fail to start without credentials");
}

#[test]
fn plugin_with_invalid_endpoint() {
    let config = Config {
        poll_interval: Duration::from_secs(1),
        endpoint: String::new(),
        auth_token: Some(String::from("token")),
        username: None,
        password: None,
    };
    let plugins = plugins_with_config(&config);

    let agent = agent::Builder::new(plugins).build_and_start();
    assert!(agent.is_err(), "the plugin should fail to start without an endpoint");
}

fn config_to_toml_table(config: &Config) -> toml::Table {
    toml::Value::try_from(config).unwrap().as_table().unwrap().clone()
}
