//! REST API receiver plugin for Alumet.
//!
//! The plugin periodically scrapes a REST API, accumulates the scraped values
//! with a [`builder::MetricsBuilder`] and pushes them to the Alumet pipeline.

use alumet::{
    pipeline::elements::source::trigger::TriggerSpec,
    plugin::{
        AlumetPluginStart, ConfigTable,
        rust::{AlumetPlugin, deserialize_config, serialize_config},
    },
    units::Unit,
};
use anyhow::Context;
use rustc_hash::FxHashMap;

pub mod builder;
pub mod config;
pub mod http;
pub mod otlp;
mod scraper;
mod source;

use crate::config::Config;
use crate::http::ApiClient;
use crate::scraper::{METRIC_TOTAL_CAPACITY, METRIC_USED_CAPACITY, RestApiScraper, UNIT_KIBIBYTE};
use crate::source::RestApiSource;

pub struct RestApiReceiverPlugin {
    config: Config,
}

impl AlumetPlugin for RestApiReceiverPlugin {
    fn name() -> &'static str {
        "restapi-receiver"
    }

    fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn default_config() -> anyhow::Result<Option<ConfigTable>> {
        Ok(Some(serialize_config(Config::default())?))
    }

    fn init(config: ConfigTable) -> anyhow::Result<Box<Self>> {
        let config: Config = deserialize_config(config)?;
        config.validate()?;
        Ok(Box::new(RestApiReceiverPlugin { config }))
    }

    fn start(&mut self, alumet: &mut AlumetPluginStart) -> anyhow::Result<()> {
        log::info!("Scraping {} every {:?}", self.config.endpoint, self.config.poll_interval);

        let unit = Unit::Custom {
            unique_name: UNIT_KIBIBYTE.to_string(),
            display_name: String::from("KiB"),
        };
        let total_capacity = alumet.create_metric::<u64>(
            METRIC_TOTAL_CAPACITY,
            unit.clone(),
            "Total storage capacity of the resource",
        )?;
        let used_capacity =
            alumet.create_metric::<u64>(METRIC_USED_CAPACITY, unit, "Used storage capacity of the resource")?;
        let metrics = FxHashMap::from_iter([
            (METRIC_TOTAL_CAPACITY.to_string(), total_capacity),
            (METRIC_USED_CAPACITY.to_string(), used_capacity),
        ]);

        let client = prepare_client(&self.config)?;
        let scraper = RestApiScraper::new(client, self.config.endpoint.clone());
        let source = RestApiSource::new(scraper, metrics);
        alumet.add_source(
            "scraper",
            Box::new(source),
            TriggerSpec::at_interval(self.config.poll_interval),
        )?;
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Creates an HTTP client that authenticates with the token if there is one,
/// or with the username and password otherwise.
fn prepare_client(config: &Config) -> anyhow::Result<ApiClient> {
    let mut client = ApiClient::new();
    match (&config.auth_token, &config.username, &config.password) {
        (Some(token), _, _) if !token.is_empty() => {
            client.set_auth_token(token).context("invalid auth_token")?;
        }
        (_, Some(username), Some(password)) => {
            client
                .set_basic_auth(username, password)
                .context("invalid username or password")?;
        }
        _ => log::warn!("No credentials provided, requests will not be authenticated"),
    }
    Ok(client)
}
