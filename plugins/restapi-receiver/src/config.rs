use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Interval between two scrapes of the API.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// URL of the REST API to scrape.
    pub endpoint: String,

    /// Value of the `Authorization` header, sent as is.
    /// Takes precedence over `username` and `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Credentials for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            endpoint: String::from("http://localhost:8080"),
            auth_token: None,
            username: Some(String::from("TODO")),
            password: Some(String::from("TODO")),
        }
    }
}

impl Config {
    /// Checks that the endpoint and some credentials are provided.
    ///
    /// All the problems are reported at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        if self.endpoint.is_empty() {
            errors.push("'endpoint' is required");
        }
        if is_blank(&self.auth_token) && (is_blank(&self.username) || is_blank(&self.password)) {
            errors.push("either of 'auth_token' or 'username'+'password' are required");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Config validation failed: {}", errors.join(", ")))
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}
