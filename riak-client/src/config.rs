//! Client configuration

use serde::{Deserialize, Serialize};

use crate::{ClientError, Result};

/// Connection settings for a Riak node's HTTP interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix of the key/value resource, e.g. `/riak/`.
    pub prefix: String,
    /// Sent as `X-Riak-ClientId` with every request.
    pub client_id: String,
    /// Server version used for capability checks. When absent every
    /// capability is assumed until [`crate::Client::detect_server_version`]
    /// runs.
    pub server_version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 8098,
            prefix: "/riak/".to_string(),
            client_id: generate_client_id(),
            server_version: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Load settings from a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json)
            .map_err(|e| ClientError::Config(format!("invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = Some(version.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must not be 0".to_string()));
        }
        if !self.prefix.starts_with('/') {
            return Err(ClientError::Config(format!(
                "prefix '{}' must start with '/'",
                self.prefix
            )));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn generate_client_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}
