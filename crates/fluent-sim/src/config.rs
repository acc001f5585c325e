//! Simulator configuration.
//!
//! Usually built in code with [`SimulatorConfig::with_address`], but it can
//! also be loaded from YAML so a suite can share one file:
//!
//! ```yaml
//! address: "127.0.0.1:8019"
//! concurrency_limit: 32
//! cors: true
//! fail_on_unexpected_requests: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Listener address; `http://` prefixes and trailing slashes are accepted.
    #[serde(default = "default_address")]
    pub address: String,

    /// Upper bound on connections being handed to the dispatcher at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default)]
    pub cors: bool,

    /// Fail `stop` when any request matched no route.
    #[serde(default)]
    pub fail_on_unexpected_requests: bool,
}

fn default_address() -> String {
    "127.0.0.1:0".to_string()
}

fn default_concurrency_limit() -> usize {
    10
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            concurrency_limit: default_concurrency_limit(),
            cors: false,
            fail_on_unexpected_requests: false,
        }
    }
}

impl SimulatorConfig {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: SimulatorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.concurrency_limit == 0 {
            anyhow::bail!("concurrency_limit must be at least 1");
        }

        let address = self.bind_address();
        let Some((host, port)) = address.rsplit_once(':') else {
            anyhow::bail!("Address '{}' must be in host:port form", self.address);
        };
        if host.is_empty() || port.parse::<u16>().is_err() {
            anyhow::bail!("Address '{}' must be in host:port form", self.address);
        }
        Ok(())
    }

    /// Address in the form the listener binds to: no scheme, no trailing slash.
    pub fn bind_address(&self) -> &str {
        let address = self.address.trim();
        let address = address
            .strip_prefix("http://")
            .or_else(|| address.strip_prefix("HTTP://"))
            .unwrap_or(address);
        address.trim_end_matches('/')
    }
}
