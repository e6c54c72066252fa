//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (any format the `config` crate understands, picked by extension), then
//! `PIPEWATCH_*` environment variables. Command-line flags are applied on top
//! by the binary.
//!
//! ```toml
//! stream_url = "ws://pipelines.internal:8765"
//! api_base = "http://pipelines.internal:8000"
//! pipeline_id = "etl-7"
//! connect_timeout_ms = 5000
//! reconnect_delay_ms = 3000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::link::{LinkOptions, Timings};

/// Prefix for environment overrides, e.g. `PIPEWATCH_PIPELINE_ID`.
pub const ENV_PREFIX: &str = "PIPEWATCH";

/// Everything needed to reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Streaming channel address.
    pub stream_url: String,
    /// Base address of the request/response channel.
    pub api_base: String,
    /// Initial subscription identifier.
    pub pipeline_id: String,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub query_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stream_url: "ws://localhost:8765".to_string(),
            api_base: "http://localhost:8000".to_string(),
            pipeline_id: "default".to_string(),
            connect_timeout_ms: 5000,
            reconnect_delay_ms: 3000,
            query_timeout_ms: 10_000,
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the link cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.stream_url.starts_with("ws://") || self.stream_url.starts_with("wss://")) {
            bail!("stream_url must be a ws:// or wss:// address, got '{}'", self.stream_url);
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            bail!("api_base must be an http:// or https:// address, got '{}'", self.api_base);
        }
        if self.pipeline_id.trim().is_empty() {
            bail!("pipeline_id must not be empty");
        }
        if self.connect_timeout_ms == 0 || self.reconnect_delay_ms == 0 {
            bail!("connect_timeout_ms and reconnect_delay_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Connection options for the status link.
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions::new(&self.stream_url, &self.pipeline_id).timings(self.timings())
    }
}
