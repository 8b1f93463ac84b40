/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed and validated monitor configuration
[POS]:    Configuration layer - endpoint, symbols, reconnect and heatmap settings
[UPDATE]: When adding new configuration options
*/

use anyhow::{bail, Context};
use riskstream_adapter::{HeatmapOptions, ReconnectBackoff, StompClientConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the risk monitor
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// STOMP-over-WebSocket endpoint (ws:// or wss://)
    pub url: String,
    /// Symbols to watch, e.g. "BTCUSDT"
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub reconnect: ReconnectBackoff,
    #[serde(default = "default_resubscribe_on_reconnect")]
    pub resubscribe_on_reconnect: bool,
    #[serde(default)]
    pub heatmap: HeatmapOptions,
}

fn default_resubscribe_on_reconnect() -> bool {
    true
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {path}"))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            bail!("url must use ws:// or wss://, got {url:?}");
        }
        if self.symbols.is_empty() {
            bail!("at least one symbol must be configured");
        }
        if let Some(blank) = self.symbols.iter().position(|symbol| symbol.trim().is_empty()) {
            bail!("symbol #{blank} is empty");
        }
        if self.reconnect.base_delay_ms == 0 {
            bail!("reconnect.base_delay_ms must be positive");
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            bail!("reconnect.max_delay_ms must not be below base_delay_ms");
        }
        Ok(())
    }

    pub fn client_config(&self) -> StompClientConfig {
        StompClientConfig {
            backoff: self.reconnect,
            resubscribe_on_reconnect: self.resubscribe_on_reconnect,
        }
    }
}
