//! TOML-based configuration for sidewinder nodes.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Milliseconds between maintenance passes. Default: 1000.
    #[serde(default = "default_maintain_interval_ms")]
    pub maintain_interval_ms: u64,
    /// Frames each peer's protocol queue holds before pushes fail.
    #[serde(default = "default_proto_queue_capacity")]
    pub proto_queue_capacity: usize,
    /// Events the actor inbox buffers before senders wait.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

fn default_maintain_interval_ms() -> u64 {
    1000
}

fn default_proto_queue_capacity() -> usize {
    256
}

fn default_event_queue_capacity() -> usize {
    1024
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            maintain_interval_ms: default_maintain_interval_ms(),
            proto_queue_capacity: default_proto_queue_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// "plain" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: NodeConfig = toml::from_str(s)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NodeError> {
        if self.node.maintain_interval_ms == 0 {
            return Err(NodeError::Config(
                "maintain_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.node.proto_queue_capacity == 0 {
            return Err(NodeError::Config(
                "proto_queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.node.event_queue_capacity == 0 {
            return Err(NodeError::Config(
                "event_queue_capacity must be non-zero".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "plain" | "json" => Ok(()),
            other => Err(NodeError::Config(format!("unknown log format: {other}"))),
        }
    }

    /// The maintenance interval as a [`Duration`].
    #[must_use]
    pub fn maintain_interval(&self) -> Duration {
        Duration::from_millis(self.node.maintain_interval_ms)
    }
}
