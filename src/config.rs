//! Viewer configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```yaml
//! base_url: wss://console.example.com/ws
//! connect_timeout_ms: 5000
//! stale_after_ms: 15000
//! max_frame_bytes: 4194304
//! max_render_hz: 15
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::UpdateRate;
use crate::{Result, StreamError};

/// Settings shared by every stream connection a viewer opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// `ws://` or `wss://` prefix; `/stream/<id>?token=...` is appended
    pub base_url: String,

    pub connect_timeout_ms: u64,

    /// Fail an open connection that receives no frame for this long.
    /// Disabled when absent.
    pub stale_after_ms: Option<u64>,

    /// Binary messages larger than this are ignored
    pub max_frame_bytes: usize,

    /// Cap on how often paced state streams yield
    pub max_render_hz: Option<u32>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000/ws".to_string(),
            connect_timeout_ms: 10_000,
            stale_after_ms: None,
            max_frame_bytes: 8 * 1024 * 1024,
            max_render_hz: None,
        }
    }
}

impl ViewerConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| StreamError::Io { path: path.to_path_buf(), source })?;
        debug!("Loaded viewer config from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("ws://") || base.starts_with("wss://")) {
            return Err(StreamError::config_error(format!(
                "base_url must start with ws:// or wss:// (got '{}')",
                self.base_url
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StreamError::config_error("connect_timeout_ms must be greater than 0"));
        }
        if self.stale_after_ms == Some(0) {
            return Err(StreamError::config_error("stale_after_ms must be greater than 0"));
        }
        if self.max_frame_bytes == 0 {
            return Err(StreamError::config_error("max_frame_bytes must be greater than 0"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }

    pub fn render_rate(&self) -> UpdateRate {
        UpdateRate::from_max_hz(self.max_render_hz)
    }
}
