//! Render rate control for viewer state streams

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often a viewer state stream yields to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every state change as it happens
    #[default]
    Native,

    /// At most this many states per second, newest wins.
    /// `Max(0)` is treated as Native.
    Max(u32),
}

impl UpdateRate {
    /// Rate for an optional Hz cap, as found in configuration
    pub fn from_max_hz(hz: Option<u32>) -> Self {
        match hz {
            Some(hz) if hz > 0 => UpdateRate::Max(hz),
            _ => UpdateRate::Native,
        }
    }

    /// Minimum spacing between yielded states, if pacing applies
    pub fn pacing_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
