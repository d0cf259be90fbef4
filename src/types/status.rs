//! Connection lifecycle and the derived viewer state

use serde::{Deserialize, Serialize};

use super::{CameraRef, Frame};
use crate::Fault;

/// Lifecycle of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ConnectionState {
    /// Closed and Failed accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewerStatus {
    Connecting,
    Streaming,
    Disconnected,
    Error,
}

impl ViewerStatus {
    /// Derive the viewer status from the connection state and whether a
    /// frame is currently installed.
    pub fn derive(connection: ConnectionState, has_frame: bool) -> Self {
        match connection {
            ConnectionState::Idle => ViewerStatus::Disconnected,
            ConnectionState::Connecting => ViewerStatus::Connecting,
            // waiting for frames
            ConnectionState::Open if !has_frame => ViewerStatus::Connecting,
            ConnectionState::Open => ViewerStatus::Streaming,
            ConnectionState::Closed => ViewerStatus::Disconnected,
            ConnectionState::Failed => ViewerStatus::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ViewerStatus::Disconnected | ViewerStatus::Error)
    }
}

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StreamStats {
    pub frames_received: u64,
    pub bytes_received: u64,
    /// Text, empty or oversized messages that were dropped
    pub ignored_messages: u64,
}

/// Read-only projection handed to the presentation layer.
///
/// Recomputed on every connection transition and every frame installation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub status: ViewerStatus,
    pub connection: ConnectionState,
    pub camera: Option<CameraRef>,
    pub current_frame: Option<Frame>,
    /// Why the connection ended, when it did not end by local close
    pub fault: Option<Fault>,
    pub stats: StreamStats,
}

impl ViewerState {
    /// State before any camera is selected
    pub fn idle() -> Self {
        Self {
            status: ViewerStatus::derive(ConnectionState::Idle, false),
            connection: ConnectionState::Idle,
            camera: None,
            current_frame: None,
            fault: None,
            stats: StreamStats::default(),
        }
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation_table() {
        use ConnectionState::*;

        assert_eq!(ViewerStatus::derive(Idle, false), ViewerStatus::Disconnected);
        for has_frame in [false, true] {
            assert_eq!(ViewerStatus::derive(Connecting, has_frame), ViewerStatus::Connecting);
            assert_eq!(ViewerStatus::derive(Closed, has_frame), ViewerStatus::Disconnected);
            assert_eq!(ViewerStatus::derive(Failed, has_frame), ViewerStatus::Error);
        }
        assert_eq!(ViewerStatus::derive(Open, false), ViewerStatus::Connecting);
        assert_eq!(ViewerStatus::derive(Open, true), ViewerStatus::Streaming);
    }

    #[test]
    fn status_serializes_in_upper_case() -> anyhow::Result<()> {
        assert_eq!(serde_yaml_ng::to_string(&ViewerStatus::Streaming)?.trim(), "STREAMING");
        Ok(())
    }

    #[test]
    fn idle_state_is_empty() {
        let state = ViewerState::default();
        assert_eq!(state.connection, ConnectionState::Idle);
        assert!(state.current_frame.is_none());
        assert!(!ConnectionState::Open.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
    }
}
