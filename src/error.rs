//! Error types for camera stream viewing.
//!
//! All failures are local to one stream connection. They never escape
//! [`StreamConnection::open`](crate::StreamConnection::open) as a `Result`;
//! instead they are projected into a [`Fault`] and published through
//! [`ViewerState`](crate::ViewerState). `Result` is only returned by the
//! operations that can fail synchronously: configuration loading and target
//! construction.
//!
//! ## Error Categories
//!
//! - **Precondition Errors**: no camera selected or no access token at connect time
//! - **Transport Errors**: handshake, network or protocol failures
//! - **Peer Close**: the camera backend ended the stream (close code + reason)
//! - **Payload Errors**: messages that are not usable frames (ignored, never fatal)
//! - **Timing Errors**: connect timeout and the optional staleness watchdog
//! - **Configuration Errors**: invalid YAML or invalid settings
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use camfeed::StreamError;
//!
//! let error = StreamError::transport_failed("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use serde::{Deserialize, Serialize};

/// Result type alias for stream operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for stream operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("No access token available at connect time")]
    AuthMissing,

    #[error("No camera selected")]
    CameraMissing,

    #[error("Invalid stream target: {reason}")]
    InvalidTarget { reason: String },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Stream closed by peer (code {code:?}): {reason}")]
    PeerClosed { code: Option<u16>, reason: String },

    #[error("Malformed payload ignored: {details}")]
    MalformedPayload { details: String },

    #[error("Connection attempt timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("No frames received for {idle:?}")]
    Stale { idle: Duration },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Returns whether re-opening the stream may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { .. } => true,
            StreamError::PeerClosed { .. } => true,
            StreamError::Timeout { .. } => true,
            StreamError::Stale { .. } => true,
            StreamError::AuthMissing => false,
            StreamError::CameraMissing => false,
            StreamError::InvalidTarget { .. } => false,
            StreamError::MalformedPayload { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::Io { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::AuthMissing => {
                vec!["Log in again to obtain an access token", "Check that the session has not expired"]
            }
            StreamError::CameraMissing => vec!["Select a camera before opening the stream"],
            StreamError::InvalidTarget { .. } => vec![
                "Check that base_url starts with ws:// or wss://",
                "Check that base_url has a host",
            ],
            StreamError::Transport { .. } => vec![
                "Check that the streaming backend is reachable",
                "Verify the access token is still valid",
                "Reconnect to the camera",
            ],
            StreamError::PeerClosed { .. } => vec![
                "Check that the camera is active and online",
                "Verify access to this camera",
                "Select the camera again to reconnect",
            ],
            StreamError::MalformedPayload { .. } => {
                vec!["Check that the backend sends one binary image per message"]
            }
            StreamError::Timeout { .. } => vec![
                "Increase connect_timeout_ms",
                "Check network latency to the streaming backend",
            ],
            StreamError::Stale { .. } => vec![
                "Check that the camera source is still producing frames",
                "Increase stale_after_ms or disable the watchdog",
            ],
            StreamError::Config { .. } => vec!["Check the viewer configuration file"],
            StreamError::Io { .. } => vec!["Check the file exists and is readable"],
        }
    }

    /// Project this error into the cloneable form carried by `ViewerState`.
    pub fn fault(&self) -> Fault {
        let kind = match self {
            StreamError::AuthMissing => FaultKind::AuthMissing,
            StreamError::CameraMissing => FaultKind::CameraMissing,
            StreamError::InvalidTarget { .. } => FaultKind::InvalidTarget,
            StreamError::Transport { .. } => FaultKind::Transport,
            StreamError::PeerClosed { .. } => FaultKind::PeerClosed,
            StreamError::MalformedPayload { .. } => FaultKind::MalformedPayload,
            StreamError::Timeout { .. } => FaultKind::Timeout,
            StreamError::Stale { .. } => FaultKind::Stale,
            StreamError::Config { .. } | StreamError::Io { .. } => FaultKind::Config,
        };
        let close_code = match self {
            StreamError::PeerClosed { code, .. } => *code,
            _ => None,
        };
        Fault { kind, message: self.to_string(), close_code }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for peer-initiated closes.
    pub fn peer_closed(code: Option<u16>, reason: impl Into<String>) -> Self {
        StreamError::PeerClosed { code, reason: reason.into() }
    }

    /// Helper constructor for ignored payloads.
    pub fn malformed_payload(details: impl Into<String>) -> Self {
        StreamError::MalformedPayload { details: details.into() }
    }

    /// Helper constructor for invalid connect targets.
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        StreamError::InvalidTarget { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        StreamError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Config { reason: reason.into(), source: Some(source) }
    }
}

impl From<serde_yaml_ng::Error> for StreamError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        StreamError::config_error_with_source("invalid YAML", Box::new(err))
    }
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        StreamError::invalid_target(err.to_string())
    }
}

/// Classification of a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    AuthMissing,
    CameraMissing,
    InvalidTarget,
    Transport,
    PeerClosed,
    MalformedPayload,
    Timeout,
    Stale,
    Config,
}

/// Cloneable summary of the error that ended a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    /// WebSocket close code, for peer-initiated closes.
    pub close_code: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            code in proptest::option::of(1000u16..5000u16),
            idle_ms in 1u64..60000u64
          ) {
            let transport = StreamError::transport_failed(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));

            let closed = StreamError::peer_closed(code, reason.clone());
            prop_assert!(closed.to_string().contains(&reason));
            prop_assert_eq!(closed.fault().close_code, code);

            let stale = StreamError::Stale { idle: Duration::from_millis(idle_ms) };
            prop_assert!(!stale.to_string().is_empty());
            prop_assert_eq!(stale.fault().kind, FaultKind::Stale);
          }
        }
    }

    #[test]
    fn retry_classification() {
        assert!(StreamError::transport_failed("refused").is_retryable());
        assert!(StreamError::peer_closed(Some(1008), "Camera is inactive").is_retryable());
        assert!(!StreamError::AuthMissing.is_retryable());
        assert!(!StreamError::config_error("bad").is_retryable());

        for error in [
            StreamError::AuthMissing,
            StreamError::CameraMissing,
            StreamError::transport_failed("x"),
            StreamError::Timeout { duration: Duration::from_secs(1) },
        ] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn fault_projection() {
        let fault = StreamError::AuthMissing.fault();
        assert_eq!(fault.kind, FaultKind::AuthMissing);
        assert_eq!(fault.close_code, None);

        let fault = StreamError::peer_closed(Some(1011), "Could not open video stream").fault();
        assert_eq!(fault.kind, FaultKind::PeerClosed);
        assert_eq!(fault.close_code, Some(1011));
        assert!(fault.message.contains("Could not open video stream"));
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::other("connection reset");
        let error = StreamError::transport_failed_with_source("read failed", Box::new(io));
        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        let converted: StreamError = err.into();
        assert!(matches!(converted, StreamError::Config { source: Some(_), .. }));
    }
}
