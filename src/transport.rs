//! Transport traits and connect target construction

use std::fmt;

use url::Url;

use crate::types::{CameraRef, Credential};
use crate::{Result, StreamError};

/// Address of one camera's frame feed.
///
/// `<base_url>/stream/<camera id>?token=<credential>`. The credential
/// travels in the query string because the transport cannot send custom
/// headers at connect time. `Debug` and [`redacted`](Self::redacted) omit it.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamTarget {
    url: Url,
    camera_id: i64,
}

impl StreamTarget {
    pub fn new(base_url: &str, camera: &CameraRef, credential: &Credential) -> Result<Self> {
        let mut url = Url::parse(base_url.trim())?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::invalid_target(format!(
                "unsupported scheme '{}' (expected ws or wss)",
                url.scheme()
            )));
        }

        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| StreamError::invalid_target("base_url cannot carry a path"))?
            .pop_if_empty()
            .push("stream")
            .push(&camera.id.to_string());
        url.query_pairs_mut().append_pair("token", credential.expose());

        Ok(Self { url, camera_id: camera.id })
    }

    /// Full target including the credential
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn camera_id(&self) -> i64 {
        self.camera_id
    }

    /// The target without its query string, safe to log
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }
}

impl fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTarget")
            .field("url", &self.redacted())
            .field("camera_id", &self.camera_id)
            .finish()
    }
}

/// Close frame sent by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// One inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One image frame
    Binary(Vec<u8>),

    /// Not part of the feed protocol; ignored by the viewer
    Text(String),

    /// The peer closed the connection, with its close frame if it sent one
    Closed(Option<CloseInfo>),
}

/// An established connection to a frame feed.
///
/// Implementations absorb protocol-level control traffic (ping/pong) and
/// surface only the events above.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Wait for the next event
    ///
    /// Returns:
    /// - `Ok(Some(event))` - Event received
    /// - `Ok(None)` - Stream ended without a close frame
    /// - `Err(e)` - Network or protocol failure
    async fn next_event(&mut self) -> Result<Option<TransportEvent>>;

    /// Close the connection. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Opens transports to stream targets
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, target: &StreamTarget) -> Result<Box<dyn Transport>>;
}
