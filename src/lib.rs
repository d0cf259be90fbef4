//! Live camera stream viewer core.
//!
//! camfeed opens one WebSocket per camera, receives an unbounded sequence of
//! binary image frames, and keeps only the newest one on display while
//! reporting connection status to the presentation layer.
//!
//! # Features
//!
//! - **Latest frame only**: one live display handle per connection, released
//!   as soon as the next frame replaces it
//! - **Explicit teardown**: `close()` (or drop) releases the frame and stops
//!   the transport; late events are ignored
//! - **Derived status**: `CONNECTING`, `STREAMING`, `DISCONNECTED`, `ERROR`
//!   published through a watch channel or a paced stream
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use camfeed::{CameraRef, Camfeed, SharedCredential, ViewerConfig, ViewerStatus};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> camfeed::Result<()> {
//!     let config = ViewerConfig::load("viewer.yaml")?;
//!     let login = SharedCredential::new();
//!     login.login("access-token");
//!
//!     let mut viewer = Camfeed::viewer(config, login.clone());
//!     viewer.select(CameraRef::new(42, "Lobby"));
//!
//!     let mut updates = viewer.updates();
//!     while let Some(state) = updates.next().await {
//!         match (state.status, &state.current_frame) {
//!             (ViewerStatus::Streaming, Some(frame)) => println!("show {}", frame.handle),
//!             (status, _) => println!("placeholder: {:?}", status),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod config;
mod error;
pub mod frame_buffer;
mod session;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Connection architecture
pub mod connection;
mod driver;
pub mod stream;
pub mod transport;
pub mod transports;
pub mod viewer;

// Core exports
pub use config::ViewerConfig;
pub use error::*;
pub use frame_buffer::{FrameBuffer, HandleRegistry};
pub use session::StreamSession;
pub use types::*;

// Main API exports
pub use connection::{StreamConnection, StreamOptions};
pub use transport::{CloseInfo, Connector, StreamTarget, Transport, TransportEvent};
pub use transports::WebSocketConnector;
pub use viewer::StreamViewer;

/// Unified entry point for camera stream viewing.
///
/// ```rust,no_run
/// use camfeed::{CameraRef, Camfeed, Credential, ViewerConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let connection = Camfeed::open(
///     CameraRef::new(42, "Lobby"),
///     Credential::new("access-token"),
///     ViewerConfig::default(),
/// );
/// println!("{:?}", connection.state().status);
/// connection.close();
/// # }
/// ```
pub struct Camfeed;

impl Camfeed {
    /// Create a viewer that reads tokens from `credentials` and connects
    /// over WebSocket.
    pub fn viewer<P: CredentialProvider>(config: ViewerConfig, credentials: P) -> StreamViewer<P> {
        StreamViewer::new(credentials, StreamOptions::new(config))
    }

    /// Open a single camera feed over WebSocket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(camera: CameraRef, credential: Credential, config: ViewerConfig) -> StreamConnection {
        StreamConnection::open(Some(camera), Some(credential), &StreamOptions::new(config))
    }
}
