//! Live stream connection to one camera

use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::{Driver, DriverSettings};
use crate::frame_buffer::HandleRegistry;
use crate::session::{SharedSession, StreamSession};
use crate::stream::state_stream;
use crate::transport::{Connector, StreamTarget};
use crate::transports::WebSocketConnector;
use crate::types::{CameraRef, ConnectionState, Credential, UpdateRate, ViewerState};
use crate::{StreamError, ViewerConfig};

/// Everything a connection needs besides the camera and credential
#[derive(Clone)]
pub struct StreamOptions {
    config: ViewerConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<HandleRegistry>,
}

impl StreamOptions {
    /// WebSocket transport with a fresh handle registry
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            connector: Arc::new(WebSocketConnector),
            registry: Arc::new(HandleRegistry::new()),
        }
    }

    /// Connect through `connector` instead of WebSocket
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Allocate display handles from a registry shared with the presentation layer
    pub fn with_registry(mut self, registry: Arc<HandleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Configuration connections are opened with
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Registry new connections allocate display handles from
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions").field("config", &self.config).finish_non_exhaustive()
    }
}

/// One camera feed, from open until close.
///
/// Created by [`open`](Self::open), which never fails synchronously: every
/// outcome, including a missing camera or token, is published as a
/// [`ViewerState`]. [`close`](Self::close) (or dropping the connection)
/// releases the held frame and stops the transport.
pub struct StreamConnection {
    camera: Option<CameraRef>,
    session: Arc<SharedSession>,
    states: watch::Receiver<ViewerState>,
    registry: Arc<HandleRegistry>,
    render_rate: UpdateRate,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamConnection {
    /// Open the feed of `camera` using `credential`.
    ///
    /// Must be called from within a Tokio runtime. Without a camera or a
    /// non-empty credential the connection fails immediately and no
    /// transport is attempted.
    pub fn open(
        camera: Option<CameraRef>,
        credential: Option<Credential>,
        options: &StreamOptions,
    ) -> Self {
        let (publisher, _) = watch::channel(ViewerState::idle());
        Self::open_with(camera, credential, options, publisher)
    }

    /// Open publishing into an existing channel, so one subscriber can
    /// follow several consecutive connections.
    pub(crate) fn open_with(
        camera: Option<CameraRef>,
        credential: Option<Credential>,
        options: &StreamOptions,
        publisher: watch::Sender<ViewerState>,
    ) -> Self {
        let states = publisher.subscribe();
        let session = StreamSession::new(
            camera.clone(),
            Arc::clone(&options.registry),
            options.config.max_frame_bytes,
        );

        let mut connection = Self {
            camera: camera.clone(),
            session: SharedSession::new(session, publisher),
            states,
            registry: Arc::clone(&options.registry),
            render_rate: options.config.render_rate(),
            cancel: CancellationToken::new(),
            task: None,
        };

        let target = match (&camera, &credential) {
            (None, _) => Err(StreamError::CameraMissing),
            (Some(_), None) => Err(StreamError::AuthMissing),
            (Some(_), Some(credential)) if credential.is_empty() => Err(StreamError::AuthMissing),
            (Some(camera), Some(credential)) => {
                StreamTarget::new(&options.config.base_url, camera, credential)
            }
        };

        let target = match target {
            Ok(target) => target,
            Err(e) => {
                connection.session.update(|s| s.fail(&e));
                return connection;
            }
        };

        info!("Opening stream {}", target.redacted());
        connection.session.update(|s| s.begin());

        connection.task = Some(Driver::spawn(
            Arc::clone(&options.connector),
            target,
            Arc::clone(&connection.session),
            DriverSettings::from(&options.config),
            connection.cancel.clone(),
        ));

        connection
    }

    /// Camera this connection was opened for
    pub fn camera(&self) -> Option<&CameraRef> {
        self.camera.as_ref()
    }

    /// Current viewer state of this connection
    pub fn state(&self) -> ViewerState {
        self.session.read(|s| s.snapshot())
    }

    /// Lifecycle state of the underlying transport
    pub fn connection_state(&self) -> ConnectionState {
        self.session.read(|s| s.state())
    }

    /// Closed or failed; this connection will publish nothing further
    pub fn is_terminal(&self) -> bool {
        self.session.read(|s| s.is_terminal())
    }

    /// Receiver that always holds the newest published state.
    ///
    /// A `wait_for` predicate may read this connection through
    /// [`state`](Self::state) and friends, but must not close it.
    pub fn subscribe(&self) -> watch::Receiver<ViewerState> {
        self.states.clone()
    }

    /// State stream paced at the configured render rate
    pub fn updates(&self) -> BoxStream<'static, ViewerState> {
        self.updates_at(self.render_rate)
    }

    /// State stream paced at `rate`
    pub fn updates_at(&self, rate: UpdateRate) -> BoxStream<'static, ViewerState> {
        state_stream(self.states.clone(), rate)
    }

    /// Registry the connection's frame handles resolve in
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Tear the connection down.
    ///
    /// Marks the session closed and releases the held frame before
    /// returning; the transport task is cancelled and closes the socket.
    /// Calling it again has no effect.
    pub fn close(&self) {
        let closed = self.session.update(|s| s.close());
        self.cancel.cancel();
        if closed {
            info!("Stream for {:?} closed", self.camera.as_ref().map(|c| c.id));
        }
    }

    /// Close, then wait for the transport task to finish closing the socket
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!("Driver task ended abnormally: {}", e);
            }
        }
    }
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("camera", &self.camera)
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        debug!("Dropping stream connection");
        self.close();
    }
}
