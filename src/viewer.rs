//! The viewing session owner
//!
//! A [`StreamViewer`] is the one place that holds the active
//! [`StreamConnection`]. Selecting another camera, reconnecting, closing the
//! viewer and dropping it all go through the same teardown, so the previous
//! connection's transport and frame are always released before a new
//! connection starts.

use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::watch;
use tracing::debug;

use crate::connection::{StreamConnection, StreamOptions};
use crate::frame_buffer::HandleRegistry;
use crate::stream::state_stream;
use crate::types::{CameraRef, CredentialProvider, UpdateRate, ViewerState};

/// Live viewer for one camera at a time.
///
/// Subscribers obtained from [`subscribe`](Self::subscribe) keep receiving
/// states across camera switches.
pub struct StreamViewer<P: CredentialProvider> {
    credentials: P,
    options: StreamOptions,
    publisher: watch::Sender<ViewerState>,
    active: Option<StreamConnection>,
}

impl<P: CredentialProvider> StreamViewer<P> {
    /// Idle viewer; nothing connects until [`select`](Self::select)
    pub fn new(credentials: P, options: StreamOptions) -> Self {
        let (publisher, _) = watch::channel(ViewerState::idle());
        Self { credentials, options, publisher, active: None }
    }

    /// Start viewing `camera`, replacing whatever was being viewed.
    ///
    /// The access token is read once, here. Must be called from within a
    /// Tokio runtime.
    pub fn select(&mut self, camera: CameraRef) {
        self.teardown();

        let credential = self.credentials.access_token();
        debug!("Selecting camera {} (token present: {})", camera, credential.is_some());

        self.active = Some(StreamConnection::open_with(
            Some(camera),
            credential,
            &self.options,
            self.publisher.clone(),
        ));
    }

    /// Re-open the current camera with a freshly read token.
    /// Returns false when no camera is selected.
    pub fn reconnect(&mut self) -> bool {
        match self.camera().cloned() {
            Some(camera) => {
                self.select(camera);
                true
            }
            None => false,
        }
    }

    /// Stop viewing. The last published state is DISCONNECTED.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(connection) = self.active.take() {
            connection.close();
        }
    }

    /// Camera currently selected
    pub fn camera(&self) -> Option<&CameraRef> {
        self.active.as_ref().and_then(|c| c.camera())
    }

    /// Active connection, if a camera is selected
    pub fn connection(&self) -> Option<&StreamConnection> {
        self.active.as_ref()
    }

    /// Newest published state
    pub fn state(&self) -> ViewerState {
        self.publisher.borrow().clone()
    }

    /// Receiver that follows the viewer across camera switches
    pub fn subscribe(&self) -> watch::Receiver<ViewerState> {
        self.publisher.subscribe()
    }

    /// State stream paced at the configured render rate
    pub fn updates(&self) -> BoxStream<'static, ViewerState> {
        state_stream(self.publisher.subscribe(), self.options.config().render_rate())
    }

    /// State stream paced at `rate`
    pub fn updates_at(&self, rate: UpdateRate) -> BoxStream<'static, ViewerState> {
        state_stream(self.publisher.subscribe(), rate)
    }

    /// Registry frame handles resolve in
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        self.options.registry()
    }
}

impl<P: CredentialProvider> fmt::Debug for StreamViewer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamViewer")
            .field("active", &self.active)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<P: CredentialProvider> Drop for StreamViewer<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
