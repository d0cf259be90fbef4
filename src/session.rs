//! Event handling for one stream connection
//!
//! [`StreamSession`] owns the connection state and the frame buffer and is
//! the only place either is mutated. Every transport event and the explicit
//! close go through it under one lock, and every handler first checks that
//! the session is not terminal, so nothing arriving after close or failure
//! can install a frame or change the published state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::frame_buffer::{FrameBuffer, HandleRegistry};
use crate::transport::{CloseInfo, TransportEvent};
use crate::types::{CameraRef, ConnectionState, Frame, StreamStats, ViewerState, ViewerStatus};
use crate::{Fault, StreamError};

/// A session shared by its connection handle and driver task.
///
/// Mutations run under the session lock and the resulting state is sent to
/// subscribers only after that lock is released. The `publishing` lock keeps
/// sends in mutation order.
pub(crate) struct SharedSession {
    session: Mutex<StreamSession>,
    publishing: Mutex<()>,
    publisher: watch::Sender<ViewerState>,
}

impl SharedSession {
    pub fn new(session: StreamSession, publisher: watch::Sender<ViewerState>) -> Arc<Self> {
        Arc::new(Self { session: Mutex::new(session), publishing: Mutex::new(()), publisher })
    }

    /// Apply a mutation, then publish the state it produced, if any.
    pub fn update<R>(&self, apply: impl FnOnce(&mut StreamSession) -> R) -> R {
        let _publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        let (result, state) = {
            let mut session = self.lock();
            let result = apply(&mut *session);
            (result, session.take_update())
        };
        if let Some(state) = state {
            self.publisher.send_replace(state);
        }
        result
    }

    /// Inspect the session without publishing
    pub fn read<R>(&self, inspect: impl FnOnce(&StreamSession) -> R) -> R {
        inspect(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, StreamSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State machine and frame slot of one connection.
///
/// Handlers record the state they produce; [`take_update`](Self::take_update)
/// hands it to whoever publishes it.
#[derive(Debug)]
pub struct StreamSession {
    camera: Option<CameraRef>,
    state: ConnectionState,
    buffer: FrameBuffer,
    fault: Option<Fault>,
    stats: StreamStats,
    max_frame_bytes: usize,
    changed: bool,
}

impl StreamSession {
    /// Idle session with an empty frame buffer
    pub fn new(
        camera: Option<CameraRef>,
        registry: Arc<HandleRegistry>,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            camera,
            state: ConnectionState::Idle,
            buffer: FrameBuffer::new(registry),
            fault: None,
            stats: StreamStats::default(),
            max_frame_bytes,
            changed: false,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Closed or failed; no further events are applied
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Frame currently on display
    pub fn current_frame(&self) -> Option<&Frame> {
        self.buffer.current()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Viewer state as it stands now
    pub fn snapshot(&self) -> ViewerState {
        let current_frame = self.buffer.current().cloned();
        ViewerState {
            status: ViewerStatus::derive(self.state, current_frame.is_some()),
            connection: self.state,
            camera: self.camera.clone(),
            current_frame,
            fault: self.fault.clone(),
            stats: self.stats,
        }
    }

    /// Snapshot of the state produced since the last call, if it changed
    pub fn take_update(&mut self) -> Option<ViewerState> {
        std::mem::take(&mut self.changed).then(|| self.snapshot())
    }

    fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Idle → Connecting
    pub fn begin(&mut self) -> bool {
        if self.state != ConnectionState::Idle {
            return false;
        }
        self.state = ConnectionState::Connecting;
        self.mark_changed();
        true
    }

    /// Connecting → Open. False if the session was closed meanwhile.
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            debug!("Transport established in state {:?}, discarding", self.state);
            return false;
        }
        self.state = ConnectionState::Open;
        info!("Stream open, waiting for frames");
        self.mark_changed();
        true
    }

    /// Apply one transport event. Returns whether the session still accepts events.
    pub fn on_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Binary(payload) => {
                self.on_binary(payload);
            }
            TransportEvent::Text(text) => self.on_text(&text),
            TransportEvent::Closed(info) => {
                self.peer_closed(info);
            }
        }
        !self.is_terminal()
    }

    /// Install a binary payload as the current frame.
    ///
    /// Only an open session installs frames. Empty and oversized payloads
    /// are counted and ignored.
    pub fn on_binary(&mut self, payload: Vec<u8>) -> Option<Frame> {
        if self.state != ConnectionState::Open {
            trace!("Dropping frame received in state {:?}", self.state);
            return None;
        }
        if payload.is_empty() {
            self.ignore(StreamError::malformed_payload("empty binary message"));
            return None;
        }
        if payload.len() > self.max_frame_bytes {
            self.ignore(StreamError::malformed_payload(format!(
                "{} byte message exceeds the {} byte frame limit",
                payload.len(),
                self.max_frame_bytes
            )));
            return None;
        }

        self.stats.frames_received += 1;
        self.stats.bytes_received += payload.len() as u64;

        let frame = self.buffer.install(payload);
        if frame.sequence == 1 {
            info!("First frame received ({} bytes, {:?})", frame.len(), frame.format);
        } else {
            trace!("Frame {} installed as {}", frame.sequence, frame.handle);
        }

        self.mark_changed();
        Some(frame)
    }

    /// Text messages are not part of the feed protocol
    pub fn on_text(&mut self, text: &str) {
        if self.state != ConnectionState::Open {
            return;
        }
        self.ignore(StreamError::malformed_payload(format!("{} byte text message", text.len())));
    }

    fn ignore(&mut self, reason: StreamError) {
        self.stats.ignored_messages += 1;
        debug!("{}", reason);
        self.mark_changed();
    }

    /// Peer closed the transport, or it ended. Happens at most once.
    pub fn peer_closed(&mut self, info: Option<CloseInfo>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let error = match info {
            Some(CloseInfo { code, reason }) => StreamError::peer_closed(Some(code), reason),
            None => StreamError::peer_closed(None, "connection ended"),
        };
        info!("{}", error);

        self.state = ConnectionState::Closed;
        self.buffer.clear();
        self.fault = Some(error.fault());
        self.mark_changed();
        true
    }

    /// Transport or precondition failure
    pub fn fail(&mut self, error: &StreamError) -> bool {
        if self.is_terminal() {
            return false;
        }
        warn!("Stream failed: {}", error);

        self.state = ConnectionState::Failed;
        self.buffer.clear();
        self.fault = Some(error.fault());
        self.mark_changed();
        true
    }

    /// Explicit teardown from any state. Idempotent: returns false if the
    /// session was already closed.
    pub fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        self.buffer.clear();
        self.mark_changed();
        true
    }
}
