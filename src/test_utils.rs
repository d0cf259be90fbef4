//! Test utilities: a scripted in-memory transport
//!
//! [`ScriptedConnector`] records every connect target and hands out a
//! [`Feed`] per accepted connection, through which a test plays the part of
//! the camera backend.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::transport::{CloseInfo, Connector, StreamTarget, Transport, TransportEvent};
use crate::types::ViewerState;
use crate::{Result, StreamError};

/// What the next connect attempt does
#[derive(Debug, Clone)]
pub enum ConnectPlan {
    Accept,
    Reject(String),
    /// Never completes; exercises the connect timeout
    Hang,
}

#[derive(Default)]
struct Shared {
    plans: VecDeque<ConnectPlan>,
    targets: Vec<String>,
    feeds: Vec<Feed>,
}

/// Connector whose transports are driven by the test
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    /// Accepts every connection unless told otherwise
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the behavior of the next connect attempt
    pub fn plan(&self, plan: ConnectPlan) -> &Self {
        self.lock().plans.push_back(plan);
        self
    }

    pub fn attempts(&self) -> usize {
        self.lock().targets.len()
    }

    pub fn targets(&self) -> Vec<String> {
        self.lock().targets.clone()
    }

    /// Feed of the `index`-th accepted connection
    pub fn feed(&self, index: usize) -> Option<Feed> {
        self.lock().feeds.get(index).cloned()
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<Box<dyn Transport>> {
        let plan = {
            let mut shared = self.lock();
            shared.targets.push(target.as_str().to_string());
            shared.plans.pop_front().unwrap_or(ConnectPlan::Accept)
        };

        match plan {
            ConnectPlan::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let closed = Arc::new(AtomicBool::new(false));
                self.lock().feeds.push(Feed { tx, closed: Arc::clone(&closed) });
                Ok(Box::new(ScriptedTransport { rx, closed }))
            }
            ConnectPlan::Reject(reason) => Err(StreamError::transport_failed(reason)),
            ConnectPlan::Hang => std::future::pending().await,
        }
    }
}

type Scripted = Result<Option<TransportEvent>>;

/// The backend side of one scripted connection
#[derive(Clone)]
pub struct Feed {
    tx: mpsc::UnboundedSender<Scripted>,
    closed: Arc<AtomicBool>,
}

impl Feed {
    pub fn frame(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.tx.send(Ok(Some(TransportEvent::Binary(payload.into()))));
    }

    pub fn text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Ok(Some(TransportEvent::Text(text.into()))));
    }

    pub fn peer_close(&self, code: u16, reason: impl Into<String>) {
        let info = CloseInfo { code, reason: reason.into() };
        let _ = self.tx.send(Ok(Some(TransportEvent::Closed(Some(info)))));
    }

    /// End the stream without a close frame
    pub fn end(&self) {
        let _ = self.tx.send(Ok(None));
    }

    pub fn error(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(StreamError::transport_failed(reason)));
    }

    /// Whether the viewer closed this transport
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedTransport {
    rx: mpsc::UnboundedReceiver<Scripted>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn next_event(&mut self) -> Result<Option<TransportEvent>> {
        self.rx.recv().await.unwrap_or(Ok(None))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Wait (up to two seconds) for a published state matching `predicate`
pub async fn wait_for(
    states: &mut watch::Receiver<ViewerState>,
    predicate: impl FnMut(&ViewerState) -> bool,
) -> ViewerState {
    let outcome = tokio::time::timeout(Duration::from_secs(2), states.wait_for(predicate))
        .await
        .map(|waited| waited.map(|state| state.clone()));

    match outcome {
        Ok(Ok(state)) => state,
        Ok(Err(_)) => panic!("state publisher dropped"),
        Err(_) => panic!("timed out waiting for state; last was {:?}", *states.borrow()),
    }
}
