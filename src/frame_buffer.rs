//! Single-slot frame storage and display handle bookkeeping
//!
//! A [`HandleRegistry`] plays the role of an object-URL table: it hands out
//! [`FrameHandle`]s that the presentation layer can resolve to bytes until
//! they are released. A [`FrameBuffer`] holds at most one installed frame
//! and is the only code that releases handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::trace;

use crate::types::{Frame, FrameFormat, FrameHandle};

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<FrameHandle, Arc<[u8]>>,
    allocated: u64,
    released: u64,
}

/// Table of live display handles.
///
/// Shared between the frame buffers that allocate into it and the
/// presentation layer that resolves handles.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    inner: Mutex<RegistryInner>,
}

impl HandleRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn allocate(&self, payload: Arc<[u8]>) -> FrameHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        let handle = FrameHandle::new(inner.next_id);
        inner.live.insert(handle, payload);
        inner.allocated += 1;
        handle
    }

    /// Returns false if the handle was not live.
    pub(crate) fn release(&self, handle: FrameHandle) -> bool {
        let mut inner = self.lock();
        if inner.live.remove(&handle).is_some() {
            inner.released += 1;
            true
        } else {
            false
        }
    }

    /// Bytes behind a live handle; `None` once it has been released.
    pub fn resolve(&self, handle: FrameHandle) -> Option<Arc<[u8]>> {
        self.lock().live.get(&handle).cloned()
    }

    /// Whether `handle` is still resolvable
    pub fn is_live(&self, handle: FrameHandle) -> bool {
        self.lock().live.contains_key(&handle)
    }

    /// Handles allocated and not yet released
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Handles allocated since creation
    pub fn allocated_count(&self) -> u64 {
        self.lock().allocated
    }

    /// Handles released since creation
    pub fn released_count(&self) -> u64 {
        self.lock().released
    }
}

/// Holds the latest frame of one connection.
///
/// Invariant: at most one handle allocated by this buffer is live.
#[derive(Debug)]
pub struct FrameBuffer {
    registry: Arc<HandleRegistry>,
    current: Option<Frame>,
    sequence: u64,
}

impl FrameBuffer {
    /// Empty buffer allocating from `registry`
    pub fn new(registry: Arc<HandleRegistry>) -> Self {
        Self { registry, current: None, sequence: 0 }
    }

    /// Install `payload` as the current frame.
    ///
    /// The new handle is allocated and substituted first, then the previous
    /// handle is released, so there is never a moment with nothing to show.
    pub fn install(&mut self, payload: impl Into<Arc<[u8]>>) -> Frame {
        let payload = payload.into();
        self.sequence += 1;

        let frame = Frame {
            handle: self.registry.allocate(Arc::clone(&payload)),
            format: FrameFormat::sniff(&payload),
            payload,
            sequence: self.sequence,
            received_at: SystemTime::now(),
        };

        if let Some(previous) = self.current.replace(frame.clone()) {
            self.registry.release(previous.handle);
            trace!("Replaced {} with {}", previous.handle, frame.handle);
        }

        frame
    }

    /// Release the current frame, if any. Returns whether one was held.
    pub fn clear(&mut self) -> bool {
        match self.current.take() {
            Some(frame) => {
                self.registry.release(frame.handle);
                trace!("Released {}", frame.handle);
                true
            }
            None => false,
        }
    }

    /// Frame currently held, if any
    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    /// Frames installed over the buffer's lifetime
    pub fn installed_count(&self) -> u64 {
        self.sequence
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}
