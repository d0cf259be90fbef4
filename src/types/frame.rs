//! Frame types for the live viewer

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Revocable reference to a frame payload held in a
/// [`HandleRegistry`](crate::HandleRegistry).
///
/// Renders as `blob:camfeed/<id>`, the way an object URL would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:camfeed/{}", self.0)
    }
}

/// Image container sniffed from the payload's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Jpeg,
    Png,
    Unknown,
}

impl FrameFormat {
    pub fn sniff(payload: &[u8]) -> Self {
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

        if payload.starts_with(JPEG) {
            FrameFormat::Jpeg
        } else if payload.starts_with(PNG) {
            FrameFormat::Png
        } else {
            FrameFormat::Unknown
        }
    }

    /// Media type for the display handle
    pub fn mime_type(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Png => "image/png",
            FrameFormat::Unknown => "application/octet-stream",
        }
    }
}

/// The latest picture received from a camera feed.
///
/// Cloning a frame is cheap and does not create a new handle; only the
/// connection's frame buffer can release `handle`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Display handle, live until the next frame replaces this one
    pub handle: FrameHandle,

    /// Raw payload (zero-copy via Arc)
    pub payload: Arc<[u8]>,

    /// Position in the connection's frame sequence, starting at 1
    pub sequence: u64,

    pub format: FrameFormat,

    pub received_at: SystemTime,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
