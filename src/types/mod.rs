//! Core types for the live camera viewer.
//!
//! ## Architecture
//!
//! - [`CameraRef`] and [`Credential`] identify which feed to open and how to authorize it
//! - [`Frame`] is the latest received picture plus its revocable [`FrameHandle`]
//! - [`ConnectionState`] is owned by a stream connection; [`ViewerStatus`] and
//!   [`ViewerState`] are derived from it for the presentation layer
//! - [`UpdateRate`] controls how often state streams yield
//!
//! ## Usage Example
//!
//! ```rust
//! use camfeed::types::{ConnectionState, ViewerStatus};
//!
//! // An open connection with no frame yet is still "connecting" to the viewer
//! assert_eq!(ViewerStatus::derive(ConnectionState::Open, false), ViewerStatus::Connecting);
//! assert_eq!(ViewerStatus::derive(ConnectionState::Open, true), ViewerStatus::Streaming);
//! ```

mod camera;
mod frame;
mod status;
mod update_rate;

pub use camera::{CameraRef, Credential, CredentialProvider, SharedCredential, StaticCredential};
pub use frame::{Frame, FrameFormat, FrameHandle};
pub use status::{ConnectionState, StreamStats, ViewerState, ViewerStatus};
pub use update_rate::UpdateRate;
