//! Viewer state streams for the presentation layer

mod pacing;

pub use pacing::Paced;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{UpdateRate, ViewerState};

/// Stream the states published on `states`, starting with the current one.
///
/// The watch channel only keeps the newest state, so a slow consumer skips
/// intermediate states rather than queueing them.
pub fn state_stream(
    states: watch::Receiver<ViewerState>,
    rate: UpdateRate,
) -> BoxStream<'static, ViewerState> {
    let states = WatchStream::new(states);
    match rate.pacing_interval() {
        None => states.boxed(),
        Some(period) => Paced::new(states, period).boxed(),
    }
}
