//! Driver spawns and runs the transport task of one stream connection

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::SharedSession;
use crate::transport::{Connector, StreamTarget, Transport, TransportEvent};
use crate::{StreamError, ViewerConfig};

/// Timing settings for one driver task
#[derive(Debug, Clone, Copy)]
pub(crate) struct DriverSettings {
    pub connect_timeout: Duration,
    pub stale_after: Option<Duration>,
}

impl From<&ViewerConfig> for DriverSettings {
    fn from(config: &ViewerConfig) -> Self {
        Self { connect_timeout: config.connect_timeout(), stale_after: config.stale_after() }
    }
}

/// Driver owns the transport of one connection.
///
/// It connects, then forwards every transport event into the session until
/// the peer closes, the transport fails, the watchdog fires, or the
/// cancellation token is triggered by `close()`. The transport is closed on
/// every exit path.
pub(crate) struct Driver;

impl Driver {
    pub fn spawn(
        connector: Arc<dyn Connector>,
        target: StreamTarget,
        session: Arc<SharedSession>,
        settings: DriverSettings,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            Self::run(connector, target, session, settings, cancel).await;
        })
    }

    async fn run(
        connector: Arc<dyn Connector>,
        target: StreamTarget,
        session: Arc<SharedSession>,
        settings: DriverSettings,
        cancel: CancellationToken,
    ) {
        debug!("Driver started for camera {}", target.camera_id());

        let connect = tokio::time::timeout(settings.connect_timeout, connector.connect(&target));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled before the transport was established");
                return;
            }
            result = connect => result,
        };

        let mut transport = match result {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                session.update(|s| s.fail(&e));
                return;
            }
            Err(_) => {
                let timeout = StreamError::Timeout { duration: settings.connect_timeout };
                session.update(|s| s.fail(&timeout));
                return;
            }
        };

        let accepted = session.update(|s| s.opened());
        if accepted {
            let frames = Self::pump(transport.as_mut(), &session, settings, &cancel).await;
            info!("Driver for camera {} ended after {} frames", target.camera_id(), frames);
        }

        transport.close().await;
    }

    /// Forward transport events until the session stops accepting them.
    /// Returns the number of frames installed.
    async fn pump(
        transport: &mut dyn Transport,
        session: &SharedSession,
        settings: DriverSettings,
        cancel: &CancellationToken,
    ) -> u64 {
        let idle_limit = settings.stale_after;
        let watchdog = tokio::time::sleep(idle_limit.unwrap_or(Duration::from_secs(3600)));
        tokio::pin!(watchdog);

        let mut frames = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Driver cancelled");
                    break;
                }
                _ = &mut watchdog, if idle_limit.is_some() => {
                    let idle = idle_limit.unwrap_or_default();
                    session.update(|s| s.fail(&StreamError::Stale { idle }));
                    break;
                }
                event = transport.next_event() => {
                    let accepting = match event {
                        Ok(Some(TransportEvent::Binary(payload))) => {
                            let installed = session.update(|s| s.on_binary(payload).is_some());
                            if installed {
                                frames += 1;
                                if let Some(limit) = idle_limit {
                                    watchdog.as_mut().reset(Instant::now() + limit);
                                }
                            }
                            !session.read(|s| s.is_terminal())
                        }
                        Ok(Some(event)) => session.update(|s| s.on_event(event)),
                        Ok(None) => {
                            session.update(|s| s.peer_closed(None));
                            false
                        }
                        Err(e) => {
                            session.update(|s| s.fail(&e));
                            false
                        }
                    };
                    if !accepting {
                        break;
                    }
                }
            }
        }
        frames
    }
}
