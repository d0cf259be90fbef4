//! WebSocket transport backed by tokio-tungstenite

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::transport::{CloseInfo, Connector, StreamTarget, Transport, TransportEvent};
use crate::{Result, StreamError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` (and, with the `tls` feature, `wss://`) frame feeds
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<Box<dyn Transport>> {
        debug!("Opening WebSocket to {}", target.redacted());

        let (socket, response) = connect_async(target.as_str()).await.map_err(|e| match e {
            WsError::Http(response) => StreamError::transport_failed(format!(
                "handshake rejected with HTTP {}",
                response.status()
            )),
            other => StreamError::transport_failed_with_source(
                "WebSocket connect failed",
                Box::new(other),
            ),
        })?;

        debug!("WebSocket handshake complete (HTTP {})", response.status());
        Ok(Box::new(WebSocketTransport { socket }))
    }
}

/// One open WebSocket to a camera feed
pub struct WebSocketTransport {
    socket: Socket,
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn next_event(&mut self) -> Result<Option<TransportEvent>> {
        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(StreamError::transport_failed_with_source(
                        "WebSocket read failed",
                        Box::new(e),
                    ));
                }
            };

            match message {
                Message::Binary(data) => return Ok(Some(TransportEvent::Binary(data))),
                Message::Text(text) => return Ok(Some(TransportEvent::Text(text))),
                Message::Close(frame) => {
                    let info = frame.map(|frame| CloseInfo {
                        code: u16::from(frame.code),
                        reason: frame.reason.into_owned(),
                    });
                    return Ok(Some(TransportEvent::Closed(info)));
                }
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("Skipping control frame");
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}
