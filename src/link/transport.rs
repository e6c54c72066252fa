//! Streaming channel transport.
//!
//! The connection manager talks to the backend through two small traits so the
//! lifecycle can be driven by a real WebSocket or by an in-memory peer.

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::TransportError;

/// Opens sockets to the streaming channel.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Establish a connection to `url`.
    ///
    /// Resolves once the socket is open and ready for the handshake.
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError>;
}

/// One open text-frame socket.
#[async_trait]
pub trait Socket: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next text frame.
    ///
    /// Returns `None` once the peer has closed the socket. Must be cancel-safe.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the socket, ignoring any failure.
    async fn close(&mut self);
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let (stream, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        TransportError::Protocol(format!("Binary frame is not UTF-8: {}", e))
                    }))
                }
                Message::Close(frame) => {
                    debug!(?frame, "Peer closed WebSocket");
                    return None;
                }
                // Pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = SinkExt::close(&mut self.stream).await {
            debug!(error = %e, "Ignoring error while closing WebSocket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_ws_connector_exchanges_text_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let hello = ws.next().await.unwrap().unwrap();
            assert_eq!(hello, Message::Text(r#"{"pipeline_id":"p1"}"#.into()));
            ws.send(Message::Text(r#"{"status":"connected"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Binary(br#"{"status":"running"}"#.to_vec()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        let mut socket = WsConnector::new()
            .connect(&format!("ws://{}", addr))
            .await
            .unwrap();
        socket
            .send_text(r#"{"pipeline_id":"p1"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(
            socket.next_text().await.unwrap().unwrap(),
            r#"{"status":"connected"}"#
        );
        assert_eq!(
            socket.next_text().await.unwrap().unwrap(),
            r#"{"status":"running"}"#
        );
        assert!(socket.next_text().await.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector::new().connect(&format!("ws://{}", addr)).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
