//! In-memory transport for driving the connection manager in tests.
//!
//! Every `connect` call is handed to the test as an [`Attempt`]; the test
//! decides whether it opens, fails, or never answers. An opened attempt yields
//! a [`Peer`] that plays the backend side of the socket.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::transport::{Connector, Socket};
use crate::error::TransportError;

/// What the backend side pushes into a mock socket.
#[derive(Debug)]
enum PeerEvent {
    Text(String),
    Error(String),
    Close,
}

/// A pending connect call.
pub struct Attempt {
    pub url: String,
    reply: oneshot::Sender<Result<Box<dyn Socket>, TransportError>>,
}

impl std::fmt::Debug for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attempt").field("url", &self.url).finish()
    }
}

impl Attempt {
    /// Let the socket open and return its backend side.
    pub fn accept(self) -> Peer {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let socket = MockSocket {
            events: event_rx,
            sent: sent_tx,
        };
        let _ = self.reply.send(Ok(Box::new(socket)));
        Peer {
            events: event_tx,
            sent: sent_rx,
        }
    }

    /// Fail the connect call.
    pub fn reject(self, reason: &str) {
        let _ = self
            .reply
            .send(Err(TransportError::Connect(reason.to_string())));
    }
}

/// Backend side of an open mock socket.
#[derive(Debug)]
pub struct Peer {
    events: mpsc::UnboundedSender<PeerEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    /// Deliver a text frame to the client.
    pub fn push(&self, text: &str) {
        let _ = self.events.send(PeerEvent::Text(text.to_string()));
    }

    /// Break the socket with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.events.send(PeerEvent::Error(reason.to_string()));
    }

    /// Close the socket from the backend side.
    pub fn close(&self) {
        let _ = self.events.send(PeerEvent::Close);
    }

    /// Wait for the next frame the client wrote.
    pub async fn recv(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Whether the client has closed or dropped its side.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Connector whose attempts are resolved by the test.
#[derive(Debug)]
pub struct MockConnector {
    attempts: mpsc::UnboundedSender<Attempt>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Attempt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { attempts: tx }, rx)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let (reply, answer) = oneshot::channel();
        let attempt = Attempt {
            url: url.to_string(),
            reply,
        };
        self.attempts
            .send(attempt)
            .map_err(|_| TransportError::Connect("test dropped attempts".into()))?;
        answer
            .await
            .map_err(|_| TransportError::Connect("attempt dropped".into()))?
    }
}

struct MockSocket {
    events: mpsc::UnboundedReceiver<PeerEvent>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Socket for MockSocket {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent
            .send(text)
            .map_err(|_| TransportError::Send("peer gone".into()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        match self.events.recv().await? {
            PeerEvent::Text(text) => Some(Ok(text)),
            PeerEvent::Error(reason) => Some(Err(TransportError::Protocol(reason))),
            PeerEvent::Close => None,
        }
    }

    async fn close(&mut self) {
        self.events.close();
    }
}
