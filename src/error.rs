//! Error types for the status link and the query channel.

use thiserror::Error;

/// Connection problems surfaced on the link status channel.
///
/// These are recovered locally by the reconnect loop and are never returned to
/// callers of [`ConnectionManager`](crate::link::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The socket did not open before the watchdog expired.
    #[error("Connection attempt timed out")]
    ConnectTimeout,

    /// Transport-level failure on an opening or open socket.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// Errors raised by a [`Connector`](crate::link::Connector) or [`Socket`](crate::link::Socket).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The connection broke while open.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An outbound frame could not be written.
    #[error("Send failed: {0}")]
    Send(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Io(e) => TransportError::Connect(e.to_string()),
            WsError::Url(e) => TransportError::Connect(e.to_string()),
            WsError::Http(response) => {
                TransportError::Connect(format!("HTTP {}", response.status()))
            }
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

/// Errors that can occur when submitting a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The endpoint answered with a non-2xx status.
    #[error("Query rejected with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request could not be delivered.
    #[error("Query transport failed: {0}")]
    Transport(String),

    /// Timeout waiting for response.
    #[error("Query timed out")]
    Timeout,

    /// The response was not valid JSON.
    #[error("Failed to parse query response: {0}")]
    Parse(String),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout
        } else if err.is_decode() {
            QueryError::Parse(err.to_string())
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        assert_eq!(
            LinkError::ConnectTimeout.to_string(),
            "Connection attempt timed out"
        );
        assert_eq!(
            LinkError::Socket("reset by peer".into()).to_string(),
            "Socket error: reset by peer"
        );
    }

    #[test]
    fn test_tungstenite_error_mapping() {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let io = WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(TransportError::from(io), TransportError::Connect(_)));
        assert!(matches!(
            TransportError::from(WsError::ConnectionClosed),
            TransportError::Protocol(_)
        ));
    }

    #[test]
    fn test_query_status_display() {
        let err = QueryError::Status {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(err.to_string(), "Query rejected with status 503: busy");
    }
}
