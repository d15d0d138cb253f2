//! Error types surfaced by the pool, the consumer lifecycle, and the plugins.

use std::io;

use derive_more::{Display, From};

/// Type-erased error from a transport, parser, or TLS collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure descriptor threaded through lifecycle events. Cheaply cloneable
/// so the same failure can be replayed to handlers bound after an event has
/// already fired (see [`crate::event::EventBus`]).
pub type ConsumerError = std::rc::Rc<SendRequestError>;

/// Errors that can occur while dialing or reusing a pooled connection.
#[derive(Debug, Display, From)]
#[non_exhaustive]
pub enum ConnectError {
    /// The underlying transport failed to connect.
    #[display("transport failed to connect: {_0}")]
    Io(io::Error),

    /// The TLS handshake (initial or post-`CONNECT` rewrap) failed.
    #[display("TLS handshake failed: {_0}")]
    Tls(BoxError),

    /// The connect attempt exceeded its deadline.
    #[display("connect attempt timed out")]
    Timeout,

    /// The connection pool has been closed and accepts no new connections.
    #[display("connection pool has been closed")]
    Disconnected,
}

impl std::error::Error for ConnectError {}

/// Errors surfaced while sending a request and reading its response.
#[derive(Debug, Display, From)]
#[non_exhaustive]
pub enum SendRequestError {
    /// Failed to connect to the request's pool address.
    #[display("failed to connect to host: {_0}")]
    Connect(ConnectError),

    /// Writing the request (or tunnel `CONNECT`) to the transport failed.
    #[display("error writing request: {_0}")]
    Write(io::Error),

    /// The HTTP parser collaborator failed to make sense of the response.
    #[display("error reading response: {_0}")]
    Parse(BoxError),

    /// Admission to the pool was refused because `max_connections` was reached
    /// and no idle connection was available.
    #[display("too many connections open for this pool")]
    TooManyConnections,

    /// The redirect chain exceeded `max_redirects`.
    #[display("too many redirects ({_0} followed)")]
    TooManyRedirects(u8),

    /// The redirect `Location` header was missing or could not be resolved
    /// against the request's current URL.
    #[display("invalid redirect location: {_0}")]
    InvalidRedirectLocation(String),

    /// The request's URL has no resolvable host, so it cannot be assigned to
    /// a pool.
    #[display("invalid request URL: {_0}")]
    InvalidUrl(String),

    /// Proxy tunnel setup (the `CONNECT` exchange or the TLS rewrap that
    /// follows it) failed.
    #[display("tunnel setup failed: {_0}")]
    Tunnel(BoxError),

    /// The connection was lost and no more reconnect attempts remain.
    #[display("connection lost: {_0}")]
    ConnectionLost(BoxError),

    /// The WebSocket handshake did not complete successfully.
    #[display("websocket upgrade failed: {_0}")]
    Upgrade(WsUpgradeError),
}

impl std::error::Error for SendRequestError {}

impl SendRequestError {
    /// True for failures the pool's reconnect policy should transparently
    /// retry by dialing a fresh connection: a socket that never connected or
    /// was dropped mid-exchange. Protocol-shape violations (a proxy refusing
    /// `CONNECT`, a failed WebSocket handshake, a response the parser
    /// couldn't make sense of) are not network failures and are not
    /// retried — they surface immediately.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, SendRequestError::Connect(_) | SendRequestError::ConnectionLost(_))
    }
}

/// Errors surfaced by the WebSocket upgrade plugin.
#[derive(Debug, Display, From)]
#[non_exhaustive]
pub enum WsUpgradeError {
    /// The handshake response did not carry status `101`.
    #[display("expected 101 Switching Protocols, got {_0}")]
    UnexpectedStatus(u16),

    /// Sending the handshake itself failed.
    #[display("{_0}")]
    SendRequest(SendRequestError),
}

impl std::error::Error for WsUpgradeError {}
