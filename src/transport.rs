//! External-collaborator traits: the byte pipe, the reactor, TLS, and wire
//! parsing are all supplied by the embedder. This crate only sequences them.

use bytes::Bytes;
use futures_core::future::LocalBoxFuture;
use http::{HeaderMap, StatusCode};

use crate::error::{BoxError, ConnectError};
use crate::request::Address;

/// A parsed response status line and headers. Producing this is the HTTP
/// parser collaborator's job; this crate only reacts to it.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// A request status line and headers, ready to be handed to the transport.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: http::Method,
    pub target: String,
    pub headers: HeaderMap,
}

/// The byte pipe to a single peer. Framing and parsing are external:
/// `read_head` returns once the parser collaborator has a full status line
/// and header block, and may be called again on the same transport (after a
/// `100 Continue` interim response, the parser resets and this is called a
/// second time for the final response).
///
/// Implementors are expected to be cheap to clone a handle to (typically an
/// `Rc`-wrapped socket) since [`crate::connection::Connection`] holds one
/// per pooled connection for its entire lifetime.
pub trait Transport: 'static {
    fn write_request(&self, head: RequestHead, body: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>>;

    fn read_head(&self) -> LocalBoxFuture<'static, Result<ResponseHead, BoxError>>;

    fn read_body(&self) -> LocalBoxFuture<'static, Result<Bytes, BoxError>>;

    /// Write a raw chunk with no framing — used by the tunnel plugin to issue
    /// the `CONNECT` request line directly and by WebSocket consumers to send
    /// frames once `FrameParser` has taken over.
    fn write_raw(&self, data: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>>;

    fn is_tls(&self) -> bool;

    /// True once the peer has closed its end or the transport otherwise
    /// detected the connection is no longer usable.
    fn is_closed(&self) -> bool;
}

/// Dials new transports for a pool address. Supplied by the embedder so this
/// crate never depends on a concrete TCP or TLS stack.
pub trait Connector: 'static {
    fn connect(&self, address: &Address) -> LocalBoxFuture<'static, Result<Box<dyn Transport>, ConnectError>>;
}

/// Rewraps an already-open transport in TLS. Used after a proxy `CONNECT`
/// tunnel has been established and the original request targets `https`.
///
/// Takes `transport` by `Rc` rather than by value: a tunneled transport is
/// always shared (the owning [`crate::connection::Connection`] and the
/// [`crate::consumer::HttpConsumer`] currently driving it both hold a
/// clone), and the handshake only needs to read and write through it, not
/// own it outright.
pub trait TlsConnector: 'static {
    fn wrap(
        &self,
        transport: std::rc::Rc<dyn Transport>,
        server_name: &str,
    ) -> LocalBoxFuture<'static, Result<std::rc::Rc<dyn Transport>, ConnectError>>;
}

/// The reactor collaborator. A default [`actix_rt`]-backed implementation is
/// provided by [`ActixEventLoop`] but embedders may supply their own.
pub trait EventLoop: 'static {
    fn spawn(&self, fut: LocalBoxFuture<'static, ()>);

    fn call_later(
        &self,
        delay: std::time::Duration,
        fut: LocalBoxFuture<'static, ()>,
    );
}

/// Drives an [`EventLoop`] on top of `actix_rt`'s single-threaded runtime,
/// mirroring the way `awc`'s `Connector` assumes an `actix_rt::System` is
/// already running on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActixEventLoop;

impl EventLoop for ActixEventLoop {
    fn spawn(&self, fut: LocalBoxFuture<'static, ()>) {
        actix_rt::spawn(fut);
    }

    fn call_later(&self, delay: std::time::Duration, fut: LocalBoxFuture<'static, ()>) {
        actix_rt::spawn(async move {
            actix_rt::time::sleep(delay).await;
            fut.await;
        });
    }
}

/// A single decoded WebSocket-style frame, handed to the bound `WsHandler`
/// after the `101` upgrade.
#[derive(Debug, Clone)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Bytes,
}

/// Consumes frames off an upgraded transport. Framing/masking itself is out
/// of scope for this crate; this trait is the seam where it plugs in.
pub trait FrameParser: 'static {
    fn parse(&mut self, data: &[u8]) -> Result<Vec<Frame>, BoxError>;
}

/// Receives decoded frames for the lifetime of an upgraded connection.
pub trait WsHandler: 'static {
    fn on_frame(&mut self, frame: Frame);
    fn on_close(&mut self, reason: Option<BoxError>);
}
