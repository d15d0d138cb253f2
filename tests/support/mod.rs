//! An in-memory `Transport`/`Connector` pair used to drive `Client` through
//! its redispatch and pooling logic without any real networking.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use futures_core::future::LocalBoxFuture;
use http::{HeaderMap, StatusCode};
use netpool_client::error::{BoxError, ConnectError};
use netpool_client::request::Address;
use netpool_client::transport::{Connector, RequestHead, ResponseHead, Transport, TlsConnector};

/// A single canned response the mock transport will hand back in order.
pub struct ScriptedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ScriptedResponse { status: StatusCode::OK, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn redirect(status: StatusCode, location: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::LOCATION, http::HeaderValue::from_str(location).unwrap());
        ScriptedResponse { status, headers, body: Bytes::new() }
    }

    pub fn status(status: StatusCode) -> Self {
        ScriptedResponse { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        self.headers.insert(name, http::HeaderValue::from_str(value).unwrap());
        self
    }
}

pub struct MockTransport {
    pub responses: RefCell<VecDeque<ScriptedResponse>>,
    pub requests_seen: RefCell<Vec<RequestHead>>,
    pub raw_writes: RefCell<Vec<Bytes>>,
    pub closed: Cell<bool>,
    pub is_tls: bool,
}

impl MockTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Rc<Self> {
        Rc::new(MockTransport {
            responses: RefCell::new(responses.into_iter().collect()),
            requests_seen: RefCell::new(Vec::new()),
            raw_writes: RefCell::new(Vec::new()),
            closed: Cell::new(false),
            is_tls: false,
        })
    }
}

impl Transport for MockTransport {
    fn write_request(&self, head: RequestHead, _body: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.requests_seen.borrow_mut().push(head);
        Box::pin(async { Ok(()) })
    }

    fn read_head(&self) -> LocalBoxFuture<'static, Result<ResponseHead, BoxError>> {
        let next = self.responses.borrow_mut().pop_front();
        Box::pin(async move {
            match next {
                Some(r) => Ok(ResponseHead { status: r.status, headers: r.headers }),
                None => Err("mock transport exhausted".into()),
            }
        })
    }

    fn read_body(&self) -> LocalBoxFuture<'static, Result<Bytes, BoxError>> {
        Box::pin(async { Ok(Bytes::new()) })
    }

    fn write_raw(&self, data: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.raw_writes.borrow_mut().push(data);
        Box::pin(async { Ok(()) })
    }

    fn is_tls(&self) -> bool {
        self.is_tls
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

/// Hands out a fresh [`MockTransport`] per dial, each pre-loaded with the
/// next batch of canned responses. One `Vec<ScriptedResponse>` per
/// connection the test expects to be opened, in dial order.
pub struct ScriptedConnector {
    pub batches: RefCell<VecDeque<Vec<ScriptedResponse>>>,
    /// Every mock transport this connector has ever dialed, in dial order, so
    /// tests can inspect `requests_seen` or count how many dials actually
    /// happened (pool reuse should keep this below the number of requests
    /// sent).
    pub dialed: RefCell<Vec<Rc<MockTransport>>>,
}

impl ScriptedConnector {
    pub fn new(batches: Vec<Vec<ScriptedResponse>>) -> Rc<Self> {
        Rc::new(ScriptedConnector {
            batches: RefCell::new(batches.into_iter().collect()),
            dialed: RefCell::new(Vec::new()),
        })
    }

    pub fn single(responses: Vec<ScriptedResponse>) -> Rc<Self> {
        Self::new(vec![responses])
    }

    pub fn dial_count(&self) -> usize {
        self.dialed.borrow().len()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _address: &Address) -> LocalBoxFuture<'static, Result<Box<dyn Transport>, ConnectError>> {
        let responses = self.batches.borrow_mut().pop_front().unwrap_or_default();
        let transport = MockTransport::new(responses);
        self.dialed.borrow_mut().push(Rc::clone(&transport));
        Box::pin(async move { Ok(Box::new(RcTransport(transport)) as Box<dyn Transport>) })
    }
}

/// `Connector::connect` must hand back an owned `Box<dyn Transport>`, but
/// tests want to keep an `Rc` to the same mock around afterward to inspect
/// it — this thin wrapper forwards every call to the shared instance.
struct RcTransport(Rc<MockTransport>);

impl Transport for RcTransport {
    fn write_request(&self, head: RequestHead, body: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.0.write_request(head, body)
    }

    fn read_head(&self) -> LocalBoxFuture<'static, Result<ResponseHead, BoxError>> {
        self.0.read_head()
    }

    fn read_body(&self) -> LocalBoxFuture<'static, Result<Bytes, BoxError>> {
        self.0.read_body()
    }

    fn write_raw(&self, data: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.0.write_raw(data)
    }

    fn is_tls(&self) -> bool {
        self.0.is_tls()
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// A transport whose every `write_request` fails, standing in for a peer
/// that has silently dropped an idle or half-open socket.
pub struct FailingTransport;

impl Transport for FailingTransport {
    fn write_request(&self, _head: RequestHead, _body: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        Box::pin(async { Err("connection reset by peer".into()) })
    }

    fn read_head(&self) -> LocalBoxFuture<'static, Result<ResponseHead, BoxError>> {
        Box::pin(async { Err("connection reset by peer".into()) })
    }

    fn read_body(&self) -> LocalBoxFuture<'static, Result<Bytes, BoxError>> {
        Box::pin(async { Ok(Bytes::new()) })
    }

    fn write_raw(&self, data: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        let _ = data;
        Box::pin(async { Err("connection reset by peer".into()) })
    }

    fn is_tls(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Dials a fresh [`FailingTransport`] every time, so every exchange fails at
/// the first write. Used to exercise the reconnect policy's network-failure
/// path without needing a real socket to drop.
pub struct FailingConnector {
    pub dial_count: Cell<usize>,
}

impl FailingConnector {
    pub fn new() -> Rc<Self> {
        Rc::new(FailingConnector { dial_count: Cell::new(0) })
    }
}

impl Connector for FailingConnector {
    fn connect(&self, _address: &Address) -> LocalBoxFuture<'static, Result<Box<dyn Transport>, ConnectError>> {
        self.dial_count.set(self.dial_count.get() + 1);
        Box::pin(async { Ok(Box::new(FailingTransport) as Box<dyn Transport>) })
    }
}

/// A no-op TLS rewrap: forwards every call to the transport it was given but
/// reports `is_tls() == true`, standing in for a real handshake in tests
/// that only care that the rewrap happened and subsequent I/O still reaches
/// the same underlying mock.
pub struct MockTlsConnector;

impl TlsConnector for MockTlsConnector {
    fn wrap(
        &self,
        transport: Rc<dyn Transport>,
        _server_name: &str,
    ) -> LocalBoxFuture<'static, Result<Rc<dyn Transport>, ConnectError>> {
        Box::pin(async move { Ok(Rc::new(TlsWrapped(transport)) as Rc<dyn Transport>) })
    }
}

struct TlsWrapped(Rc<dyn Transport>);

impl Transport for TlsWrapped {
    fn write_request(&self, head: RequestHead, body: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.0.write_request(head, body)
    }

    fn read_head(&self) -> LocalBoxFuture<'static, Result<ResponseHead, BoxError>> {
        self.0.read_head()
    }

    fn read_body(&self) -> LocalBoxFuture<'static, Result<Bytes, BoxError>> {
        self.0.read_body()
    }

    fn write_raw(&self, data: Bytes) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        self.0.write_raw(data)
    }

    fn is_tls(&self) -> bool {
        true
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}
