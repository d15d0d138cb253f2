//! A single pooled transport plus the bookkeeping the pool needs to reuse,
//! reconnect, or retire it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures_core::future::LocalBoxFuture;
use log::{debug, trace};

use crate::consumer::HttpConsumer;
use crate::error::{ConsumerError, SendRequestError};
use crate::event::EventBus;
use crate::plugins::tunnel;
use crate::request::{Address, Outcome};
use crate::transport::{RequestHead, TlsConnector, Transport};

const CONNECTION_LOST: &str = "connection_lost";

/// One transport and the request currently (if any) running over it.
///
/// `connection_lost` lives on the connection rather than the consumer
/// because the pool binds its reconnect hook once, when the connection is
/// built, and that hook must keep observing every consumer that is ever
/// attached to this connection afterward — not just the first one. Handlers
/// close over whatever state they need (typically a `Weak<Connection>` and
/// the pool), so the event's subject type is just `()`.
pub struct Connection {
    pub address: Address,
    transport: Rc<dyn Transport>,
    tls: Option<Rc<dyn TlsConnector>>,
    current: RefCell<Option<Rc<RefCell<HttpConsumer>>>>,
    events: RefCell<EventBus<(), ()>>,
    closed: Cell<bool>,
    processed: Cell<u64>,
    last_released: Cell<Instant>,
}

impl Connection {
    pub fn new(address: Address, transport: Rc<dyn Transport>, tls: Option<Rc<dyn TlsConnector>>) -> Rc<Connection> {
        let mut events = EventBus::new();
        events.register_many(CONNECTION_LOST);
        Rc::new(Connection {
            address,
            transport,
            tls,
            current: RefCell::new(None),
            events: RefCell::new(events),
            closed: Cell::new(false),
            processed: Cell::new(0),
            last_released: Cell::new(Instant::now()),
        })
    }

    pub fn is_tls(&self) -> bool {
        self.transport.is_tls()
    }

    pub fn processed(&self) -> u64 {
        self.processed.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get() || self.transport.is_closed()
    }

    /// True once `idle_timeout` has elapsed since this connection was last
    /// released back to the pool while idle.
    pub fn is_stale(&self, idle_timeout: Duration) -> bool {
        !idle_timeout.is_zero() && self.last_released.get().elapsed() >= idle_timeout
    }

    pub fn mark_released(&self) {
        self.last_released.set(Instant::now());
    }

    pub fn close(&self) {
        self.closed.set(true);
    }

    /// Bound once by the pool right after construction (mirrors
    /// `connection.bind_event('connection_lost', ...)` in the original).
    pub fn bind_connection_lost(&self, handler: impl FnMut(&mut (), Option<&ConsumerError>) -> Option<()> + 'static) {
        self.events.borrow_mut().bind_event(CONNECTION_LOST, &mut (), Box::new(handler));
    }

    /// Called by `Client::dispatch_with_retry` when an exchange on this
    /// connection ends in a network failure, not by anything in this module.
    pub fn fire_connection_lost(&self, err: Option<ConsumerError>) {
        self.events.borrow_mut().fire_event(CONNECTION_LOST, &mut (), err);
    }

    /// Drive one request/response exchange to completion (including any
    /// 100-continue interim responses) and return what the consumer's
    /// `post_request` plugins decided should happen next.
    pub fn send_request(
        self: Rc<Self>,
        consumer: Rc<RefCell<HttpConsumer>>,
    ) -> LocalBoxFuture<'static, Result<Option<Outcome>, SendRequestError>> {
        Box::pin(async move {
            consumer.borrow_mut().transport = Some(Rc::clone(&self.transport));
            *self.current.borrow_mut() = Some(Rc::clone(&consumer));

            tunnel::establish(&consumer, self.tls.as_deref()).await?;

            if let Some(outcome) = consumer.borrow_mut().fire_pre_request() {
                return Ok(Some(outcome));
            }

            // `pre_request` handlers (the tunnel plugin in particular) may
            // have rewrapped the consumer's transport in TLS after a
            // `CONNECT`; read it back rather than assuming it's still the
            // one this connection was dialed with.
            let transport = consumer
                .borrow()
                .transport
                .clone()
                .expect("transport is set before pre_request fires");

            let (head, body, expect_continue) = {
                let c = consumer.borrow();
                let req = &c.request;
                let mut headers = req.headers.clone();
                if req.expect_continue {
                    headers.insert(http::header::EXPECT, http::HeaderValue::from_static("100-continue"));
                }
                let head = RequestHead { method: req.method.clone(), target: req.url.to_string(), headers };
                let body = if req.expect_continue { bytes::Bytes::new() } else { req.body.clone() };
                (head, body, req.expect_continue)
            };

            trace!("writing request to {:?}", self.address);
            // A failure here means nothing reached the peer at all — almost
            // always a socket the peer (or an idle timeout somewhere in
            // between) already closed out from under a pooled connection,
            // not a framing problem, so this is a network failure rather
            // than a parse one.
            transport.write_request(head, body).await.map_err(SendRequestError::ConnectionLost)?;

            let _ = expect_continue;
            let outcome = loop {
                let head = transport.read_head().await.map_err(SendRequestError::Parse)?;
                let status = head.status;
                let is_interim = status == http::StatusCode::CONTINUE;
                // The parser collaborator resets between reads; firing
                // `on_headers` again for the interim response lets the
                // continue100 plugin flag the deferred body for a write
                // before we loop back to read the real status line.
                let outcome = consumer.borrow_mut().fire_on_headers(head);

                if consumer.borrow().take_continue_body_write() {
                    let body = consumer.borrow().request.body.clone();
                    transport.write_raw(body).await.map_err(SendRequestError::Parse)?;
                }

                if is_interim {
                    continue;
                }

                if let Some(outcome) = outcome {
                    break Some(outcome);
                }

                // A `101` carries no body at all; what follows on the wire is
                // frame data for whatever took the transport over, not
                // anything this exchange's parser should consume.
                let needs_body = consumer.borrow().request.method != http::Method::HEAD
                    && status != http::StatusCode::SWITCHING_PROTOCOLS;
                if needs_body {
                    let body = transport.read_body().await.map_err(SendRequestError::Parse)?;
                    consumer.borrow_mut().append_body(body);
                }

                break consumer.borrow_mut().fire_post_request();
            };

            consumer.borrow_mut().fire_finish(None);
            self.processed.set(self.processed.get() + 1);
            debug!("request to {:?} completed ({} processed)", self.address, self.processed.get());
            Ok(outcome)
        })
    }
}
