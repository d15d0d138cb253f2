//! Finishes a WebSocket handshake: on a `101 Switching Protocols` response,
//! marks the connection as taken over rather than returned to the pool and
//! hands the still-open transport to a [`WsHandler`].
//!
//! The original client modeled the upgraded connection as a `WebSocketClient`
//! that delegated attribute access back onto the underlying connection via
//! `__getattr__`, so callers could keep calling connection methods through
//! it. An explicit adapter over a named `Transport` handle is the idiomatic
//! equivalent here — no dynamic delegation, just a type that owns the
//! pieces it needs.

use std::cell::RefCell;
use std::rc::Rc;

use http::StatusCode;

use crate::consumer::{HttpConsumer, ON_HEADERS};
use crate::error::{SendRequestError, WsUpgradeError};
use crate::transport::{Transport, WsHandler};

/// Bound onto a consumer whose request has `upgrade == true`. Flips
/// `release_connection` off the moment a `101` arrives, synchronously within
/// `on_headers` — before `Connection::send_request` returns, and so before
/// `dispatch_with_retry` ever gets a chance to check the flag and hand the
/// connection back to the pool. `finish_handshake` runs later, once the
/// caller has the finished consumer, and only validates and builds the
/// [`WsConnection`]; by then the pooling decision has already been made.
pub fn install(consumer: &Rc<RefCell<HttpConsumer>>) {
    consumer.borrow_mut().bind_event(
        ON_HEADERS,
        Box::new(|c, _| {
            if matches!(&c.response, Some(head) if head.status == StatusCode::SWITCHING_PROTOCOLS) {
                c.release_connection = false;
            }
            None
        }),
    );
}

/// A WebSocket connection that has completed its handshake. Owns the raw
/// transport and the frame handler the caller supplied; nothing here reaches
/// back into the HTTP consumer or connection pool.
pub struct WsConnection {
    transport: Rc<dyn Transport>,
    handler: Box<dyn WsHandler>,
}

impl WsConnection {
    pub fn write_frame(&self, payload: bytes::Bytes) -> futures_core::future::LocalBoxFuture<'static, Result<(), crate::error::BoxError>> {
        self.transport.write_raw(payload)
    }

    pub fn handler_mut(&mut self) -> &mut dyn WsHandler {
        self.handler.as_mut()
    }
}

/// Validate the handshake response and, on success, build a [`WsConnection`]
/// around the consumer's transport and `handler`. `release_connection` has
/// already been flipped off by [`install`]'s `on_headers` handler by the time
/// this runs; this function only needs to confirm the handshake actually
/// succeeded and hand the transport over.
pub fn finish_handshake(
    consumer: &Rc<RefCell<HttpConsumer>>,
    handler: Box<dyn WsHandler>,
) -> Result<WsConnection, SendRequestError> {
    let consumer = consumer.borrow();
    let status = consumer
        .response
        .as_ref()
        .map(|head| head.status)
        .unwrap_or(StatusCode::OK);

    if status != StatusCode::SWITCHING_PROTOCOLS {
        return Err(SendRequestError::Upgrade(WsUpgradeError::UnexpectedStatus(status.as_u16())));
    }

    let transport = consumer
        .transport
        .clone()
        .expect("transport is set for the duration of an exchange");

    Ok(WsConnection { transport, handler })
}
