//! Proxy `CONNECT` tunneling. Establishing a tunnel needs real I/O before the
//! real request can be written, which doesn't fit the synchronous
//! [`crate::event::EventBus`] handler signature the other four plugins use —
//! so unlike them, this one is invoked directly by
//! [`crate::connection::Connection`] as an async precondition rather than
//! bound onto `pre_request`. The logic itself (issue `CONNECT`, check the
//! status, rewrap in TLS) still belongs to this module; `Connection` only
//! decides *when* to call it.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::consumer::HttpConsumer;
use crate::error::SendRequestError;
use crate::transport::{RequestHead, TlsConnector};

/// If `consumer`'s request carries a [`crate::request::TunnelDescriptor`],
/// issue `CONNECT` over its current transport and, for an `https` target,
/// rewrap the tunnel in TLS before returning. No-op otherwise.
pub async fn establish(
    consumer: &Rc<RefCell<HttpConsumer>>,
    tls: Option<&dyn TlsConnector>,
) -> Result<(), SendRequestError> {
    if consumer.borrow().request.tunnel.is_none() {
        return Ok(());
    }

    let transport = consumer
        .borrow()
        .transport
        .clone()
        .ok_or_else(|| SendRequestError::Tunnel("no transport to tunnel over".into()))?;

    let target_host = consumer.borrow().request.url.host_str().unwrap_or_default().to_owned();
    let target_port = consumer.borrow().request.url.port_or_known_default().unwrap_or(443);
    let authority = format!("{target_host}:{target_port}");

    let head = RequestHead { method: Method::CONNECT, target: authority, headers: HeaderMap::new() };
    transport.write_request(head, Bytes::new()).await.map_err(SendRequestError::Tunnel)?;

    let response = transport.read_head().await.map_err(SendRequestError::Tunnel)?;
    if !response.status.is_success() {
        return Err(SendRequestError::Tunnel(format!("proxy refused CONNECT: {}", response.status).into()));
    }

    let target_tls = consumer.borrow().request.url.scheme().eq_ignore_ascii_case("https");
    if target_tls {
        let tls = tls.ok_or_else(|| {
            SendRequestError::Tunnel("https tunnel target but no TlsConnector configured".into())
        })?;
        let wrapped = tls
            .wrap(transport, &target_host)
            .await
            .map_err(|e| SendRequestError::Tunnel(Box::new(e)))?;
        consumer.borrow_mut().transport = Some(wrapped);
    }

    Ok(())
}
