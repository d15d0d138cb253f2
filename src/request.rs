//! Request descriptors and the `Outcome` union that replaces the original
//! `request_again` sentinel.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::transport::ResponseHead;

/// A resolved peer endpoint. Two requests that resolve to the same
/// `Address` may share a pooled connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn from_url(url: &Url) -> Option<Self> {
        let scheme = url.scheme().to_owned();
        let host = url.host_str()?.to_owned();
        let port = url.port_or_known_default()?;
        Some(Address { scheme, host, port })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https") || self.scheme.eq_ignore_ascii_case("wss")
    }
}

/// The key a [`crate::pool::ConnectionPool`] is looked up by on the client:
/// one pool per address/idle-timeout pair, mirroring the original's
/// `(host, port), timeout` pool key.
pub type PoolKey = (Address, Duration);

/// Proxy tunnel target, set on a request when a proxy address differs from
/// the request's own address.
#[derive(Debug, Clone)]
pub struct TunnelDescriptor {
    pub proxy: Address,
}

/// A single HTTP (or WebSocket handshake) request as it travels through the
/// client, the pool, and the plugin chain. Mutated in place across redirects
/// rather than rebuilt, matching the original's reuse of one request object
/// through `_do_redirect`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub history: Vec<ResponseHead>,
    pub allow_redirects: bool,
    pub expect_continue: bool,
    pub tunnel: Option<TunnelDescriptor>,
    /// Set by [`crate::client::Client::upgrade`] before dispatch. Tells the
    /// upgrade plugin to watch for a `101` response and flip
    /// `release_connection` off as soon as `on_headers` fires, rather than
    /// waiting for the handshake to be finalized after the exchange already
    /// returned — by then the connection would already be back in the pool.
    pub upgrade: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        HttpRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            history: Vec::new(),
            allow_redirects: true,
            expect_continue: false,
            tunnel: None,
            upgrade: false,
        }
    }

    /// The address a pool dials for this request: the proxy's address when
    /// tunneling, since that's who the transport actually connects to — the
    /// tunnel plugin issues `CONNECT` for the real target over that same
    /// transport once it's open.
    pub fn address(&self) -> Option<Address> {
        match &self.tunnel {
            Some(tunnel) => Some(tunnel.proxy.clone()),
            None => Address::from_url(&self.url),
        }
    }
}

/// What a consumer's `post_request` event produced: either the exchange is
/// done, or the client must dispatch another request using the same
/// connection-acquisition path. Replaces the original's `request_again`
/// namedtuple with a typed union so the client's redispatch loop is a single
/// `match` instead of a truthiness check on a magic tuple.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The response is complete; hand it back to the caller.
    Completed,
    /// Re-run the exchange — a redirect, a 100-continue body write, or the
    /// start of a proxy tunnel — using the parameters given.
    Redispatch(RedispatchParams),
}

#[derive(Debug, Clone)]
pub struct RedispatchParams {
    pub method: Method,
    pub url: Url,
    /// Whether the redispatched request should keep or drop the current body
    /// (redirects to GET drop it; 307/308 keep it; 100-continue re-sends the
    /// one the caller already supplied).
    pub keep_body: bool,
}
