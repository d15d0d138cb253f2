//! Pool and client tuning, built the way `awc`'s `ConnectorConfig`/`Connector`
//! pair is: a plain data struct plus a builder that hands out a `Client`.

use std::rc::Rc;
use std::time::Duration;

use crate::client::Client;
use crate::transport::{ActixEventLoop, Connector, EventLoop, TlsConnector};

/// Tuning knobs for a [`Client`] and the pools it creates. Defaults mirror
/// the originating Python client's defaults, adjusted where this crate's
/// Open Question resolutions changed the behavior (see `DESIGN.md`).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-pool cap on concurrently open connections. `0` means unbounded.
    pub max_connections: usize,
    /// How long an idle pooled connection may sit before it's treated as
    /// stale and dropped rather than reused.
    pub idle_timeout: Duration,
    /// How many times a connection may be silently reconnected after the
    /// peer closes it before giving up and surfacing the error.
    pub max_reconnect: u32,
    /// Base delay used by the reconnect backoff curve; see
    /// [`crate::pool::reconnect_time_lag`].
    pub reconnecting_gap: Duration,
    /// Cap on the number of redirects the redirect plugin will follow for a
    /// single top-level request.
    pub max_redirects: u8,
    /// Keep a cookie jar and attach it to outgoing requests. Requires the
    /// `cookies` feature.
    pub store_cookies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_connections: 0,
            idle_timeout: Duration::from_secs(30),
            max_reconnect: 1,
            reconnecting_gap: Duration::from_secs(2),
            max_redirects: 10,
            store_cookies: cfg!(feature = "cookies"),
        }
    }
}

/// Builds a [`Client`] from a [`ClientConfig`] plus the external
/// collaborators (connector, TLS, reactor) it will drive.
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Option<Rc<dyn Connector>>,
    tls: Option<Rc<dyn TlsConnector>>,
    event_loop: Rc<dyn EventLoop>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            config: ClientConfig::default(),
            connector: None,
            tls: None,
            event_loop: Rc::new(ActixEventLoop),
        }
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn idle_timeout(mut self, d: Duration) -> Self {
        self.config.idle_timeout = d;
        self
    }

    pub fn max_reconnect(mut self, n: u32) -> Self {
        self.config.max_reconnect = n;
        self
    }

    pub fn reconnecting_gap(mut self, d: Duration) -> Self {
        self.config.reconnecting_gap = d;
        self
    }

    pub fn max_redirects(mut self, n: u8) -> Self {
        self.config.max_redirects = n;
        self
    }

    pub fn store_cookies(mut self, yes: bool) -> Self {
        self.config.store_cookies = yes;
        self
    }

    pub fn connector(mut self, connector: Rc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn tls_connector(mut self, tls: Rc<dyn TlsConnector>) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn event_loop(mut self, event_loop: Rc<dyn EventLoop>) -> Self {
        self.event_loop = event_loop;
        self
    }

    pub fn finish(self) -> Client {
        let connector = self.connector.expect("ClientBuilder requires a Connector");
        Client::new(self.config, connector, self.tls, self.event_loop)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
