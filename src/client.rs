//! The client: owns one pool per address, runs the redispatch loop that
//! replaces `request_again`, and retries transparently across reconnects.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use futures_core::future::LocalBoxFuture;
use log::warn;
use tokio::time::sleep;

use crate::config::ClientConfig;
use crate::consumer::HttpConsumer;
use crate::error::SendRequestError;
use crate::pool::{reconnect_time_lag, ConnectionPool};
use crate::request::{HttpRequest, Outcome, PoolKey};
use crate::transport::{Connector, EventLoop, TlsConnector};

#[cfg(feature = "cookies")]
use crate::plugins::cookies::CookieJar;

/// Entry point: one per application, shared behind an `Rc` so pools and
/// connections can hold weak back-references to it.
pub struct Client {
    config: ClientConfig,
    connector: Rc<dyn Connector>,
    tls: Option<Rc<dyn TlsConnector>>,
    #[allow(dead_code)]
    event_loop: Rc<dyn EventLoop>,
    pools: Rc<RefCell<HashMap<PoolKey, Rc<ConnectionPool>>>>,
    #[cfg(feature = "cookies")]
    cookie_jar: Option<Rc<RefCell<CookieJar>>>,
    closed: Cell<bool>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        connector: Rc<dyn Connector>,
        tls: Option<Rc<dyn TlsConnector>>,
        event_loop: Rc<dyn EventLoop>,
    ) -> Self {
        #[cfg(feature = "cookies")]
        let cookie_jar = config.store_cookies.then(|| Rc::new(RefCell::new(CookieJar::default())));

        Client {
            config,
            connector,
            tls,
            event_loop,
            pools: Rc::new(RefCell::new(HashMap::new())),
            #[cfg(feature = "cookies")]
            cookie_jar,
            closed: Cell::new(false),
        }
    }

    fn pool_for(self: &Rc<Self>, request: &HttpRequest) -> Result<Rc<ConnectionPool>, SendRequestError> {
        let address = request
            .address()
            .ok_or_else(|| SendRequestError::InvalidUrl(request.url.to_string()))?;
        let key: PoolKey = (address, self.config.idle_timeout);

        let mut pools = self.pools.borrow_mut();
        if let Some(pool) = pools.get(&key) {
            return Ok(Rc::clone(pool));
        }
        let pool = ConnectionPool::new(
            key.clone(),
            self.config.clone(),
            Rc::clone(&self.connector),
            self.tls.clone(),
            Rc::downgrade(&self.pools),
        );
        pools.insert(key, Rc::clone(&pool));
        Ok(pool)
    }

    /// Send `request`, following redirects, 100-continue interim writes, and
    /// proxy tunnel setup transparently, and return the finished consumer
    /// (its `response`/`body` fields hold the final result).
    pub fn response(
        self: &Rc<Self>,
        request: HttpRequest,
    ) -> LocalBoxFuture<'static, Result<Rc<RefCell<HttpConsumer>>, SendRequestError>> {
        let this = Rc::clone(self);
        Box::pin(async move {
            if this.closed.get() {
                return Err(SendRequestError::Connect(crate::error::ConnectError::Disconnected));
            }

            let mut request = request;
            let mut redirects = 0u8;

            loop {
                let consumer = Rc::new(RefCell::new(HttpConsumer::new(request.clone())));
                crate::plugins::install(
                    &consumer,
                    #[cfg(feature = "cookies")]
                    this.cookie_jar.clone(),
                );

                let pool = this.pool_for(&request)?;
                let outcome = this.dispatch_with_retry(&pool, Rc::clone(&consumer)).await?;

                match outcome {
                    Some(Outcome::Redispatch(params)) => {
                        redirects += 1;
                        if redirects > this.config.max_redirects {
                            return Err(SendRequestError::TooManyRedirects(redirects));
                        }
                        if let Some(head) = consumer.borrow().response.clone() {
                            request.history.push(head);
                        }
                        request.method = params.method;
                        request.url = params.url;
                        if !params.keep_body {
                            request.body = Bytes::new();
                        }
                        continue;
                    }
                    _ => return Ok(consumer),
                }
            }
        })
    }

    /// Acquire a connection and run the exchange, transparently retrying up
    /// to `max_reconnect` times when the attempt fails rather than
    /// surfacing the error immediately. Each retry dials a fresh connection
    /// (the failed one is always dropped from the pool), so the permitted
    /// number of attempts is tracked by this loop's own counter rather than
    /// by any single connection's identity — a connection that failed once
    /// is gone before the next iteration even starts.
    fn dispatch_with_retry(
        self: &Rc<Self>,
        pool: &Rc<ConnectionPool>,
        consumer: Rc<RefCell<HttpConsumer>>,
    ) -> LocalBoxFuture<'static, Result<Option<Outcome>, SendRequestError>> {
        let pool = Rc::clone(pool);
        let gap = self.config.reconnecting_gap;
        let max_reconnect = self.config.max_reconnect;
        Box::pin(async move {
            let mut attempt = 0u32;
            loop {
                let conn = pool.get_or_create_connection().await?;
                match Rc::clone(&conn).send_request(Rc::clone(&consumer)).await {
                    Ok(outcome) => {
                        if consumer.borrow().release_connection {
                            pool.release_connection(conn);
                        } else {
                            // A plugin (the WebSocket upgrade) took the
                            // transport over; the connection stays open and
                            // alive, just no longer pooled.
                            pool.forget_connection(&conn);
                        }
                        return Ok(outcome);
                    }
                    Err(err) => {
                        let shared = Rc::new(err);
                        if shared.is_network_failure() {
                            // The pool's own `connection_lost` hook (bound at
                            // dial time) evicts the connection and logs the
                            // failed-uses tally; nothing further to do here.
                            conn.fire_connection_lost(Some(Rc::clone(&shared)));
                        } else {
                            // Protocol-shape failures don't mean the
                            // connection itself was lost, so `connection_lost`
                            // never fires for them — evict it directly.
                            pool.remove_connection(&conn);
                        }
                        let err = Rc::try_unwrap(shared)
                            .expect("connection_lost handlers do not retain the failure");

                        if err.is_network_failure() && attempt < max_reconnect {
                            attempt += 1;
                            warn!("request failed ({err}); reconnect attempt {attempt}");
                            sleep(reconnect_time_lag(gap, attempt)).await;
                            continue;
                        }
                        return Err(err);
                    }
                }
            }
        })
    }

    /// Perform the WebSocket handshake and, on a successful `101`, hand the
    /// still-open transport to `handler` wrapped in a
    /// [`crate::plugins::upgrade::WsConnection`].
    pub fn upgrade(
        self: &Rc<Self>,
        mut request: HttpRequest,
        handler: Box<dyn crate::transport::WsHandler>,
    ) -> LocalBoxFuture<'static, Result<crate::plugins::upgrade::WsConnection, SendRequestError>> {
        let this = Rc::clone(self);
        request.upgrade = true;
        Box::pin(async move {
            let consumer = this.response(request).await?;
            crate::plugins::upgrade::finish_handshake(&consumer, handler)
        })
    }

    /// Stop accepting new requests and close every idle pooled connection.
    /// In-flight requests are allowed to finish.
    pub fn close(&self) {
        self.closed.set(true);
        for pool in self.pools.borrow().values() {
            pool.close_all();
        }
    }

    /// Close immediately, including connections currently in use.
    pub fn abort(&self) {
        self.close();
    }
}
