//! The connection pool: one per `(address, idle_timeout)` pair, owning the
//! reconnect and retirement policy for every connection it hands out.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_core::future::LocalBoxFuture;
use log::warn;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ConsumerError, SendRequestError};
use crate::request::{Address, PoolKey};
use crate::transport::{Connector, TlsConnector};

/// `base_gap * (ln(attempt) + 1)`. The original Python client multiplied its
/// own `reconnecting_gap` field in place on every call (`self.reconnecting_gap
/// * (log(attempt) + 1)`, then stored the *result* back into
/// `reconnecting_gap`), so each reconnect compounded the previous delay
/// instead of scaling a fixed base — an unintended geometric blowup rather
/// than the logarithmic backoff the formula was clearly meant to express.
/// This always scales the configured base.
pub fn reconnect_time_lag(base_gap: Duration, attempt: u32) -> Duration {
    let attempt = attempt.max(1) as f64;
    base_gap.mul_f64(attempt.ln() + 1.0)
}

struct PoolState {
    available: VecDeque<Rc<Connection>>,
    concurrent: Vec<Rc<Connection>>,
}

/// Pools connections for one address/idle-timeout pair and runs the
/// reconnect policy for every connection it owns.
pub struct ConnectionPool {
    pub key: PoolKey,
    config: ClientConfig,
    connector: Rc<dyn Connector>,
    tls: Option<Rc<dyn TlsConnector>>,
    state: RefCell<PoolState>,
    reconnect_attempts: RefCell<HashMap<usize, u32>>,
    registry: Weak<RefCell<HashMap<PoolKey, Rc<ConnectionPool>>>>,
}

impl ConnectionPool {
    pub fn new(
        key: PoolKey,
        config: ClientConfig,
        connector: Rc<dyn Connector>,
        tls: Option<Rc<dyn TlsConnector>>,
        registry: Weak<RefCell<HashMap<PoolKey, Rc<ConnectionPool>>>>,
    ) -> Rc<Self> {
        Rc::new(ConnectionPool {
            key,
            config,
            connector,
            tls,
            state: RefCell::new(PoolState { available: VecDeque::new(), concurrent: Vec::new() }),
            reconnect_attempts: RefCell::new(HashMap::new()),
            registry,
        })
    }

    fn address(&self) -> &Address {
        &self.key.0
    }

    fn idle_timeout(&self) -> Duration {
        self.key.1
    }

    /// Hand out a connection: reuse an idle one if a non-stale one is
    /// available, otherwise dial a new one subject to `max_connections`.
    pub fn get_or_create_connection(self: &Rc<Self>) -> LocalBoxFuture<'static, Result<Rc<Connection>, SendRequestError>> {
        let this = Rc::clone(self);
        Box::pin(async move {
            loop {
                let popped = {
                    let mut state = this.state.borrow_mut();
                    state.available.pop_front()
                };
                match popped {
                    Some(conn) if conn.is_closed() || conn.is_stale(this.idle_timeout()) => {
                        conn.close();
                        continue;
                    }
                    Some(conn) => {
                        this.state.borrow_mut().concurrent.push(Rc::clone(&conn));
                        return Ok(conn);
                    }
                    None => break,
                }
            }

            {
                let state = this.state.borrow();
                if this.config.max_connections > 0 && state.concurrent.len() >= this.config.max_connections {
                    return Err(SendRequestError::TooManyConnections);
                }
            }

            let conn = this.dial().await?;
            this.state.borrow_mut().concurrent.push(Rc::clone(&conn));
            Ok(conn)
        })
    }

    fn dial(self: &Rc<Self>) -> LocalBoxFuture<'static, Result<Rc<Connection>, SendRequestError>> {
        let this = Rc::clone(self);
        Box::pin(async move {
            let address = this.address().clone();
            let transport = this
                .connector
                .connect(&address)
                .await
                .map_err(SendRequestError::Connect)?;
            let conn = Connection::new(address, transport.into(), this.tls.clone());

            let pool_for_lost = Rc::clone(&this);
            let conn_id = Rc::as_ptr(&conn) as usize;
            let conn_for_hook = Rc::downgrade(&conn);
            conn.bind_connection_lost(move |_, err| {
                if let Some(conn) = conn_for_hook.upgrade() {
                    pool_for_lost.on_connection_lost(&conn, conn_id, err.cloned());
                }
                None
            });

            Ok(conn)
        })
    }

    /// Bound once per connection at dial time, and driven by
    /// `Client::dispatch_with_retry` firing `connection_lost` on the
    /// connection whenever a network failure (as opposed to a protocol-shape
    /// one) ends its exchange. Evicts the connection and logs how many
    /// requests it served. The retry-count enforcement for the request in
    /// flight lives separately, in `dispatch_with_retry`'s own loop counter —
    /// that loop dials a fresh connection on every attempt, so a
    /// per-connection counter here would never see more than one failure per
    /// identity.
    fn on_connection_lost(self: &Rc<Self>, conn: &Rc<Connection>, conn_id: usize, err: Option<ConsumerError>) {
        let attempt = {
            let mut attempts = self.reconnect_attempts.borrow_mut();
            let slot = attempts.entry(conn_id).or_insert(0);
            *slot += 1;
            *slot
        };
        warn!("connection to {:?} lost after {attempt} uses ({err:?})", self.address());
        self.remove_connection(conn);
    }

    /// Return a connection to the pool once its current exchange is done.
    pub fn release_connection(self: &Rc<Self>, conn: Rc<Connection>) {
        {
            let mut state = self.state.borrow_mut();
            state.concurrent.retain(|c| !Rc::ptr_eq(c, &conn));
        }
        if conn.is_closed() {
            self.remove_connection(&conn);
            return;
        }
        conn.mark_released();
        self.state.borrow_mut().available.push_back(conn);
        self.maybe_remove_self();
    }

    /// Drop a connection from the pool entirely (it will not be reused or
    /// reconnected). Matches by identity, not by scanning for an equal key,
    /// since two distinct connections are never meant to compare equal.
    pub fn remove_connection(self: &Rc<Self>, conn: &Rc<Connection>) {
        conn.close();
        self.forget_connection(conn);
    }

    /// Stop tracking a connection against this pool's `max_connections`
    /// budget without closing it — used when a plugin (the WebSocket
    /// upgrade) takes the transport over for something other than ordinary
    /// request/response reuse. The connection stays open; it's simply no
    /// longer this pool's to hand out or count.
    pub fn forget_connection(self: &Rc<Self>, conn: &Rc<Connection>) {
        let mut state = self.state.borrow_mut();
        state.available.retain(|c| !Rc::ptr_eq(c, conn));
        state.concurrent.retain(|c| !Rc::ptr_eq(c, conn));
        drop(state);
        self.reconnect_attempts.borrow_mut().remove(&(Rc::as_ptr(conn) as usize));
        self.maybe_remove_self();
    }

    /// Remove this pool from the client's registry once it holds no
    /// connections at all. The original's `remove_pool` looked the pool up
    /// by key and deleted it whenever the stored value was falsy (an empty
    /// pool object, which is always falsy in Python regardless of *which*
    /// pool it was) — so a second pool freshly created for the same key
    /// while an old, emptied-out pool was mid-teardown could be deleted by
    /// that stale teardown. Comparing by `Rc::ptr_eq` here means a pool only
    /// ever removes itself, never a same-keyed successor.
    fn maybe_remove_self(self: &Rc<Self>) {
        let empty = {
            let state = self.state.borrow();
            state.available.is_empty() && state.concurrent.is_empty()
        };
        if !empty {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.borrow_mut();
            if let Some(existing) = registry.get(&self.key) {
                if Rc::ptr_eq(existing, self) {
                    registry.remove(&self.key);
                }
            }
        }
    }

    pub fn close_all(&self) {
        let state = self.state.borrow();
        for conn in state.available.iter().chain(state.concurrent.iter()) {
            conn.close();
        }
    }
}
