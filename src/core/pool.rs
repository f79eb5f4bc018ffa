//! Bounded connection pool
//!
//! The pool is the one component built for concurrent use. Checkout and checkin
//! happen under a single mutex, so a connection is never handed to two holders
//! at once and the number of outstanding checkouts never exceeds `max_size`.
//! Once checked out, a connection belongs to its holder until the
//! [`PooledConnection`] guard is dropped.

use super::backend::Driver;
use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::session::Session;
use parking_lot::{Condvar, Mutex};
use serde::Deserialize;
use std::ops::Deref;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// What `checkout` does when every connection is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Wait for a checkin, up to the checkout timeout
    #[default]
    Block,
    /// Fail immediately with `PoolExhausted`
    Fail,
}

fn default_max_size() -> usize {
    16
}

fn default_checkout_timeout_ms() -> Option<u64> {
    Some(5_000)
}

/// Pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Open every connection up front instead of on demand
    #[serde(default)]
    pub eager: bool,
    /// How long a blocked checkout waits; `None` waits forever
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: Option<u64>,
    /// Behaviour when the pool is exhausted
    #[serde(default)]
    pub exhausted: ExhaustedPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            eager: false,
            checkout_timeout_ms: default_checkout_timeout_ms(),
            exhausted: ExhaustedPolicy::Block,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }

    /// Set maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Open all connections when the pool is created
    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// Set connection acquisition timeout
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Wait for a free connection without a deadline
    pub fn without_checkout_timeout(mut self) -> Self {
        self.checkout_timeout_ms = None;
        self
    }

    /// Set the exhaustion policy
    pub fn with_exhausted_policy(mut self, policy: ExhaustedPolicy) -> Self {
        self.exhausted = policy;
        self
    }

    /// Checkout timeout as a `Duration`
    pub fn checkout_timeout(&self) -> Option<Duration> {
        self.checkout_timeout_ms.map(Duration::from_millis)
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently open (idle plus in use)
    pub size: usize,
    /// Connections waiting in the pool
    pub idle: usize,
    /// Connections checked out
    pub in_use: usize,
    /// Callers blocked in `checkout`
    pub waiting: usize,
}

type ConnectionFactory = Box<dyn Fn() -> Result<Connection> + Send + Sync>;

struct PoolState {
    idle: Vec<Connection>,
    size: usize,
    in_use: usize,
    waiting: usize,
    closed: bool,
}

/// A bounded set of connections shared between threads
pub struct Pool {
    config: PoolConfig,
    factory: ConnectionFactory,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl Pool {
    /// Create a pool whose connections are opened with driver `D`
    pub fn new<D: Driver>(options: D::Options, config: PoolConfig) -> Result<Self> {
        Self::with_factory(config, move || Connection::open::<D>(&options))
    }

    /// Create a pool around an arbitrary connection factory
    ///
    /// # Errors
    ///
    /// Returns an error if `max_size` is zero, or if eager creation fails.
    pub fn with_factory<F>(config: PoolConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Connection> + Send + Sync + 'static,
    {
        if config.max_size == 0 {
            return Err(DatabaseError::open("pool max_size must be at least 1"));
        }

        let mut idle = Vec::with_capacity(config.max_size);
        if config.eager {
            for _ in 0..config.max_size {
                idle.push(factory()?);
            }
        }
        debug!(
            max_size = config.max_size,
            opened = idle.len(),
            policy = ?config.exhausted,
            "pool created"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                size: idle.len(),
                idle,
                in_use: 0,
                waiting: 0,
                closed: false,
            }),
            available: Condvar::new(),
            factory: Box::new(factory),
            config,
        })
    }

    /// The pool's configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out a connection, honouring the exhaustion policy
    ///
    /// # Errors
    ///
    /// - `PoolClosed` once [`close`](Pool::close) has been called
    /// - `PoolExhausted` under [`ExhaustedPolicy::Fail`]
    /// - `PoolTimeout` when a blocked checkout reaches its deadline
    /// - any error from opening a new connection
    pub fn checkout(&self) -> Result<PooledConnection<'_>> {
        let deadline = self
            .config
            .checkout_timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = self.state.lock();

        loop {
            if let Some(acquired) = self.try_acquire(&mut state) {
                drop(state);
                return acquired;
            }

            if self.config.exhausted == ExhaustedPolicy::Fail {
                return Err(DatabaseError::pool_exhausted(state.in_use, self.config.max_size));
            }

            state.waiting += 1;
            trace!(waiting = state.waiting, "waiting for pooled connection");
            let timed_out = match deadline {
                Some(deadline) => self.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };
            state.waiting -= 1;

            if timed_out && !self.can_acquire(&state) {
                let timeout_ms = self.config.checkout_timeout_ms.unwrap_or_default();
                warn!(timeout_ms, in_use = state.in_use, "pool checkout timed out");
                return Err(DatabaseError::pool_timeout(timeout_ms));
            }
        }
    }

    /// Check out a connection without ever blocking
    ///
    /// Returns `Ok(None)` when the pool is exhausted.
    pub fn try_checkout(&self) -> Result<Option<PooledConnection<'_>>> {
        let mut state = self.state.lock();
        match self.try_acquire(&mut state) {
            Some(acquired) => {
                drop(state);
                acquired.map(Some)
            }
            None => Ok(None),
        }
    }

    fn can_acquire(&self, state: &PoolState) -> bool {
        state.closed || !state.idle.is_empty() || state.size < self.config.max_size
    }

    /// Take an idle connection or reserve a slot for a new one
    ///
    /// Returns `None` when the caller has to wait. Opening a new connection
    /// happens with the lock held; the slot is released again if it fails.
    fn try_acquire(&self, state: &mut PoolState) -> Option<Result<PooledConnection<'_>>> {
        if state.closed {
            return Some(Err(DatabaseError::PoolClosed));
        }

        if let Some(connection) = state.idle.pop() {
            state.in_use += 1;
            trace!(in_use = state.in_use, "pooled connection checked out");
            return Some(Ok(PooledConnection::new(self, connection)));
        }

        if state.size < self.config.max_size {
            return Some(match (self.factory)() {
                Ok(connection) => {
                    state.size += 1;
                    state.in_use += 1;
                    debug!(size = state.size, "pool opened connection");
                    Ok(PooledConnection::new(self, connection))
                }
                Err(e) => {
                    warn!(error = %e, "pool failed to open connection");
                    Err(e)
                }
            });
        }

        None
    }

    /// Return a connection to the pool
    ///
    /// Equivalent to dropping the guard.
    pub fn checkin(&self, connection: PooledConnection<'_>) {
        drop(connection);
    }

    fn release(&self, connection: Connection) {
        let mut state = self.state.lock();
        state.in_use -= 1;
        if state.closed {
            state.size -= 1;
            drop(state);
            if let Err(e) = connection.close() {
                warn!(error = %e, "failed to close connection returned to closed pool");
            }
        } else {
            state.idle.push(connection);
            trace!(in_use = state.in_use, "pooled connection checked in");
            drop(state);
        }
        self.available.notify_one();
    }

    /// Open a session over a checked-out connection
    ///
    /// The connection goes back to the pool when the session is dropped.
    pub fn session(&self) -> Result<Session<'_>> {
        Ok(Session::from_pooled(self.checkout()?))
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            size: state.size,
            idle: state.idle.len(),
            in_use: state.in_use,
            waiting: state.waiting,
        }
    }

    /// Whether [`close`](Pool::close) has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Close the pool
    ///
    /// Idle connections are closed now, checked-out ones when they come back.
    /// Every later or blocked checkout fails with `PoolClosed`.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.size -= idle.len();
            idle
        };
        debug!(closed = idle.len(), "pool closing");
        for connection in idle {
            if let Err(e) = connection.close() {
                warn!(error = %e, "failed to close idle connection");
            }
        }
        self.available.notify_all();
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A connection checked out of a [`Pool`]
///
/// Dereferences to [`Connection`]; dropping it checks the connection back in.
pub struct PooledConnection<'p> {
    pool: &'p Pool,
    // Always `Some` until dropped
    connection: Option<Connection>,
}

impl<'p> PooledConnection<'p> {
    fn new(pool: &'p Pool, connection: Connection) -> Self {
        Self {
            pool,
            connection: Some(connection),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self.connection.as_ref() {
            Some(connection) => connection,
            None => unreachable!("pooled connection used after checkin"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledConnection")
            .field(&**self)
            .finish()
    }
}
