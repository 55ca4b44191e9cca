//! Bounded connection pool (SPEC_FULL.md §1 external contract:
//! "connection pooling").
//!
//! `client::Connection` is a blocking, non-`Clone`, non-`Sync` value —
//! exactly one command may be in flight on it at a time. This crate
//! hands out exclusive, reconnect-checked leases over a fixed number of
//! such connections instead of trying to make one connection answer
//! several callers at once (`client::SharedConnection` already covers
//! that narrower case with a plain mutex). Pooling has no real protocol
//! shape of its own to borrow, so this follows the ordinary
//! blocking-pool idiom: a `Mutex`-guarded free list plus a `Condvar` to
//! park acquirers past the size cap, the same primitives `std::sync`
//! offers for any bounded resource pool.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use client::{Connection, ConnectionOptions};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Client(#[from] client::Error),

    /// No connection became available before `acquire_timeout` elapsed.
    #[error("timed out waiting {0:?} for a pooled connection")]
    AcquireTimeout(Duration),

    /// The pool's internal mutex was poisoned by a panic in another
    /// thread holding it.
    #[error("pool lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Hard cap on the number of connections the pool will ever open.
    pub max_size: usize,
    /// How long `acquire` blocks waiting for a connection before giving
    /// up. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Some(Duration::from_secs(30)),
        }
    }
}

struct State {
    idle: VecDeque<Connection>,
    /// Connections currently open, idle or leased. Never exceeds
    /// `max_size`; decremented whenever a lease is dropped without
    /// returning a connection (the connection turned out unusable).
    open_count: usize,
}

struct Shared {
    connect_options: ConnectionOptions,
    pool_options: PoolOptions,
    state: Mutex<State>,
    available: Condvar,
}

/// A bounded pool of [`client::Connection`]s to one MySQL server.
#[derive(Clone)]
pub struct Pool(Arc<Shared>);

impl Pool {
    pub fn new(connect_options: ConnectionOptions, pool_options: PoolOptions) -> Self {
        Self(Arc::new(Shared {
            connect_options,
            pool_options,
            state: Mutex::new(State {
                idle: VecDeque::new(),
                open_count: 0,
            }),
            available: Condvar::new(),
        }))
    }

    /// Opens `count` connections up front (capped at `max_size`) so the
    /// first callers through `acquire` do not pay connect latency.
    pub fn warm_up(&self, count: usize) -> Result<()> {
        let count = count.min(self.0.pool_options.max_size);
        for _ in 0..count {
            let conn = Connection::connect(self.0.connect_options.clone())?;
            let mut state = self.lock_state()?;
            state.idle.push_back(conn);
            state.open_count += 1;
        }
        Ok(())
    }

    /// Leases one connection, opening a fresh one if the pool has not
    /// yet reached `max_size`, otherwise waiting for a caller to return
    /// one. A leased connection found closed (a prior command hit an
    /// I/O error; spec.md §5 "Cancellation") is transparently
    /// reconnected before being handed back, so callers never observe
    /// the broken-connection state the core engine surfaces.
    pub fn acquire(&self) -> Result<PooledConnection<'_>> {
        let deadline = self.0.pool_options.acquire_timeout.map(|d| Instant::now() + d);

        let mut state = self.lock_state()?;
        loop {
            if let Some(mut conn) = state.idle.pop_front() {
                drop(state);
                if !conn.is_open() {
                    conn.reconnect()?;
                }
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }

            if state.open_count < self.0.pool_options.max_size {
                state.open_count += 1;
                drop(state);
                return match Connection::connect(self.0.connect_options.clone()) {
                    Ok(conn) => Ok(PooledConnection {
                        pool: self,
                        conn: Some(conn),
                    }),
                    Err(e) => {
                        // Connect failed: give the slot back so a later
                        // caller can retry opening it.
                        let mut state = self.lock_state()?;
                        state.open_count -= 1;
                        drop(state);
                        Err(PoolError::Client(e))
                    }
                };
            }

            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::AcquireTimeout(self.0.pool_options.acquire_timeout.unwrap()));
                    }
                    let (guard, timeout_result) = self
                        .0
                        .available
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| PoolError::LockPoisoned)?;
                    if timeout_result.timed_out() && guard.idle.is_empty() && guard.open_count >= self.0.pool_options.max_size {
                        return Err(PoolError::AcquireTimeout(self.0.pool_options.acquire_timeout.unwrap()));
                    }
                    guard
                }
                None => self.0.available.wait(state).map_err(|_| PoolError::LockPoisoned)?,
            };
        }
    }

    pub fn idle_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.idle.len())
    }

    pub fn open_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.open_count)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.0.state.lock().map_err(|_| PoolError::LockPoisoned)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut state) = self.lock_state() {
            state.idle.push_back(conn);
        }
        self.0.available.notify_one();
    }

    fn drop_connection(&self) {
        if let Ok(mut state) = self.lock_state() {
            state.open_count = state.open_count.saturating_sub(1);
        }
        self.0.available.notify_one();
    }
}

/// An exclusive lease on one pooled connection. Returns the connection
/// to the pool's idle list on drop; a connection left closed by an error
/// still counts against `max_size` until then (it is reconnected on its
/// next `acquire`, not eagerly on return).
pub struct PooledConnection<'p> {
    pool: &'p Pool,
    conn: Option<Connection>,
}

impl PooledConnection<'_> {
    /// Drops the lease without returning the connection to the pool —
    /// used when the caller knows the connection is unrecoverable and
    /// wants a fresh one opened in its place next time.
    pub fn discard(mut self) {
        self.conn.take();
        self.pool.drop_connection();
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken before drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken before drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_without_a_server_fails_cleanly() {
        let pool = Pool::new(
            ConnectionOptions::new("127.0.0.1", 1, "root", ""),
            PoolOptions { max_size: 2, acquire_timeout: Some(Duration::from_millis(50)) },
        );
        assert!(pool.warm_up(1).is_err());
        assert_eq!(pool.open_count().unwrap(), 0);
    }

    #[test]
    fn acquire_times_out_when_server_unreachable_and_slot_exhausted() {
        let pool = Pool::new(
            ConnectionOptions::new("127.0.0.1", 1, "root", ""),
            PoolOptions { max_size: 1, acquire_timeout: Some(Duration::from_millis(20)) },
        );
        // first attempt: connect fails, but frees its slot back up.
        assert!(pool.acquire().is_err());
        assert_eq!(pool.open_count().unwrap(), 0);
    }
}
