//! Thread-safe connection wrapper (component H, spec.md §9 REDESIGN
//! FLAGS: "composition instead of inheritance").
//!
//! `SharedConnection` *holds* an `Arc<Mutex<Connection>>` and re-exposes
//! the operations callers need — composition over subclassing, following
//! the same `Arc<Mutex<...>>`-around-a-raw-resource shape used elsewhere
//! (e.g. `binlog::decoder::event_statistics`). The result/transaction
//! handles returned here hold the `MutexGuard` directly — releasing the
//! lock on `Drop` rather than through a free-floating "in use" flag.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::field::FieldDescriptor;
use crate::options::ConnectionOptions;
use crate::result::Row;
use crate::statement::StatementHandle;

/// A `Connection` behind a mutex, cloneable and shareable across
/// threads. Exactly one command may be in flight at a time (spec.md §3);
/// the mutex enforces that directly instead of needing a separate
/// in-flight flag.
#[derive(Debug, Clone)]
pub struct SharedConnection(Arc<Mutex<Connection>>);

impl SharedConnection {
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Connection::connect(options)?))))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self(Arc::new(Mutex::new(conn)))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.0.lock().map_err(|_| Error::LockPoisoned)
    }

    pub fn ping(&self) -> Result<()> {
        self.lock()?.ping()
    }

    pub fn use_db(&self, db: &str) -> Result<()> {
        self.lock()?.use_db(db)
    }

    pub fn reconnect(&self) -> Result<()> {
        self.lock()?.reconnect()
    }

    pub fn close(&self) -> Result<()> {
        self.lock()?.close()
    }

    pub fn is_open(&self) -> Result<bool> {
        Ok(self.lock()?.is_open())
    }

    pub fn exec(&self, sql: &str) -> Result<u64> {
        self.lock()?.exec(sql)
    }

    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.lock()?.query(sql)
    }

    /// Opens a streaming result, holding the connection's lock until the
    /// returned `SharedResult` is drained or dropped.
    pub fn start(&self, sql: &str) -> Result<SharedResult<'_>> {
        let mut guard = self.lock()?;
        let result = guard.start(sql)?;
        Ok(SharedResult { guard, result })
    }

    pub fn prepare(&self, sql: &str) -> Result<StatementHandle> {
        self.lock()?.prepare(sql)
    }

    /// Begins a transaction, holding the lock until `commit`/`rollback`
    /// (or `Drop`, which rolls back).
    pub fn begin(&self) -> Result<SharedTransaction<'_>> {
        let mut guard = self.lock()?;
        guard.exec("BEGIN")?;
        Ok(SharedTransaction { guard, done: false })
    }
}

/// A streaming result obtained through `SharedConnection::start`. Holds
/// the connection's lock for its lifetime; dropping it drains any
/// remaining rows so the connection is left idle for the next caller.
pub struct SharedResult<'a> {
    guard: MutexGuard<'a, Connection>,
    result: crate::result::ResultState,
}

impl SharedResult<'_> {
    pub fn fields(&self) -> &[FieldDescriptor] {
        self.result.fields()
    }

    pub fn affected_rows(&self) -> u64 {
        self.result.affected_rows()
    }

    pub fn get_row(&mut self) -> Result<Option<Row>> {
        self.result.get_row(&mut self.guard)
    }

    /// Releases the lock explicitly, after draining any remaining rows.
    pub fn close(mut self) -> Result<()> {
        self.result.drain(&mut self.guard)
    }
}

impl Drop for SharedResult<'_> {
    fn drop(&mut self) {
        let _ = self.result.drain(&mut self.guard);
    }
}

/// A transaction obtained through `SharedConnection::begin`. Holds the
/// connection's lock until committed, rolled back, or dropped.
pub struct SharedTransaction<'a> {
    guard: MutexGuard<'a, Connection>,
    done: bool,
}

impl SharedTransaction<'_> {
    pub fn exec(&mut self, sql: &str) -> Result<u64> {
        self.guard.exec(sql)
    }

    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.guard.query(sql)
    }

    pub fn prepare(&mut self, sql: &str) -> Result<StatementHandle> {
        self.guard.prepare(sql)
    }

    pub fn commit(mut self) -> Result<()> {
        self.guard.exec("COMMIT")?;
        self.done = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.guard.exec("ROLLBACK")?;
        self.done = true;
        Ok(())
    }
}

impl Drop for SharedTransaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.guard.exec("ROLLBACK");
        }
    }
}
