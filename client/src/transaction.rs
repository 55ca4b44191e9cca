//! Transaction handle (spec.md §4.H, §9 REDESIGN FLAGS).
//!
//! Per spec.md §9's redesign note, a `Transaction<'a>` borrows the
//! connection for its lifetime rather than embedding an owned
//! `Connection` — the borrow checker enforces "only one thing touches
//! the wire at a time" for free instead of needing a runtime guard.

use crate::connection::Connection;
use crate::error::Result;

/// Exclusive, scoped access to a connection between `BEGIN` and
/// `COMMIT`/`ROLLBACK`. Holding a `Transaction` makes the borrow checker
/// refuse any other use of the connection until it is consumed.
pub struct Transaction<'a> {
    conn: &'a mut Connection,
    done: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self {
        Self { conn, done: false }
    }

    /// Runs `sql` within the transaction, returning the same `ResultState`
    /// a direct `Connection::start` would.
    pub fn query(&mut self, sql: &str) -> Result<crate::result::ResultState> {
        self.conn.start(sql)
    }

    pub fn exec(&mut self, sql: &str) -> Result<u64> {
        self.conn.exec(sql)
    }

    pub fn prepare(&mut self, sql: &str) -> Result<crate::statement::StatementHandle> {
        self.conn.prepare(sql)
    }

    pub fn statement(&mut self, handle: crate::statement::StatementHandle) -> crate::statement::StatementCursor<'_> {
        self.conn.statement(handle)
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.exec("COMMIT")?;
        self.done = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.conn.exec("ROLLBACK")?;
        self.done = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    /// An undropped (i.e. neither committed nor rolled back) transaction
    /// is rolled back, matching MySQL's own behaviour when a session
    /// ends mid-transaction. Errors here are swallowed: there is no
    /// caller left to hand them to from inside `drop`.
    fn drop(&mut self) {
        if !self.done {
            let _ = self.conn.exec("ROLLBACK");
        }
    }
}
