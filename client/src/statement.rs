//! Prepared-statement manager (component F, §4.F) and the per-statement
//! data model (§3 "Statement").
//!
//! Follows the same "server id + owned metadata, rekeyed on reconnect"
//! shape used for binlog position bookkeeping in
//! `connection::conn::connection_options::ConnectionOptions::update_binlog_position`
//! — update in place, never reissue a fresh client-visible identity.
//!
//! Rust ownership note (see DESIGN.md): rather than embedding an
//! `Arc<RefCell<Connection>>` in each statement object, a `Statement`
//! lives in the connection's statement map and callers hold a
//! `StatementHandle` — a small `Copy` key that stays valid across
//! `reconnect()` even though the server-assigned id behind it changes.
//! `Connection::statement(handle)` hands back a short-lived
//! `StatementCursor` for the ergonomic `bind_params`/`run`/`reset`/
//! `delete` call surface.

use std::collections::HashMap;

use crate::binder::Param;
use crate::field::FieldDescriptor;

/// Stable client-side identity for a prepared statement. Unlike the
/// server-assigned statement id (which is rekeyed on every reconnect),
/// this value never changes for the lifetime of the handle. Carries the
/// owning connection's id so a handle used against a different
/// connection is rejected as `cross-connection-use` (spec.md §4.H)
/// rather than silently aliasing an unrelated statement that happens to
/// share the same numeric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle {
    pub(crate) conn_id: u64,
    pub(crate) id: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ParamSlot {
    pub(crate) value: Option<Param>,
    pub(crate) long_data_sent: bool,
}

impl ParamSlot {
    fn empty() -> Self {
        Self {
            value: None,
            long_data_sent: false,
        }
    }
}

#[derive(Debug)]
pub struct Statement {
    pub(crate) server_id: u32,
    pub(crate) sql: String,
    pub(crate) param_count: usize,
    pub(crate) params: Vec<ParamSlot>,
    pub(crate) fields: Vec<FieldDescriptor>,
    /// True when the next EXECUTE must re-send the parameter type block
    /// (spec.md GLOSSARY "Rebind"): set after bind, reset, or reconnect.
    pub(crate) rebind: bool,
}

impl Statement {
    pub(crate) fn new(server_id: u32, sql: String, param_count: usize, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            server_id,
            sql,
            param_count,
            params: (0..param_count).map(|_| ParamSlot::empty()).collect(),
            fields,
            rebind: true,
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Re-materialises this statement's server-side identity after a
    /// reconnect (§4.F): new id, and — since spec.md's open question
    /// says field/param metadata must not be trusted across reconnect —
    /// fresh field/param counts copied in wholesale. Previously bound
    /// parameter *values* are preserved; only the slot count is
    /// reconciled if the server now reports a different param count.
    pub(crate) fn repreprare(&mut self, new_server_id: u32, param_count: usize, fields: Vec<FieldDescriptor>) {
        self.server_id = new_server_id;
        self.fields = fields;
        if param_count != self.param_count {
            self.params = (0..param_count).map(|_| ParamSlot::empty()).collect();
            self.param_count = param_count;
        }
        self.rebind = true;
    }
}

/// Owns every live prepared statement for one connection generation,
/// keyed by the stable client-side handle.
#[derive(Debug)]
pub struct StatementManager {
    conn_id: u64,
    statements: HashMap<u64, Statement>,
    next_handle: u64,
}

impl StatementManager {
    pub fn new(conn_id: u64) -> Self {
        Self {
            conn_id,
            statements: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn insert(&mut self, statement: Statement) -> StatementHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.statements.insert(id, statement);
        StatementHandle { conn_id: self.conn_id, id }
    }

    /// Looks up `handle`, returning `None` both when the statement has
    /// been closed and when `handle` belongs to a different connection
    /// generation — callers distinguish the latter via
    /// [`StatementManager::owns`].
    pub fn get(&self, handle: StatementHandle) -> Option<&Statement> {
        if handle.conn_id != self.conn_id {
            return None;
        }
        self.statements.get(&handle.id)
    }

    pub fn get_mut(&mut self, handle: StatementHandle) -> Option<&mut Statement> {
        if handle.conn_id != self.conn_id {
            return None;
        }
        self.statements.get_mut(&handle.id)
    }

    pub fn remove(&mut self, handle: StatementHandle) -> Option<Statement> {
        if handle.conn_id != self.conn_id {
            return None;
        }
        self.statements.remove(&handle.id)
    }

    /// True iff `handle` was minted by this connection generation (even
    /// if the statement it named has since been closed) — used to tell
    /// `cross-connection-use` apart from a plain stale handle.
    pub fn owns(&self, handle: StatementHandle) -> bool {
        handle.conn_id == self.conn_id
    }

    /// All live handles, in insertion order — used by reconnect replay
    /// so re-PREPARE happens in the order statements were first created.
    pub fn handles(&self) -> Vec<StatementHandle> {
        let mut ids: Vec<_> = self.statements.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| StatementHandle { conn_id: self.conn_id, id }).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Ergonomic, short-lived handle returned by `Connection::statement`:
/// borrows the connection so `bind_params`/`run`/`reset`/`delete`/
/// `send_long_data` read as method calls on "the statement" while the
/// actual state lives in the connection's `StatementManager` (see the
/// module doc comment's ownership note).
pub struct StatementCursor<'a> {
    conn: &'a mut crate::connection::Connection,
    handle: StatementHandle,
}

impl<'a> StatementCursor<'a> {
    pub(crate) fn new(conn: &'a mut crate::connection::Connection, handle: StatementHandle) -> Self {
        Self { conn, handle }
    }

    pub fn handle(&self) -> StatementHandle {
        self.handle
    }

    pub fn param_count(&self) -> crate::error::Result<usize> {
        Ok(self.conn.statement_ref(self.handle)?.param_count())
    }

    pub fn fields(&self) -> crate::error::Result<Vec<FieldDescriptor>> {
        Ok(self.conn.statement_ref(self.handle)?.fields().to_vec())
    }

    /// Binds `params` onto the statement's placeholders (spec.md §4.G).
    pub fn bind_params(&mut self, params: impl crate::binder::IntoParams) -> crate::error::Result<&mut Self> {
        self.conn.bind_params(self.handle, params)?;
        Ok(self)
    }

    /// Streams `data` to the server as one parameter's long data,
    /// chunked to `pkt_size` bytes per `STMT_SEND_LONG_DATA` packet
    /// (spec.md §4.D).
    pub fn send_long_data(
        &mut self,
        param_index: usize,
        data: impl std::io::Read,
        pkt_size: usize,
    ) -> crate::error::Result<&mut Self> {
        self.conn.send_long_data(self.handle, param_index, data, pkt_size)?;
        Ok(self)
    }

    /// Executes the statement with its currently bound parameters
    /// (spec.md §4.D "EXECUTE").
    pub fn run(&mut self) -> crate::error::Result<crate::result::ResultState> {
        self.conn.execute_statement(self.handle)
    }

    /// `run(values…)` per spec.md §6's Statement surface: binds `params`
    /// then executes in one call, for callers that don't need
    /// `bind_params` as a separate step.
    pub fn run_with(&mut self, params: impl crate::binder::IntoParams) -> crate::error::Result<crate::result::ResultState> {
        self.bind_params(params)?;
        self.run()
    }

    /// `STMT_RESET` (spec.md §9's open-question resolution: reset sends
    /// `STMT_RESET`, never `STMT_CLOSE`): clears bound parameter values
    /// and cancels any cursor the server held open.
    pub fn reset(&mut self) -> crate::error::Result<()> {
        self.conn.reset_statement(self.handle)
    }

    /// `STMT_CLOSE`: releases the statement on both client and server
    /// and invalidates this handle.
    pub fn delete(self) -> crate::error::Result<()> {
        self.conn.delete_statement(self.handle)
    }
}
