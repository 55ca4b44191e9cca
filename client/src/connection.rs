//! Connection (§3 "Connection") and the command-engine integration that
//! drives handshake/auth (C), command dispatch (D), result streaming
//! (E), and prepared-statement reconnect replay (F) through one owned
//! transport.
//!
//! Grounded on `connection::conn::connection::Connection` in the
//! teacher for the overall "owns a channel, tracks session info,
//! exposes `try_connect`/`query`" shape; the `rows_pending` invariant,
//! init-command replay, and reconnect-time statement re-preparation have
//! no teacher analogue and are built directly from spec.md §3/§4.F/§7.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, instrument};

use proto::{ColumnType, PacketFramer};

use crate::binder::{check_param_count, IntoParams, Param};
use crate::command::{self, code};
use crate::error::{Error, Result};
use crate::escape::escape_string;
use crate::field::FieldDescriptor;
use crate::handshake::{self, Greeting};
use crate::options::ConnectionOptions;
use crate::result::{read_result_header, ResultState};
use crate::statement::{Statement, StatementCursor, StatementHandle, StatementManager};
use crate::status_flags::StatusFlags;
use crate::transaction::Transaction;
use crate::transport::Transport;

#[derive(Debug, Clone, Default)]
struct ServerInfo {
    protocol_version: u8,
    server_version: String,
    thread_id: u32,
    capability_flags: u32,
    collation: u8,
}

/// Process-wide source of unique connection ids, used to tag prepared
/// statement handles so a handle from one `Connection` can never alias a
/// statement in another (spec.md §4.H `cross-connection-use`).
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Owns one MySQL session end to end (spec.md §3 "Connection").
#[derive(Debug)]
pub struct Connection {
    id: u64,
    options: ConnectionOptions,
    framer: Option<PacketFramer<Transport>>,
    server: ServerInfo,
    status_flags: StatusFlags,
    statements: StatementManager,
    init_commands: Vec<String>,
    /// True iff a result set with >=1 field is open and not fully
    /// drained; no command other than row retrieval may run meanwhile
    /// (spec.md §3 invariant).
    rows_pending: bool,
}

impl Connection {
    /// Opens a transport, performs the handshake, and replays every
    /// registered init command. `options.database` (if set) is sent as
    /// part of the login packet per spec.md §4.C.
    #[instrument(skip(options), fields(host = %options.hostname, port = options.port))]
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        let mut conn = Self {
            id,
            options,
            framer: None,
            server: ServerInfo::default(),
            status_flags: StatusFlags::empty(),
            statements: StatementManager::new(id),
            init_commands: Vec::new(),
            rows_pending: false,
        };
        conn.open()?;
        Ok(conn)
    }

    /// Identity used to tag the prepared-statement handles this
    /// connection mints (spec.md §4.H `cross-connection-use`). Stable
    /// across `reconnect()` — only the server-assigned statement ids are
    /// rekeyed, never the client-visible connection identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Like [`Connection::connect`] but preserves a caller-built list of
    /// init commands and the statement map across the call (used by
    /// [`Connection::reconnect`]).
    fn open(&mut self) -> Result<()> {
        if self.framer.is_some() {
            return Err(Error::AlreadyConnected);
        }
        let transport = Transport::connect(&self.options)?;
        let mut framer = PacketFramer::new(transport, self.options.max_packet_size);

        let greeting_bytes = framer.read_packet()?;
        let greeting = handshake::parse_greeting(&greeting_bytes)?;
        if greeting.capability_flags & crate::capability_flags::CLIENT_PROTOCOL_41 == 0 {
            return Err(Error::UnsupportedProtocol(
                "server did not advertise CLIENT_PROTOCOL_41".to_string(),
            ));
        }

        self.server = ServerInfo {
            protocol_version: greeting.protocol_version,
            server_version: greeting.server_version.clone(),
            thread_id: greeting.thread_id,
            capability_flags: greeting.capability_flags,
            collation: greeting.server_collation,
        };
        self.status_flags = StatusFlags::from_bits_truncate(greeting.status_flags);

        self.authenticate(&mut framer, &greeting)?;
        self.framer = Some(framer);
        self.rows_pending = false;
        debug!(thread_id = self.server.thread_id, server_version = %self.server.server_version, "handshake complete");

        for sql in self.init_commands.clone() {
            let mut result = self.start(&sql)?;
            result.drain(self)?;
        }
        Ok(())
    }

    /// Drives the login exchange. Per spec.md §4.C, only an OK response
    /// is accepted — an auth-switch request or anything else fails the
    /// connection outright; this crate negotiates a single mechanism
    /// (`mysql_native_password`) and does not implement AUTH_SWITCH.
    fn authenticate(&self, framer: &mut PacketFramer<Transport>, greeting: &Greeting) -> Result<()> {
        let scrambled = handshake::scramble_native_password(&self.options.password, &greeting.scramble);
        let login = handshake::build_login_packet(
            &self.options.username,
            &scrambled,
            self.options.database.as_deref(),
            self.options.max_packet_size,
            None,
        );
        framer.write_packet(&login)?;

        let response = framer.read_packet()?;
        if response.is_empty() {
            return Err(Error::AuthFailed("empty authentication response".to_string()));
        }
        command::check_err(&response)?;
        if response[0] != command::response::OK {
            return Err(Error::AuthFailed(format!(
                "expected OK after login, got leading byte 0x{:02x} (auth-switch is not supported)",
                response[0]
            )));
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.framer.is_some()
    }

    /// Sends QUIT (ignoring any error, per spec.md §7) and always drops
    /// the transport handle.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut framer) = self.framer.take() {
            framer.start_command();
            let _ = framer.write_packet(&command::quit_packet());
        }
        self.rows_pending = false;
        Ok(())
    }

    /// Closes (if open) and reopens the transport, then replays every
    /// live prepared statement's PREPARE so existing `StatementHandle`s
    /// keep working (spec.md §4.F). Per spec.md §9's open question,
    /// cached field/param metadata is never trusted across reconnect —
    /// whatever the new PREPARE reports is taken as authoritative.
    #[instrument(skip(self))]
    pub fn reconnect(&mut self) -> Result<()> {
        let _ = self.close();
        self.open()?;

        debug!(statements = self.statements.handles().len(), "replaying prepared statements after reconnect");
        for handle in self.statements.handles() {
            let sql = match self.statements.get(handle) {
                Some(stmt) => stmt.sql().to_string(),
                None => continue,
            };
            let (server_id, param_count, fields) = self.do_prepare(&sql)?;
            if let Some(stmt) = self.statements.get_mut(handle) {
                stmt.repreprare(server_id, param_count, fields);
            }
        }
        Ok(())
    }

    pub fn thread_id(&self) -> u32 {
        self.server.thread_id
    }

    pub fn server_version(&self) -> &str {
        &self.server.server_version
    }

    /// Registers `sql` to be replayed (in registration order) after
    /// every successful handshake, including reconnects (spec.md §6).
    pub fn register_init(&mut self, sql: impl Into<String>) {
        self.init_commands.push(sql.into());
    }

    /// Caller-lowered packet size ceiling; returns the previous value.
    pub fn set_max_packet_size(&mut self, size: u32) -> u32 {
        let old = self.options.max_packet_size;
        self.options.max_packet_size = size;
        if let Some(framer) = self.framer.as_mut() {
            framer.set_max_packet_size(size);
        }
        old
    }

    pub fn escape_string(&self, s: &str) -> String {
        escape_string(s, self.status_flags.contains(StatusFlags::NO_BACKSLASH_ESCAPES))
    }

    fn framer_mut(&mut self) -> Result<&mut PacketFramer<Transport>> {
        self.framer.as_mut().ok_or(Error::NotConnected)
    }

    pub(crate) fn read_packet(&mut self) -> Result<Vec<u8>> {
        Ok(self.framer_mut()?.read_packet()?)
    }

    pub(crate) fn note_result_drained(&mut self, more_pending: bool) {
        self.rows_pending = more_pending;
    }

    /// Guards the drain-before-next-command invariant: returns
    /// `unreaded-rows` without emitting any wire traffic (spec.md §4.E).
    fn guard_idle(&self) -> Result<()> {
        if self.rows_pending {
            debug!("refusing command: a result set is still open");
            return Err(Error::UnreadRows);
        }
        Ok(())
    }

    fn begin_command(&mut self, payload: &[u8]) -> Result<()> {
        self.guard_idle()?;
        let framer = self.framer_mut()?;
        framer.start_command();
        framer.write_packet(payload)?;
        Ok(())
    }

    /// Runs a command whose response is always OK/ERR (no field
    /// stream): `INIT_DB`, `PING`, `STMT_CLOSE`, `STMT_RESET`.
    fn run_ok_command(&mut self, payload: &[u8]) -> Result<command::OkPacket> {
        if let Err(e) = self.begin_command(payload) {
            self.rows_pending = false;
            return Err(e);
        }
        let packet = match self.read_packet() {
            Ok(p) => p,
            Err(e) => {
                self.rows_pending = false;
                return Err(e);
            }
        };
        if let Err(e) = command::check_err(&packet) {
            self.rows_pending = false;
            return Err(e);
        }
        let ok = command::parse_ok(&packet)?;
        self.status_flags = ok.status_flags;
        self.rows_pending = false;
        Ok(ok)
    }

    pub fn ping(&mut self) -> Result<()> {
        self.run_ok_command(&command::ping_packet()).map(|_| ())
    }

    pub fn use_db(&mut self, db: &str) -> Result<()> {
        self.run_ok_command(&command::init_db_packet(db)).map(|_| ())
    }

    /// Issues `COM_QUERY` and opens the resulting text-protocol result
    /// (spec.md §4.D/§4.E). The result borrows exclusive access to the
    /// connection's read stream until drained.
    #[instrument(skip(self, sql), fields(sql_len = sql.len()))]
    pub fn start(&mut self, sql: &str) -> Result<ResultState> {
        if let Err(e) = self.begin_command(&command::query_packet(sql)) {
            self.rows_pending = false;
            return Err(e);
        }
        self.finish_opening_result(false)
    }

    /// `query` convenience named in spec.md §1/§6: collects a result to
    /// completion.
    pub fn query(&mut self, sql: &str) -> Result<Vec<crate::result::Row>> {
        let mut result = self.start(sql)?;
        let mut rows = Vec::new();
        while let Some(row) = result.get_row(self)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// `exec` convenience named in spec.md §1/§6: runs to completion and
    /// returns only the affected-row count, discarding any field stream.
    pub fn exec(&mut self, sql: &str) -> Result<u64> {
        let mut result = self.start(sql)?;
        let affected = result.affected_rows();
        result.drain(self)?;
        Ok(affected)
    }

    fn finish_opening_result(&mut self, binary: bool) -> Result<ResultState> {
        match read_result_header(self, binary) {
            Ok(header) => {
                self.rows_pending = header.is_streaming() || header.more_results();
                Ok(header)
            }
            Err(e) => {
                self.rows_pending = false;
                Err(e)
            }
        }
    }

    /// Advances a multi-result set produced by a prior `start`/EXECUTE
    /// when `more_results()` is true, per spec.md §4.E.
    pub fn next_result(&mut self, binary: bool) -> Result<ResultState> {
        self.finish_opening_result(binary)
    }

    /// PREPARE's wire exchange, shared by `prepare()` and reconnect
    /// replay (spec.md §4.D/§4.F): returns the fresh server id, param
    /// count, and column field descriptors.
    fn do_prepare(&mut self, sql: &str) -> Result<(u32, usize, Vec<FieldDescriptor>)> {
        if let Err(e) = self.begin_command(&command::stmt_prepare_packet(sql)) {
            self.rows_pending = false;
            return Err(e);
        }
        let result = (|| -> Result<(u32, usize, Vec<FieldDescriptor>)> {
            let first = self.read_packet()?;
            command::check_err(&first)?;
            let prep = command::parse_prepare_ok(&first)?;

            if prep.param_count > 0 {
                for _ in 0..prep.param_count {
                    let packet = self.read_packet()?;
                    command::check_err(&packet)?;
                }
                let eof = self.read_packet()?;
                command::check_err(&eof)?;
                if !command::is_eof(&eof) {
                    return Err(Error::BadResult("expected EOF after parameter list".to_string()));
                }
            }

            let mut fields = Vec::with_capacity(prep.column_count as usize);
            if prep.column_count > 0 {
                for _ in 0..prep.column_count {
                    let packet = self.read_packet()?;
                    command::check_err(&packet)?;
                    fields.push(FieldDescriptor::parse(&packet)?);
                }
                let eof = self.read_packet()?;
                command::check_err(&eof)?;
                if !command::is_eof(&eof) {
                    return Err(Error::BadResult("expected EOF after field list".to_string()));
                }
            }

            Ok((prep.statement_id, prep.param_count as usize, fields))
        })();

        self.rows_pending = false;
        result
    }

    /// `PREPARE`: inserts the new statement into the connection's
    /// statement map, keyed by a stable client-side handle (spec.md §3
    /// "Statement", §4.F).
    pub fn prepare(&mut self, sql: &str) -> Result<StatementHandle> {
        let (server_id, param_count, fields) = self.do_prepare(sql)?;
        let statement = Statement::new(server_id, sql.to_string(), param_count, fields);
        Ok(self.statements.insert(statement))
    }

    /// Borrows the statement for the ergonomic `bind_params`/`run`/
    /// `reset`/`delete` surface spec.md §6 names.
    pub fn statement(&mut self, handle: StatementHandle) -> StatementCursor<'_> {
        StatementCursor::new(self, handle)
    }

    pub(crate) fn statement_ref(&self, handle: StatementHandle) -> Result<&Statement> {
        if !self.statements.owns(handle) {
            return Err(Error::CrossConnectionUse);
        }
        self.statements
            .get(handle)
            .ok_or_else(|| Error::StaleStatement("statement handle is no longer valid".to_string()))
    }

    pub(crate) fn statement_mut(&mut self, handle: StatementHandle) -> Result<&mut Statement> {
        if !self.statements.owns(handle) {
            return Err(Error::CrossConnectionUse);
        }
        self.statements
            .get_mut(handle)
            .ok_or_else(|| Error::StaleStatement("statement handle is no longer valid".to_string()))
    }

    /// Binds `params` onto the statement's parameter slots and flips
    /// `rebind` (spec.md §4.G). `bind-count` is a caller error.
    pub(crate) fn bind_params(&mut self, handle: StatementHandle, params: impl IntoParams) -> Result<()> {
        let values = params.into_params();
        let stmt = self.statement_mut(handle)?;
        check_param_count(stmt.param_count(), &values)?;
        for (slot, value) in stmt.params.iter_mut().zip(values) {
            slot.value = Some(value);
            slot.long_data_sent = false;
        }
        stmt.rebind = true;
        Ok(())
    }

    pub(crate) fn reset_params(&mut self, handle: StatementHandle) -> Result<()> {
        let stmt = self.statement_mut(handle)?;
        for slot in stmt.params.iter_mut() {
            slot.value = None;
            slot.long_data_sent = false;
        }
        stmt.rebind = true;
        Ok(())
    }

    /// `STMT_SEND_LONG_DATA` (spec.md §4.D): streams `data` to the
    /// server in fixed `pkt_size - 6`-byte chunks, one command per
    /// non-empty chunk. Never generates a response.
    pub(crate) fn send_long_data(
        &mut self,
        handle: StatementHandle,
        param_index: usize,
        mut data: impl Read,
        pkt_size: usize,
    ) -> Result<()> {
        if pkt_size < 7 {
            return Err(Error::SmallPacketSize(pkt_size));
        }
        let (server_id, param_count) = {
            let stmt = self.statement_ref(handle)?;
            (stmt.server_id, stmt.param_count())
        };
        if param_index >= param_count {
            return Err(Error::WrongParamIndex { index: param_index, param_count });
        }

        let chunk_len = pkt_size - 6;
        let mut buf = vec![0u8; chunk_len];
        loop {
            let n = read_chunk(&mut data, &mut buf)?;
            if n == 0 {
                break;
            }
            self.guard_idle()?;
            let framer = self.framer_mut()?;
            framer.start_command();
            framer.write_packet(&command::stmt_send_long_data_packet(server_id, param_index as u16, &buf[..n]))?;
        }

        let stmt = self.statement_mut(handle)?;
        let slot = &mut stmt.params[param_index];
        slot.long_data_sent = true;
        if slot.value.is_none() {
            slot.value = Some(Param::Bytes(Vec::new()));
        }
        stmt.rebind = true;
        Ok(())
    }

    /// `STMT_RESET` (0x1a): per spec.md §9's resolution of the source's
    /// `Reset`/`STMT_CLOSE` ambiguity, this sends `STMT_RESET` and reads
    /// an OK response. `delete`/`STMT_CLOSE` is a separate operation.
    pub(crate) fn reset_statement(&mut self, handle: StatementHandle) -> Result<()> {
        let server_id = self.statement_ref(handle)?.server_id;
        self.run_ok_command(&command::stmt_reset_packet(server_id))?;
        self.reset_params(handle)
    }

    /// `STMT_CLOSE`: removes the statement from the map and invalidates
    /// the handle. `STMT_CLOSE` never generates a response.
    pub(crate) fn delete_statement(&mut self, handle: StatementHandle) -> Result<()> {
        let server_id = match self.statements.get(handle) {
            Some(stmt) => stmt.server_id,
            None => return Ok(()),
        };
        if self.guard_idle().is_ok() {
            if let Ok(framer) = self.framer_mut() {
                framer.start_command();
                let _ = framer.write_packet(&command::stmt_close_packet(server_id));
            }
        }
        self.statements.remove(handle);
        Ok(())
    }

    pub(crate) fn execute_statement(&mut self, handle: StatementHandle) -> Result<ResultState> {
        let payload = {
            let stmt = self.statement_ref(handle)?;
            build_execute_packet(stmt)
        };
        if let Err(e) = self.begin_command(&payload) {
            self.rows_pending = false;
            return Err(e);
        }
        let header = self.finish_opening_result(true)?;

        if let Ok(stmt) = self.statement_mut(handle) {
            stmt.rebind = false;
            for slot in stmt.params.iter_mut() {
                slot.long_data_sent = false;
            }
        }
        Ok(header)
    }

    /// Begins a transaction: `BEGIN`, then a `Transaction` handle that
    /// holds exclusive use of this connection until `commit`/`rollback`
    /// (spec.md §4.H).
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        self.exec("BEGIN")?;
        Ok(Transaction::new(self))
    }
}

fn read_chunk(r: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Builds the EXECUTE packet body (spec.md §4.D): statement id, flags,
/// iteration count, null bitmap, `new-params-bound` byte, optional type
/// block, then packed non-null/non-long-data values in order.
fn build_execute_packet(stmt: &Statement) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(code::STMT_EXECUTE);
    buf.write_u32::<LittleEndian>(stmt.server_id).unwrap();
    buf.push(0); // flags: no cursor
    buf.write_u32::<LittleEndian>(1).unwrap(); // iteration count

    let bitmap_len = (stmt.param_count + 7) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    for (i, slot) in stmt.params.iter().enumerate() {
        let is_null = !slot.long_data_sent && matches!(slot.value, None | Some(Param::Null));
        if is_null {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    buf.extend_from_slice(&bitmap);

    buf.push(if stmt.rebind { 1 } else { 0 });
    if stmt.rebind {
        for slot in &stmt.params {
            let (type_code, unsigned) = match &slot.value {
                Some(p) => p.wire_type(),
                None => (ColumnType::Null as u16, false),
            };
            let flagged = type_code | if unsigned { 0x8000 } else { 0 };
            buf.write_u16::<LittleEndian>(flagged).unwrap();
        }
    }

    for slot in &stmt.params {
        if slot.long_data_sent {
            continue;
        }
        match &slot.value {
            Some(Param::Null) | None => {}
            Some(p) => p.encode(&mut buf),
        }
    }
    buf
}
