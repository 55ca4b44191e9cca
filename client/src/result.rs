//! Result stream (component E, §4.E, §3 "Result").
//!
//! Grounded on `connection::conn::query_result::StreamQueryResult`'s
//! lazy-`Iterator` + drain-on-`Drop` shape, generalised to also cover
//! the binary protocol and the `more-pending`/EOF bookkeeping the
//! teacher's CDC client never needed (it only ever issues `COM_QUERY`).

use std::io::Cursor;

use proto::{read_len_enc_bytes_or_null, read_len_enc_int};

use crate::command::{self, OkPacket};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::field::FieldDescriptor;
use crate::status_flags::StatusFlags;
use crate::value::{decode_binary_value, decode_text_value, read_binary_null_bitmap, Value};

pub type Row = Vec<Value>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Cursor2 {
    Open,
    /// EOF reached, but `SERVER_MORE_RESULTS_EXISTS` was set: the caller
    /// must call `next_result` to advance rather than reconnecting.
    MorePending,
    Drained,
}

/// The shared state behind both the direct `Connection::start` result
/// and the `SharedConnection` wrapper's result handle. Kept free of any
/// reference to the connection itself so both wrappers can hold it
/// alongside either a `&mut Connection` or a `MutexGuard<Connection>`.
#[derive(Debug)]
pub struct ResultState {
    pub fields: Vec<FieldDescriptor>,
    binary: bool,
    cursor: Cursor2,
    affected_rows: u64,
    last_insert_id: u64,
    status_flags: StatusFlags,
    warnings: u16,
}

impl ResultState {
    pub fn from_ok(ok: OkPacket) -> Self {
        Self {
            fields: Vec::new(),
            binary: false,
            cursor: Cursor2::Drained,
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            status_flags: ok.status_flags,
            warnings: ok.warnings,
        }
    }

    pub fn opened(fields: Vec<FieldDescriptor>, binary: bool) -> Self {
        let cursor = if fields.is_empty() { Cursor2::Drained } else { Cursor2::Open };
        Self {
            fields,
            binary,
            cursor,
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: StatusFlags::empty(),
            warnings: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.cursor, Cursor2::Open)
    }

    pub fn more_results(&self) -> bool {
        matches!(self.cursor, Cursor2::MorePending)
            || self.status_flags.contains(StatusFlags::MORE_RESULTS_EXISTS)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    /// Reads the next packet off `conn`'s framer and decodes it as
    /// either a row or a stream-ending EOF, per spec.md §4.E.
    pub fn get_row(&mut self, conn: &mut Connection) -> Result<Option<Row>> {
        if !matches!(self.cursor, Cursor2::Open) {
            return Ok(None);
        }

        let packet = conn.read_packet()?;
        command::check_err(&packet)?;

        if command::is_eof(&packet) {
            let eof = command::parse_eof(&packet)?;
            self.status_flags = eof.status_flags;
            self.warnings = eof.warning_count;
            if self.status_flags.contains(StatusFlags::MORE_RESULTS_EXISTS) {
                self.cursor = Cursor2::MorePending;
            } else {
                self.cursor = Cursor2::Drained;
            }
            conn.note_result_drained(self.more_results());
            return Ok(None);
        }

        let row = if self.binary {
            decode_binary_row(&packet, &self.fields)?
        } else {
            decode_text_row(&packet, &self.fields)?
        };
        Ok(Some(row))
    }

    /// Drains any remaining rows without returning them, so the
    /// connection can be reused. Mirrors `StreamQueryResult::drop`'s
    /// behaviour, made explicit rather than implicit since this crate's
    /// `Connection` API is `&mut self`-based rather than iterator-based.
    pub fn drain(&mut self, conn: &mut Connection) -> Result<()> {
        while self.get_row(conn)?.is_some() {}
        Ok(())
    }

    /// `GetRows` named in spec.md §1/§6: collects every remaining row.
    /// A trivial composition over `get_row`, for callers that don't need
    /// streaming.
    pub fn get_rows(&mut self, conn: &mut Connection) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.get_row(conn)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// `End` named in spec.md §1/§6: an explicit alias for `drain`, for
    /// callers that want to abandon a partially-read result without
    /// reading the rest of its rows themselves.
    pub fn end(&mut self, conn: &mut Connection) -> Result<()> {
        self.drain(conn)
    }
}

fn decode_text_row(packet: &[u8], fields: &[FieldDescriptor]) -> Result<Row> {
    let mut cursor = Cursor::new(packet);
    let mut row = Vec::with_capacity(fields.len());
    for field in fields {
        let raw = read_len_enc_bytes_or_null(&mut cursor)?;
        row.push(decode_text_value(raw, field)?);
    }
    Ok(row)
}

fn decode_binary_row(packet: &[u8], fields: &[FieldDescriptor]) -> Result<Row> {
    let mut cursor = Cursor::new(packet);
    cursor.set_position(1); // leading 0x00 packet header byte
    let nulls = read_binary_null_bitmap(&mut cursor, fields.len())?;
    let mut row = Vec::with_capacity(fields.len());
    for (field, is_null) in fields.iter().zip(nulls) {
        if is_null {
            row.push(Value::Null);
        } else {
            row.push(decode_binary_value(&mut cursor, field)?);
        }
    }
    Ok(row)
}

/// Reads a result header (§4.D "Result header" row): length-encoded
/// field count, that many field descriptors, then a terminal EOF.
/// Shared by `COM_QUERY` and `COM_STMT_EXECUTE` — both produce the same
/// shaped header, differing only in whether the row stream that follows
/// is text or binary.
pub fn read_result_header(conn: &mut Connection, binary: bool) -> Result<ResultState> {
    let first = conn.read_packet()?;
    command::check_err(&first)?;
    command::check_local_infile(&first)?;

    if first[0] == command::response::OK {
        return Ok(ResultState::from_ok(command::parse_ok(&first)?));
    }

    let mut cursor = Cursor::new(first.as_slice());
    let field_count = read_len_enc_int(&mut cursor)? as usize;

    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let packet = conn.read_packet()?;
        command::check_err(&packet)?;
        fields.push(FieldDescriptor::parse(&packet)?);
    }

    if field_count > 0 {
        let eof = conn.read_packet()?;
        command::check_err(&eof)?;
        if !command::is_eof(&eof) {
            return Err(Error::BadResult("expected EOF after field list".to_string()));
        }
    }

    Ok(ResultState::opened(fields, binary))
}
