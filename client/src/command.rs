//! Command engine (component D, §4.D): command packet codes, their
//! serialisation, and response classification.
//!
//! Grounded on `connection::commands::query_command::QueryCommand` for
//! the "one byte code + body" shape and on
//! `connection::packet::{ok_packet,end_of_file_packet}` for the
//! OK/EOF payload layouts; `ERR` parsing and the PREPARE/EXECUTE/
//! SEND_LONG_DATA bodies have no analogue in a CDC client that never
//! issues prepared statements, and are built directly from spec.md §4.D.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use proto::read_len_enc_int;

use crate::error::{Error, Result};
use crate::status_flags::StatusFlags;

pub mod code {
    pub const QUIT: u8 = 0x01;
    pub const INIT_DB: u8 = 0x02;
    pub const QUERY: u8 = 0x03;
    pub const PING: u8 = 0x0e;
    pub const STMT_PREPARE: u8 = 0x16;
    pub const STMT_EXECUTE: u8 = 0x17;
    pub const STMT_SEND_LONG_DATA: u8 = 0x18;
    pub const STMT_CLOSE: u8 = 0x19;
    pub const STMT_RESET: u8 = 0x1a;
}

pub mod response {
    pub const OK: u8 = 0x00;
    pub const LOCAL_INFILE: u8 = 0xFB;
    pub const EOF: u8 = 0xFE;
    pub const ERR: u8 = 0xFF;
}

pub fn query_packet(sql: &str) -> Vec<u8> {
    let mut buf = vec![code::QUERY];
    buf.extend_from_slice(sql.as_bytes());
    buf
}

pub fn init_db_packet(db: &str) -> Vec<u8> {
    let mut buf = vec![code::INIT_DB];
    buf.extend_from_slice(db.as_bytes());
    buf
}

pub fn ping_packet() -> Vec<u8> {
    vec![code::PING]
}

pub fn quit_packet() -> Vec<u8> {
    vec![code::QUIT]
}

pub fn stmt_prepare_packet(sql: &str) -> Vec<u8> {
    let mut buf = vec![code::STMT_PREPARE];
    buf.extend_from_slice(sql.as_bytes());
    buf
}

pub fn stmt_close_packet(statement_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    buf.write_u8(code::STMT_CLOSE).unwrap();
    buf.write_u32::<LittleEndian>(statement_id).unwrap();
    buf
}

pub fn stmt_reset_packet(statement_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    buf.write_u8(code::STMT_RESET).unwrap();
    buf.write_u32::<LittleEndian>(statement_id).unwrap();
    buf
}

/// One SEND_LONG_DATA chunk, per spec.md §4.D: statement id, parameter
/// index, raw chunk bytes. Never generates a response.
pub fn stmt_send_long_data_packet(statement_id: u32, param_index: u16, chunk: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(7 + chunk.len());
    buf.write_u8(code::STMT_SEND_LONG_DATA).unwrap();
    buf.write_u32::<LittleEndian>(statement_id).unwrap();
    buf.write_u16::<LittleEndian>(param_index).unwrap();
    buf.extend_from_slice(chunk);
    buf
}

#[derive(Debug, Clone)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
    pub info: String,
}

/// Parses an OK_Packet body (leading 0x00 byte already consumed by the
/// caller's dispatch on the response's first byte).
pub fn parse_ok(payload: &[u8]) -> Result<OkPacket> {
    let mut cursor = Cursor::new(&payload[1..]);
    let affected_rows = read_len_enc_int(&mut cursor).unwrap_or(0);
    let last_insert_id = read_len_enc_int(&mut cursor).unwrap_or(0);
    let status = cursor.read_u16::<LittleEndian>().unwrap_or(0);
    let warnings = cursor.read_u16::<LittleEndian>().unwrap_or(0);
    let mut info = String::new();
    std::io::Read::read_to_string(&mut cursor, &mut info).ok();
    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status_flags: StatusFlags::from_bits_truncate(status),
        warnings,
        info,
    })
}

#[derive(Debug, Clone)]
pub struct EofPacket {
    pub warning_count: u16,
    pub status_flags: StatusFlags,
}

/// An EOF_Packet is `0xFE` with a payload shorter than 9 bytes (spec.md
/// §4.E / GLOSSARY) — the length check disambiguates it from a
/// length-encoded integer that happens to start with `0xFE`.
pub fn is_eof(payload: &[u8]) -> bool {
    !payload.is_empty() && payload.len() < 9 && payload[0] == response::EOF
}

pub fn parse_eof(payload: &[u8]) -> Result<EofPacket> {
    let mut cursor = Cursor::new(&payload[1..]);
    let warning_count = cursor.read_u16::<LittleEndian>()?;
    let status = cursor.read_u16::<LittleEndian>()?;
    Ok(EofPacket {
        warning_count,
        status_flags: StatusFlags::from_bits_truncate(status),
    })
}

/// Converts an ERR_Packet into `Error::Server`, per spec.md §4.D / §7.
pub fn check_err(payload: &[u8]) -> Result<()> {
    if payload.is_empty() || payload[0] != response::ERR {
        return Ok(());
    }
    let mut cursor = Cursor::new(&payload[1..]);
    let code = cursor.read_u16::<LittleEndian>()?;
    // '#' sqlstate marker, then 5-byte sqlstate.
    let _marker = cursor.read_u8()?;
    let sql_state = {
        let mut buf = [0u8; 5];
        std::io::Read::read_exact(&mut cursor, &mut buf)?;
        String::from_utf8_lossy(&buf).into_owned()
    };
    let mut message = String::new();
    std::io::Read::read_to_string(&mut cursor, &mut message).ok();
    Err(Error::Server {
        code,
        sql_state,
        message,
    })
}

pub fn check_local_infile(payload: &[u8]) -> Result<()> {
    if !payload.is_empty() && payload[0] == response::LOCAL_INFILE {
        return Err(Error::LocalInfileUnsupported);
    }
    Ok(())
}

/// PREPARE's own response header (spec.md §4.D): statement id, field
/// count, parameter count, filler byte, warning count.
#[derive(Debug, Clone)]
pub struct PrepareOkPacket {
    pub statement_id: u32,
    pub column_count: u16,
    pub param_count: u16,
    pub warning_count: u16,
}

pub fn parse_prepare_ok(payload: &[u8]) -> Result<PrepareOkPacket> {
    let mut cursor = Cursor::new(&payload[1..]);
    let statement_id = cursor.read_u32::<LittleEndian>()?;
    let column_count = cursor.read_u16::<LittleEndian>()?;
    let param_count = cursor.read_u16::<LittleEndian>()?;
    let _filler = cursor.read_u8()?;
    let warning_count = cursor.read_u16::<LittleEndian>()?;
    Ok(PrepareOkPacket {
        statement_id,
        column_count,
        param_count,
        warning_count,
    })
}
