//! Wire-level building blocks for the MySQL client protocol: packet
//! framing, the length-encoded/codec primitives, column type codes, and
//! binary date/time shapes. Everything above this (handshake, commands,
//! result streaming, prepared statements) lives in the `client` crate.

pub mod codec;
pub mod column_type;
pub mod error;
pub mod packet;
pub mod temporal;

pub use codec::{
    read_fixed_string, read_len_enc_bytes, read_len_enc_bytes_or_null, read_len_enc_int,
    read_len_enc_string, read_len_enc_string_or_null, read_null_term_string, write_len_enc_bytes,
    write_len_enc_int, write_null_term_string, NULL_MARKER, NULL_TERMINATOR,
};
pub use column_type::ColumnType;
pub use error::{ProtoError, ProtoResult};
pub use packet::{PacketFramer, DEFAULT_MAX_PACKET_SIZE, MAX_BODY_LENGTH, PACKET_HEADER_SIZE};
pub use temporal::{read_date, read_date_time, read_time, write_date, write_date_time, write_time, Date, DateTime, Time};
