//! Client capability flags sent in the handshake response (§4.C).
//!
//! Carried over from `declar::capability_flags` almost unchanged — these
//! are the wire protocol's own constants, not something this crate
//! redesigns.

pub(crate) const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;

/// Send found rows instead of affected rows in EOF_Packet.
pub(crate) const CLIENT_FOUND_ROWS: u32 = 0x0000_0002;

/// Get all column flags.
///
/// ### Server
/// Supports longer flags.
///
/// ### Client
/// Expects longer flags.
pub(crate) const CLIENT_LONG_FLAG: u32 = 0x0000_0004;

/// Database (schema) name can be specified on connect in Handshake Response Packet.
pub(crate) const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;

pub(crate) const CLIENT_NO_SCHEMA: u32 = 0x0000_0010;

pub(crate) const CLIENT_COMPRESS: u32 = 0x0000_0020;

pub(crate) const CLIENT_ODBC: u32 = 0x0000_0040;

pub(crate) const CLIENT_LOCAL_FILES: u32 = 0x0000_0080;

pub(crate) const CLIENT_IGNORE_SPACE: u32 = 0x0000_0100;

pub(crate) const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;

pub(crate) const CLIENT_INTERACTIVE: u32 = 0x0000_0400;

/// Use SSL encryption for the session. Never set by this crate: TLS
/// upgrade is out of scope.
#[allow(dead_code)]
pub(crate) const CLIENT_SSL: u32 = 0x0000_0800;

pub(crate) const CLIENT_IGNORE_SIGPIPE: u32 = 0x0000_1000;

/// Client knows about transactions: can receive status flags in
/// OK_Packet / EOF_Packet.
pub(crate) const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;

pub(crate) const CLIENT_RESERVED: u32 = 0x0000_4000;

pub(crate) const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;

pub(crate) const CLIENT_MULTI_STATEMENTS: u32 = 0x0001_0000;

pub(crate) const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;

pub(crate) const CLIENT_PS_MULTI_RESULTS: u32 = 0x0004_0000;

/// Client supports plugin authentication.
pub(crate) const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

pub(crate) const CLIENT_CONNECT_ATTRS: u32 = 0x0010_0000;

#[allow(dead_code)]
pub(crate) const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;

pub(crate) const CLIENT_CAN_HANDLE_EXPIRED_PASSWORDS: u32 = 0x0040_0000;

pub(crate) const CLIENT_SESSION_TRACK: u32 = 0x0080_0000;

/// Client no longer needs EOF_Packet and will use OK_Packet instead.
pub(crate) const CLIENT_DEPRECATE_EOF: u32 = 0x0100_0000;

/// Bundle of flags this crate always requests, per spec.md §4.C: long
/// passwords, found-rows, long column flags, protocol-41, transactions,
/// secure connection, multi-results. `CLIENT_CONNECT_WITH_DB` is added
/// conditionally by the caller when a database name is set.
pub(crate) const BASE_CLIENT_FLAGS: u32 = CLIENT_LONG_PASSWORD
    | CLIENT_FOUND_ROWS
    | CLIENT_LONG_FLAG
    | CLIENT_PROTOCOL_41
    | CLIENT_TRANSACTIONS
    | CLIENT_SECURE_CONNECTION
    | CLIENT_MULTI_RESULTS;
