use proto::ProtoError;

/// Errors surfaced by the connection, handshake, command, and prepared
/// statement layers (§7's taxonomy). Wire-framing failures from `proto`
/// are folded in via `#[from]` rather than re-declared here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No transport is open; the caller must `connect`/`reconnect` first.
    #[error("not connected")]
    NotConnected,

    /// `connect` called on a `Connection` that already has an open
    /// transport.
    #[error("already connected")]
    AlreadyConnected,

    /// A command other than row retrieval was attempted while a result
    /// set was still open (spec.md §3 `rows_pending` invariant).
    #[error("unreaded rows: drain the open result before issuing another command")]
    UnreadRows,

    /// The server sent an ERR_Packet in response to a command.
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        code: u16,
        sql_state: String,
        message: String,
    },

    /// Caller passed a parameter list whose length does not match the
    /// statement's placeholder count (§4.G).
    #[error("parameter count mismatch: statement expects {expected}, got {got}")]
    ParamCountMismatch { expected: usize, got: usize },

    /// `send_long_data`/parameter binding referenced a parameter index
    /// the statement does not have.
    #[error("parameter index {index} out of range (statement has {param_count} parameter(s))")]
    WrongParamIndex { index: usize, param_count: usize },

    /// `send_long_data` was called with a chunk size too small to make
    /// progress (spec.md §4.D: `pkt_size` less than 7 is rejected).
    #[error("packet size {0} is too small for SEND_LONG_DATA (minimum 7)")]
    SmallPacketSize(usize),

    /// A received packet's class was inconsistent with the expected
    /// protocol state (desync one layer up from `ProtoError::Desync`).
    #[error("bad result: {0}")]
    BadResult(String),

    /// The initial handshake packet failed a structural precondition
    /// this crate requires: protocol version other than 10, or the
    /// server did not advertise `CLIENT_PROTOCOL_41`.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Authentication did not complete: the server returned an ERR
    /// packet in place of OK, or requested an auth-switch/plugin this
    /// crate does not negotiate (spec.md §4.C: only OK is accepted).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The server requested `LOCAL INFILE`; this crate refuses it.
    #[error("LOCAL INFILE is not supported")]
    LocalInfileUnsupported,

    /// A prepared statement was used after the connection that created
    /// it reconnected and the replay of PREPARE failed, or the handle
    /// is no longer known to the current connection generation.
    #[error("stale prepared statement: {0}")]
    StaleStatement(String),

    /// A `Transaction`/`StatementCursor` for one connection was used
    /// against a different connection.
    #[error("statement/transaction used against the wrong connection")]
    CrossConnectionUse,

    /// The mutex guarding connection state was poisoned by a panic in
    /// another thread holding it.
    #[error("connection lock poisoned")]
    LockPoisoned,

    /// Operation attempted on a connection already marked closed.
    #[error("connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
