use std::io;

/// Errors raised by the packet framer (§4.A) and the wire codec (§4.B).
///
/// These are deliberately narrow: anything above the wire layer (auth
/// failures, server ERR packets, bind-count mismatches, ...) is reported
/// by `client::Error` instead. This type only ever describes the stream
/// being unparseable or the transport misbehaving.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The sequence byte on a received packet did not match the one the
    /// client expected next. Fatal: the connection is no longer usable.
    #[error("protocol desync: expected sequence {expected}, got {got}")]
    Desync { expected: u8, got: u8 },

    /// A length-encoded integer used the 0xFB "null" marker outside of a
    /// row payload, or some other structurally invalid encoding was seen.
    #[error("malformed length-encoded value: {0}")]
    BadLengthEncoding(&'static str),

    /// A binary value or column definition carried a MySQL type code this
    /// crate does not know how to decode/encode.
    #[error("unsupported column type code: {0}")]
    UnsupportedType(u16),
}

pub type ProtoResult<T> = Result<T, ProtoError>;
