//! Blocking MySQL 4.1+ wire-protocol client.
//!
//! Layered on the `proto` crate's packet framer and wire codec: this
//! crate adds the handshake/auth exchange, command dispatch, result
//! streaming, prepared statements, and the thread-safe wrapper described
//! across spec.md §3/§4/§6/§9.

mod binder;
mod capability_flags;
mod command;
mod connection;
mod error;
mod escape;
mod field;
mod handshake;
mod options;
mod result;
mod shared;
mod statement;
mod status_flags;
mod transaction;
mod transport;
mod value;

pub use binder::{IntoParam, IntoParams, Param};
pub use connection::Connection;
pub use error::{Error, Result};
pub use field::FieldDescriptor;
pub use options::ConnectionOptions;
pub use result::{ResultState, Row};
pub use shared::{SharedConnection, SharedResult, SharedTransaction};
pub use statement::{StatementCursor, StatementHandle};
pub use status_flags::StatusFlags;
pub use transaction::Transaction;
pub use value::Value;
