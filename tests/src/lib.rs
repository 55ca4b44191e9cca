//! Integration-style scenario tests for `client`/`proto`, driven against
//! an in-process mock MySQL server rather than a real `mysqld`.
//!
//! A dedicated `tests` workspace member: a crate whose only job is
//! exercising the rest of the workspace end to end, kept separate from
//! the unit tests living alongside the code they cover.

pub mod mock_server;

#[cfg(test)]
mod scenarios;
