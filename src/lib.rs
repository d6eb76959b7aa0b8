//! Asynchronous multi-client chat relay.
//!
//! A frame on the wire is a four-byte ASCII command tag followed by a
//! big-endian length prefix and that many payload bytes; see `README.md` for
//! the protocol and usage. Each module focuses on a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface for room and client modes.
//! - [`connection`] wraps one duplex stream with condition-driven buffered
//!   reads and writes.
//! - [`frame`] defines the wire format and the command tags.
//! - [`session`] couples a connection with per-client chat state and runs
//!   one decode cycle at a time.
//! - [`room`] accepts connections, dispatches commands, and fans chat lines
//!   out to every other member.
//! - [`client`] connects to a room, multiplexing stdin and broadcasts for a
//!   terminal user.
//!
//! Integration tests use this crate directly to exercise the room and the
//! wire protocol.

pub mod cli;
pub mod client;
pub mod connection;
pub mod frame;
pub mod room;
pub mod session;
