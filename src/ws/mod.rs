//! Match socket: wire protocol and connection management

pub mod connection;
pub mod protocol;

pub use connection::{open_match_connection, ConnectionError, ConnectionEvent, ConnectionHandle, ConnectionRegistry};
pub use protocol::{ClientMsg, Direction, PowerupKind, Role, ServerMsg, Side};
