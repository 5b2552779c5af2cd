//! Pong live-match client
//!
//! Connects to a match socket, applies authoritative snapshots, layers
//! client-only effects on top, renders at a fixed cadence and forwards
//! paddle input. Local, online and tournament flows drive matches through
//! the game HTTP API.

pub mod api;
pub mod app;
pub mod config;
pub mod flows;
pub mod game;
pub mod lifecycle;
pub mod render;
pub mod tournament;
pub mod ws;

pub use app::ClientContext;
pub use config::{Config, ConfigError};
pub use lifecycle::{MatchConfig, MatchEnd, MatchPhase, MatchSession};
