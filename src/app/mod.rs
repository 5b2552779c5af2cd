//! Application context: configuration, API client, connection slot, input routing

pub mod state;

pub use state::{ClientContext, InputRouter};
