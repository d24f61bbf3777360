//! HTTP / WebSocket surface of the room relay.

mod handler;
mod runner;
mod signal;
pub mod state;

pub use runner::{build_router, run, serve};
