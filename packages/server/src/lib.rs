//! Collaborative text room relay library.
//!
//! This library provides the server side of a password-gated, real-time
//! shared text buffer: room registry, session index, per-room broadcast
//! and the HTTP/WebSocket surface.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use config::ServerArgs;
pub use ui::run as run_server;
