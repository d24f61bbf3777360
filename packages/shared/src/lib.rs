//! Utilities shared between the SyncRoom server and client.

pub mod logger;
pub mod time;
