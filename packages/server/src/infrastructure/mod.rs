//! Infrastructure layer: wire DTOs, fan-out and in-memory repositories.

pub mod dto;
pub mod fanout;
pub mod repository;
