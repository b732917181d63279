//! Interceptable markdown rendering with allow-list sanitisation and keyword
//! highlighting.

pub mod application;
pub mod config;
pub mod infra;
