//! Application layer: the render pipeline and the errors surfaced to callers.

pub mod error;
pub mod render;
