//! Application layer: the render-through flow and top-level errors.

pub mod error;
pub mod render;
