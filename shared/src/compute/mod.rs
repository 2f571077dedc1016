//! Escape-time engine shared by the single-process renderer and the render
//! nodes.

pub mod escape;
pub mod mapping;
pub mod pool;
pub mod strategy;
