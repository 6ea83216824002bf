//! Core types for type-safe vector spaces, transformations and Gaussians

pub mod gaussian;
pub mod spaces;
pub mod transforms;
