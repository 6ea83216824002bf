//! System models
//!
//! This module defines the linear dynamical system describing latent
//! dynamics and the sensor, the trajectory sampler, and common presets.

mod lds;
mod presets;

pub use lds::*;
pub use presets::*;
