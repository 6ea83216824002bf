//! LDS-Kalman: Linear Dynamical Systems and Kalman Filtering for Rust
//!
//! A type-safe implementation of discrete-time linear-Gaussian state-space
//! models: sampling latent/observed trajectories and running the Kalman
//! filter with exact Gaussian posteriors and per-step log-likelihoods.
//!
//! # Features
//!
//! - **Type Safety**: State, measurement and innovation spaces are distinct types
//! - **Checked Construction**: Dimension mismatches are reported before any work
//! - **Stable Numerics**: Cholesky solves instead of explicit inverses
//! - **no_std Support**: Works with `alloc` only
//!
//! # Example
//!
//! ```
//! use lds_kalman::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let lds = LinearDynamicalSystem::new(
//!     DMatrix::identity(2, 2),
//!     DMatrix::identity(2, 2),
//!     DMatrix::identity(2, 2),
//!     DMatrix::identity(2, 2),
//!     DVector::from_vec(vec![5.0, 5.0]),
//!     DMatrix::identity(2, 2),
//! )
//! .unwrap();
//!
//! let trajectory = lds.sample(0, 15);
//! let result = KalmanFilter::default()
//!     .filter(&lds, trajectory.observations())
//!     .unwrap();
//!
//! assert_eq!(result.len(), 15);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod filters;
pub mod models;
pub mod types;

pub mod prelude {
    pub use crate::filters::config::*;
    pub use crate::filters::kalman::*;
    pub use crate::models::*;
    pub use crate::types::gaussian::*;
    pub use crate::types::spaces::*;
    pub use crate::types::transforms::*;
    pub use crate::{LdsError, Result};
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdsError {
    /// A parameter or observation does not have the shape the system requires
    DimensionMismatch {
        /// Name of the offending parameter
        parameter: &'static str,
        /// Required `(rows, cols)`
        expected: (usize, usize),
        /// Supplied `(rows, cols)`
        found: (usize, usize),
    },
    /// A parameter has a zero-sized state or observation dimension
    EmptyDimension {
        /// Name of the offending parameter
        parameter: &'static str,
    },
    /// A parameter contains NaN or infinite entries
    NonFiniteParameter {
        /// Name of the offending parameter
        parameter: &'static str,
    },
    /// The innovation covariance was singular or ill-conditioned, or the
    /// step produced non-finite values
    NumericalInstability {
        /// Index of the failing time step
        step: usize,
    },
}

#[cfg(feature = "std")]
impl std::error::Error for LdsError {}

impl ::core::fmt::Display for LdsError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            LdsError::DimensionMismatch {
                parameter,
                expected,
                found,
            } => write!(
                f,
                "Dimension mismatch for {}: expected {}x{}, found {}x{}",
                parameter, expected.0, expected.1, found.0, found.1
            ),
            LdsError::EmptyDimension { parameter } => {
                write!(f, "Parameter {} has a zero-sized dimension", parameter)
            }
            LdsError::NonFiniteParameter { parameter } => {
                write!(f, "Parameter {} contains non-finite values", parameter)
            }
            LdsError::NumericalInstability { step } => {
                write!(f, "Numerical instability detected at step {}", step)
            }
        }
    }
}

pub type Result<T> = ::core::result::Result<T, LdsError>;
