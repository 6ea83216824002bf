//! Filtering for linear dynamical systems
//!
//! - [`kalman::KalmanFilter`]: Standard linear Kalman filter
//! - [`config::FilterConfig`]: Numerical policy for the recursion

pub mod config;
pub mod kalman;
