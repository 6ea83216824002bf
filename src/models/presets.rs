//! Common system presets
//!
//! Ready-made linear dynamical systems for typical tracking and
//! time-series setups.

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use super::lds::LinearDynamicalSystem;
use crate::Result;

/// Random walk observed directly in every coordinate.
///
/// `A = I`, `C = I`, `Q = q * I`, `R = r * I`, `Sigma0 = p0 * I`, with the
/// dimension taken from `mu0`.
///
/// # Panics
/// Panics if any variance is negative.
pub fn random_walk<T: RealField + Float + Copy>(
    mu0: DVector<T>,
    process_variance: T,
    observation_variance: T,
    prior_variance: T,
) -> Result<LinearDynamicalSystem<T>> {
    assert!(
        process_variance >= T::zero(),
        "Process variance must be non-negative"
    );
    assert!(
        observation_variance >= T::zero(),
        "Observation variance must be non-negative"
    );
    assert!(
        prior_variance >= T::zero(),
        "Prior variance must be non-negative"
    );

    let n = mu0.len();
    let eye = DMatrix::<T>::identity(n, n);
    LinearDynamicalSystem::new(
        eye.clone(),
        eye.clone(),
        eye.scale(process_variance),
        eye.scale(observation_variance),
        mu0,
        eye.scale(prior_variance),
    )
}

/// Constant velocity model in 2D with a position-only sensor.
///
/// State: `[x, y, vx, vy]`, observation: `[x, y]`.
///
/// Process noise follows the discrete white noise acceleration model with
/// standard deviation `sigma_a`; each position coordinate is observed with
/// standard deviation `sigma_pos`.
///
/// # Arguments
/// - `dt`: Time step (must be non-negative)
/// - `sigma_a`: Acceleration noise standard deviation (must be >= 0)
/// - `sigma_pos`: Position measurement noise standard deviation (must be > 0)
/// - `mu0`, `sigma0`: Prior over the initial state
///
/// # Panics
/// Panics if `dt < 0`, `sigma_a < 0` or `sigma_pos <= 0`.
pub fn constant_velocity_2d<T: RealField + Float + Copy>(
    dt: T,
    sigma_a: T,
    sigma_pos: T,
    mu0: DVector<T>,
    sigma0: DMatrix<T>,
) -> Result<LinearDynamicalSystem<T>> {
    assert!(dt >= T::zero(), "Time step dt must be non-negative");
    assert!(
        sigma_a >= T::zero(),
        "Process noise sigma_a must be non-negative"
    );
    assert!(
        sigma_pos > T::zero(),
        "Measurement noise sigma_pos must be positive"
    );

    let one = T::one();
    let zero = T::zero();
    let two = one + one;
    let four = two + two;

    let a = DMatrix::from_row_slice(
        4,
        4,
        &[
            one, zero, dt, zero, //
            zero, one, zero, dt, //
            zero, zero, one, zero, //
            zero, zero, zero, one,
        ],
    );

    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;
    let sigma_sq = sigma_a * sigma_a;

    let q11 = dt4 / four * sigma_sq;
    let q13 = dt3 / two * sigma_sq;
    let q33 = dt2 * sigma_sq;

    let q = DMatrix::from_row_slice(
        4,
        4,
        &[
            q11, zero, q13, zero, //
            zero, q11, zero, q13, //
            q13, zero, q33, zero, //
            zero, q13, zero, q33,
        ],
    );

    let c = DMatrix::from_row_slice(2, 4, &[one, zero, zero, zero, zero, one, zero, zero]);
    let r = DMatrix::<T>::identity(2, 2).scale(sigma_pos * sigma_pos);

    LinearDynamicalSystem::new(a, c, q, r, mu0, sigma0)
}
