//! Linear dynamical system and trajectory sampler
//!
//! Describes a linear-Gaussian state-space model:
//!
//! ```text
//! z_0     ~ N(mu0, Sigma0)
//! z_t     = A * z_{t-1} + w_t,   w_t ~ N(0, Q)
//! x_t     = C * z_t + v_t,       v_t ~ N(0, R)
//! ```
//!
//! The system is validated once at construction and never mutated; the
//! sampler and the filter only borrow it.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::filters::kalman::KalmanState;
use crate::types::gaussian::MultivariateNormal;
use crate::types::spaces::{MeasurementCovariance, Measurement, StateCovariance, StateVector};
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::{LdsError, Result};

// ============================================================================
// Linear Dynamical System
// ============================================================================

/// An immutable linear-Gaussian state-space model.
///
/// # Type Parameters
///
/// - `T`: Scalar type (typically `f32` or `f64`)
///
/// Dimensions are fixed at construction: `state_dim` is the side of `A`
/// and `obs_dim` the number of rows of `C`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearDynamicalSystem<T: RealField> {
    transition: TransitionMatrix<T>,
    observation: ObservationMatrix<T>,
    process_noise: StateCovariance<T>,
    observation_noise: MeasurementCovariance<T>,
    initial_mean: StateVector<T>,
    initial_covariance: StateCovariance<T>,
}

fn check_shape<T: RealField>(
    parameter: &'static str,
    matrix: &DMatrix<T>,
    expected: (usize, usize),
) -> Result<()> {
    let found = matrix.shape();
    if found != expected {
        return Err(LdsError::DimensionMismatch {
            parameter,
            expected,
            found,
        });
    }
    check_finite(parameter, matrix.iter())
}

fn check_finite<'a, T: RealField + 'a>(
    parameter: &'static str,
    mut values: impl Iterator<Item = &'a T>,
) -> Result<()> {
    if values.all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(LdsError::NonFiniteParameter { parameter })
    }
}

impl<T: RealField + Float + Copy> LinearDynamicalSystem<T> {
    /// Creates a system from its six parameters.
    ///
    /// # Arguments
    /// - `a`: State transition matrix (state_dim x state_dim)
    /// - `c`: Observation matrix (obs_dim x state_dim)
    /// - `q`: Process noise covariance (state_dim x state_dim)
    /// - `r`: Observation noise covariance (obs_dim x obs_dim)
    /// - `mu0`: Prior mean of the initial state (state_dim)
    /// - `sigma0`: Prior covariance of the initial state (state_dim x state_dim)
    ///
    /// # Errors
    /// - [`LdsError::EmptyDimension`] if `A` or `C` has no rows
    /// - [`LdsError::DimensionMismatch`] naming the first inconsistent parameter
    /// - [`LdsError::NonFiniteParameter`] if any entry is NaN or infinite
    pub fn new(
        a: DMatrix<T>,
        c: DMatrix<T>,
        q: DMatrix<T>,
        r: DMatrix<T>,
        mu0: DVector<T>,
        sigma0: DMatrix<T>,
    ) -> Result<Self> {
        let state_dim = a.nrows();
        if state_dim == 0 {
            return Err(LdsError::EmptyDimension { parameter: "A" });
        }
        check_shape("A", &a, (state_dim, state_dim))?;

        let obs_dim = c.nrows();
        if obs_dim == 0 {
            return Err(LdsError::EmptyDimension { parameter: "C" });
        }
        check_shape("C", &c, (obs_dim, state_dim))?;
        check_shape("Q", &q, (state_dim, state_dim))?;
        check_shape("R", &r, (obs_dim, obs_dim))?;

        if mu0.len() != state_dim {
            return Err(LdsError::DimensionMismatch {
                parameter: "mu0",
                expected: (state_dim, 1),
                found: (mu0.len(), 1),
            });
        }
        check_finite("mu0", mu0.iter())?;
        check_shape("Sigma0", &sigma0, (state_dim, state_dim))?;

        tracing::debug!(state_dim, obs_dim, "constructed linear dynamical system");

        Ok(Self {
            transition: TransitionMatrix::from_matrix(a),
            observation: ObservationMatrix::from_matrix(c),
            process_noise: StateCovariance::from_matrix(q),
            observation_noise: MeasurementCovariance::from_matrix(r),
            initial_mean: StateVector::from_dvector(mu0),
            initial_covariance: StateCovariance::from_matrix(sigma0),
        })
    }

    /// Dimension of the latent state.
    #[inline]
    pub fn state_dim(&self) -> usize {
        self.transition.rows()
    }

    /// Dimension of an observation.
    #[inline]
    pub fn obs_dim(&self) -> usize {
        self.observation.rows()
    }

    /// State transition matrix `A`.
    #[inline]
    pub fn transition_matrix(&self) -> &TransitionMatrix<T> {
        &self.transition
    }

    /// Observation matrix `C`.
    #[inline]
    pub fn observation_matrix(&self) -> &ObservationMatrix<T> {
        &self.observation
    }

    /// Process noise covariance `Q`.
    #[inline]
    pub fn process_noise(&self) -> &StateCovariance<T> {
        &self.process_noise
    }

    /// Observation noise covariance `R`.
    #[inline]
    pub fn observation_noise(&self) -> &MeasurementCovariance<T> {
        &self.observation_noise
    }

    /// Prior mean `mu0`.
    #[inline]
    pub fn initial_mean(&self) -> &StateVector<T> {
        &self.initial_mean
    }

    /// Prior covariance `Sigma0`.
    #[inline]
    pub fn initial_covariance(&self) -> &StateCovariance<T> {
        &self.initial_covariance
    }

    /// The prior over the initial state as a filter state.
    pub fn prior(&self) -> KalmanState<T> {
        KalmanState::new(self.initial_mean.clone(), self.initial_covariance.clone())
    }

    /// Samples a latent trajectory and its observations from a seed.
    ///
    /// The same seed always produces the same trajectory for the same system.
    pub fn sample(&self, seed: u64, timesteps: usize) -> Trajectory<T>
    where
        StandardNormal: Distribution<T>,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        self.sample_with_rng(&mut rng, timesteps)
    }

    /// Samples a latent trajectory and its observations from a caller-supplied
    /// generator.
    ///
    /// All latent states are drawn first (`z_0`, then `w_1..w_{T-1}`), followed
    /// by the observation noise `v_0..v_{T-1}`.
    pub fn sample_with_rng<R: Rng + ?Sized>(&self, rng: &mut R, timesteps: usize) -> Trajectory<T>
    where
        StandardNormal: Distribution<T>,
    {
        if timesteps == 0 {
            return Trajectory::default();
        }

        let initial = MultivariateNormal::new(self.initial_mean.clone(), &self.initial_covariance);
        let process = MultivariateNormal::zero_mean(&self.process_noise);
        let measurement = MultivariateNormal::zero_mean(&self.observation_noise);

        let mut latents = Vec::with_capacity(timesteps);
        latents.push(initial.sample(rng));
        for t in 1..timesteps {
            let next = self.transition.apply_state(&latents[t - 1]) + process.sample(rng);
            latents.push(next);
        }

        let observations = latents
            .iter()
            .map(|z| self.observation.observe(z) + measurement.sample(rng))
            .collect();

        tracing::debug!(timesteps, "sampled trajectory");

        Trajectory {
            latents,
            observations,
        }
    }
}

// ============================================================================
// Trajectory
// ============================================================================

/// A sampled trajectory: latent states paired with their observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<T: RealField> {
    latents: Vec<StateVector<T>>,
    observations: Vec<Measurement<T>>,
}

impl<T: RealField> Default for Trajectory<T> {
    fn default() -> Self {
        Self {
            latents: Vec::new(),
            observations: Vec::new(),
        }
    }
}

impl<T: RealField> Trajectory<T> {
    /// Number of time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.latents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.latents.is_empty()
    }

    /// Latent states `z_0..z_{T-1}`.
    #[inline]
    pub fn latents(&self) -> &[StateVector<T>] {
        &self.latents
    }

    /// Observations `x_0..x_{T-1}`.
    #[inline]
    pub fn observations(&self) -> &[Measurement<T>] {
        &self.observations
    }

    /// The `(latent, observation)` pair at step `t`.
    pub fn get(&self, t: usize) -> Option<(&StateVector<T>, &Measurement<T>)> {
        Some((self.latents.get(t)?, self.observations.get(t)?))
    }

    /// Iterates over `(latent, observation)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateVector<T>, &Measurement<T>)> {
        self.latents.iter().zip(self.observations.iter())
    }

    /// Splits into `(latents, observations)`.
    pub fn into_parts(self) -> (Vec<StateVector<T>>, Vec<Measurement<T>>) {
        (self.latents, self.observations)
    }
}
