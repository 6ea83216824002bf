//! Standard Kalman Filter for linear dynamical systems
//!
//! A type-safe implementation of the discrete-time Kalman filter over a
//! [`LinearDynamicalSystem`]. The filter itself holds only its numerical
//! configuration; each call borrows the system and the observations and
//! returns a fresh [`FilterResult`].
//!
//! # Type Safety
//!
//! The space markers ensure:
//! - State vectors cannot be mixed with measurements
//! - The gain maps innovations back into state space
//! - Transitions preserve state space typing
//!
//! Dimensions are checked against the system before any computation.
//!
//! # Example
//!
//! ```
//! use lds_kalman::filters::kalman::KalmanFilter;
//! use lds_kalman::models::random_walk;
//! use lds_kalman::types::spaces::Measurement;
//! use nalgebra::dvector;
//!
//! let lds = random_walk(dvector![0.0, 0.0], 0.1, 1.0, 10.0).unwrap();
//! let filter = KalmanFilter::default();
//!
//! // Predict then update with one measurement
//! let predicted = filter.predict(&lds, &lds.prior());
//! let outcome = filter
//!     .update(&lds, &predicted, &Measurement::from_slice(&[1.5, 0.2]))
//!     .unwrap();
//! assert!(outcome.state.uncertainty() < predicted.uncertainty());
//!
//! // Or run the whole recursion
//! let trajectory = lds.sample(7, 10);
//! let result = filter.filter(&lds, trajectory.observations()).unwrap();
//! assert_eq!(result.len(), 10);
//! ```

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use nalgebra::{Cholesky, DVector, Dyn, RealField};
use num_traits::Float;

use super::config::{CovarianceUpdate, FilterConfig, StabilityPolicy};
use crate::models::LinearDynamicalSystem;
use crate::types::gaussian::{checked_cholesky, log_density_from_cholesky, mahalanobis_squared};
use crate::types::spaces::{
    ComputeInnovation, Innovation, InnovationCovariance, Measurement, StateCovariance, StateVector,
};
use crate::types::transforms::{
    compute_innovation_covariance, compute_kalman_gain, joseph_update, simple_covariance_update,
};
use crate::{LdsError, Result};

// ============================================================================
// Kalman Filter State
// ============================================================================

/// State estimate for the Kalman filter.
///
/// Contains the mean and covariance of a Gaussian belief over the latent
/// state, either predicted (before the observation at a step) or filtered
/// (after it).
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState<T: RealField> {
    /// State estimate mean
    pub mean: StateVector<T>,
    /// State estimate covariance
    pub covariance: StateCovariance<T>,
}

impl<T: RealField + Copy> KalmanState<T> {
    /// Creates a new Kalman filter state.
    #[inline]
    pub fn new(mean: StateVector<T>, covariance: StateCovariance<T>) -> Self {
        Self { mean, covariance }
    }

    /// Creates a state with identity covariance.
    #[inline]
    pub fn with_identity_covariance(mean: StateVector<T>) -> Self {
        let dim = mean.len();
        Self {
            mean,
            covariance: StateCovariance::identity(dim),
        }
    }

    /// Creates a state with diagonal covariance.
    #[inline]
    pub fn with_diagonal_covariance(mean: StateVector<T>, diagonal: &DVector<T>) -> Self {
        Self {
            mean,
            covariance: StateCovariance::from_diagonal(diagonal),
        }
    }

    /// State dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }

    /// Returns `true` if mean and covariance are free of NaN and infinities.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.covariance.is_finite()
    }
}

// ============================================================================
// Update Outcome
// ============================================================================

/// Everything the measurement update computes at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<T: RealField> {
    /// Filtered (posterior) state
    pub state: KalmanState<T>,
    /// Innovation `y = x - C * mu_pred`
    pub innovation: Innovation<T>,
    /// Innovation covariance `S = C * P_pred * C^T + R`, including jitter if applied
    pub innovation_covariance: InnovationCovariance<T>,
    /// `log N(y; 0, S)`
    pub log_likelihood: T,
    /// Whether diagonal jitter was added to `S`
    pub jittered: bool,
}

// ============================================================================
// Filter Result
// ============================================================================

/// Predicted and filtered estimates at one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep<T: RealField> {
    /// Belief before the observation at this step (the prior at step 0)
    pub predicted: KalmanState<T>,
    /// Belief after the observation at this step
    pub filtered: KalmanState<T>,
    /// Log marginal likelihood contribution of this step's observation
    pub log_likelihood: T,
    /// Whether the innovation covariance needed jitter at this step
    pub jittered: bool,
}

/// Output of a full filter pass, one [`FilterStep`] per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult<T: RealField> {
    steps: Vec<FilterStep<T>>,
}

impl<T: RealField + Copy> FilterResult<T> {
    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps in time order.
    #[inline]
    pub fn steps(&self) -> &[FilterStep<T>] {
        &self.steps
    }

    /// The step at index `t`.
    #[inline]
    pub fn get(&self, t: usize) -> Option<&FilterStep<T>> {
        self.steps.get(t)
    }

    /// The final step, if any.
    #[inline]
    pub fn last(&self) -> Option<&FilterStep<T>> {
        self.steps.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterStep<T>> {
        self.steps.iter()
    }

    /// Filtered means `mu_filt_0..mu_filt_{T-1}`.
    pub fn filtered_means(&self) -> impl Iterator<Item = &StateVector<T>> {
        self.steps.iter().map(|s| &s.filtered.mean)
    }

    /// Filtered covariances `Sigma_filt_0..Sigma_filt_{T-1}`.
    pub fn filtered_covariances(&self) -> impl Iterator<Item = &StateCovariance<T>> {
        self.steps.iter().map(|s| &s.filtered.covariance)
    }

    /// Predicted means `mu_pred_0..mu_pred_{T-1}`.
    pub fn predicted_means(&self) -> impl Iterator<Item = &StateVector<T>> {
        self.steps.iter().map(|s| &s.predicted.mean)
    }

    /// Predicted covariances `Sigma_pred_0..Sigma_pred_{T-1}`.
    pub fn predicted_covariances(&self) -> impl Iterator<Item = &StateCovariance<T>> {
        self.steps.iter().map(|s| &s.predicted.covariance)
    }

    /// Per-step log-likelihood contributions.
    pub fn log_likelihoods(&self) -> impl Iterator<Item = T> + '_ {
        self.steps.iter().map(|s| s.log_likelihood)
    }

    /// Log marginal likelihood of the whole observation sequence.
    pub fn total_log_likelihood(&self) -> T {
        self.steps
            .iter()
            .fold(T::zero(), |acc, s| acc + s.log_likelihood)
    }

    /// Number of steps that needed jitter.
    pub fn jittered_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.jittered).count()
    }

    /// Consumes the result and returns the steps.
    pub fn into_steps(self) -> Vec<FilterStep<T>> {
        self.steps
    }
}

impl<'a, T: RealField + Copy> IntoIterator for &'a FilterResult<T> {
    type Item = &'a FilterStep<T>;
    type IntoIter = ::core::slice::Iter<'a, FilterStep<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

// ============================================================================
// Kalman Filter
// ============================================================================

/// A standard discrete-time Kalman filter.
///
/// The filter is stateless apart from its [`FilterConfig`]; the same
/// instance and the same system can be used for any number of concurrent
/// runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanFilter<T> {
    config: FilterConfig<T>,
}

impl<T: RealField + Float + Copy> Default for KalmanFilter<T> {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl<T: RealField + Float + Copy> KalmanFilter<T> {
    /// Creates a filter with the given configuration.
    #[inline]
    pub fn new(config: FilterConfig<T>) -> Self {
        Self { config }
    }

    /// Returns the numerical configuration.
    #[inline]
    pub fn config(&self) -> &FilterConfig<T> {
        &self.config
    }

    /// Performs the prediction step.
    ///
    /// Propagates the state estimate forward one step:
    /// - mu_pred = A * mu
    /// - P_pred = A * P * A^T + Q, symmetrized if configured
    pub fn predict(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
    ) -> KalmanState<T> {
        let a = lds.transition_matrix();

        let predicted_mean = a.apply_state(&state.mean);
        let mut predicted_cov = a
            .propagate_covariance(&state.covariance)
            .add(lds.process_noise());
        if self.config.symmetrize {
            predicted_cov = predicted_cov.symmetrize();
        }

        KalmanState {
            mean: predicted_mean,
            covariance: predicted_cov,
        }
    }

    /// Performs the update step with a measurement.
    ///
    /// Incorporates a measurement to refine the state estimate:
    /// - y = x - C * mu (innovation)
    /// - S = C * P * C^T + R (innovation covariance)
    /// - K = P * C^T * S^{-1} (Kalman gain, via Cholesky solve)
    /// - mu_upd = mu + K * y
    /// - P_upd = (I - K*C) * P, or the Joseph form if configured
    ///
    /// Errors carry step index 0; [`filter`](Self::filter) reports the actual
    /// step.
    ///
    /// # Errors
    /// - [`LdsError::DimensionMismatch`] if the measurement length is not `obs_dim`
    /// - [`LdsError::NonFiniteParameter`] if the measurement contains NaN or infinities
    /// - [`LdsError::NumericalInstability`] if `S` cannot be factorized under
    ///   the configured policy or the result is not finite
    pub fn update(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
        measurement: &Measurement<T>,
    ) -> Result<UpdateOutcome<T>> {
        check_measurement(lds, measurement)?;
        self.update_at(lds, state, measurement, 0)
    }

    /// Runs the full filter recursion over an observation sequence.
    ///
    /// Step 0 conditions the prior `(mu0, Sigma0)` on the first observation;
    /// every later step predicts from the previous filtered estimate first.
    /// An empty sequence yields an empty result.
    ///
    /// # Errors
    /// - [`LdsError::DimensionMismatch`] if any observation has the wrong
    ///   length (checked before filtering starts)
    /// - [`LdsError::NonFiniteParameter`] naming `"observation"` if any
    ///   observation contains NaN or infinities (also checked up front)
    /// - [`LdsError::NumericalInstability`] with the failing step index, for
    ///   finite inputs that overflow or an innovation covariance that cannot
    ///   be factorized
    #[tracing::instrument(skip_all, fields(steps = observations.len()))]
    pub fn filter(
        &self,
        lds: &LinearDynamicalSystem<T>,
        observations: &[Measurement<T>],
    ) -> Result<FilterResult<T>> {
        for (t, x) in observations.iter().enumerate() {
            if let Err(err) = check_measurement(lds, x) {
                tracing::debug!(step = t, "observation rejected");
                return Err(err);
            }
        }

        tracing::debug!(
            state_dim = lds.state_dim(),
            obs_dim = lds.obs_dim(),
            "running kalman filter"
        );

        let mut steps: Vec<FilterStep<T>> = Vec::with_capacity(observations.len());

        for (t, x) in observations.iter().enumerate() {
            let predicted = match steps.last() {
                Some(prev) => self.predict(lds, &prev.filtered),
                None => lds.prior(),
            };

            let outcome = self.update_at(lds, &predicted, x, t)?;

            tracing::trace!(
                step = t,
                log_likelihood = ?outcome.log_likelihood,
                "filter step"
            );

            steps.push(FilterStep {
                predicted,
                filtered: outcome.state,
                log_likelihood: outcome.log_likelihood,
                jittered: outcome.jittered,
            });
        }

        Ok(FilterResult { steps })
    }

    /// Computes the log-likelihood of a measurement given a predicted state.
    ///
    /// # Returns
    /// `log N(x - C * mu; 0, S)`, or `None` if `S` is not positive definite
    /// or the measurement has the wrong length
    pub fn measurement_log_likelihood(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
        measurement: &Measurement<T>,
    ) -> Option<T> {
        let (innovation, _, chol) = self.innovation_factor(lds, state, measurement)?;
        Some(log_density_from_cholesky(&innovation, &chol))
    }

    /// Computes the squared Mahalanobis distance between a measurement and the
    /// predicted measurement.
    ///
    /// Useful for gating: measurements with distance above a chi-squared
    /// threshold with `obs_dim` degrees of freedom are unlikely under the model.
    ///
    /// # Returns
    /// Squared Mahalanobis distance, or `None` if the innovation covariance is singular
    pub fn mahalanobis_distance_squared(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
        measurement: &Measurement<T>,
    ) -> Option<T> {
        let (innovation, _, chol) = self.innovation_factor(lds, state, measurement)?;
        Some(mahalanobis_squared(&innovation, &chol))
    }

    fn innovation_factor(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
        measurement: &Measurement<T>,
    ) -> Option<(Innovation<T>, InnovationCovariance<T>, Cholesky<T, Dyn>)> {
        if measurement.len() != lds.obs_dim() {
            return None;
        }
        let c = lds.observation_matrix();
        let innovation = measurement.innovation(&c.observe(&state.mean));
        let s = compute_innovation_covariance(&state.covariance, c, lds.observation_noise());
        let chol = checked_cholesky(&s, self.config.condition_tolerance)?;
        Some((innovation, s, chol))
    }

    /// Factorizes `S`, applying the configured stability policy.
    fn factor_innovation(
        &self,
        s: InnovationCovariance<T>,
        step: usize,
    ) -> Result<(InnovationCovariance<T>, Cholesky<T, Dyn>, bool)> {
        let tolerance = self.config.condition_tolerance;
        if let Some(chol) = checked_cholesky(&s, tolerance) {
            return Ok((s, chol, false));
        }

        match self.config.stability {
            StabilityPolicy::FailFast => {
                tracing::debug!(step, "innovation covariance ill-conditioned");
                Err(LdsError::NumericalInstability { step })
            }
            StabilityPolicy::Jitter { jitter } => {
                tracing::warn!(
                    step,
                    jitter = ?jitter,
                    "innovation covariance ill-conditioned, retrying with jitter"
                );
                let jittered = s.add_diagonal(jitter);
                match checked_cholesky(&jittered, tolerance) {
                    Some(chol) => Ok((jittered, chol, true)),
                    None => Err(LdsError::NumericalInstability { step }),
                }
            }
        }
    }

    fn update_at(
        &self,
        lds: &LinearDynamicalSystem<T>,
        state: &KalmanState<T>,
        measurement: &Measurement<T>,
        step: usize,
    ) -> Result<UpdateOutcome<T>> {
        let c = lds.observation_matrix();
        let r = lds.observation_noise();

        // Innovation
        let predicted_meas = c.observe(&state.mean);
        let innovation = measurement.innovation(&predicted_meas);

        // Innovation covariance: S = C * P * C^T + R
        let s = compute_innovation_covariance(&state.covariance, c, r);
        let (innovation_cov, chol, jittered) = self.factor_innovation(s, step)?;

        // Kalman gain: K = P * C^T * S^{-1}
        let kalman_gain = compute_kalman_gain(&state.covariance, c, &chol);

        // Updated mean: mu = mu + K * y
        let updated_mean = state.mean.clone() + kalman_gain.correct(&innovation);

        let mut updated_cov = match self.config.covariance_update {
            CovarianceUpdate::Simple => simple_covariance_update(&state.covariance, &kalman_gain, c),
            CovarianceUpdate::Joseph => joseph_update(&state.covariance, &kalman_gain, c, r),
        };
        if self.config.symmetrize {
            updated_cov = updated_cov.symmetrize();
        }

        let log_likelihood = log_density_from_cholesky(&innovation, &chol);

        let state = KalmanState::new(updated_mean, updated_cov);
        if !state.is_finite() || !Float::is_finite(log_likelihood) {
            tracing::debug!(step, "filter step produced non-finite values");
            return Err(LdsError::NumericalInstability { step });
        }

        Ok(UpdateOutcome {
            state,
            innovation,
            innovation_covariance: innovation_cov,
            log_likelihood,
            jittered,
        })
    }
}

fn check_measurement<T: RealField>(
    lds: &LinearDynamicalSystem<T>,
    measurement: &Measurement<T>,
) -> Result<()>
where
    T: Float + Copy,
{
    let obs_dim = lds.obs_dim();
    if measurement.len() != obs_dim {
        return Err(LdsError::DimensionMismatch {
            parameter: "observation",
            expected: (obs_dim, 1),
            found: (measurement.len(), 1),
        });
    }
    if !measurement.is_finite() {
        return Err(LdsError::NonFiniteParameter {
            parameter: "observation",
        });
    }
    Ok(())
}

// ============================================================================
// Standalone Functions
// ============================================================================

/// Runs the Kalman filter with the default configuration.
///
/// Equivalent to `KalmanFilter::default().filter(lds, observations)`.
pub fn filter<T: RealField + Float + Copy>(
    lds: &LinearDynamicalSystem<T>,
    observations: &[Measurement<T>],
) -> Result<FilterResult<T>> {
    KalmanFilter::default().filter(lds, observations)
}

// ============================================================================
// Tests
// ============================================================================
