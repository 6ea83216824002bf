//! Kalman filter configuration
//!
//! Numerical policy for the filter recursion: how a singular or
//! ill-conditioned innovation covariance is treated, which covariance
//! update form is used, and whether filtered covariances are symmetrized.

use nalgebra::RealField;
use num_traits::Float;

/// What to do when the innovation covariance cannot be factorized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilityPolicy<T> {
    /// Return [`LdsError::NumericalInstability`](crate::LdsError::NumericalInstability) immediately.
    FailFast,
    /// Add `jitter * I` to the innovation covariance and retry once.
    Jitter {
        /// Amount added to each diagonal entry
        jitter: T,
    },
}

/// Form of the filtered covariance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovarianceUpdate {
    /// `(I - K*C) * P`
    #[default]
    Simple,
    /// `(I - K*C) * P * (I - K*C)^T + K * R * K^T`
    Joseph,
}

/// Configuration for [`KalmanFilter`](super::kalman::KalmanFilter).
///
/// The default fails fast on an ill-conditioned innovation covariance, uses
/// the simple covariance update, symmetrizes predicted and filtered
/// covariances and rejects innovation covariances with a pivot ratio below
/// `1e-12`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig<T> {
    /// Policy for singular or ill-conditioned innovation covariances
    pub stability: StabilityPolicy<T>,
    /// Covariance update form
    pub covariance_update: CovarianceUpdate,
    /// Replace each predicted and filtered covariance with `(P + P^T) / 2`
    pub symmetrize: bool,
    /// Smallest accepted `L_ii^2 / S_ii` over the Cholesky factor `L` of the
    /// innovation covariance `S`. The ratio does not depend on the units of
    /// each observation channel.
    pub condition_tolerance: T,
}

impl<T: RealField + Float + Copy> Default for FilterConfig<T> {
    fn default() -> Self {
        Self {
            stability: StabilityPolicy::FailFast,
            covariance_update: CovarianceUpdate::Simple,
            symmetrize: true,
            condition_tolerance: T::from_f64(1e-12).unwrap_or_else(T::zero),
        }
    }
}

impl<T: RealField + Float + Copy> FilterConfig<T> {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stability policy.
    ///
    /// # Panics
    /// Panics if a jitter policy carries a non-positive or non-finite jitter.
    pub fn with_stability(mut self, stability: StabilityPolicy<T>) -> Self {
        if let StabilityPolicy::Jitter { jitter } = stability {
            assert!(
                jitter > T::zero() && Float::is_finite(jitter),
                "Jitter must be positive and finite"
            );
        }
        self.stability = stability;
        self
    }

    /// Shorthand for [`StabilityPolicy::Jitter`].
    ///
    /// # Panics
    /// Panics if `jitter` is not positive and finite.
    pub fn with_jitter(self, jitter: T) -> Self {
        self.with_stability(StabilityPolicy::Jitter { jitter })
    }

    /// Sets the covariance update form.
    pub fn with_covariance_update(mut self, covariance_update: CovarianceUpdate) -> Self {
        self.covariance_update = covariance_update;
        self
    }

    /// Enables or disables symmetrization of filtered covariances.
    pub fn with_symmetrize(mut self, symmetrize: bool) -> Self {
        self.symmetrize = symmetrize;
        self
    }

    /// Sets the conditioning tolerance.
    ///
    /// # Panics
    /// Panics if `tolerance` is negative or NaN.
    pub fn with_condition_tolerance(mut self, tolerance: T) -> Self {
        assert!(
            tolerance >= T::zero(),
            "Condition tolerance must be non-negative"
        );
        self.condition_tolerance = tolerance;
        self
    }
}
