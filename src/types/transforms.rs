//! Typed transformation matrices
//!
//! Matrices that transform vectors between spaces, with type-level
//! encoding of source and target spaces.

use ::core::marker::PhantomData;
use nalgebra::{Cholesky, DMatrix, Dyn, RealField, Scalar};

use super::spaces::{
    Innovation, InnovationCovariance, InnovationSpace, Measurement, MeasurementCovariance,
    MeasurementSpace, StateCovariance, StateSpace, StateVector, Vector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A transformation matrix that maps vectors from one space to another.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `To`: Target space marker (rows)
/// - `From`: Source space marker (columns)
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, To, From> {
    inner: DMatrix<T>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, To, From> Transform<T, To, From> {
    /// Creates a transform from a raw matrix.
    #[inline]
    pub fn from_matrix(inner: DMatrix<T>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &DMatrix<T> {
        &self.inner
    }

    /// Dimension of the target space.
    #[inline]
    pub fn rows(&self) -> usize {
        self.inner.nrows()
    }

    /// Dimension of the source space.
    #[inline]
    pub fn cols(&self) -> usize {
        self.inner.ncols()
    }
}

impl<T: RealField + Copy, To, From> Transform<T, To, From> {
    /// Applies the transformation to a vector of the source space.
    #[inline]
    pub fn apply(&self, v: &Vector<T, From>) -> Vector<T, To> {
        Vector::from_dvector(&self.inner * v.as_dvector())
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// State transition matrix `A`: StateSpace -> StateSpace
pub type TransitionMatrix<T> = Transform<T, StateSpace, StateSpace>;

/// Observation matrix `C`: StateSpace -> MeasurementSpace
pub type ObservationMatrix<T> = Transform<T, MeasurementSpace, StateSpace>;

/// Kalman gain `K`: InnovationSpace -> StateSpace
pub type KalmanGain<T> = Transform<T, StateSpace, InnovationSpace>;

// ============================================================================
// Specific Transform Applications
// ============================================================================

impl<T: RealField + Copy> TransitionMatrix<T> {
    /// Applies the transition to a state vector.
    #[inline]
    pub fn apply_state(&self, state: &StateVector<T>) -> StateVector<T> {
        self.apply(state)
    }

    /// Propagates a covariance matrix: A * P * A^T
    #[inline]
    pub fn propagate_covariance(&self, cov: &StateCovariance<T>) -> StateCovariance<T> {
        StateCovariance::from_matrix(&self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<T: RealField + Copy> ObservationMatrix<T> {
    /// Applies the observation model to a state vector.
    #[inline]
    pub fn observe(&self, state: &StateVector<T>) -> Measurement<T> {
        self.apply(state)
    }

    /// Projects state covariance to measurement space: C * P * C^T
    #[inline]
    pub fn project_covariance(&self, cov: &StateCovariance<T>) -> MeasurementCovariance<T> {
        MeasurementCovariance::from_matrix(&self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<T: RealField + Copy> KalmanGain<T> {
    /// Applies the Kalman gain to an innovation vector.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T>) -> StateVector<T> {
        self.apply(innovation)
    }
}

// ============================================================================
// Kalman Gain Computation
// ============================================================================

/// Computes the Kalman gain matrix from a factorized innovation covariance.
///
/// K = P * C^T * S^{-1}
///
/// `S^{-1}` is never formed. Since P and S are symmetric,
/// K^T = S^{-1} * (C * P), which is a Cholesky solve against `C * P`.
pub fn compute_kalman_gain<T: RealField + Copy>(
    state_cov: &StateCovariance<T>,
    obs_matrix: &ObservationMatrix<T>,
    innovation_chol: &Cholesky<T, Dyn>,
) -> KalmanGain<T> {
    let c_p = obs_matrix.as_matrix() * state_cov.as_matrix();
    let k_t = innovation_chol.solve(&c_p);
    KalmanGain::from_matrix(k_t.transpose())
}

/// Computes the innovation covariance.
///
/// S = C * P * C^T + R, symmetrized.
pub fn compute_innovation_covariance<T: RealField + Copy>(
    state_cov: &StateCovariance<T>,
    obs_matrix: &ObservationMatrix<T>,
    meas_noise: &MeasurementCovariance<T>,
) -> InnovationCovariance<T> {
    let c_p_ct = obs_matrix.project_covariance(state_cov);
    InnovationCovariance::from_matrix(c_p_ct.as_matrix() + meas_noise.as_matrix()).symmetrize()
}

/// Updates state covariance using Joseph form for numerical stability.
///
/// P_updated = (I - K*C) * P * (I - K*C)^T + K * R * K^T
pub fn joseph_update<T: RealField + Copy>(
    state_cov: &StateCovariance<T>,
    kalman_gain: &KalmanGain<T>,
    obs_matrix: &ObservationMatrix<T>,
    meas_noise: &MeasurementCovariance<T>,
) -> StateCovariance<T> {
    let n = state_cov.dim();
    let i_kc = DMatrix::<T>::identity(n, n) - kalman_gain.as_matrix() * obs_matrix.as_matrix();

    let term1 = &i_kc * state_cov.as_matrix() * i_kc.transpose();
    let term2 =
        kalman_gain.as_matrix() * meas_noise.as_matrix() * kalman_gain.as_matrix().transpose();

    StateCovariance::from_matrix(term1 + term2)
}

/// Simple covariance update.
///
/// P_updated = (I - K*C) * P
pub fn simple_covariance_update<T: RealField + Copy>(
    state_cov: &StateCovariance<T>,
    kalman_gain: &KalmanGain<T>,
    obs_matrix: &ObservationMatrix<T>,
) -> StateCovariance<T> {
    let n = state_cov.dim();
    let i_kc = DMatrix::<T>::identity(n, n) - kalman_gain.as_matrix() * obs_matrix.as_matrix();

    StateCovariance::from_matrix(i_kc * state_cov.as_matrix())
}
