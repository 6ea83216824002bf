//! Gaussian densities and multivariate normal sampling
//!
//! Log-densities are evaluated from a Cholesky factor so the covariance is
//! never inverted explicitly. Sampling uses a square-root factor `L` with
//! `L * L^T = P`, falling back to a clamped eigendecomposition when `P` is
//! only positive semi-definite.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, RealField, SymmetricEigen};
use num_traits::Float;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::spaces::{Covariance, Vector};

// ============================================================================
// Factorization
// ============================================================================

/// Factorizes a covariance, rejecting ill-conditioned matrices.
///
/// Returns `None` when the Cholesky decomposition fails, when any factor entry
/// is non-finite, or when some pivot ratio `L_ii^2 / P_ii` falls below
/// `rcond_tolerance`. The ratio is the fraction of the variance of component
/// `i` not explained by the components before it, so it is unaffected by the
/// units of each component and only small for nearly collinear covariances.
pub fn checked_cholesky<T: RealField + Float + Copy, Space>(
    covariance: &Covariance<T, Space>,
    rcond_tolerance: T,
) -> Option<Cholesky<T, Dyn>> {
    let chol = covariance.cholesky()?;
    let l = chol.l_dirty();
    let p = covariance.as_matrix();

    for i in 0..l.nrows() {
        let d = l[(i, i)];
        let var = p[(i, i)];
        if !Float::is_finite(d) || var <= T::zero() {
            return None;
        }
        if d * d / var < rcond_tolerance {
            return None;
        }
    }

    Some(chol)
}

/// Log-determinant of a matrix from its Cholesky factor: `2 * sum(ln L_ii)`.
pub fn log_determinant<T: RealField + Float + Copy>(chol: &Cholesky<T, Dyn>) -> T {
    let l = chol.l_dirty();
    let mut sum = T::zero();
    for i in 0..l.nrows() {
        sum = sum + Float::ln(l[(i, i)]);
    }
    sum + sum
}

/// Squared Mahalanobis distance `z^T * P^{-1} * z` from a Cholesky factor of `P`.
pub fn mahalanobis_squared<T: RealField + Float + Copy, Space>(
    z: &Vector<T, Space>,
    chol: &Cholesky<T, Dyn>,
) -> T {
    let solved = chol.solve(z.as_dvector());
    z.as_dvector().dot(&solved)
}

// ============================================================================
// Log-Density
// ============================================================================

/// Log-density of `z` under `Normal(0, P)`, given the Cholesky factor of `P`.
///
/// log N(z; 0, P) = -0.5 * (m * ln(2*pi) + ln|P| + z^T * P^{-1} * z)
pub fn log_density_from_cholesky<T: RealField + Float + Copy, Space>(
    z: &Vector<T, Space>,
    chol: &Cholesky<T, Dyn>,
) -> T {
    let m = T::from_usize(z.len()).unwrap_or_else(T::zero);
    let half = T::from_f64(0.5).unwrap_or_else(T::zero);
    let log_two_pi = Float::ln(T::two_pi());

    -half * (m * log_two_pi + log_determinant(chol) + mahalanobis_squared(z, chol))
}

/// Computes the log-likelihood of a zero-mean Gaussian.
///
/// Returns `None` if the covariance matrix is singular or not positive definite.
pub fn gaussian_log_likelihood<T: RealField + Float + Copy, Space>(
    z: &Vector<T, Space>,
    covariance: &Covariance<T, Space>,
) -> Option<T> {
    let chol = covariance.cholesky()?;
    Some(log_density_from_cholesky(z, &chol))
}

/// Computes the likelihood of a zero-mean Gaussian.
///
/// Returns `None` if the covariance matrix is singular or not positive definite.
pub fn gaussian_likelihood<T: RealField + Float + Copy, Space>(
    z: &Vector<T, Space>,
    covariance: &Covariance<T, Space>,
) -> Option<T> {
    gaussian_log_likelihood(z, covariance).map(Float::exp)
}

// ============================================================================
// Sampling
// ============================================================================

/// A multivariate normal distribution prepared for repeated sampling.
///
/// The square-root factor is computed once at construction; each draw then
/// costs `dim` standard-normal samples and one matrix-vector product.
#[derive(Debug, Clone)]
pub struct MultivariateNormal<T: RealField, Space> {
    mean: Vector<T, Space>,
    factor: DMatrix<T>,
}

impl<T: RealField + Float + Copy, Space> MultivariateNormal<T, Space> {
    /// Creates a distribution with the given mean and covariance.
    ///
    /// # Panics
    /// Panics if the covariance side length differs from the mean length.
    pub fn new(mean: Vector<T, Space>, covariance: &Covariance<T, Space>) -> Self {
        assert_eq!(
            mean.len(),
            covariance.dim(),
            "Mean and covariance dimensions must agree"
        );
        Self {
            mean,
            factor: square_root_factor(covariance),
        }
    }

    /// Creates a zero-mean distribution (a noise source).
    pub fn zero_mean(covariance: &Covariance<T, Space>) -> Self {
        Self::new(Vector::zeros(covariance.dim()), covariance)
    }

    /// Dimension of the samples.
    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Draws one sample `mean + L * e` with `e ~ Normal(0, I)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector<T, Space>
    where
        StandardNormal: Distribution<T>,
    {
        let e = DVector::from_fn(self.dim(), |_, _| StandardNormal.sample(&mut *rng));
        Vector::from_dvector(self.mean.as_dvector() + &self.factor * e)
    }
}

/// Computes a square-root factor `L` with `L * L^T = P`.
///
/// Uses the Cholesky factor for positive definite `P`. Otherwise, falls back
/// to `V * sqrt(max(lambda, 0))` from the symmetric eigendecomposition, which
/// also covers semi-definite covariances such as an all-zero noise term.
pub fn square_root_factor<T: RealField + Float + Copy, Space>(
    covariance: &Covariance<T, Space>,
) -> DMatrix<T> {
    if let Some(chol) = covariance.cholesky() {
        return chol.unpack();
    }

    tracing::debug!(
        dim = covariance.dim(),
        "covariance not positive definite, factoring by eigendecomposition"
    );

    let eigen = SymmetricEigen::new(covariance.symmetrize().into_matrix());
    let roots = eigen
        .eigenvalues
        .map(|lambda| Float::sqrt(Float::max(lambda, T::zero())));
    eigen.eigenvectors * DMatrix::from_diagonal(&roots)
}
