//! Vector space markers and typed vectors
//!
//! This module provides type-safe vectors that cannot be accidentally mixed
//! across different mathematical spaces (state, measurement, innovation).
//! Dimensions are carried at runtime so that a system can be described by
//! caller-supplied matrices; the space of a vector is still fixed at compile
//! time.

use ::core::marker::PhantomData;
use ::core::ops::Add;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, RealField, Scalar, SymmetricEigen};

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker type for state space vectors (the latent state `z`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker type for measurement space vectors (the observations `x`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker type for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// A vector parameterized by scalar type and mathematical space.
///
/// The `Space` parameter ensures that vectors from different spaces cannot
/// be accidentally mixed in operations. Adding vectors of different lengths
/// within the same space panics, as it does for the underlying nalgebra
/// vectors; dimension checks against a system happen where vectors enter
/// the library.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, Space> {
    inner: DVector<T>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, Space> Vector<T, Space> {
    /// Creates a new vector by copying a slice.
    #[inline]
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            inner: DVector::from_column_slice(data),
            _marker: PhantomData,
        }
    }

    /// Creates a new vector from an nalgebra DVector.
    #[inline]
    pub fn from_dvector(inner: DVector<T>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying nalgebra vector.
    #[inline]
    pub fn as_dvector(&self) -> &DVector<T> {
        &self.inner
    }

    /// Returns a reference to the raw data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Number of components.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` for a zero-length vector.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Access element at index (unchecked).
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }
}

impl<T: RealField + Copy, Space> Vector<T, Space> {
    /// Creates a zero vector of the given dimension.
    #[inline]
    pub fn zeros(dim: usize) -> Self {
        Self {
            inner: DVector::zeros(dim),
            _marker: PhantomData,
        }
    }

    /// Computes the Euclidean norm.
    #[inline]
    pub fn norm(&self) -> T {
        self.inner.norm()
    }

    /// Returns `true` if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// A state vector in state space.
pub type StateVector<T> = Vector<T, StateSpace>;

/// A measurement vector in measurement space.
pub type Measurement<T> = Vector<T, MeasurementSpace>;

/// An innovation vector (measurement residual) in innovation space.
pub type Innovation<T> = Vector<T, InnovationSpace>;

// ============================================================================
// Operations: Same-Space Addition
// ============================================================================

impl<T: RealField + Copy, Space> Add for Vector<T, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner + rhs.inner,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Special Operation: Measurement - Measurement = Innovation
// ============================================================================

/// Trait for computing innovation (residual) from measurements.
///
/// This is a separate trait because subtracting two measurements
/// produces an innovation vector, not another measurement.
pub trait ComputeInnovation<T: RealField> {
    /// Computes the innovation (residual) between this measurement and a predicted measurement.
    fn innovation(&self, predicted: &Measurement<T>) -> Innovation<T>;
}

impl<T: RealField + Copy> ComputeInnovation<T> for Measurement<T> {
    #[inline]
    fn innovation(&self, predicted: &Measurement<T>) -> Innovation<T> {
        Innovation {
            inner: &self.inner - &predicted.inner,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a specific vector space.
///
/// Covariance matrices are symmetric positive semi-definite matrices
/// that describe the uncertainty in a vector estimate.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, Space> {
    inner: DMatrix<T>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, Space> Covariance<T, Space> {
    /// Creates a covariance matrix from a raw matrix.
    ///
    /// # Safety (logical)
    /// The caller should ensure the matrix is square, symmetric and positive
    /// semi-definite.
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

    /// Consumes self and returns the underlying matrix.
    #[inline]
    pub fn into_matrix(self) -> DMatrix<T> {
        self.inner
    }

    /// Side length of the (square) matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.inner.nrows()
    }
}

impl<T: RealField + Copy, Space> Covariance<T, Space> {
    /// Creates a zero covariance matrix.
    #[inline]
    pub fn zeros(dim: usize) -> Self {
        Self::from_matrix(DMatrix::zeros(dim, dim))
    }

    /// Creates an identity covariance matrix.
    #[inline]
    pub fn identity(dim: usize) -> Self {
        Self::from_matrix(DMatrix::identity(dim, dim))
    }

    /// Creates a diagonal covariance matrix.
    #[inline]
    pub fn from_diagonal(diag: &DVector<T>) -> Self {
        Self::from_matrix(DMatrix::from_diagonal(diag))
    }

    /// Adds two covariance matrices.
    #[inline]
    pub fn add(&self, other: &Self) -> Self {
        Self::from_matrix(&self.inner + &other.inner)
    }

    /// Adds `jitter` to every diagonal entry.
    #[inline]
    pub fn add_diagonal(&self, jitter: T) -> Self {
        let mut inner = self.inner.clone();
        for i in 0..inner.nrows() {
            inner[(i, i)] += jitter;
        }
        Self::from_matrix(inner)
    }

    /// Computes the trace of the covariance matrix.
    #[inline]
    pub fn trace(&self) -> T {
        self.inner.trace()
    }

    /// Returns `(P + P^T) / 2`.
    #[inline]
    pub fn symmetrize(&self) -> Self {
        let half = T::one() / (T::one() + T::one());
        Self::from_matrix((&self.inner + self.inner.transpose()).scale(half))
    }

    /// Largest absolute difference between `P[i,j]` and `P[j,i]`.
    pub fn asymmetry(&self) -> T {
        let n = self.inner.nrows();
        let mut worst = T::zero();
        for i in 0..n {
            for j in (i + 1)..n {
                let d = (self.inner[(i, j)] - self.inner[(j, i)]).abs();
                if d > worst {
                    worst = d;
                }
            }
        }
        worst
    }

    /// Returns `true` if every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }

    /// Smallest eigenvalue of the symmetric part of the matrix.
    ///
    /// Returns `None` for an empty matrix.
    pub fn min_eigenvalue(&self) -> Option<T> {
        if self.inner.is_empty() {
            return None;
        }
        let eigen = SymmetricEigen::new(self.symmetrize().into_matrix());
        eigen.eigenvalues.iter().copied().reduce(|a, b| a.min(b))
    }

    /// Computes the determinant of the covariance matrix via Cholesky decomposition.
    ///
    /// For a positive definite matrix, det(A) = det(L)^2 where L is lower triangular.
    /// Returns None if the matrix is not positive definite.
    pub fn determinant(&self) -> Option<T> {
        let chol = self.cholesky()?;
        let l = chol.l_dirty();
        let mut det_l = T::one();
        for i in 0..l.nrows() {
            det_l *= l[(i, i)];
        }
        Some(det_l * det_l)
    }

    /// Computes the Cholesky decomposition.
    ///
    /// Returns `None` if the matrix is not positive definite.
    #[inline]
    pub fn cholesky(&self) -> Option<Cholesky<T, Dyn>> {
        Cholesky::new(self.inner.clone())
    }
}

// ============================================================================
// Type Aliases for Covariance
// ============================================================================

/// Covariance matrix in state space.
pub type StateCovariance<T> = Covariance<T, StateSpace>;

/// Covariance matrix in measurement space.
pub type MeasurementCovariance<T> = Covariance<T, MeasurementSpace>;

/// Covariance matrix in innovation space.
///
/// The innovation covariance S = C*P*C' + R is built from a measurement-space
/// noise term but describes the spread of innovation vectors, so the Kalman
/// update and the log-likelihood work with this alias.
pub type InnovationCovariance<T> = Covariance<T, InnovationSpace>;
