//! Common test helpers for filter integration tests
//!
//! Includes a reference filter written directly against nalgebra in the
//! textbook form (explicit inverses, no typed spaces) to cross-check the
//! library recursion.

#![allow(dead_code)]

use lds_kalman::models::LinearDynamicalSystem;
use lds_kalman::types::spaces::Measurement;
use nalgebra::{DMatrix, DVector};

/// Raw parameters of a linear dynamical system.
#[derive(Debug, Clone)]
pub struct RawSystem {
    pub a: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub q: DMatrix<f64>,
    pub r: DMatrix<f64>,
    pub mu0: DVector<f64>,
    pub sigma0: DMatrix<f64>,
}

impl RawSystem {
    pub fn build(&self) -> LinearDynamicalSystem<f64> {
        LinearDynamicalSystem::new(
            self.a.clone(),
            self.c.clone(),
            self.q.clone(),
            self.r.clone(),
            self.mu0.clone(),
            self.sigma0.clone(),
        )
        .unwrap()
    }
}

/// The all-identity 2-D system: A = C = Q = R = Sigma0 = I, mu0 = [5, 5].
pub fn identity_system() -> RawSystem {
    let eye = DMatrix::identity(2, 2);
    RawSystem {
        a: eye.clone(),
        c: eye.clone(),
        q: eye.clone(),
        r: eye.clone(),
        mu0: DVector::from_vec(vec![5.0, 5.0]),
        sigma0: eye,
    }
}

/// A rotating 3-D state observed through two mixed channels.
pub fn mixed_system() -> RawSystem {
    let theta: f64 = 0.1;
    let (s, c) = theta.sin_cos();
    RawSystem {
        a: DMatrix::from_row_slice(3, 3, &[c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 0.95]),
        c: DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.5, 0.0, 1.0, -0.5]),
        q: DMatrix::from_row_slice(3, 3, &[0.2, 0.05, 0.0, 0.05, 0.2, 0.0, 0.0, 0.0, 0.1]),
        r: DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.1, 0.4]),
        mu0: DVector::from_vec(vec![1.0, -1.0, 0.5]),
        sigma0: DMatrix::identity(3, 3).scale(2.0),
    }
}

/// One step of reference output: filtered mean, filtered covariance and
/// log-likelihood contribution.
#[derive(Debug, Clone)]
pub struct ReferenceStep {
    pub mean: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub log_likelihood: f64,
}

/// Textbook Kalman filter with explicit inverses.
pub fn reference_filter(system: &RawSystem, observations: &[DVector<f64>]) -> Vec<ReferenceStep> {
    let n = system.a.nrows();
    let m = system.c.nrows();
    let mut out: Vec<ReferenceStep> = Vec::with_capacity(observations.len());

    for (t, x) in observations.iter().enumerate() {
        let (mu_pred, p_pred) = if t == 0 {
            (system.mu0.clone(), system.sigma0.clone())
        } else {
            let prev = &out[t - 1];
            (
                &system.a * &prev.mean,
                &system.a * &prev.covariance * system.a.transpose() + &system.q,
            )
        };

        let y = x - &system.c * &mu_pred;
        let s = &system.c * &p_pred * system.c.transpose() + &system.r;
        let s_inv = s.clone().try_inverse().expect("reference S must be invertible");
        let k = &p_pred * system.c.transpose() * &s_inv;

        let mean = &mu_pred + &k * &y;
        let covariance = (DMatrix::identity(n, n) - &k * &system.c) * &p_pred;

        let mahal = (y.transpose() * &s_inv * &y)[(0, 0)];
        let log_likelihood = -0.5
            * (m as f64 * (2.0 * std::f64::consts::PI).ln() + s.determinant().ln() + mahal);

        out.push(ReferenceStep {
            mean,
            covariance,
            log_likelihood,
        });
    }

    out
}

/// Independent scalar filters, one per coordinate, for systems where every
/// matrix is diagonal. Returns `(means, variances)` per step.
pub fn diagonal_reference(
    system: &RawSystem,
    observations: &[DVector<f64>],
) -> Vec<(Vec<f64>, Vec<f64>)> {
    let n = system.a.nrows();
    let mut means: Vec<f64> = (0..n).map(|i| system.mu0[i]).collect();
    let mut vars: Vec<f64> = (0..n).map(|i| system.sigma0[(i, i)]).collect();
    let mut out = Vec::with_capacity(observations.len());

    for (t, x) in observations.iter().enumerate() {
        for i in 0..n {
            let a = system.a[(i, i)];
            let c = system.c[(i, i)];
            if t > 0 {
                means[i] *= a;
                vars[i] = a * a * vars[i] + system.q[(i, i)];
            }
            let s = c * c * vars[i] + system.r[(i, i)];
            let k = vars[i] * c / s;
            means[i] += k * (x[i] - c * means[i]);
            vars[i] *= 1.0 - k * c;
        }
        out.push((means.clone(), vars.clone()));
    }

    out
}

/// Converts typed observations to raw vectors.
pub fn raw_observations(observations: &[Measurement<f64>]) -> Vec<DVector<f64>> {
    observations.iter().map(|x| x.as_dvector().clone()).collect()
}

/// `|a - b| <= rtol * |b| + atol`, elementwise.
pub fn all_close(a: &[f64], b: &[f64], rtol: f64, atol: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= rtol * y.abs() + atol)
}

/// Matrix version of [`all_close`].
pub fn matrix_close(a: &DMatrix<f64>, b: &DMatrix<f64>, rtol: f64, atol: f64) -> bool {
    a.shape() == b.shape() && all_close(a.as_slice(), b.as_slice(), rtol, atol)
}
