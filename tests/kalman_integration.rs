//! Integration tests for sampling and Kalman filtering

mod common;

use common::{
    all_close, diagonal_reference, identity_system, matrix_close, mixed_system, raw_observations,
    reference_filter,
};
use lds_kalman::prelude::*;
use nalgebra::{DMatrix, DVector};

#[test]
fn test_identity_system_matches_reference() {
    let system = identity_system();
    let lds = system.build();
    let trajectory = lds.sample(0, 15);
    let raw = raw_observations(trajectory.observations());

    let result = KalmanFilter::default()
        .filter(&lds, trajectory.observations())
        .unwrap();
    let reference = reference_filter(&system, &raw);

    assert_eq!(result.len(), 15);
    for (t, (step, expected)) in result.iter().zip(reference.iter()).enumerate() {
        assert!(
            all_close(
                step.filtered.mean.as_slice(),
                expected.mean.as_slice(),
                1e-2,
                1e-8
            ),
            "Step {}: mean {:?} vs reference {:?}",
            t,
            step.filtered.mean.as_slice(),
            expected.mean.as_slice()
        );
        assert!(
            matrix_close(
                step.filtered.covariance.as_matrix(),
                &expected.covariance,
                1e-2,
                1e-8
            ),
            "Step {}: covariance mismatch",
            t
        );
        assert!((step.log_likelihood - expected.log_likelihood).abs() < 1e-8);
    }
}

#[test]
fn test_identity_system_matches_per_coordinate_filter() {
    let system = identity_system();
    let lds = system.build();
    let trajectory = lds.sample(0, 15);

    let result = filter(&lds, trajectory.observations()).unwrap();
    let scalar = diagonal_reference(&system, &raw_observations(trajectory.observations()));

    for (step, (means, vars)) in result.iter().zip(scalar.iter()) {
        assert!(all_close(step.filtered.mean.as_slice(), means, 1e-2, 1e-8));
        let diag: Vec<f64> = step.filtered.covariance.as_matrix().diagonal().iter().copied().collect();
        assert!(all_close(&diag, vars, 1e-2, 1e-8));
        assert!(step.filtered.covariance.as_matrix()[(0, 1)].abs() < 1e-12);
    }
}

#[test]
fn test_identity_system_covariance_converges() {
    // Scalar Riccati fixed point for a = c = q = r = 1: p = (sqrt(5) - 1) / 2
    let lds = identity_system().build();
    let trajectory = lds.sample(3, 15);
    let result = filter(&lds, trajectory.observations()).unwrap();

    let fixed_point = (5.0_f64.sqrt() - 1.0) / 2.0;
    let last = result.last().unwrap();
    let p = last.filtered.covariance.as_matrix();
    assert!((p[(0, 0)] - fixed_point).abs() < 1e-6);
    assert!((p[(1, 1)] - fixed_point).abs() < 1e-6);
}

#[test]
fn test_mixed_system_matches_reference() {
    let system = mixed_system();
    let lds = system.build();
    let trajectory = lds.sample(11, 40);
    let raw = raw_observations(trajectory.observations());

    for update in [CovarianceUpdate::Simple, CovarianceUpdate::Joseph] {
        let result = KalmanFilter::new(FilterConfig::new().with_covariance_update(update))
            .filter(&lds, trajectory.observations())
            .unwrap();
        let reference = reference_filter(&system, &raw);

        for (step, expected) in result.iter().zip(reference.iter()) {
            assert!(all_close(
                step.filtered.mean.as_slice(),
                expected.mean.as_slice(),
                1e-6,
                1e-9
            ));
            assert!(matrix_close(
                step.filtered.covariance.as_matrix(),
                &expected.covariance,
                1e-6,
                1e-9
            ));
        }

        let total: f64 = reference.iter().map(|s| s.log_likelihood).sum();
        assert!((result.total_log_likelihood() - total).abs() < 1e-6);
    }
}

#[test]
fn test_filtered_covariances_symmetric_psd() {
    let system = mixed_system();
    let lds = system.build();
    let trajectory = lds.sample(5, 60);
    let result = filter(&lds, trajectory.observations()).unwrap();

    for (t, step) in result.iter().enumerate() {
        let cov = &step.filtered.covariance;
        assert!(cov.asymmetry() < 1e-12, "Step {}: asymmetric covariance", t);
        let min_eig = cov.min_eigenvalue().unwrap();
        assert!(min_eig >= -1e-9, "Step {}: min eigenvalue {}", t, min_eig);
    }
}

#[test]
fn test_single_step_is_conjugate_update() {
    let system = mixed_system();
    let lds = system.build();
    let x = DVector::from_vec(vec![0.3, -0.7]);
    let result = filter(&lds, &[Measurement::from_dvector(x.clone())]).unwrap();
    assert_eq!(result.len(), 1);

    // Information form: P^-1 = Sigma0^-1 + C^T R^-1 C
    let sigma0_inv = system.sigma0.clone().try_inverse().unwrap();
    let r_inv = system.r.clone().try_inverse().unwrap();
    let post_prec = &sigma0_inv + system.c.transpose() * &r_inv * &system.c;
    let post_cov = post_prec.try_inverse().unwrap();
    let post_mean = &post_cov * (&sigma0_inv * &system.mu0 + system.c.transpose() * &r_inv * &x);

    let step = &result.steps()[0];
    assert!(all_close(step.filtered.mean.as_slice(), post_mean.as_slice(), 1e-9, 1e-12));
    assert!(matrix_close(step.filtered.covariance.as_matrix(), &post_cov, 1e-9, 1e-12));
}

#[test]
fn test_sampling_is_deterministic() {
    let lds = mixed_system().build();

    let first = lds.sample(42, 25);
    let second = lds.sample(42, 25);
    let other = lds.sample(43, 25);

    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn test_filter_is_pure() {
    let lds = identity_system().build();
    let trajectory = lds.sample(0, 15);
    let snapshot = (lds.clone(), trajectory.clone());

    let kf = KalmanFilter::default();
    let first = kf.filter(&lds, trajectory.observations()).unwrap();
    let second = kf.filter(&lds, trajectory.observations()).unwrap();

    assert_eq!(first, second);
    assert_eq!(snapshot.0, lds);
    assert_eq!(snapshot.1, trajectory);
}

#[test]
fn test_dimension_mismatch_on_construction() {
    let err = LinearDynamicalSystem::new(
        DMatrix::<f64>::identity(2, 2),
        DMatrix::identity(3, 3),
        DMatrix::identity(2, 2),
        DMatrix::identity(3, 3),
        DVector::zeros(2),
        DMatrix::identity(2, 2),
    )
    .unwrap_err();

    assert_eq!(
        err,
        LdsError::DimensionMismatch {
            parameter: "C",
            expected: (3, 2),
            found: (3, 3),
        }
    );
}

#[test]
fn test_zero_steps() {
    let lds = identity_system().build();
    let trajectory = lds.sample(0, 0);
    assert!(trajectory.is_empty());

    let result = filter(&lds, trajectory.observations()).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_concurrent_filtering_shares_system() {
    let lds = mixed_system().build();
    let kf = KalmanFilter::default();

    let sequential: Vec<f64> = (0..4)
        .map(|seed| {
            let trajectory = lds.sample(seed, 20);
            kf.filter(&lds, trajectory.observations())
                .unwrap()
                .total_log_likelihood()
        })
        .collect();

    let concurrent: Vec<f64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let lds = &lds;
                scope.spawn(move || {
                    let trajectory = lds.sample(seed, 20);
                    kf.filter(lds, trajectory.observations())
                        .unwrap()
                        .total_log_likelihood()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

#[test]
fn test_constant_velocity_tracks_target() {
    let lds = constant_velocity_2d(
        1.0,
        0.05,
        2.0,
        DVector::from_vec(vec![0.0, 0.0, 1.0, 0.5]),
        DMatrix::identity(4, 4).scale(4.0),
    )
    .unwrap();
    let trajectory = lds.sample(9, 50);
    let result = filter(&lds, trajectory.observations()).unwrap();

    // Final position error should be well below the raw sensor noise
    let (latents, _) = trajectory.into_parts();
    let truth = latents.last().unwrap();
    let estimate = &result.last().unwrap().filtered.mean;
    let err = (estimate.as_dvector().rows(0, 2) - truth.as_dvector().rows(0, 2)).norm();
    assert!(err < 8.0, "Position error {} too large", err);
}

#[test]
fn test_overflowing_observation_reports_step() {
    let lds = mixed_system().build();
    let mut observations = lds.sample(2, 6).observations().to_vec();
    observations[2] = Measurement::from_slice(&[1e200, 0.0]);

    // Finite input whose Mahalanobis distance overflows
    let err = filter(&lds, &observations).unwrap_err();
    assert_eq!(err, LdsError::NumericalInstability { step: 2 });
}

#[test]
fn test_nan_observation_rejected_before_filtering() {
    let lds = mixed_system().build();
    let mut observations = lds.sample(2, 6).observations().to_vec();
    observations[4] = Measurement::from_slice(&[f64::NAN, 0.0]);

    let err = filter(&lds, &observations).unwrap_err();
    assert_eq!(
        err,
        LdsError::NonFiniteParameter {
            parameter: "observation"
        }
    );
}

#[test]
fn test_mixed_units_system_matches_reference() {
    // Channels in very different units: millimetres vs kilometres
    let mut system = identity_system();
    system.r = DMatrix::from_diagonal(&DVector::from_vec(vec![1e-7, 1e6]));
    system.sigma0 = system.r.clone();
    system.q = DMatrix::from_diagonal(&DVector::from_vec(vec![1e-8, 1e5]));
    let lds = system.build();

    let trajectory = lds.sample(17, 20);
    let result = filter(&lds, trajectory.observations()).unwrap();
    let reference = reference_filter(&system, &raw_observations(trajectory.observations()));

    assert_eq!(result.jittered_steps(), 0);
    for (step, expected) in result.iter().zip(reference.iter()) {
        assert!(all_close(
            step.filtered.mean.as_slice(),
            expected.mean.as_slice(),
            1e-6,
            1e-15
        ));
    }
}
