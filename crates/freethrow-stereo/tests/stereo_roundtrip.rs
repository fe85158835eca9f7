use freethrow_core::{CalibrationPattern, CornerObservation, ImageSize};
use freethrow_stereo::{
    stereo_rectify, rectify_point, Camera, CalibrationError, CalibrationOptions, CameraIntrinsics,
    Distortion, StereoCalibration, StereoCalibrator,
};
use nalgebra::{Isometry3, Point3, Rotation3, Vector3};

fn truth() -> StereoCalibration {
    StereoCalibration {
        image_size: ImageSize::new(640, 640),
        left: Camera::new(
            CameraIntrinsics::new(600.0, 605.0, 320.0, 318.0),
            Distortion {
                k1: -0.1,
                k2: 0.02,
                ..Distortion::default()
            },
        ),
        right: Camera::new(
            CameraIntrinsics::new(590.0, 592.0, 325.0, 322.0),
            Distortion {
                k1: -0.08,
                k2: 0.01,
                ..Distortion::default()
            },
        ),
        rotation: Rotation3::new(Vector3::new(0.01, 0.15, 0.005)).into_inner(),
        translation: Vector3::new(-29.7, 0.5, 4.5),
        rms: 0.0,
    }
}

fn board_pose(view: usize) -> Isometry3<f64> {
    let a = view as f64;
    Isometry3::new(
        Vector3::new(7.0 + 3.0 * a.sin(), -3.75 + 2.0 * (1.7 * a).cos(), 45.0 + 1.5 * a),
        Vector3::new(
            0.4 * (1.3 * a).sin(),
            0.4 * (0.9 * a).cos(),
            0.2 * (0.5 * a).sin(),
        ),
    )
}

fn observe(
    rig: &StereoCalibration,
    pattern: &CalibrationPattern,
    views: usize,
) -> (Vec<CornerObservation>, Vec<CornerObservation>) {
    let object = pattern.object_points();
    let mut left = Vec::new();
    let mut right = Vec::new();
    for v in 0..views {
        let pose = board_pose(v);
        let l = object
            .iter()
            .map(|p| rig.left.project(&(pose * p)).expect("left in front"))
            .collect();
        let r = object
            .iter()
            .map(|p| {
                let x = rig.rotation * (pose * p).coords + rig.translation;
                rig.right.project(&Point3::from(x)).expect("right in front")
            })
            .collect();
        left.push(CornerObservation::new(l));
        right.push(CornerObservation::new(r));
    }
    (left, right)
}

fn rel(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs()
}

#[test]
fn recovers_synthetic_rig() {
    let rig = truth();
    let pattern = CalibrationPattern::default();
    let (left, right) = observe(&rig, &pattern, 16);

    let options = CalibrationOptions {
        fix_k3: true,
        ..CalibrationOptions::default()
    };
    let calib = StereoCalibrator::new(pattern, rig.image_size, options)
        .expect("calibrator")
        .calibrate(&left, &right)
        .expect("calibration");

    assert!(calib.rms < 1e-3, "rms {}", calib.rms);
    for (est, exp) in [(&calib.left, &rig.left), (&calib.right, &rig.right)] {
        let (e, t) = (est.intrinsics, exp.intrinsics);
        for (a, b) in [(e.fx, t.fx), (e.fy, t.fy), (e.cx, t.cx), (e.cy, t.cy)] {
            assert!(rel(a, b) < 1e-2, "{a} vs {b}");
        }
    }
    let dr = Rotation3::from_matrix_unchecked(calib.rotation.transpose() * rig.rotation).angle();
    assert!(dr < 1e-3, "rotation off by {dr} rad");
    assert!(
        (calib.translation - rig.translation).norm() / rig.translation.norm() < 1e-2,
        "T {:?}",
        calib.translation
    );
}

#[test]
fn calibrated_rig_rectifies_to_shared_rows() {
    let rig = truth();
    let pattern = CalibrationPattern::default();
    let (left, right) = observe(&rig, &pattern, 15);
    let calib = StereoCalibrator::new(pattern, rig.image_size, CalibrationOptions::default())
        .expect("calibrator")
        .calibrate(&left, &right)
        .expect("calibration");

    let transforms = stereo_rectify(&calib, calib.image_size).expect("rectify");
    for (l, r) in left.iter().zip(&right).take(4) {
        for (a, b) in l.corners.iter().zip(&r.corners) {
            let ra = rectify_point(&calib, &transforms, 0, *a).expect("left");
            let rb = rectify_point(&calib, &transforms, 1, *b).expect("right");
            assert!((ra.y - rb.y).abs() < 0.05, "{} vs {}", ra.y, rb.y);
        }
    }
}

#[test]
fn refuses_three_pairs() {
    let rig = truth();
    let pattern = CalibrationPattern::default();
    let (left, right) = observe(&rig, &pattern, 3);
    let err = StereoCalibrator::new(pattern, rig.image_size, CalibrationOptions::default())
        .expect("calibrator")
        .calibrate(&left, &right)
        .expect_err("three pairs");
    assert_eq!(
        CalibrationError::InsufficientPairs {
            found: 3,
            required: 5
        },
        err
    );
}

#[test]
fn refuses_unequal_lists() {
    let rig = truth();
    let pattern = CalibrationPattern::default();
    let (left, right) = observe(&rig, &pattern, 6);
    let err = StereoCalibrator::new(pattern, rig.image_size, CalibrationOptions::default())
        .expect("calibrator")
        .calibrate(&left, &right[..5])
        .expect_err("mismatch");
    assert_eq!(
        CalibrationError::MismatchedObservations { left: 6, right: 5 },
        err
    );
}
