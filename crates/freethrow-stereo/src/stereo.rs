use crate::camera::Camera;
use crate::error::CalibrationError;
use crate::lm::{self, NllsProblem};
use crate::mono::{
    calibrate_camera_named, pose_from_params, pose_params, push_view_residuals,
    rms_from_residuals, CalibrationOptions,
};
use crate::zhang::project_to_so3;
use freethrow_core::{CalibrationPattern, CornerObservation, ImageSize};
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Matrix3x4, Point2, Point3, Rotation3, Translation3,
    UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Two calibrated cameras and the pose of the right camera relative to the
/// left one: `X_right = R * X_left + T`.
#[derive(Clone, Debug, PartialEq)]
pub struct StereoCalibration {
    pub image_size: ImageSize,
    pub left: Camera,
    pub right: Camera,
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Joint reprojection RMS over both cameras, pixels.
    pub rms: f64,
}

fn skew(t: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -t.z, t.y, t.z, 0.0, -t.x, -t.y, t.x, 0.0)
}

impl StereoCalibration {
    /// `P1 = K1 [I | 0]`.
    pub fn projection_left(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
        self.left.intrinsics.matrix() * rt
    }

    /// `P2 = K2 [R | T]`.
    pub fn projection_right(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        rt.set_column(3, &self.translation);
        self.right.intrinsics.matrix() * rt
    }

    /// `E = [T]x R`.
    pub fn essential(&self) -> Matrix3<f64> {
        skew(&self.translation) * self.rotation
    }

    /// `F = K2^-T E K1^-1`, `None` when a camera matrix is singular.
    pub fn fundamental(&self) -> Option<Matrix3<f64>> {
        let k1_inv = self.left.intrinsics.matrix().try_inverse()?;
        let k2_inv = self.right.intrinsics.matrix().try_inverse()?;
        Some(k2_inv.transpose() * self.essential() * k1_inv)
    }

    /// Distance between the optical centers, in pattern units.
    pub fn baseline(&self) -> f64 {
        self.translation.norm()
    }

    pub fn relative_pose(&self) -> Isometry3<f64> {
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
            self.rotation,
        ));
        Isometry3::from_parts(Translation3::from(self.translation), rot)
    }
}

/// Reprojection acceptance applied after calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptancePolicy {
    pub max_rms_px: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self { max_rms_px: 1.0 }
    }
}

impl AcceptancePolicy {
    pub fn check(&self, calib: &StereoCalibration) -> Result<(), CalibrationError> {
        if calib.rms > self.max_rms_px {
            return Err(CalibrationError::RmsAboveThreshold {
                rms: calib.rms,
                max: self.max_rms_px,
            });
        }
        Ok(())
    }
}

/// How capture instants were kept or dropped while pairing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PairingStats {
    pub instants: usize,
    pub paired: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub neither: usize,
}

#[derive(Clone, Debug, Default)]
pub struct PairedObservations {
    pub left: Vec<CornerObservation>,
    pub right: Vec<CornerObservation>,
    pub stats: PairingStats,
}

/// Keep the capture instants where both cameras found the board.
pub fn pair_observations(
    left: &[Option<CornerObservation>],
    right: &[Option<CornerObservation>],
) -> Result<PairedObservations, CalibrationError> {
    if left.len() != right.len() {
        return Err(CalibrationError::MismatchedObservations {
            left: left.len(),
            right: right.len(),
        });
    }
    let mut out = PairedObservations {
        stats: PairingStats {
            instants: left.len(),
            ..PairingStats::default()
        },
        ..PairedObservations::default()
    };
    for (l, r) in left.iter().zip(right) {
        match (l, r) {
            (Some(l), Some(r)) => {
                out.left.push(l.clone());
                out.right.push(r.clone());
                out.stats.paired += 1;
            }
            (Some(_), None) => out.stats.left_only += 1,
            (None, Some(_)) => out.stats.right_only += 1,
            (None, None) => out.stats.neither += 1,
        }
    }
    Ok(out)
}

/// Relative pose plus per-view left poses, intrinsics held fixed.
struct StereoProblem<'a> {
    object: &'a [Point3<f64>],
    left: &'a [Vec<Point2<f64>>],
    right: &'a [Vec<Point2<f64>>],
    cam_left: Camera,
    cam_right: Camera,
}

impl StereoProblem<'_> {
    fn rows_per_view(&self) -> usize {
        4 * self.object.len()
    }

    fn pack(&self, relative: &Isometry3<f64>, left_poses: &[Isometry3<f64>]) -> DVector<f64> {
        let mut x = pose_params(relative).to_vec();
        for pose in left_poses {
            x.extend(pose_params(pose));
        }
        DVector::from_vec(x)
    }

    fn relative(&self, x: &DVector<f64>) -> Isometry3<f64> {
        pose_from_params(&x.as_slice()[0..6])
    }

    fn left_pose(&self, x: &DVector<f64>, view: usize) -> Isometry3<f64> {
        let o = 6 + 6 * view;
        pose_from_params(&x.as_slice()[o..o + 6])
    }

    fn view_residuals(&self, out: &mut Vec<f64>, relative: &Isometry3<f64>, pose: &Isometry3<f64>, v: usize) {
        push_view_residuals(out, &self.cam_left, pose, self.object, &self.left[v]);
        push_view_residuals(out, &self.cam_right, &(relative * pose), self.object, &self.right[v]);
    }
}

impl NllsProblem for StereoProblem<'_> {
    fn num_params(&self) -> usize {
        6 + 6 * self.left.len()
    }

    fn num_residuals(&self) -> usize {
        self.rows_per_view() * self.left.len()
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let relative = self.relative(x);
        let mut out = Vec::with_capacity(self.num_residuals());
        for v in 0..self.left.len() {
            self.view_residuals(&mut out, &relative, &self.left_pose(x, v), v);
        }
        DVector::from_vec(out)
    }

    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let r0 = self.residuals(x);
        let mut j = DMatrix::zeros(r0.len(), x.len());
        let mut xp = x.clone();
        let rows = self.rows_per_view();

        for c in 0..x.len() {
            let h = 1e-7 * x[c].abs().max(1e-2);
            xp[c] = x[c] + h;
            if c < 6 {
                let r1 = self.residuals(&xp);
                j.column_mut(c).copy_from(&((r1 - &r0) / h));
            } else {
                let view = (c - 6) / 6;
                let mut r1 = Vec::with_capacity(rows);
                self.view_residuals(&mut r1, &self.relative(&xp), &self.left_pose(&xp, view), view);
                let base = view * rows;
                for (k, v) in r1.into_iter().enumerate() {
                    j[(base + k, c)] = (v - r0[base + k]) / h;
                }
            }
            xp[c] = x[c];
        }
        j
    }
}

/// Average relative pose over views, rotation projected back onto SO(3).
fn initial_relative_pose(
    left: &[Isometry3<f64>],
    right: &[Isometry3<f64>],
) -> Option<Isometry3<f64>> {
    let n = left.len().min(right.len());
    if n == 0 {
        return None;
    }
    let mut r_sum = Matrix3::zeros();
    let mut t_sum = Vector3::zeros();
    for (l, r) in left.iter().zip(right) {
        let rel = r * l.inverse();
        r_sum += rel.rotation.to_rotation_matrix().into_inner();
        t_sum += rel.translation.vector;
    }
    let r = project_to_so3(&r_sum)?;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Some(Isometry3::from_parts(
        Translation3::from(t_sum / n as f64),
        rot,
    ))
}

/// Calibrates a two-camera rig from paired checkerboard observations.
#[derive(Clone, Debug)]
pub struct StereoCalibrator {
    pattern: CalibrationPattern,
    image_size: ImageSize,
    options: CalibrationOptions,
}

impl StereoCalibrator {
    pub fn new(
        pattern: CalibrationPattern,
        image_size: ImageSize,
        options: CalibrationOptions,
    ) -> Result<Self, CalibrationError> {
        pattern.validate()?;
        if image_size.is_empty() {
            return Err(CalibrationError::EmptyImageSize {
                width: image_size.width,
                height: image_size.height,
            });
        }
        Ok(Self {
            pattern,
            image_size,
            options,
        })
    }

    pub fn pattern(&self) -> &CalibrationPattern {
        &self.pattern
    }

    /// Calibrate from same-instant pairs (see [`pair_observations`]).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, left, right), fields(pairs = left.len()))
    )]
    pub fn calibrate(
        &self,
        left: &[CornerObservation],
        right: &[CornerObservation],
    ) -> Result<StereoCalibration, CalibrationError> {
        if left.len() != right.len() {
            return Err(CalibrationError::MismatchedObservations {
                left: left.len(),
                right: right.len(),
            });
        }
        let required = self.options.min_pairs.max(crate::mono::MIN_VIEWS);
        if left.len() < required {
            return Err(CalibrationError::InsufficientPairs {
                found: left.len(),
                required,
            });
        }
        let expected = self.pattern.len();
        for (view, (l, r)) in left.iter().zip(right).enumerate() {
            for obs in [l, r] {
                if obs.len() != expected {
                    return Err(CalibrationError::CornerCountMismatch {
                        view,
                        expected,
                        got: obs.len(),
                    });
                }
            }
        }
        log::info!(
            "stereo calibration: {} pairs, pattern {}x{} @ {}",
            left.len(),
            self.pattern.cols,
            self.pattern.rows,
            self.pattern.square_size
        );

        let object = self.pattern.object_points();
        let left_views: Vec<Vec<Point2<f64>>> = left.iter().map(|o| o.corners.clone()).collect();
        let right_views: Vec<Vec<Point2<f64>>> = right.iter().map(|o| o.corners.clone()).collect();

        let mono_left =
            calibrate_camera_named(&object, &left_views, self.image_size, &self.options, "left")?;
        let mono_right = calibrate_camera_named(
            &object,
            &right_views,
            self.image_size,
            &self.options,
            "right",
        )?;

        let relative = initial_relative_pose(&mono_left.poses, &mono_right.poses)
            .ok_or(CalibrationError::NonFinite { stage: "stereo init" })?;

        let problem = StereoProblem {
            object: &object,
            left: &left_views,
            right: &right_views,
            cam_left: mono_left.camera,
            cam_right: mono_right.camera,
        };
        let x0 = problem.pack(&relative, &mono_left.poses);
        let (x, report) = lm::solve(&problem, x0, &self.options.solve_options());

        let rms = rms_from_residuals(&problem.residuals(&x));
        let relative = problem.relative(&x);
        let rotation = relative.rotation.to_rotation_matrix().into_inner();
        let translation = relative.translation.vector;
        if !rms.is_finite() || rotation.iter().chain(translation.iter()).any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite { stage: "stereo" });
        }
        if !report.converged {
            return Err(CalibrationError::NotConverged { stage: "stereo", rms });
        }
        log::info!(
            "stereo: rms {:.4} px (left {:.4}, right {:.4}), baseline {:.3}",
            rms,
            mono_left.rms,
            mono_right.rms,
            translation.norm()
        );

        Ok(StereoCalibration {
            image_size: self.image_size,
            left: mono_left.camera,
            right: mono_right.camera,
            rotation,
            translation,
            rms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraIntrinsics;
    use approx::assert_relative_eq;

    fn rig() -> StereoCalibration {
        StereoCalibration {
            image_size: ImageSize::new(640, 640),
            left: Camera::new(CameraIntrinsics::new(600.0, 600.0, 320.0, 320.0), Default::default()),
            right: Camera::new(CameraIntrinsics::new(620.0, 615.0, 310.0, 330.0), Default::default()),
            rotation: Rotation3::new(Vector3::new(0.02, -0.3, 0.01)).into_inner(),
            translation: Vector3::new(-40.0, 1.0, 8.0),
            rms: 0.0,
        }
    }

    #[test]
    fn corresponding_points_satisfy_epipolar_constraint() {
        let calib = rig();
        let f = calib.fundamental().expect("invertible");
        let p1 = calib.projection_left();
        let p2 = calib.projection_right();
        for x in [Point3::new(5.0, -3.0, 200.0), Point3::new(-20.0, 10.0, 150.0)] {
            let xh = x.to_homogeneous();
            let a = p1 * xh;
            let b = p2 * xh;
            let a = a / a.z;
            let b = b / b.z;
            assert!((b.transpose() * f * a)[(0, 0)].abs() < 1e-9);
        }
    }

    #[test]
    fn projection_matrices_follow_rig_convention() {
        let calib = rig();
        let p1 = calib.projection_left();
        assert_relative_eq!(p1.fixed_view::<3, 3>(0, 0).into_owned(), calib.left.intrinsics.matrix());
        assert_eq!(Vector3::<f64>::zeros(), p1.column(3).into_owned());

        let p2 = calib.projection_right();
        assert_relative_eq!(
            p2.column(3).into_owned(),
            calib.right.intrinsics.matrix() * calib.translation,
            epsilon = 1e-9
        );
        assert_relative_eq!(calib.baseline(), calib.translation.norm());
    }

    #[test]
    fn pairing_keeps_only_two_sided_instants() {
        let obs = || Some(CornerObservation::new(vec![Point2::new(1.0, 2.0)]));
        let left = vec![obs(), None, obs(), obs(), None];
        let right = vec![obs(), obs(), None, obs(), None];
        let paired = pair_observations(&left, &right).expect("same length");

        assert_eq!(2, paired.left.len());
        assert_eq!(2, paired.right.len());
        assert_eq!(
            PairingStats {
                instants: 5,
                paired: 2,
                left_only: 1,
                right_only: 1,
                neither: 1
            },
            paired.stats
        );
        assert!(matches!(
            pair_observations(&left, &right[..3]),
            Err(CalibrationError::MismatchedObservations { left: 5, right: 3 })
        ));
    }

    #[test]
    fn acceptance_policy_flags_high_rms() {
        let mut calib = rig();
        calib.rms = 0.4;
        assert!(AcceptancePolicy::default().check(&calib).is_ok());
        calib.rms = 1.7;
        assert!(matches!(
            AcceptancePolicy::default().check(&calib),
            Err(CalibrationError::RmsAboveThreshold { .. })
        ));
    }
}
