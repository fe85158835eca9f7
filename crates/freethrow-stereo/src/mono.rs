//! Single-camera calibration: Zhang initialisation followed by a joint
//! reprojection-error refinement of intrinsics, distortion and board poses.

use crate::camera::{Camera, CameraIntrinsics, Distortion};
use crate::error::CalibrationError;
use crate::lm::{self, NllsProblem, SolveOptions};
use crate::zhang::{intrinsics_from_homographies, pose_from_homography};
use freethrow_core::{estimate_homography, ImageSize};
use nalgebra::{DMatrix, DVector, Isometry3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Minimum number of board views a single camera needs.
pub const MIN_VIEWS: usize = 3;

/// Knobs of the calibration solves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Keep `k3` at zero.
    pub fix_k3: bool,
    /// Keep `p1`, `p2` at zero.
    pub fix_tangential: bool,
    pub max_iterations: usize,
    /// Minimum number of paired views the stereo solve accepts.
    pub min_pairs: usize,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fix_k3: false,
            fix_tangential: false,
            max_iterations: 200,
            min_pairs: 5,
        }
    }
}

impl CalibrationOptions {
    pub(crate) fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            max_iters: self.max_iterations,
            ..SolveOptions::default()
        }
    }

    /// Indices into `[k1, k2, p1, p2, k3]` that are optimised.
    fn free_distortion(&self) -> Vec<usize> {
        let mut free = vec![0, 1];
        if !self.fix_tangential {
            free.extend([2, 3]);
        }
        if !self.fix_k3 {
            free.push(4);
        }
        free
    }
}

/// Result of calibrating one camera.
#[derive(Clone, Debug)]
pub struct MonoCalibration {
    pub camera: Camera,
    /// Board-to-camera pose per view.
    pub poses: Vec<Isometry3<f64>>,
    /// Reprojection RMS over all corners, pixels.
    pub rms: f64,
}

pub(crate) fn pose_params(pose: &Isometry3<f64>) -> [f64; 6] {
    let r = pose.rotation.scaled_axis();
    let t = pose.translation.vector;
    [r.x, r.y, r.z, t.x, t.y, t.z]
}

pub(crate) fn pose_from_params(p: &[f64]) -> Isometry3<f64> {
    Isometry3::new(
        Vector3::new(p[3], p[4], p[5]),
        Vector3::new(p[0], p[1], p[2]),
    )
}

/// Push the reprojection residuals of one view; NaN marks a point that
/// landed behind the camera.
pub(crate) fn push_view_residuals(
    out: &mut Vec<f64>,
    camera: &Camera,
    pose: &Isometry3<f64>,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
) {
    for (x, u) in object.iter().zip(image) {
        match camera.project_posed(pose, x) {
            Some(p) => {
                out.push(p.x - u.x);
                out.push(p.y - u.y);
            }
            None => {
                out.push(f64::NAN);
                out.push(f64::NAN);
            }
        }
    }
}

/// `sqrt(Σ|e|² / points)` for residuals laid out as `(dx, dy)` pairs.
pub(crate) fn rms_from_residuals(r: &DVector<f64>) -> f64 {
    let points = (r.len() / 2).max(1);
    (r.norm_squared() / points as f64).sqrt()
}

struct MonoProblem<'a> {
    object: &'a [Point3<f64>],
    views: &'a [Vec<Point2<f64>>],
    free_distortion: Vec<usize>,
}

impl MonoProblem<'_> {
    fn intrinsic_len(&self) -> usize {
        4 + self.free_distortion.len()
    }

    fn pack(&self, camera: &Camera, poses: &[Isometry3<f64>]) -> DVector<f64> {
        let k = &camera.intrinsics;
        let d = camera.distortion.to_array();
        let mut x = vec![k.fx, k.fy, k.cx, k.cy];
        x.extend(self.free_distortion.iter().map(|&i| d[i]));
        for pose in poses {
            x.extend(pose_params(pose));
        }
        DVector::from_vec(x)
    }

    fn camera(&self, x: &DVector<f64>) -> Camera {
        let mut d = [0.0; 5];
        for (slot, &i) in self.free_distortion.iter().enumerate() {
            d[i] = x[4 + slot];
        }
        Camera::new(
            CameraIntrinsics::new(x[0], x[1], x[2], x[3]),
            Distortion::from_slice(&d).unwrap_or_default(),
        )
    }

    fn pose(&self, x: &DVector<f64>, view: usize) -> Isometry3<f64> {
        let o = self.intrinsic_len() + 6 * view;
        pose_from_params(&x.as_slice()[o..o + 6])
    }
}

impl NllsProblem for MonoProblem<'_> {
    fn num_params(&self) -> usize {
        self.intrinsic_len() + 6 * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        2 * self.object.len() * self.views.len()
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let camera = self.camera(x);
        let mut out = Vec::with_capacity(self.num_residuals());
        for (v, image) in self.views.iter().enumerate() {
            push_view_residuals(&mut out, &camera, &self.pose(x, v), self.object, image);
        }
        DVector::from_vec(out)
    }

    /// A pose parameter only moves its own view's residuals.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let r0 = self.residuals(x);
        let mut j = DMatrix::zeros(r0.len(), x.len());
        let mut xp = x.clone();
        let ni = self.intrinsic_len();
        let rows_per_view = 2 * self.object.len();

        for c in 0..x.len() {
            let h = 1e-7 * x[c].abs().max(1e-2);
            xp[c] = x[c] + h;
            if c < ni {
                let r1 = self.residuals(&xp);
                j.column_mut(c).copy_from(&((r1 - &r0) / h));
            } else {
                let view = (c - ni) / 6;
                let camera = self.camera(&xp);
                let mut r1 = Vec::with_capacity(rows_per_view);
                push_view_residuals(
                    &mut r1,
                    &camera,
                    &self.pose(&xp, view),
                    self.object,
                    &self.views[view],
                );
                let base = view * rows_per_view;
                for (k, v) in r1.into_iter().enumerate() {
                    j[(base + k, c)] = (v - r0[base + k]) / h;
                }
            }
            xp[c] = x[c];
        }
        j
    }
}

/// Calibrate one camera from board views.
///
/// `views[v][k]` is the pixel position of `object[k]` in view `v`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(object, views, options), fields(views = views.len(), points = object.len()))
)]
pub fn calibrate_camera(
    object: &[Point3<f64>],
    views: &[Vec<Point2<f64>>],
    image_size: ImageSize,
    options: &CalibrationOptions,
) -> Result<MonoCalibration, CalibrationError> {
    calibrate_camera_named(object, views, image_size, options, "mono")
}

pub(crate) fn calibrate_camera_named(
    object: &[Point3<f64>],
    views: &[Vec<Point2<f64>>],
    image_size: ImageSize,
    options: &CalibrationOptions,
    camera_name: &'static str,
) -> Result<MonoCalibration, CalibrationError> {
    if image_size.is_empty() {
        return Err(CalibrationError::EmptyImageSize {
            width: image_size.width,
            height: image_size.height,
        });
    }
    if views.len() < MIN_VIEWS {
        return Err(CalibrationError::InsufficientViews {
            found: views.len(),
            required: MIN_VIEWS,
        });
    }
    for (view, image) in views.iter().enumerate() {
        if image.len() != object.len() {
            return Err(CalibrationError::CornerCountMismatch {
                view,
                expected: object.len(),
                got: image.len(),
            });
        }
    }

    let plane: Vec<Point2<f64>> = object.iter().map(|p| Point2::new(p.x, p.y)).collect();
    let homographies = views
        .iter()
        .enumerate()
        .map(|(view, image)| {
            estimate_homography(&plane, image)
                .map(|h| h.h)
                .ok_or(CalibrationError::DegenerateHomography { view })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let intrinsics = intrinsics_from_homographies(&homographies, image_size)
        .ok_or(CalibrationError::DegenerateIntrinsics {
            camera: camera_name,
        })?;
    let k = intrinsics.matrix();
    let poses = homographies
        .iter()
        .enumerate()
        .map(|(view, h)| {
            pose_from_homography(&k, h).ok_or(CalibrationError::DegenerateHomography { view })
        })
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!(
        "{} camera init: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        camera_name,
        intrinsics.fx,
        intrinsics.fy,
        intrinsics.cx,
        intrinsics.cy
    );

    let problem = MonoProblem {
        object,
        views,
        free_distortion: options.free_distortion(),
    };
    let x0 = problem.pack(&Camera::new(intrinsics, Distortion::default()), &poses);
    let (x, report) = lm::solve(&problem, x0, &options.solve_options());

    let rms = rms_from_residuals(&problem.residuals(&x));
    let camera = problem.camera(&x);
    if !rms.is_finite() || !camera.intrinsics.is_valid() {
        return Err(CalibrationError::NonFinite {
            stage: camera_name,
        });
    }
    if !report.converged {
        return Err(CalibrationError::NotConverged {
            stage: camera_name,
            rms,
        });
    }

    let poses = (0..views.len()).map(|v| problem.pose(&x, v)).collect();
    log::info!(
        "{} camera: rms {:.4} px after {} iterations (fx={:.2} fy={:.2} cx={:.2} cy={:.2})",
        camera_name,
        rms,
        report.iterations,
        camera.intrinsics.fx,
        camera.intrinsics.fy,
        camera.intrinsics.cx,
        camera.intrinsics.cy
    );

    Ok(MonoCalibration {
        camera,
        poses,
        rms,
    })
}
