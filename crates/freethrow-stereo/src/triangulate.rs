//! Two-view linear triangulation of keypoint sequences.

use crate::camera::Camera;
use crate::stereo::StereoCalibration;
use freethrow_core::{
    CoreError, ImageSize, Joint, JointMap, Keypoint2, KeypointSeries, TriangulatedSeries,
};
use nalgebra::{Matrix3x4, Matrix4, Point2, Point3, RowVector4};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TriangulateError {
    #[error("left and right sequences differ in length ({left} vs {right} frames)")]
    FrameCountMismatch { left: usize, right: usize },
    #[error("joint sets differ: missing on the left {missing_left:?}, missing on the right {missing_right:?}")]
    JointSetMismatch {
        missing_left: Vec<Joint>,
        missing_right: Vec<Joint>,
    },
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// How keypoint coordinates are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointUnits {
    /// `[0, 1]` fractions of the calibration image size.
    #[default]
    Normalized,
    Pixels,
}

/// Counts gathered while triangulating a sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TriangulationSummary {
    pub frames: usize,
    /// Declared (frame, joint) slots.
    pub samples: usize,
    /// Slots where at least one view had no observation.
    pub missing_input: usize,
    /// Slots where both views were present but the rays gave no finite point.
    pub degenerate: usize,
}

impl TriangulationSummary {
    pub fn reconstructed(&self) -> usize {
        self.samples - self.missing_input - self.degenerate
    }
}

/// Linear (DLT) triangulation of one correspondence.
///
/// `a` and `b` must already be distortion free and expressed in the pixel
/// frame of `p1` and `p2`. Returns `None` when the homogeneous scale of the
/// solution vanishes (rays parallel, point at infinity) or the result is not
/// finite.
pub fn triangulate_point(
    p1: &Matrix3x4<f64>,
    p2: &Matrix3x4<f64>,
    a: Point2<f64>,
    b: Point2<f64>,
) -> Option<Point3<f64>> {
    let rows: [RowVector4<f64>; 4] = [
        p1.row(2) * a.x - p1.row(0),
        p1.row(2) * a.y - p1.row(1),
        p2.row(2) * b.x - p2.row(0),
        p2.row(2) * b.y - p2.row(1),
    ];
    let m = Matrix4::from_rows(&rows);
    let svd = m.svd(false, true);
    let v_t = svd.v_t?;
    let x = v_t.row(svd.singular_values.imin());

    let w = x[3];
    if w.abs() < 1e-10 {
        return None;
    }
    let p = Point3::new(x[0] / w, x[1] / w, x[2] / w);
    p.coords.iter().all(|v| v.is_finite()).then_some(p)
}

/// Triangulates keypoints of a calibrated rig into the left-camera frame.
#[derive(Clone, Debug)]
pub struct Triangulator {
    left: Camera,
    right: Camera,
    p1: Matrix3x4<f64>,
    p2: Matrix3x4<f64>,
    image_size: ImageSize,
    units: KeypointUnits,
}

impl Triangulator {
    pub fn new(calib: &StereoCalibration) -> Self {
        Self {
            left: calib.left,
            right: calib.right,
            p1: calib.projection_left(),
            p2: calib.projection_right(),
            image_size: calib.image_size,
            units: KeypointUnits::default(),
        }
    }

    pub fn with_units(mut self, units: KeypointUnits) -> Self {
        self.units = units;
        self
    }

    pub fn units(&self) -> KeypointUnits {
        self.units
    }

    pub fn projection_matrices(&self) -> (&Matrix3x4<f64>, &Matrix3x4<f64>) {
        (&self.p1, &self.p2)
    }

    fn to_pixel(&self, k: &Keypoint2) -> Option<Point2<f64>> {
        if !(k.x.is_finite() && k.y.is_finite()) {
            return None;
        }
        Some(match self.units {
            KeypointUnits::Pixels => Point2::new(k.x, k.y),
            KeypointUnits::Normalized => Point2::new(
                k.x * self.image_size.width as f64,
                k.y * self.image_size.height as f64,
            ),
        })
    }

    /// Undistort two raw pixels and triangulate them.
    pub fn triangulate_pixels(&self, a: Point2<f64>, b: Point2<f64>) -> Option<Point3<f64>> {
        triangulate_point(
            &self.p1,
            &self.p2,
            self.left.undistort_pixel(a),
            self.right.undistort_pixel(b),
        )
    }

    /// Triangulate every declared joint of every frame.
    ///
    /// A sample missing on either side stays missing. Both sequences must have
    /// the same length and declare the same joints.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, left, right), fields(frames = left.len()))
    )]
    pub fn triangulate_series(
        &self,
        left: &KeypointSeries,
        right: &KeypointSeries,
    ) -> Result<(TriangulatedSeries, TriangulationSummary), TriangulateError> {
        if left.len() != right.len() {
            return Err(TriangulateError::FrameCountMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let missing_left: Vec<Joint> = right
            .joints()
            .iter()
            .copied()
            .filter(|j| !left.declares(*j))
            .collect();
        let missing_right: Vec<Joint> = left
            .joints()
            .iter()
            .copied()
            .filter(|j| !right.declares(*j))
            .collect();
        if !missing_left.is_empty() || !missing_right.is_empty() {
            return Err(TriangulateError::JointSetMismatch {
                missing_left,
                missing_right,
            });
        }

        let joints = left.joints().to_vec();
        let mut out = TriangulatedSeries::new(joints.clone())?;
        let mut summary = TriangulationSummary {
            frames: left.len(),
            ..TriangulationSummary::default()
        };

        for (lf, rf) in left.frames().iter().zip(right.frames()) {
            let mut frame = JointMap::new();
            for &joint in &joints {
                summary.samples += 1;
                let pair = lf
                    .get(joint)
                    .and_then(|k| self.to_pixel(k))
                    .zip(rf.get(joint).and_then(|k| self.to_pixel(k)));
                let Some((a, b)) = pair else {
                    summary.missing_input += 1;
                    continue;
                };
                match self.triangulate_pixels(a, b) {
                    Some(p) => frame.insert(joint, p),
                    None => summary.degenerate += 1,
                }
            }
            out.push(frame);
        }

        log::info!(
            "triangulated {} frames: {}/{} samples, {} missing input, {} degenerate",
            summary.frames,
            summary.reconstructed(),
            summary.samples,
            summary.missing_input,
            summary.degenerate
        );
        Ok((out, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraIntrinsics, Distortion};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    fn parallel_rig() -> StereoCalibration {
        let cam = Camera::new(CameraIntrinsics::new(600.0, 600.0, 320.0, 320.0), Distortion::default());
        StereoCalibration {
            image_size: ImageSize::new(640, 640),
            left: cam,
            right: cam,
            rotation: Matrix3::identity(),
            translation: Vector3::new(-30.0, 0.0, 0.0),
            rms: 0.0,
        }
    }

    #[test]
    fn recovers_point_from_exact_projections() {
        let calib = parallel_rig();
        let (p1, p2) = (calib.projection_left(), calib.projection_right());
        let x = Point3::new(4.0, -7.0, 220.0);
        let a = (p1 * x.to_homogeneous()).xyz();
        let b = (p2 * x.to_homogeneous()).xyz();
        let a = Point2::new(a.x / a.z, a.y / a.z);
        let b = Point2::new(b.x / b.z, b.y / b.z);

        let est = triangulate_point(&p1, &p2, a, b).expect("finite");
        assert_relative_eq!(est, x, max_relative = 1e-6);
    }

    #[test]
    fn identical_pixels_in_a_parallel_rig_are_at_infinity() {
        let calib = parallel_rig();
        let p = Point2::new(400.0, 300.0);
        assert!(triangulate_point(&calib.projection_left(), &calib.projection_right(), p, p).is_none());
    }

    #[test]
    fn normalized_units_scale_by_image_size() {
        let tri = Triangulator::new(&parallel_rig());
        assert_eq!(KeypointUnits::Normalized, tri.units());
        assert_eq!(
            Some(Point2::new(320.0, 160.0)),
            tri.to_pixel(&Keypoint2::new(0.5, 0.25, 1.0))
        );
        let tri = tri.with_units(KeypointUnits::Pixels);
        assert_eq!(
            Some(Point2::new(0.5, 0.25)),
            tri.to_pixel(&Keypoint2::new(0.5, 0.25, 1.0))
        );
        assert_eq!(None, tri.to_pixel(&Keypoint2::new(f64::NAN, 0.0, 1.0)));
    }

    #[test]
    fn rejects_misaligned_sequences() {
        let tri = Triangulator::new(&parallel_rig());
        let mut left = KeypointSeries::new(vec![Joint::RightElbow, Joint::RightWrist]).expect("joints");
        let right = KeypointSeries::new(vec![Joint::RightElbow, Joint::RightShoulder]).expect("joints");
        assert_eq!(
            Err(TriangulateError::JointSetMismatch {
                missing_left: vec![Joint::RightShoulder],
                missing_right: vec![Joint::RightWrist],
            }),
            tri.triangulate_series(&left, &right).map(|_| ())
        );

        left.push(JointMap::new());
        let right = KeypointSeries::new(vec![Joint::RightElbow, Joint::RightWrist]).expect("joints");
        assert_eq!(
            Err(TriangulateError::FrameCountMismatch { left: 1, right: 0 }),
            tri.triangulate_series(&left, &right).map(|_| ())
        );
    }
}
