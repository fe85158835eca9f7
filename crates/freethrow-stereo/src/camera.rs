//! Pinhole camera with Brown–Conrady lens distortion.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Focal lengths and principal point, in pixels. Skew is always zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Reads `fx, fy, cx, cy` from a camera matrix; skew is ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    #[inline]
    pub fn to_pixel(&self, n: Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    #[inline]
    pub fn to_normalized(&self, p: Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite())
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }
}

/// Radial `k1, k2, k3` and tangential `p1, p2` coefficients, stored in the
/// conventional `[k1, k2, p1, p2, k3]` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Accepts 4 (no `k3`) or 5 coefficients.
    pub fn from_slice(c: &[f64]) -> Option<Self> {
        match c.len() {
            4 | 5 => Some(Self {
                k1: c[0],
                k2: c[1],
                p1: c[2],
                p2: c[3],
                k3: c.get(4).copied().unwrap_or(0.0),
            }),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|v| *v == 0.0)
    }

    /// Map ideal normalized coordinates to distorted normalized coordinates.
    #[inline]
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        Vector2::new(
            x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    /// Invert [`distort`](Self::distort) by fixed-point iteration.
    pub fn undistort(&self, d: Vector2<f64>) -> Vector2<f64> {
        if self.is_zero() {
            return d;
        }
        let mut n = d;
        for _ in 0..20 {
            let (x, y) = (n.x, n.y);
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            if radial.abs() < 1e-12 {
                break;
            }
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let next = Vector2::new((d.x - dx) / radial, (d.y - dy) / radial);
            let step = (next - n).norm_squared();
            n = next;
            if step < 1e-24 {
                break;
            }
        }
        n
    }
}

/// One calibrated camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
}

impl Camera {
    pub fn new(intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a point given in this camera's frame. `None` behind the camera.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 1e-12 {
            return None;
        }
        let n = Vector2::new(p.x / p.z, p.y / p.z);
        Some(self.intrinsics.to_pixel(self.distortion.distort(n)))
    }

    /// Project a world point seen through `pose` (world to camera).
    #[inline]
    pub fn project_posed(&self, pose: &Isometry3<f64>, p: &Point3<f64>) -> Option<Point2<f64>> {
        self.project(&(pose * p))
    }

    /// Ideal normalized coordinates of a raw pixel.
    pub fn normalize_pixel(&self, p: Point2<f64>) -> Vector2<f64> {
        self.distortion.undistort(self.intrinsics.to_normalized(p))
    }

    /// Remove lens distortion and re-project with the same camera matrix.
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        self.intrinsics.to_pixel(self.normalize_pixel(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        Camera::new(
            CameraIntrinsics::new(610.0, 605.0, 322.0, 318.0),
            Distortion {
                k1: -0.21,
                k2: 0.05,
                p1: 0.001,
                p2: -0.0007,
                k3: 0.0,
            },
        )
    }

    #[test]
    fn undistort_inverts_distort() {
        let cam = camera();
        for n in [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.3, -0.2),
            Vector2::new(-0.45, 0.4),
        ] {
            let back = cam.distortion.undistort(cam.distortion.distort(n));
            assert_relative_eq!(back, n, epsilon = 1e-9);
        }
    }

    #[test]
    fn undistorted_pixel_matches_pinhole_projection() {
        let cam = camera();
        let p = Point3::new(12.0, -7.5, 80.0);
        let raw = cam.project(&p).expect("in front");
        let ideal = cam.intrinsics.to_pixel(Vector2::new(p.x / p.z, p.y / p.z));
        assert_relative_eq!(cam.undistort_pixel(raw), ideal, epsilon = 1e-6);
    }

    #[test]
    fn points_behind_the_camera_do_not_project() {
        assert!(camera().project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn four_coefficient_vectors_leave_k3_zero() {
        let d = Distortion::from_slice(&[0.1, 0.01, 0.0, 0.0]).expect("4 coeffs");
        assert_eq!(0.0, d.k3);
        assert!(Distortion::from_slice(&[0.1]).is_none());
    }
}
