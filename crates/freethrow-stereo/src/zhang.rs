//! Closed-form initialisation for planar calibration (Zhang's method).

use crate::camera::CameraIntrinsics;
use freethrow_core::ImageSize;
use nalgebra::{DMatrix, Isometry3, Matrix3, Rotation3, SVector, Translation3, UnitQuaternion, Vector3};

/// The 6-vector `v_ij(H)` built from columns `i` and `j` of `H`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel conditioning: center on the image and scale to unit size.
fn conditioning(size: ImageSize) -> Matrix3<f64> {
    let (w, h) = (size.width as f64, size.height as f64);
    let s = 2.0 / (w + h).max(1.0);
    Matrix3::new(s, 0.0, -s * 0.5 * w, 0.0, s, -s * 0.5 * h, 0.0, 0.0, 1.0)
}

/// Zero-skew intrinsics from board-plane homographies (`pixel ~ H * [X, Y, 1]`).
///
/// Needs at least two homographies. Returns `None` when the views do not
/// constrain the image of the absolute conic (e.g. all boards parallel).
pub fn intrinsics_from_homographies(
    homographies: &[Matrix3<f64>],
    image_size: ImageSize,
) -> Option<CameraIntrinsics> {
    if homographies.len() < 2 {
        return None;
    }
    let n = conditioning(image_size);

    let m = homographies.len();
    let mut v = DMatrix::<f64>::zeros(2 * m + 1, 6);
    for (k, h) in homographies.iter().enumerate() {
        let hn = n * h;
        let hn = hn / hn.norm();
        v.row_mut(2 * k).copy_from(&v_ij(&hn, 0, 1).transpose());
        v.row_mut(2 * k + 1)
            .copy_from(&(v_ij(&hn, 0, 0) - v_ij(&hn, 1, 1)).transpose());
    }
    // zero skew: B12 = 0
    v[(2 * m, 1)] = 1.0;

    let svd = v.svd(false, true);
    let v_t = svd.v_t?;
    let b = v_t.row(svd.singular_values.imin()).transpose();
    let b = if b[0] < 0.0 { -b } else { b };
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() <= 1e-12 * (b11 * b11 + b22 * b22) || b11.abs() < 1e-300 {
        return None;
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return None;
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let u0 = -b13 * alpha * alpha / lambda;

    let k_cond = Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    let k = n.try_inverse()? * k_cond;
    let intr = CameraIntrinsics::from_matrix(&k);
    intr.is_valid().then_some(intr)
}

/// Closest rotation in the Frobenius sense.
pub fn project_to_so3(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        return Some(u_flipped * v_t);
    }
    Some(r)
}

/// Board-to-camera pose from a plane homography, with the board in front of
/// the camera.
pub fn pose_from_homography(k: &Matrix3<f64>, h: &Matrix3<f64>) -> Option<Isometry3<f64>> {
    let k_inv = k.try_inverse()?;
    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let norm = 0.5 * (a1.norm() + a2.norm());
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if a3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = a1 * lambda;
    let r2 = a2 * lambda;
    let r3 = r1.cross(&r2);
    let r = project_to_so3(&Matrix3::from_columns(&[r1, r2, r3]))?;
    let t: Vector3<f64> = a3 * lambda;

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Some(Isometry3::from_parts(Translation3::from(t), rot))
}
