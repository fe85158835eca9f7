//! Epipolar rectification under the zero-disparity convention.
//!
//! The relative rotation is split evenly between the two cameras, the
//! baseline is then rotated onto the image x-axis (or y-axis for a
//! vertical rig). Both rectified cameras share one focal length and one
//! principal point, so a scene point lands on the same row in both images.

use crate::camera::Camera;
use crate::stereo::StereoCalibration;
use freethrow_core::{sample_bilinear_u8, GrayImage, GrayImageView, ImageSize};
use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point2, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("image size must be non-zero (got {width}x{height})")]
    EmptyImageSize { width: u32, height: u32 },
    #[error("baseline is zero, the views cannot be rectified")]
    ZeroBaseline,
    #[error("rectified geometry is singular")]
    Singular,
}

/// Visual QA knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Vertical distance between overlaid epipolar lines, pixels.
    pub line_spacing: usize,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self { line_spacing: 40 }
    }
}

/// Rectifying rotations, new projection matrices and the disparity-to-depth
/// matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct RectifyTransforms {
    pub image_size: ImageSize,
    pub r1: Matrix3<f64>,
    pub r2: Matrix3<f64>,
    pub p1: Matrix3x4<f64>,
    pub p2: Matrix3x4<f64>,
    pub q: Matrix4<f64>,
}

impl RectifyTransforms {
    fn camera_parts(&self, index: usize) -> (&Matrix3<f64>, &Matrix3x4<f64>) {
        if index == 0 {
            (&self.r1, &self.p1)
        } else {
            (&self.r2, &self.p2)
        }
    }
}

fn rotate_normalized(r: &Matrix3<f64>, n: Vector2<f64>) -> Option<Vector2<f64>> {
    let v = r * Vector3::new(n.x, n.y, 1.0);
    if v.z.abs() < 1e-12 {
        return None;
    }
    Some(Vector2::new(v.x / v.z, v.y / v.z))
}

/// Where a raw pixel of `camera` lands after rectification with `r`, `p`.
fn rectify_with(
    camera: &Camera,
    r: &Matrix3<f64>,
    p: &Matrix3x4<f64>,
    pixel: Point2<f64>,
) -> Option<Point2<f64>> {
    let n = rotate_normalized(r, camera.normalize_pixel(pixel))?;
    Some(Point2::new(
        p[(0, 0)] * n.x + p[(0, 2)],
        p[(1, 1)] * n.y + p[(1, 2)],
    ))
}

/// Bouguet rectification of a calibrated rig.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(calib)))]
pub fn stereo_rectify(
    calib: &StereoCalibration,
    image_size: ImageSize,
) -> Result<RectifyTransforms, RectifyError> {
    if image_size.is_empty() {
        return Err(RectifyError::EmptyImageSize {
            width: image_size.width,
            height: image_size.height,
        });
    }
    if calib.baseline() < 1e-12 {
        return Err(RectifyError::ZeroBaseline);
    }

    let om = Rotation3::from_matrix_unchecked(calib.rotation).scaled_axis();
    let r_half = Rotation3::new(-0.5 * om).into_inner();
    let t = r_half * calib.translation;

    // align the baseline with the dominant image axis
    let idx = if t.x.abs() > t.y.abs() { 0 } else { 1 };
    let c = t[idx];
    let mut uu = Vector3::zeros();
    uu[idx] = if c > 0.0 { 1.0 } else { -1.0 };
    let mut ww = t.cross(&uu);
    let nw = ww.norm();
    if nw > 0.0 {
        ww *= (c.abs() / t.norm()).clamp(-1.0, 1.0).acos() / nw;
    }
    let w_r = Rotation3::new(ww).into_inner();
    let r1 = w_r * r_half.transpose();
    let r2 = w_r * r_half;
    let t_rect = r2 * calib.translation;
    if t_rect[idx].abs() < 1e-12 {
        return Err(RectifyError::ZeroBaseline);
    }

    let (nx, ny) = (image_size.width as f64, image_size.height as f64);
    let cameras = [&calib.left, &calib.right];
    let rotations = [r1, r2];

    let mut fc = f64::INFINITY;
    for cam in cameras {
        let k = cam.intrinsics.matrix();
        let mut f = k[(idx ^ 1, idx ^ 1)];
        let k1 = cam.distortion.k1;
        if k1 < 0.0 {
            f *= 1.0 + k1 * (nx * nx + ny * ny) / (4.0 * f * f);
        }
        fc = fc.min(f);
    }
    if !fc.is_finite() || fc <= 0.0 {
        return Err(RectifyError::Singular);
    }

    // principal points that keep the image corners centred, then shared
    let corners = [
        Point2::new(0.0, 0.0),
        Point2::new(nx - 1.0, 0.0),
        Point2::new(0.0, ny - 1.0),
        Point2::new(nx - 1.0, ny - 1.0),
    ];
    let mut cc = Vector2::zeros();
    for (cam, r) in cameras.iter().zip(&rotations) {
        let mut mean = Vector2::zeros();
        for corner in corners {
            let n = rotate_normalized(r, cam.normalize_pixel(corner)).ok_or(RectifyError::Singular)?;
            mean += n * fc;
        }
        mean /= corners.len() as f64;
        cc += Vector2::new((nx - 1.0) / 2.0, (ny - 1.0) / 2.0) - mean;
    }
    cc /= 2.0;

    let mut p1 = Matrix3x4::zeros();
    p1[(0, 0)] = fc;
    p1[(1, 1)] = fc;
    p1[(0, 2)] = cc.x;
    p1[(1, 2)] = cc.y;
    p1[(2, 2)] = 1.0;
    let mut p2 = p1;
    p2[(idx, 3)] = t_rect[idx] * fc;

    let tx = t_rect[idx];
    #[rustfmt::skip]
    let q = Matrix4::new(
        1.0, 0.0, 0.0, -cc.x,
        0.0, 1.0, 0.0, -cc.y,
        0.0, 0.0, 0.0, fc,
        0.0, 0.0, -1.0 / tx, 0.0,
    );
    if q.iter().chain(p2.iter()).any(|v| !v.is_finite()) {
        return Err(RectifyError::Singular);
    }
    log::debug!(
        "rectify: f={:.2} c=({:.2}, {:.2}) baseline axis {}",
        fc,
        cc.x,
        cc.y,
        if idx == 0 { "x" } else { "y" }
    );

    Ok(RectifyTransforms {
        image_size,
        r1,
        r2,
        p1,
        p2,
        q,
    })
}

/// Map a raw pixel of the left (`0`) or right (`1`) camera into its
/// rectified image.
pub fn rectify_point(
    calib: &StereoCalibration,
    transforms: &RectifyTransforms,
    camera_index: usize,
    pixel: Point2<f64>,
) -> Option<Point2<f64>> {
    let camera = if camera_index == 0 {
        &calib.left
    } else {
        &calib.right
    };
    let (r, p) = transforms.camera_parts(camera_index);
    rectify_with(camera, r, p, pixel)
}

/// Per-pixel lookup: rectified pixel -> raw source pixel.
#[derive(Clone, Debug)]
pub struct RectifyMaps {
    pub width: usize,
    pub height: usize,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl RectifyMaps {
    /// Build the lookup for one camera with rectifying rotation `r` and
    /// rectified projection `p`.
    pub fn for_camera(
        camera: &Camera,
        r: &Matrix3<f64>,
        p: &Matrix3x4<f64>,
        size: ImageSize,
    ) -> Self {
        let (width, height) = (size.width as usize, size.height as usize);
        let (f, cx, cy) = (p[(0, 0)], p[(0, 2)], p[(1, 2)]);
        let r_inv = r.transpose();
        let mut map_x = Vec::with_capacity(width * height);
        let mut map_y = Vec::with_capacity(width * height);
        for v in 0..height {
            for u in 0..width {
                let n = Vector2::new((u as f64 - cx) / f, (v as f64 - cy) / f);
                let src = rotate_normalized(&r_inv, n)
                    .map(|n| camera.intrinsics.to_pixel(camera.distortion.distort(n)));
                let (sx, sy) = match src {
                    Some(s) => (s.x as f32, s.y as f32),
                    None => (-1.0, -1.0),
                };
                map_x.push(sx);
                map_y.push(sy);
            }
        }
        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    pub fn apply(&self, src: &GrayImageView<'_>) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for (i, (x, y)) in self.map_x.iter().zip(&self.map_y).enumerate() {
            out.data[i] = sample_bilinear_u8(src, *x, *y);
        }
        out
    }
}

/// Lookups for both cameras.
pub fn rectify_maps(
    calib: &StereoCalibration,
    transforms: &RectifyTransforms,
) -> (RectifyMaps, RectifyMaps) {
    let size = transforms.image_size;
    (
        RectifyMaps::for_camera(&calib.left, &transforms.r1, &transforms.p1, size),
        RectifyMaps::for_camera(&calib.right, &transforms.r2, &transforms.p2, size),
    )
}

/// Overlay white horizontal lines every `spacing` rows.
pub fn draw_epipolar_lines(img: &mut GrayImage, spacing: usize) {
    if spacing == 0 {
        return;
    }
    for y in (0..img.height).step_by(spacing) {
        for x in 0..img.width {
            img.put(x, y, 255);
        }
    }
}
