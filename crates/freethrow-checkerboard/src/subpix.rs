//! Sub-pixel corner refinement.
//!
//! At a true X-junction every image gradient inside a small window is
//! orthogonal to the vector from the junction to the gradient's pixel. The
//! refined position solves that condition in the least-squares sense,
//! Gaussian-weighted toward the window center, and is iterated until the
//! update drops below `epsilon`.

use crate::params::SubPixParams;
use freethrow_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;

/// Refine a single corner estimate. Returns the input unchanged when the
/// window carries no usable gradient structure or the estimate drifts
/// farther than one window from where it started.
pub fn corner_subpix(
    image: &GrayImageView<'_>,
    initial: Point2<f32>,
    params: &SubPixParams,
) -> Point2<f32> {
    let hw = params.half_window as i32;
    if hw == 0 {
        return initial;
    }
    let hwf = hw as f32;

    let mask: Vec<f32> = (-hw..=hw)
        .flat_map(|dy| {
            (-hw..=hw).map(move |dx| {
                let (x, y) = (dx as f32 / hwf, dy as f32 / hwf);
                (-(x * x + y * y)).exp()
            })
        })
        .collect();

    let eps2 = params.epsilon * params.epsilon;
    let (w, h) = (image.width as f32, image.height as f32);
    let mut c = initial;

    for _ in 0..params.max_iterations {
        let (mut a, mut b, mut cc, mut bb1, mut bb2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
        let mut k = 0;
        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let x = c.x + dx as f32;
                let y = c.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(image, x + 1.0, y) - sample_bilinear(image, x - 1.0, y));
                let gy = 0.5 * (sample_bilinear(image, x, y + 1.0) - sample_bilinear(image, x, y - 1.0));
                let m = mask[k] as f64;
                k += 1;

                let (gx, gy) = (gx as f64, gy as f64);
                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;
                let (px, py) = (dx as f64, dy as f64);

                a += gxx;
                b += gxy;
                cc += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * cc - b * b;
        if det.abs() <= f64::EPSILON * f64::EPSILON || !det.is_finite() {
            break;
        }
        let scale = 1.0 / det;
        let next = Point2::new(
            c.x + (scale * (cc * bb1 - b * bb2)) as f32,
            c.y + (scale * (a * bb2 - b * bb1)) as f32,
        );
        let step2 = (next - c).norm_squared();
        c = next;
        if c.x < 0.0 || c.y < 0.0 || c.x >= w || c.y >= h {
            break;
        }
        if step2 <= eps2 {
            break;
        }
    }

    let drift = c - initial;
    if !(c.x.is_finite() && c.y.is_finite()) || drift.x.abs() > hwf || drift.y.abs() > hwf {
        return initial;
    }
    c
}

/// Refine every corner in place.
pub fn refine_corners(image: &GrayImageView<'_>, corners: &mut [Point2<f32>], params: &SubPixParams) {
    for p in corners.iter_mut() {
        *p = corner_subpix(image, *p, params);
    }
}
