use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Check whether two undirected directions are orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff_abs = angle_diff_abs(reference_angle, other_angle);
    (FRAC_PI_2 - diff_abs).abs() <= tolerance.abs()
}

/// Angle between an undirected axis and a directed vector angle, in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(PI - diff_abs)
}

/// Dominant grid axis from corner diagonal orientations, in `(-π/4, π/4]`.
///
/// Grid axes sit at ±45° from every corner diagonal, so all four axis
/// directions coincide once angles are multiplied by four.
pub fn dominant_grid_axis(orientations: impl Iterator<Item = f32>) -> Option<f32> {
    let (mut s, mut c, mut n) = (0.0f32, 0.0f32, 0usize);
    for theta in orientations {
        let a = 4.0 * (theta - FRAC_PI_4);
        s += a.sin();
        c += a.cos();
        n += 1;
    }
    if n == 0 || (s * s + c * c).sqrt() < 1e-6 * n as f32 {
        return None;
    }
    Some(0.25 * s.atan2(c))
}
