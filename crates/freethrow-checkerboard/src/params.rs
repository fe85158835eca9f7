use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Absolute lower bound on neighbor distance.
    pub min_spacing_pix: f32,
    /// Absolute upper bound on neighbor distance.
    pub max_spacing_pix: f32,
    /// Relative band around the median nearest-neighbor distance.
    pub spacing_tolerance: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 4.0,
            max_spacing_pix: 400.0,
            spacing_tolerance: 0.5,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Gradient-orthogonality refinement window and stop criteria.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half size of the search window; 5 gives an 11×11 window.
    pub half_window: usize,
    pub max_iterations: usize,
    /// Stop once a refinement step moves less than this many pixels.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 1e-3,
        }
    }
}

/// Parameters specific to the checkerboard detector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckerboardParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Largest accepted RMS deviation from a fitted homography, relative to
    /// the mean grid spacing.
    pub max_fit_residual_rel: f64,

    pub graph: GridGraphParams,
    pub subpix: SubPixParams,
}

impl Default for CheckerboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            max_fit_residual_rel: 0.15,
            graph: GridGraphParams::default(),
            subpix: SubPixParams::default(),
        }
    }
}
