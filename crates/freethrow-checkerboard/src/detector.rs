use crate::gridgraph::GridGraph;
use crate::params::CheckerboardParams;
use crate::subpix::refine_corners;
use freethrow_core::{
    estimate_homography, CalibrationPattern, Corner, CoreError, CornerObservation, GrayImageView,
};
use nalgebra::{Point2, Vector2};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Invalid detector configuration. A board that is simply not visible is
/// not an error; see [`CheckerboardDetector::detect`].
#[derive(thiserror::Error, Debug)]
pub enum CheckerboardError {
    #[error(transparent)]
    Pattern(#[from] CoreError),

    #[error("sub-pixel window must be at least 1 pixel (got half size {0})")]
    EmptyWindow(usize),
}

/// Finds a `cols × rows` inner-corner checkerboard among X-junction
/// candidates and returns its corners in canonical row-major order.
///
/// Canonical order: index `j * cols + i`, where `i` advances along the board
/// axis that points most to the image right (+x) and `j` completes a
/// right-handed frame with `i` in image coordinates (y down), so `j` points
/// toward the image bottom for an upright board. Both cameras of a stereo
/// pair therefore label a shared board view identically.
#[derive(Debug, Clone)]
pub struct CheckerboardDetector {
    pattern: CalibrationPattern,
    params: CheckerboardParams,
}

impl CheckerboardDetector {
    pub fn new(
        pattern: CalibrationPattern,
        params: CheckerboardParams,
    ) -> Result<Self, CheckerboardError> {
        pattern.validate()?;
        if params.subpix.half_window == 0 {
            return Err(CheckerboardError::EmptyWindow(0));
        }
        Ok(Self { pattern, params })
    }

    pub fn pattern(&self) -> &CalibrationPattern {
        &self.pattern
    }

    pub fn params(&self) -> &CheckerboardParams {
        &self.params
    }

    /// Assemble the grid and refine it on `image`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image, corners), fields(candidates = corners.len()))
    )]
    pub fn detect(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Corner],
    ) -> Option<CornerObservation> {
        let mut grid = self.assemble_grid(corners)?;
        refine_corners(image, &mut grid, &self.params.subpix);
        Some(CornerObservation::new(
            grid.iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect(),
        ))
    }

    /// Integer-accuracy grid in canonical order, without image refinement.
    pub fn assemble_grid(&self, corners: &[Corner]) -> Option<Vec<Point2<f32>>> {
        let strong: Vec<Corner> = corners
            .iter()
            .filter(|c| c.strength >= self.params.min_strength)
            .copied()
            .collect();
        if strong.len() < self.pattern.len() {
            log::debug!(
                "checkerboard: {} candidates, need {}",
                strong.len(),
                self.pattern.len()
            );
            return None;
        }

        let graph = GridGraph::new(&strong, &self.params.graph);
        let mut best: Option<(f64, Vec<Point2<f32>>)> = None;

        for component in graph.connected_components() {
            if component.len() != self.pattern.len() {
                continue;
            }
            let coords = graph.assign_grid_coordinates(&component);
            let Some(grid) = self.canonical_grid(&strong, &coords) else {
                continue;
            };
            let Some(residual) = self.fit_residual(&grid) else {
                continue;
            };
            log::debug!(
                "checkerboard: component of {} corners, relative fit residual {:.3}",
                component.len(),
                residual
            );
            if residual <= self.params.max_fit_residual_rel
                && best.as_ref().is_none_or(|(r, _)| residual < *r)
            {
                best = Some((residual, grid));
            }
        }

        best.map(|(_, grid)| grid)
    }

    /// Map BFS coordinates onto a full `cols × rows` box in canonical order.
    fn canonical_grid(
        &self,
        corners: &[Corner],
        coords: &[(usize, i32, i32)],
    ) -> Option<Vec<Point2<f32>>> {
        let min_i = coords.iter().map(|c| c.1).min()?;
        let min_j = coords.iter().map(|c| c.2).min()?;
        let w = (coords.iter().map(|c| c.1).max()? - min_i + 1) as usize;
        let h = (coords.iter().map(|c| c.2).max()? - min_j + 1) as usize;

        let mut cells: HashMap<(usize, usize), Point2<f32>> = HashMap::with_capacity(coords.len());
        for &(node, i, j) in coords {
            let key = ((i - min_i) as usize, (j - min_j) as usize);
            if cells.insert(key, corners[node].position).is_some() {
                return None;
            }
        }
        if cells.len() != w * h {
            return None;
        }

        let (cols, rows) = (self.pattern.cols, self.pattern.rows);
        let at = |i: usize, j: usize| cells.get(&(i, j)).copied();
        let axis_dir = |transposed: bool, along_i: bool| -> Option<Vector2<f32>> {
            let (w, h) = if transposed { (h, w) } else { (w, h) };
            let mut sum = Vector2::zeros();
            for j in 0..h {
                for i in 0..w {
                    let (ni, nj) = if along_i { (i + 1, j) } else { (i, j + 1) };
                    if ni >= w || nj >= h {
                        continue;
                    }
                    let (a, b) = if transposed {
                        (at(j, i)?, at(nj, ni)?)
                    } else {
                        (at(i, j)?, at(ni, nj)?)
                    };
                    sum += b - a;
                }
            }
            Some(sum)
        };

        let transposed = if (w, h) == (cols, rows) && (cols != rows) {
            false
        } else if (w, h) == (rows, cols) && (cols != rows) {
            true
        } else if (w, h) == (cols, rows) {
            // square board: the more horizontal axis becomes `i`
            let di = axis_dir(false, true)?;
            di.x.abs() < di.y.abs()
        } else {
            return None;
        };

        let di = axis_dir(transposed, true)?;
        let dj = axis_dir(transposed, false)?;
        let flip_i = di.x < 0.0;
        let di = if flip_i { -di } else { di };
        let flip_j = di.perp(&dj) < 0.0;

        let mut out = Vec::with_capacity(cols * rows);
        for j in 0..rows {
            for i in 0..cols {
                let ci = if flip_i { cols - 1 - i } else { i };
                let cj = if flip_j { rows - 1 - j } else { j };
                let p = if transposed { at(cj, ci)? } else { at(ci, cj)? };
                out.push(p);
            }
        }
        Some(out)
    }

    /// RMS deviation from the best homography, relative to mean spacing.
    fn fit_residual(&self, grid: &[Point2<f32>]) -> Option<f64> {
        let image: Vec<Point2<f64>> = grid
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        let cols = self.pattern.cols;
        let plane: Vec<Point2<f64>> = (0..grid.len())
            .map(|k| Point2::new((k % cols) as f64, (k / cols) as f64))
            .collect();

        let h = estimate_homography(&plane, &image)?;
        let spacing = image
            .iter()
            .enumerate()
            .filter(|(k, _)| k % cols + 1 < cols)
            .map(|(k, p)| (image[k + 1] - p).norm())
            .sum::<f64>()
            / (self.pattern.rows * (cols - 1)) as f64;
        if spacing <= f64::EPSILON {
            return None;
        }
        Some(h.rms_error(&plane, &image) / spacing)
    }
}
