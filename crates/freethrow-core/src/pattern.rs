use crate::CoreError;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Planar checkerboard described by its *inner* corner grid.
///
/// Object points are laid out row-major: index `j * cols + i` is the corner
/// at column `i`, row `j`, located at `(i * square_size, j * square_size, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPattern {
    pub cols: usize,
    pub rows: usize,
    /// Edge length of one square, in the unit all metric outputs inherit.
    pub square_size: f64,
}

impl Default for CalibrationPattern {
    fn default() -> Self {
        Self {
            cols: 5,
            rows: 4,
            square_size: 2.5,
        }
    }
}

impl CalibrationPattern {
    pub fn new(cols: usize, rows: usize, square_size: f64) -> Result<Self, CoreError> {
        let pattern = Self {
            cols,
            rows,
            square_size,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cols < 2 || self.rows < 2 {
            return Err(CoreError::PatternTooSmall {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return Err(CoreError::InvalidSquareSize(self.square_size));
        }
        Ok(())
    }

    /// Number of inner corners.
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object_points(&self) -> Vec<Point3<f64>> {
        (0..self.rows)
            .flat_map(|j| {
                (0..self.cols).map(move |i| {
                    Point3::new(
                        i as f64 * self.square_size,
                        j as f64 * self.square_size,
                        0.0,
                    )
                })
            })
            .collect()
    }

    /// Object points projected onto the board plane.
    pub fn plane_points(&self) -> Vec<Point2<f64>> {
        self.object_points()
            .into_iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect()
    }
}

/// Sub-pixel corner positions of one detected pattern, in canonical row-major
/// order. "Not detected" is expressed by the absence of a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerObservation {
    pub corners: Vec<Point2<f64>>,
}

impl CornerObservation {
    pub fn new(corners: Vec<Point2<f64>>) -> Self {
        Self { corners }
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major_on_z0() {
        let pattern = CalibrationPattern::new(3, 2, 2.0).expect("pattern");
        let pts = pattern.object_points();
        assert_eq!(6, pts.len());
        assert_eq!(Point3::new(0.0, 0.0, 0.0), pts[0]);
        assert_eq!(Point3::new(4.0, 0.0, 0.0), pts[2]);
        assert_eq!(Point3::new(2.0, 2.0, 0.0), pts[4]);
        assert!(pts.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn rejects_degenerate_patterns() {
        assert!(matches!(
            CalibrationPattern::new(1, 4, 2.5),
            Err(CoreError::PatternTooSmall { cols: 1, rows: 4 })
        ));
        assert!(matches!(
            CalibrationPattern::new(5, 4, 0.0),
            Err(CoreError::InvalidSquareSize(_))
        ));
    }
}
