//! Checkerboard detector for stereo calibration captures.
//!
//! ## Quickstart
//!
//! ```
//! use freethrow_checkerboard::{CheckerboardDetector, CheckerboardParams};
//! use freethrow_core::{CalibrationPattern, Corner, GrayImage};
//!
//! let detector = CheckerboardDetector::new(CalibrationPattern::default(), CheckerboardParams::default())
//!     .expect("valid pattern");
//!
//! let image = GrayImage::new(640, 640);
//! let corners: Vec<Corner> = Vec::new();
//! assert!(detector.detect(&image.view(), &corners).is_none());
//! ```
//!
//! Pipeline, starting from X-junction candidates of any corner detector:
//! 1. Drop weak candidates and estimate a base spacing from nearest-neighbor
//!    distances.
//! 2. Estimate the global grid axis from corner orientations.
//! 3. Link each corner to at most one neighbor per grid direction
//!    (distance ~ base spacing, orientations orthogonal, edge at ~45° to
//!    both orientations).
//! 4. BFS each connected component and assign integer `(i, j)` coordinates.
//! 5. Keep a component that fills exactly `cols × rows` (up to swap), bring it
//!    to canonical order and check it against a fitted homography.
//! 6. Refine every corner to sub-pixel accuracy on the image gradient.
//!
//! Not finding a board is an ordinary outcome and is reported as `None`.

mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use detector::{CheckerboardDetector, CheckerboardError};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{CheckerboardParams, GridGraphParams, SubPixParams};
pub use subpix::{corner_subpix, refine_corners};
