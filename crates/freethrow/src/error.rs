use crate::tables::TableError;
use freethrow_checkerboard::CheckerboardError;
use freethrow_core::ImageSize;
use freethrow_phases::{MotError, PhaseError};
use freethrow_stereo::{CalibrationError, CalibrationIoError, RectifyError, TriangulateError};
use std::path::PathBuf;

/// Any failure of an end-to-end pipeline stage.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error(transparent)]
    Checkerboard(#[from] CheckerboardError),
    #[error("calibration: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("calibration file: {0}")]
    CalibrationIo(#[from] CalibrationIoError),
    #[error("rectification: {0}")]
    Rectify(#[from] RectifyError),
    #[error("triangulation: {0}")]
    Triangulate(#[from] TriangulateError),
    #[error("phases: {0}")]
    Phase(#[from] PhaseError),
    #[error(".mot file: {0}")]
    Mot(#[from] MotError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("{path}: image halves are {found:?}, earlier pairs were {expected:?}")]
    ImageSizeMismatch {
        path: PathBuf,
        expected: ImageSize,
        found: ImageSize,
    },
    #[error("rectified halves differ in height: left {left}, right {right}")]
    HalfHeightMismatch { left: usize, right: usize },
    #[error("{path}: no input files matching `{pattern}`")]
    NoInputs { path: PathBuf, pattern: String },
}
