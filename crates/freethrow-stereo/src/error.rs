use freethrow_core::CoreError;

/// Errors surfaced by monocular and stereo calibration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("found only {found} valid observation pairs, need at least {required}")]
    InsufficientPairs { found: usize, required: usize },

    #[error("only {found} views for monocular calibration, need at least {required}")]
    InsufficientViews { found: usize, required: usize },

    #[error("left and right observation lists differ in length ({left} vs {right})")]
    MismatchedObservations { left: usize, right: usize },

    #[error("view {view}: expected {expected} corners, got {got}")]
    CornerCountMismatch {
        view: usize,
        expected: usize,
        got: usize,
    },

    #[error("view {view}: no board homography could be fitted")]
    DegenerateHomography { view: usize },

    #[error("{camera} camera: the views do not constrain the intrinsics")]
    DegenerateIntrinsics { camera: &'static str },

    #[error("{stage}: refinement did not converge (rms {rms:.4} px)")]
    NotConverged { stage: &'static str, rms: f64 },

    #[error("{stage}: numerical failure, non-finite result")]
    NonFinite { stage: &'static str },

    #[error("image size must be non-zero (got {width}x{height})")]
    EmptyImageSize { width: u32, height: u32 },

    #[error("reprojection RMS {rms:.4} px exceeds the accepted {max:.4} px")]
    RmsAboveThreshold { rms: f64, max: f64 },

    #[error(transparent)]
    Pattern(#[from] CoreError),
}
