//! Two-camera geometry for the free-throw capture rig.
//!
//! ## Quickstart
//!
//! ```no_run
//! use freethrow_core::{CalibrationPattern, CornerObservation, ImageSize};
//! use freethrow_stereo::{CalibrationOptions, StereoCalibrator, Triangulator};
//!
//! # fn observations() -> (Vec<CornerObservation>, Vec<CornerObservation>) { unimplemented!() }
//! let (left, right) = observations();
//! let calibrator = StereoCalibrator::new(
//!     CalibrationPattern::default(),
//!     ImageSize::new(640, 640),
//!     CalibrationOptions::default(),
//! )?;
//! let calib = calibrator.calibrate(&left, &right)?;
//! println!("rms {:.3} px, baseline {:.2}", calib.rms, calib.baseline());
//!
//! let triangulator = Triangulator::new(&calib);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! - [`calibrate_camera`]: Zhang initialisation plus Levenberg–Marquardt
//!   refinement of one camera.
//! - [`StereoCalibrator`]: both monocular solves, then the relative pose with
//!   intrinsics held fixed.
//! - [`stereo_rectify`] / [`RectifyMaps`]: row-aligned views for visual QA.
//! - [`Triangulator`]: DLT triangulation of keypoint sequences with missing
//!   samples carried through.
//! - [`CalibrationFile`]: JSON persistence.

mod camera;
mod error;
mod io;
mod lm;
mod mono;
mod rectify;
mod stereo;
mod triangulate;
mod zhang;

pub use camera::{Camera, CameraIntrinsics, Distortion};
pub use error::CalibrationError;
pub use io::{CalibrationFile, CalibrationIoError};
pub use lm::{solve, NllsProblem, SolveOptions, SolveReport};
pub use mono::{calibrate_camera, CalibrationOptions, MonoCalibration, MIN_VIEWS};
pub use rectify::{
    draw_epipolar_lines, rectify_maps, rectify_point, stereo_rectify, RectifyError, RectifyMaps,
    RectifyParams, RectifyTransforms,
};
pub use stereo::{
    pair_observations, AcceptancePolicy, PairedObservations, PairingStats, StereoCalibration,
    StereoCalibrator,
};
pub use triangulate::{
    triangulate_point, KeypointUnits, TriangulateError, TriangulationSummary, Triangulator,
};
pub use zhang::{intrinsics_from_homographies, pose_from_homography, project_to_so3};
