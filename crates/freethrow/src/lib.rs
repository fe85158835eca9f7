//! Stereo free-throw motion capture.
//!
//! This crate provides:
//! - re-exports of the workspace crates (`core`, `checkerboard`, `stereo`,
//!   `phases`);
//! - (feature `image`) ChESS corner detection through `chess-corners`,
//!   side-by-side pair splitting and parallel board detection;
//! - CSV keypoint, 3D and phase tables, a JSON pipeline config and a
//!   parallel batch runner.
//!
//! ## Quickstart
//!
//! ```no_run
//! use freethrow::stereo::{StereoCalibration, Triangulator};
//! use freethrow::tables::{read_keypoint_table, write_point_table};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let calib = StereoCalibration::load_json("stereo_calib.json")?;
//! let left = read_keypoint_table("left.csv")?;
//! let right = read_keypoint_table("right.csv")?;
//! let (points, summary) = Triangulator::new(&calib).triangulate_series(&left, &right)?;
//! println!("{} of {} samples reconstructed", summary.reconstructed(), summary.samples);
//! write_point_table("points3d.csv", &points)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `freethrow::core`: joints, keypoint series, images, calibration pattern.
//! - `freethrow::checkerboard`: grid assembly and sub-pixel refinement.
//! - `freethrow::stereo`: calibration, rectification, triangulation, persistence.
//! - `freethrow::phases`: wind-up, release and follow-through segmentation.
//! - `freethrow::detect` (feature `image`): end-to-end helpers from `image::GrayImage`.

pub use freethrow_checkerboard as checkerboard;
pub use freethrow_core as core;
pub use freethrow_phases as phases;
pub use freethrow_stereo as stereo;

pub use freethrow_checkerboard::{CheckerboardDetector, CheckerboardParams};
pub use freethrow_core::{
    CalibrationPattern, CornerObservation, Joint, KeypointSeries, TriangulatedSeries,
};
pub use freethrow_phases::{segment_phases, PhaseAnnotation, PhaseParams};
pub use freethrow_stereo::{StereoCalibration, StereoCalibrator, Triangulator};

pub mod batch;
pub mod config;
mod error;
pub mod pipeline;
pub mod tables;

#[cfg(feature = "image")]
pub mod detect;

pub use batch::BatchReport;
pub use config::PipelineConfig;
pub use error::PipelineError;
