//! Core types and utilities for the free-throw stereo pipeline.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, image codec or file format.
//!
//! - [`Joint`] / [`JointMap`] / [`JointSeries`]: strongly typed per-joint
//!   samples for 2D keypoints and triangulated 3D points, with `None` as the
//!   only representation of a missing observation.
//! - [`CalibrationPattern`] / [`CornerObservation`]: planar checkerboard
//!   geometry shared by the detector and the calibrator.
//! - [`GrayImageView`] / [`GrayImage`]: minimal 8-bit grayscale buffers.
//! - [`Homography`]: normalized DLT estimation.

mod corner;
mod error;
mod homography;
mod image;
mod joint;
mod keypoint;
mod logger;
mod pattern;

pub use corner::Corner;
pub use error::CoreError;
pub use homography::{estimate_homography, Homography};
pub use image::{
    compose_side_by_side, sample_bilinear, sample_bilinear_u8, split_side_by_side, GrayImage,
    GrayImageView, ImageSize,
};
pub use joint::Joint;
pub use keypoint::{
    JointMap, JointSeries, Keypoint2, KeypointFrame, KeypointSeries, TriangulatedFrame,
    TriangulatedSeries,
};
pub use pattern::{CalibrationPattern, CornerObservation};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
