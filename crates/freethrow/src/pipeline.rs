//! End-to-end stages used by the `freethrow` binary.

use crate::error::PipelineError;
use crate::tables::{read_keypoint_table, write_point_table};
use freethrow_stereo::{KeypointUnits, StereoCalibration, TriangulationSummary, Triangulator};
use std::path::Path;

#[cfg(feature = "image")]
use crate::config::PipelineConfig;
#[cfg(feature = "image")]
use crate::detect::{
    default_chess_config, detect_pairs, from_core_image, gray_view, list_pair_images, split_pair,
};
#[cfg(feature = "image")]
use freethrow_checkerboard::CheckerboardDetector;
#[cfg(feature = "image")]
use freethrow_stereo::{
    draw_epipolar_lines, pair_observations, rectify_maps, stereo_rectify, PairingStats,
    StereoCalibrator,
};

/// Result of calibrating from a directory of side-by-side captures.
#[cfg(feature = "image")]
#[derive(Clone, Debug)]
pub struct CalibrationRun {
    pub calibration: StereoCalibration,
    pub stats: PairingStats,
}

/// Detect, pair and calibrate. Acceptance is left to the caller.
#[cfg(feature = "image")]
pub fn calibrate_directory(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<CalibrationRun, PipelineError> {
    let paths = list_pair_images(dir)?;
    let detector = CheckerboardDetector::new(config.pattern, config.checkerboard.clone())?;
    let detections = detect_pairs(&paths, &default_chess_config(), &detector)?;
    let paired = pair_observations(&detections.left, &detections.right)?;
    log::info!(
        "{} pairs: {} usable, {} left only, {} right only, {} neither",
        paired.stats.instants,
        paired.stats.paired,
        paired.stats.left_only,
        paired.stats.right_only,
        paired.stats.neither
    );

    let calibrator = StereoCalibrator::new(
        config.pattern,
        detections.image_size,
        config.calibration.clone(),
    )?;
    let calibration = calibrator.calibrate(&paired.left, &paired.right)?;
    Ok(CalibrationRun {
        calibration,
        stats: paired.stats,
    })
}

/// Rectified side-by-side frame with epipolar lines every `line_spacing` rows.
#[cfg(feature = "image")]
pub fn rectify_side_by_side(
    calib: &StereoCalibration,
    pair: &::image::GrayImage,
    line_spacing: usize,
) -> Result<::image::GrayImage, PipelineError> {
    let (left, right) = split_pair(pair);
    let transforms = stereo_rectify(calib, calib.image_size)?;
    let (map_left, map_right) = rectify_maps(calib, &transforms);
    let left = map_left.apply(&gray_view(&left));
    let right = map_right.apply(&gray_view(&right));
    let mut joined = join_halves(&left, &right)?;
    draw_epipolar_lines(&mut joined, line_spacing);
    Ok(from_core_image(&joined))
}

#[cfg(feature = "image")]
fn join_halves(
    left: &crate::core::GrayImage,
    right: &crate::core::GrayImage,
) -> Result<crate::core::GrayImage, PipelineError> {
    crate::core::compose_side_by_side(&left.view(), &right.view()).ok_or(
        PipelineError::HalfHeightMismatch {
            left: left.height,
            right: right.height,
        },
    )
}

/// Triangulate two keypoint tables into a 3D table.
pub fn triangulate_tables(
    calib: &StereoCalibration,
    units: KeypointUnits,
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
    out: impl AsRef<Path>,
) -> Result<TriangulationSummary, PipelineError> {
    let left = read_keypoint_table(left)?;
    let right = read_keypoint_table(right)?;
    let (points, summary) = Triangulator::new(calib)
        .with_units(units)
        .triangulate_series(&left, &right)?;
    write_point_table(out, &points)?;
    Ok(summary)
}
