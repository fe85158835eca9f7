//! JSON persistence of a stereo calibration.
//!
//! Canonical keys are `K1`, `dist1`, `K2`, `dist2`, `R`, `T` plus the derived
//! `P1`, `P2`, `E`, `F`, `rms` and `image_size`. Files written by tools that
//! use `mtxL`/`distL`/`mtxR`/`distR` load as well; they are always written
//! back with the canonical names.

use crate::camera::{Camera, CameraIntrinsics, Distortion};
use crate::stereo::StereoCalibration;
use freethrow_core::ImageSize;
use nalgebra::{Matrix3, Matrix3x4, Vector3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("`{key}` must hold 4 or 5 distortion coefficients, found {len}")]
    InvalidDistortion { key: &'static str, len: usize },
    #[error("image size must be non-zero (got {width}x{height})")]
    EmptyImageSize { width: u32, height: u32 },
}

fn default_image_size() -> [u32; 2] {
    [640, 640]
}

type Rows3 = [[f64; 3]; 3];
type Rows3x4 = [[f64; 4]; 3];

fn rows3(m: &Matrix3<f64>) -> Rows3 {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

fn rows3x4(m: &Matrix3x4<f64>) -> Rows3x4 {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

fn matrix3(rows: &Rows3) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| rows[r][c])
}

/// On-disk layout of a stereo calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default = "default_image_size")]
    pub image_size: [u32; 2],
    #[serde(rename = "K1", alias = "mtxL")]
    pub k1: Rows3,
    #[serde(rename = "dist1", alias = "distL")]
    pub dist1: Vec<f64>,
    #[serde(rename = "K2", alias = "mtxR")]
    pub k2: Rows3,
    #[serde(rename = "dist2", alias = "distR")]
    pub dist2: Vec<f64>,
    #[serde(rename = "R")]
    pub r: Rows3,
    #[serde(rename = "T")]
    pub t: [f64; 3],
    #[serde(rename = "P1", default, skip_serializing_if = "Option::is_none")]
    pub p1: Option<Rows3x4>,
    #[serde(rename = "P2", default, skip_serializing_if = "Option::is_none")]
    pub p2: Option<Rows3x4>,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Rows3>,
    #[serde(rename = "F", default, skip_serializing_if = "Option::is_none")]
    pub f: Option<Rows3>,
    #[serde(default)]
    pub rms: f64,
}

impl CalibrationFile {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rebuild the calibration. Derived matrices in the file are ignored and
    /// recomputed from `K`, `R`, `T`.
    pub fn to_calibration(&self) -> Result<StereoCalibration, CalibrationIoError> {
        let [width, height] = self.image_size;
        let image_size = ImageSize::new(width, height);
        if image_size.is_empty() {
            return Err(CalibrationIoError::EmptyImageSize { width, height });
        }
        let dist = |key: &'static str, c: &[f64]| {
            Distortion::from_slice(c).ok_or(CalibrationIoError::InvalidDistortion {
                key,
                len: c.len(),
            })
        };
        Ok(StereoCalibration {
            image_size,
            left: Camera::new(
                CameraIntrinsics::from_matrix(&matrix3(&self.k1)),
                dist("dist1", &self.dist1)?,
            ),
            right: Camera::new(
                CameraIntrinsics::from_matrix(&matrix3(&self.k2)),
                dist("dist2", &self.dist2)?,
            ),
            rotation: matrix3(&self.r),
            translation: Vector3::from(self.t),
            rms: self.rms,
        })
    }
}

impl From<&StereoCalibration> for CalibrationFile {
    fn from(c: &StereoCalibration) -> Self {
        Self {
            image_size: [c.image_size.width, c.image_size.height],
            k1: rows3(&c.left.intrinsics.matrix()),
            dist1: c.left.distortion.to_array().to_vec(),
            k2: rows3(&c.right.intrinsics.matrix()),
            dist2: c.right.distortion.to_array().to_vec(),
            r: rows3(&c.rotation),
            t: [c.translation.x, c.translation.y, c.translation.z],
            p1: Some(rows3x4(&c.projection_left())),
            p2: Some(rows3x4(&c.projection_right())),
            e: Some(rows3(&c.essential())),
            f: c.fundamental().map(|f| rows3(&f)),
            rms: c.rms,
        }
    }
}

impl StereoCalibration {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        CalibrationFile::load_json(path)?.to_calibration()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        CalibrationFile::from(self).write_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "mtxL": [[600.0, 0.0, 320.0], [0.0, 601.0, 318.0], [0.0, 0.0, 1.0]],
        "distL": [-0.1, 0.02, 0.0, 0.0],
        "mtxR": [[605.0, 0.0, 322.0], [0.0, 604.0, 321.0], [0.0, 0.0, 1.0]],
        "distR": [-0.12, 0.03, 0.001, 0.0, 0.01],
        "R": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        "T": [-30.0, 0.5, 1.0]
    }"#;

    #[test]
    fn legacy_key_names_are_accepted() {
        let file: CalibrationFile = serde_json::from_str(LEGACY).expect("parse");
        let calib = file.to_calibration().expect("valid");
        assert_eq!(ImageSize::new(640, 640), calib.image_size);
        assert_eq!(601.0, calib.left.intrinsics.fy);
        assert_eq!(0.0, calib.left.distortion.k3);
        assert_eq!(0.01, calib.right.distortion.k3);
        assert_eq!(-30.0, calib.translation.x);
    }

    #[test]
    fn writes_canonical_keys_with_derived_matrices() {
        let file: CalibrationFile = serde_json::from_str(LEGACY).expect("parse");
        let calib = file.to_calibration().expect("valid");
        let json = serde_json::to_value(CalibrationFile::from(&calib)).expect("serialize");

        for key in ["K1", "dist1", "K2", "dist2", "R", "T", "P1", "P2", "E", "F", "rms"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("mtxL").is_none());
        assert_eq!(5, json["dist1"].as_array().map(Vec::len).unwrap_or(0));
    }

    #[test]
    fn rotation_entries_keep_every_bit() {
        let mut file: CalibrationFile = serde_json::from_str(LEGACY).expect("parse");
        file.r[0][2] = 0.17990707808051327;
        file.t[1] = 0.7299999999999999;
        let json = serde_json::to_string_pretty(&file).expect("serialize");
        let back: CalibrationFile = serde_json::from_str(&json).expect("parse");
        assert_eq!(file.r[0][2].to_bits(), back.r[0][2].to_bits());
        assert_eq!(file.t[1].to_bits(), back.t[1].to_bits());
    }

    #[test]
    fn rejects_bad_distortion_length() {
        let mut file: CalibrationFile = serde_json::from_str(LEGACY).expect("parse");
        file.dist2 = vec![0.1, 0.2];
        assert!(matches!(
            file.to_calibration(),
            Err(CalibrationIoError::InvalidDistortion { key: "dist2", len: 2 })
        ));
    }
}
