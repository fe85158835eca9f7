use crate::PhaseError;
use serde::{Deserialize, Serialize};

/// Phase segmentation settings.
///
/// `velocity_threshold` is in degrees per second, durations in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseParams {
    pub fps: f64,
    pub velocity_threshold: f64,
    /// Consecutive samples the arm speed must stay above the threshold.
    pub sustained_window: usize,
    pub lookback_seconds: f64,
    pub followthrough_seconds: f64,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            fps: 30.0,
            velocity_threshold: 10.0,
            sustained_window: 3,
            lookback_seconds: 1.0,
            followthrough_seconds: 0.3,
        }
    }
}

impl PhaseParams {
    pub fn validate(&self) -> Result<(), PhaseError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(PhaseError::InvalidParams(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if self.sustained_window == 0 {
            return Err(PhaseError::InvalidParams(
                "sustained_window must be at least 1".into(),
            ));
        }
        for (name, v) in [
            ("velocity_threshold", self.velocity_threshold),
            ("lookback_seconds", self.lookback_seconds),
            ("followthrough_seconds", self.followthrough_seconds),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(PhaseError::InvalidParams(format!(
                    "{name} must be finite and non-negative, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Frames covered by `seconds` at this frame rate.
    pub fn frames(&self, seconds: f64) -> usize {
        (seconds * self.fps).round() as usize
    }
}
