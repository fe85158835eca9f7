use crate::core::CalibrationPattern;
use crate::error::PipelineError;
use freethrow_checkerboard::CheckerboardParams;
use freethrow_phases::PhaseParams;
use freethrow_stereo::{AcceptancePolicy, CalibrationOptions, RectifyParams};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Every tunable of the pipeline in one JSON document. Missing sections
/// take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pattern: CalibrationPattern,
    pub checkerboard: CheckerboardParams,
    pub calibration: CalibrationOptions,
    pub acceptance: AcceptancePolicy,
    pub phases: PhaseParams,
    pub rectify: RectifyParams,
}

impl PipelineConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{ "phases": { "fps": 60.0 }, "acceptance": { "max_rms_px": 0.5 } }"#,
        )
        .expect("parse");
        assert_eq!(60.0, cfg.phases.fps);
        assert_eq!(3, cfg.phases.sustained_window);
        assert_eq!(0.5, cfg.acceptance.max_rms_px);
        assert_eq!(CalibrationPattern::default(), cfg.pattern);
        assert_eq!(5, cfg.calibration.min_pairs);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pipeline.json");
        let mut cfg = PipelineConfig::default();
        cfg.pattern = CalibrationPattern::new(9, 6, 2.0).expect("pattern");
        cfg.rectify.line_spacing = 25;
        cfg.write_json(&path).expect("write");
        assert_eq!(cfg, PipelineConfig::load_json(&path).expect("load"));
    }
}
