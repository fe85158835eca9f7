use crate::{PhaseError, PhaseParams};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Elbow and shoulder flexion of one throw, degrees per frame. `NaN` marks an
/// untracked frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AngleSeries {
    elbow: Vec<f64>,
    shoulder: Vec<f64>,
}

impl AngleSeries {
    pub fn new(elbow: Vec<f64>, shoulder: Vec<f64>) -> Result<Self, PhaseError> {
        if elbow.len() != shoulder.len() {
            return Err(PhaseError::LengthMismatch {
                elbow: elbow.len(),
                shoulder: shoulder.len(),
            });
        }
        Ok(Self { elbow, shoulder })
    }

    pub(crate) fn from_parts(elbow: Vec<f64>, shoulder: Vec<f64>) -> Self {
        debug_assert_eq!(elbow.len(), shoulder.len());
        Self { elbow, shoulder }
    }

    pub fn elbow(&self) -> &[f64] {
        &self.elbow
    }

    pub fn shoulder(&self) -> &[f64] {
        &self.shoulder
    }

    pub fn len(&self) -> usize {
        self.elbow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elbow.is_empty()
    }
}

/// Frame indices of the three throw phases.
///
/// Always `windup_start <= release_frame <= followthrough_end < frames`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAnnotation {
    pub windup_start: usize,
    pub release_frame: usize,
    pub followthrough_end: usize,
}

/// Absolute finite-difference velocity, `NaN` at frame 0 and wherever a
/// neighbouring sample is missing.
pub fn abs_velocity(angles: &[f64], fps: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(angles.len());
    if angles.is_empty() {
        return out;
    }
    out.push(f64::NAN);
    out.extend(angles.windows(2).map(|w| ((w[1] - w[0]) * fps).abs()));
    out
}

/// Per-frame mean of the available elbow and shoulder speeds.
pub fn arm_speed(series: &AngleSeries, fps: f64) -> Vec<f64> {
    let elbow = abs_velocity(series.elbow(), fps);
    let shoulder = abs_velocity(series.shoulder(), fps);
    elbow
        .iter()
        .zip(&shoulder)
        .map(|(&e, &s)| match (e.is_nan(), s.is_nan()) {
            (false, false) => 0.5 * (e + s),
            (false, true) => e,
            (true, false) => s,
            (true, true) => f64::NAN,
        })
        .collect()
}

/// First index of the smallest non-`NaN` value.
fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v < b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Segment one throw into wind-up, release and follow-through.
///
/// Release is the frame of minimum elbow flexion. Wind-up starts at the
/// first frame of the run of `sustained_window` samples above the speed
/// threshold that ends closest to release (the run may end on the release
/// frame itself). Only runs ending after the lookback start count; without
/// one the wind-up falls back to the start of the lookback.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(series), fields(frames = series.len()))
)]
pub fn segment_phases(
    series: &AngleSeries,
    params: &PhaseParams,
) -> Result<PhaseAnnotation, PhaseError> {
    params.validate()?;
    if series.is_empty() {
        return Err(PhaseError::EmptySeries);
    }
    let release_frame =
        argmin(series.elbow()).ok_or(PhaseError::AllMissing { signal: "elbow" })?;
    let last = series.len() - 1;

    let speed = arm_speed(series, params.fps);
    let start = release_frame.saturating_sub(params.frames(params.lookback_seconds));
    let window = params.sustained_window;

    // Walk back from release; the run closest to release wins.
    let run_start = (start + 1..=release_frame)
        .rev()
        .filter(|&i| i + 1 >= window)
        .find(|&i| {
            speed[i + 1 - window..=i]
                .iter()
                .all(|v| *v > params.velocity_threshold)
        })
        .map(|i| i + 1 - window);
    if run_start.is_none() {
        log::debug!(
            "no sustained arm speed above {} deg/s before frame {}, using lookback start {}",
            params.velocity_threshold,
            release_frame,
            start
        );
    }
    let windup_start = run_start.unwrap_or(start);

    let followthrough_end = (release_frame + params.frames(params.followthrough_seconds)).min(last);
    Ok(PhaseAnnotation {
        windup_start,
        release_frame,
        followthrough_end,
    })
}
