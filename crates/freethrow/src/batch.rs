//! Independent per-throw processing on the rayon pool.
//!
//! A failing input is recorded with its message and never stops the batch.

use crate::error::PipelineError;
use crate::tables::{read_point_table, PhaseRow};
use freethrow_phases::kinematics::{arm_flexion_series, Side};
use freethrow_phases::mot::sort_by_shot_number;
use freethrow_phases::{segment_phases, AngleSeries, MotTable, PhaseAnnotation, PhaseParams};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of a batch, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<(String, String)>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl BatchReport<PhaseAnnotation> {
    pub fn phase_rows(&self) -> Vec<PhaseRow> {
        self.succeeded
            .iter()
            .map(|(file, phases)| PhaseRow::new(file.as_str(), phases))
            .collect()
    }
}

fn input_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run `job` on every input in parallel and collect successes and failures.
pub fn run_batch<T, F>(inputs: &[PathBuf], job: F) -> BatchReport<T>
where
    T: Send,
    F: Fn(&Path) -> Result<T, PipelineError> + Sync,
{
    let results: Vec<(String, Result<T, PipelineError>)> = inputs
        .par_iter()
        .map(|path| (input_id(path), job(path)))
        .collect();

    let mut report = BatchReport::default();
    for (id, result) in results {
        match result {
            Ok(value) => report.succeeded.push((id, value)),
            Err(err) => {
                log::warn!("{id}: {err}");
                report.failed.push((id, err.to_string()));
            }
        }
    }
    log::info!(
        "batch finished: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

/// Elbow and shoulder flexion of one throw: `.mot` joint angles, or a 3D
/// keypoint `.csv` reduced to right-arm flexion.
pub fn load_angle_series(path: &Path) -> Result<AngleSeries, PipelineError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => {
            let points = read_point_table(path)?;
            Ok(arm_flexion_series(&points, Side::Right))
        }
        _ => Ok(MotTable::read(path)?.default_angle_series()?),
    }
}

pub fn phases_for_file(path: &Path, params: &PhaseParams) -> Result<PhaseAnnotation, PipelineError> {
    let series = load_angle_series(path)?;
    let phases = segment_phases(&series, params)?;
    log::debug!("{}: {phases:?}", path.display());
    Ok(phases)
}

/// `.mot` and `.csv` files of `dir`, ordered by shot number.
pub fn list_throw_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PipelineError> {
    let dir = dir.as_ref();
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file() && matches!(p.extension().and_then(|e| e.to_str()), Some("mot" | "csv"))
        })
        .map(|p| input_id(&p))
        .collect();
    if names.is_empty() {
        return Err(PipelineError::NoInputs {
            path: dir.to_path_buf(),
            pattern: "*.mot, *.csv".to_owned(),
        });
    }
    sort_by_shot_number(&mut names);
    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}

#[cfg_attr(feature = "tracing", instrument(level = "info", skip(dir, params)))]
pub fn phase_batch(
    dir: impl AsRef<Path>,
    params: &PhaseParams,
) -> Result<BatchReport<PhaseAnnotation>, PipelineError> {
    params.validate()?;
    let files = list_throw_files(dir)?;
    Ok(run_batch(&files, |path| phases_for_file(path, params)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_collected_in_order() {
        let inputs: Vec<PathBuf> = ["a1.mot", "b2.mot", "c3.mot", "d4.mot"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let report = run_batch(&inputs, |p| {
            let name = input_id(p);
            if name.starts_with('b') || name.starts_with('d') {
                Err(PipelineError::NoInputs {
                    path: p.to_path_buf(),
                    pattern: "x".into(),
                })
            } else {
                Ok(name.len())
            }
        });
        assert_eq!(4, report.total());
        assert_eq!(
            vec![("a1.mot".to_owned(), 6), ("c3.mot".to_owned(), 6)],
            report.succeeded
        );
        assert_eq!("b2.mot", report.failed[0].0);
        assert_eq!("d4.mot", report.failed[1].0);
    }

    #[test]
    fn throw_files_follow_shot_numbers() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["Freethrow10.mot", "Freethrow2.csv", "Freethrow1.mot", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"").expect("touch");
        }
        let files = list_throw_files(dir.path()).expect("list");
        let names: Vec<_> = files.iter().map(|p| input_id(p)).collect();
        assert_eq!(vec!["Freethrow1.mot", "Freethrow2.csv", "Freethrow10.mot"], names);
    }

    #[test]
    fn invalid_params_stop_before_any_work() {
        let dir = tempfile::tempdir().expect("tempdir");
        let params = PhaseParams {
            fps: 0.0,
            ..PhaseParams::default()
        };
        assert!(matches!(
            phase_batch(dir.path(), &params),
            Err(PipelineError::Phase(_))
        ));
    }
}
