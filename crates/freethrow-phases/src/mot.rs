//! Reader for OpenSim/OpenCap `.mot` joint-angle files.

use crate::{AngleSeries, MotError, PhaseAnnotation};
use std::{fs, path::Path};

pub const DEFAULT_ELBOW_COLUMN: &str = "elbow_flex_r";
pub const DEFAULT_SHOULDER_COLUMN: &str = "arm_flex_r";

/// Numeric table from a `.mot` file, one row per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct MotTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl MotTable {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, MotError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Everything before the first line starting with `time` is header text.
    pub fn parse(text: &str) -> Result<Self, MotError> {
        let mut lines = text.lines().enumerate();
        let columns: Vec<String> = lines
            .by_ref()
            .find(|(_, l)| l.trim_start().starts_with("time"))
            .map(|(_, l)| l.split_whitespace().map(str::to_owned).collect())
            .ok_or(MotError::MissingHeader)?;

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>().map_err(|_| MotError::Parse {
                        line: line_no,
                        token: tok.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if row.len() != columns.len() {
                return Err(MotError::RaggedRow {
                    line: line_no,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Result<usize, MotError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| MotError::MissingColumn(name.to_owned()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>, MotError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    pub fn row(&self, frame: usize) -> Option<&[f64]> {
        self.rows.get(frame).map(Vec::as_slice)
    }

    pub fn angle_series(&self, elbow: &str, shoulder: &str) -> Result<AngleSeries, MotError> {
        Ok(AngleSeries::new(self.column(elbow)?, self.column(shoulder)?)?)
    }

    /// Series from the right-arm columns OpenCap writes by default.
    pub fn default_angle_series(&self) -> Result<AngleSeries, MotError> {
        self.angle_series(DEFAULT_ELBOW_COLUMN, DEFAULT_SHOULDER_COLUMN)
    }
}

/// Every column's value at the release frame.
pub fn release_snapshot(table: &MotTable, phases: &PhaseAnnotation) -> Vec<(String, f64)> {
    table
        .row(phases.release_frame)
        .map(|row| table.columns.iter().cloned().zip(row.iter().copied()).collect())
        .unwrap_or_default()
}

/// Shot number embedded in a file name: its first run of ASCII digits.
pub fn shot_number(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Order file names by shot number; names without one go last, by name.
pub fn sort_by_shot_number<T: AsRef<str>>(names: &mut [T]) {
    names.sort_by(|a, b| {
        let key = |s: &str| (shot_number(s).unwrap_or(u64::MAX), s.to_owned());
        key(a.as_ref()).cmp(&key(b.as_ref()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Coordinates\nversion=1\nnRows=4\nnColumns=4\ninDegrees=yes\nendheader\n\
time\tpelvis_tilt\telbow_flex_r\tarm_flex_r\n\
0.000\t1.0\t120.5\t30.0\n\
0.033\t1.1\t100.0\t35.0\n\
0.067\t1.2\t80.25\t50.0\n\
\n\
0.100\t1.3\t95.0\t70.0\n";

    #[test]
    fn skips_free_text_header() {
        let t = MotTable::parse(SAMPLE).expect("parse");
        assert_eq!(vec!["time", "pelvis_tilt", "elbow_flex_r", "arm_flex_r"], t.columns());
        assert_eq!(4, t.len());
        assert_eq!(vec![120.5, 100.0, 80.25, 95.0], t.column("elbow_flex_r").expect("elbow"));
    }

    #[test]
    fn reports_schema_problems() {
        assert!(matches!(MotTable::parse("endheader\n1 2 3\n"), Err(MotError::MissingHeader)));
        assert!(matches!(
            MotTable::parse("time a\n0.0 x\n"),
            Err(MotError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            MotTable::parse("time a b\n0.0 1.0\n"),
            Err(MotError::RaggedRow { line: 2, expected: 3, found: 2 })
        ));
        let t = MotTable::parse(SAMPLE).expect("parse");
        assert!(matches!(t.column("knee_angle_r"), Err(MotError::MissingColumn(c)) if c == "knee_angle_r"));
    }

    #[test]
    fn snapshot_reads_the_release_row() {
        let t = MotTable::parse(SAMPLE).expect("parse");
        let phases = PhaseAnnotation {
            windup_start: 0,
            release_frame: 2,
            followthrough_end: 3,
        };
        let snap = release_snapshot(&t, &phases);
        assert_eq!(("elbow_flex_r".to_owned(), 80.25), snap[2]);
        assert_eq!(4, snap.len());
    }

    #[test]
    fn shots_sort_numerically() {
        let mut names = vec!["Freethrow10.mot", "notes.mot", "Freethrow2.mot", "Freethrow1.mot"];
        sort_by_shot_number(&mut names);
        assert_eq!(
            vec!["Freethrow1.mot", "Freethrow2.mot", "Freethrow10.mot", "notes.mot"],
            names
        );
        assert_eq!(Some(7), shot_number("shot_007_left.mot"));
    }
}
