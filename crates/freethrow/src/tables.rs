//! CSV tables exchanged with the pose-estimation and analysis tools.
//!
//! - keypoint table: `frame`, then `{joint}_x, {joint}_y, {joint}_v` (or
//!   `{joint}_score`) per joint;
//! - 3D table: `frame`, then `{joint}_x, {joint}_y, {joint}_z` per joint;
//! - phase table: `file, windup_start, release_frame, followthrough_end`.
//!
//! Missing samples are written as `-1,-1,-1` and read back as missing.

use freethrow_core::{
    CoreError, Joint, JointMap, Keypoint2, KeypointSeries, TriangulatedSeries,
};
use freethrow_phases::PhaseAnnotation;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const MISSING: f64 = -1.0;

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("first column must be `frame`")]
    MissingFrameColumn,
    #[error("column `{column}` does not name a known joint")]
    UnknownJoint { column: String },
    #[error("column `{column}` has an unexpected suffix")]
    UnknownSuffix { column: String },
    #[error("joint `{joint}` lacks its `{suffix}` column")]
    IncompleteJoint { joint: &'static str, suffix: &'static str },
    #[error("column `{column}` appears twice")]
    DuplicateColumn { column: String },
    #[error("row {row}, column `{column}`: `{value}` is not a number")]
    Value {
        row: usize,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Joint columns of one table layout, each slot listing accepted suffixes.
struct Layout<const N: usize> {
    suffixes: [&'static [&'static str]; N],
}

const KEYPOINT_LAYOUT: Layout<3> = Layout {
    suffixes: [&["_x"], &["_y"], &["_v", "_score"]],
};

const POINT_LAYOUT: Layout<3> = Layout {
    suffixes: [&["_x"], &["_y"], &["_z"]],
};

impl<const N: usize> Layout<N> {
    fn split<'a>(&self, column: &'a str) -> Option<(&'a str, usize)> {
        self.suffixes.iter().enumerate().find_map(|(slot, names)| {
            names
                .iter()
                .find_map(|s| column.strip_suffix(s))
                .map(|prefix| (prefix, slot))
        })
    }

    /// Column indices per declared joint, in table order.
    fn parse_header(&self, headers: &csv::StringRecord) -> Result<Vec<(Joint, [usize; N])>, TableError> {
        if headers.get(0).map(str::trim) != Some("frame") {
            return Err(TableError::MissingFrameColumn);
        }
        let mut joints: Vec<(Joint, [Option<usize>; N])> = Vec::new();
        for (idx, column) in headers.iter().enumerate().skip(1) {
            let column = column.trim();
            let (prefix, slot) = self.split(column).ok_or_else(|| TableError::UnknownSuffix {
                column: column.to_owned(),
            })?;
            let joint: Joint = prefix.parse().map_err(|_| TableError::UnknownJoint {
                column: column.to_owned(),
            })?;
            let entry = match joints.iter_mut().find(|(j, _)| *j == joint) {
                Some(entry) => entry,
                None => {
                    joints.push((joint, [None; N]));
                    let last = joints.len() - 1;
                    &mut joints[last]
                }
            };
            if entry.1[slot].replace(idx).is_some() {
                return Err(TableError::DuplicateColumn {
                    column: column.to_owned(),
                });
            }
        }

        joints
            .into_iter()
            .map(|(joint, slots)| {
                let mut out = [0; N];
                for (slot, idx) in slots.iter().enumerate() {
                    out[slot] = idx.ok_or(TableError::IncompleteJoint {
                        joint: joint.name(),
                        suffix: self.suffixes[slot][0],
                    })?;
                }
                Ok((joint, out))
            })
            .collect()
    }

    fn header(&self, joints: &[Joint]) -> Vec<String> {
        let mut out = vec!["frame".to_owned()];
        for joint in joints {
            for names in &self.suffixes {
                out.push(format!("{}{}", joint.name(), names[0]));
            }
        }
        out
    }
}

fn parse_value(
    record: &csv::StringRecord,
    headers: &csv::StringRecord,
    row: usize,
    idx: usize,
) -> Result<f64, TableError> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|_| TableError::Value {
        row,
        column: headers.get(idx).unwrap_or("").to_owned(),
        value: raw.to_owned(),
    })
}

/// A single `-1` or blank coordinate drops the whole sample.
fn is_missing(values: &[f64]) -> bool {
    values.iter().any(|v| *v == MISSING || !v.is_finite())
}

fn reader<R: io::Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

/// Read a keypoint table from any reader.
pub fn read_keypoints<R: io::Read>(rdr: R) -> Result<KeypointSeries, TableError> {
    let mut rdr = reader(rdr);
    let headers = rdr.headers()?.clone();
    let layout = KEYPOINT_LAYOUT.parse_header(&headers)?;
    let mut series = KeypointSeries::new(layout.iter().map(|(j, _)| *j).collect())?;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let mut frame = JointMap::new();
        for (joint, cols) in &layout {
            let mut v = [0.0; 3];
            for (slot, idx) in cols.iter().enumerate() {
                v[slot] = parse_value(&record, &headers, row + 1, *idx)?;
            }
            if !is_missing(&v[..2]) {
                frame.insert(*joint, Keypoint2::new(v[0], v[1], v[2]));
            }
        }
        series.push(frame);
    }
    Ok(series)
}

pub fn read_keypoint_table(path: impl AsRef<Path>) -> Result<KeypointSeries, TableError> {
    read_keypoints(std::fs::File::open(path)?)
}

pub fn write_keypoints<W: io::Write>(wtr: W, series: &KeypointSeries) -> Result<(), TableError> {
    let mut wtr = csv::Writer::from_writer(wtr);
    wtr.write_record(KEYPOINT_LAYOUT.header(series.joints()))?;
    for (f, frame) in series.frames().iter().enumerate() {
        let mut row = vec![f.to_string()];
        for joint in series.joints() {
            let [x, y, v] = frame
                .get(*joint)
                .map(|k| [k.x, k.y, k.confidence])
                .unwrap_or([MISSING; 3]);
            row.extend([x, y, v].iter().map(f64::to_string));
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a 3D keypoint table from any reader.
pub fn read_points<R: io::Read>(rdr: R) -> Result<TriangulatedSeries, TableError> {
    let mut rdr = reader(rdr);
    let headers = rdr.headers()?.clone();
    let layout = POINT_LAYOUT.parse_header(&headers)?;
    let mut series = TriangulatedSeries::new(layout.iter().map(|(j, _)| *j).collect())?;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let mut frame = JointMap::new();
        for (joint, cols) in &layout {
            let mut v = [0.0; 3];
            for (slot, idx) in cols.iter().enumerate() {
                v[slot] = parse_value(&record, &headers, row + 1, *idx)?;
            }
            if !is_missing(&v) {
                frame.insert(*joint, Point3::new(v[0], v[1], v[2]));
            }
        }
        series.push(frame);
    }
    Ok(series)
}

pub fn read_point_table(path: impl AsRef<Path>) -> Result<TriangulatedSeries, TableError> {
    read_points(std::fs::File::open(path)?)
}

pub fn write_points<W: io::Write>(wtr: W, series: &TriangulatedSeries) -> Result<(), TableError> {
    let mut wtr = csv::Writer::from_writer(wtr);
    wtr.write_record(POINT_LAYOUT.header(series.joints()))?;
    for (f, frame) in series.frames().iter().enumerate() {
        let mut row = vec![f.to_string()];
        for joint in series.joints() {
            let p = frame
                .get(*joint)
                .map(|p| [p.x, p.y, p.z])
                .unwrap_or([MISSING; 3]);
            row.extend(p.iter().map(f64::to_string));
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_point_table(path: impl AsRef<Path>, series: &TriangulatedSeries) -> Result<(), TableError> {
    write_points(std::fs::File::create(path)?, series)
}

/// One row of the phase table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub file: String,
    pub windup_start: usize,
    pub release_frame: usize,
    pub followthrough_end: usize,
}

impl PhaseRow {
    pub fn new(file: impl Into<String>, phases: &PhaseAnnotation) -> Self {
        Self {
            file: file.into(),
            windup_start: phases.windup_start,
            release_frame: phases.release_frame,
            followthrough_end: phases.followthrough_end,
        }
    }
}

pub fn write_phases<W: io::Write>(wtr: W, rows: &[PhaseRow]) -> Result<(), TableError> {
    let mut wtr = csv::Writer::from_writer(wtr);
    if rows.is_empty() {
        wtr.write_record(["file", "windup_start", "release_frame", "followthrough_end"])?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_phase_table(path: impl AsRef<Path>, rows: &[PhaseRow]) -> Result<(), TableError> {
    write_phases(std::fs::File::create(path)?, rows)
}

pub fn read_phases<R: io::Read>(rdr: R) -> Result<Vec<PhaseRow>, TableError> {
    reader(rdr)
        .deserialize()
        .map(|r| r.map_err(TableError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "frame,right_elbow_x,right_elbow_y,right_elbow_v,right_wrist_x,right_wrist_y,right_wrist_score\n\
0,0.5,0.25,0.9,0.6,0.3,0.8\n\
1,-1,-1,-1,0.61,0.31,0.85\n\
2,0.52,0.27,0.95,,,\n";

    #[test]
    fn reads_keypoints_and_missing_markers() {
        let series = read_keypoints(TABLE.as_bytes()).expect("table");
        assert_eq!(&[Joint::RightElbow, Joint::RightWrist], series.joints());
        assert_eq!(3, series.len());
        assert_eq!(
            Some(&Keypoint2::new(0.5, 0.25, 0.9)),
            series.sample(0, Joint::RightElbow)
        );
        assert!(series.sample(1, Joint::RightElbow).is_none());
        assert!(series.sample(2, Joint::RightWrist).is_none());
        assert_eq!(2, series.missing_count());
    }

    #[test]
    fn one_sentinel_coordinate_drops_the_sample() {
        let keypoints = "frame,right_elbow_x,right_elbow_y,right_elbow_v\n0,-1,0.4,0.9\n1,0.5,0.4,-1\n";
        let series = read_keypoints(keypoints.as_bytes()).expect("keypoints");
        assert!(series.sample(0, Joint::RightElbow).is_none());
        assert_eq!(
            Some(&Keypoint2::new(0.5, 0.4, -1.0)),
            series.sample(1, Joint::RightElbow)
        );

        let points = "frame,right_elbow_x,right_elbow_y,right_elbow_z\n0,-1,0.4,0.0\n1,2.0,-1,150.0\n2,2.0,3.0,150.0\n";
        let series = read_points(points.as_bytes()).expect("points");
        assert!(series.sample(0, Joint::RightElbow).is_none());
        assert!(series.sample(1, Joint::RightElbow).is_none());
        assert!(series.sample(2, Joint::RightElbow).is_some());
    }

    #[test]
    fn header_errors_name_the_column() {
        let err = read_keypoints("frame,right_elbw_x,right_elbw_y,right_elbw_v\n".as_bytes())
            .expect_err("typo");
        assert!(matches!(err, TableError::UnknownJoint { column } if column == "right_elbw_x"));

        let err = read_keypoints("frame,right_elbow_x,right_elbow_y\n".as_bytes()).expect_err("short");
        assert!(matches!(
            err,
            TableError::IncompleteJoint { joint: "right_elbow", suffix: "_v" }
        ));

        let err = read_keypoints("time,nose_x,nose_y,nose_v\n".as_bytes()).expect_err("frame");
        assert!(matches!(err, TableError::MissingFrameColumn));

        let err = read_keypoints("frame,nose_x,nose_y,nose_v\n0,1,abc,1\n".as_bytes())
            .expect_err("value");
        assert!(matches!(err, TableError::Value { row: 1, ref column, .. } if column == "nose_y"));
    }

    #[test]
    fn points_round_trip_with_missing_rows() {
        let mut series = TriangulatedSeries::new(vec![Joint::RightShoulder, Joint::RightElbow]).expect("joints");
        let mut f0 = JointMap::new();
        f0.insert(Joint::RightShoulder, Point3::new(1.5, -2.25, 140.0));
        f0.insert(Joint::RightElbow, Point3::new(3.0, 20.5, 138.75));
        let mut f1 = JointMap::new();
        f1.insert(Joint::RightElbow, Point3::new(2.5, 21.0, 139.0));
        series.push(f0);
        series.push(f1);

        let mut buf = Vec::new();
        write_points(&mut buf, &series).expect("write");
        let text = String::from_utf8(buf.clone()).expect("utf8");
        assert!(text.starts_with("frame,right_shoulder_x,right_shoulder_y,right_shoulder_z,"));
        assert!(text.contains("1,-1,-1,-1,2.5,21,139"));

        assert_eq!(series, read_points(buf.as_slice()).expect("read"));
    }

    #[test]
    fn phase_rows_have_the_expected_header() {
        let rows = vec![PhaseRow::new(
            "Freethrow1.mot",
            &PhaseAnnotation {
                windup_start: 30,
                release_frame: 45,
                followthrough_end: 54,
            },
        )];
        let mut buf = Vec::new();
        write_phases(&mut buf, &rows).expect("write");
        let text = String::from_utf8(buf.clone()).expect("utf8");
        assert_eq!(
            "file,windup_start,release_frame,followthrough_end\nFreethrow1.mot,30,45,54\n",
            text
        );
        assert_eq!(rows, read_phases(buf.as_slice()).expect("read"));
    }
}
