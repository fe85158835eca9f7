//! Joint angles from triangulated keypoints.

use crate::AngleSeries;
use freethrow_core::{Joint, TriangulatedFrame, TriangulatedSeries};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    #[default]
    Right,
}

impl Side {
    fn joints(self) -> [Joint; 4] {
        match self {
            Side::Left => [
                Joint::LeftHip,
                Joint::LeftShoulder,
                Joint::LeftElbow,
                Joint::LeftWrist,
            ],
            Side::Right => [
                Joint::RightHip,
                Joint::RightShoulder,
                Joint::RightElbow,
                Joint::RightWrist,
            ],
        }
    }
}

/// Angle between two vectors in degrees, `NaN` if either is degenerate.
pub fn angle_between_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let n = a.norm() * b.norm();
    if n < 1e-12 {
        return f64::NAN;
    }
    (a.dot(b) / n).clamp(-1.0, 1.0).acos().to_degrees()
}

/// 0° for a straight arm, growing as the elbow bends.
pub fn elbow_flexion(shoulder: &Point3<f64>, elbow: &Point3<f64>, wrist: &Point3<f64>) -> f64 {
    180.0 - angle_between_deg(&(shoulder - elbow), &(wrist - elbow))
}

/// Angle between the trunk (shoulder to hip) and the upper arm.
pub fn shoulder_flexion(hip: &Point3<f64>, shoulder: &Point3<f64>, elbow: &Point3<f64>) -> f64 {
    angle_between_deg(&(hip - shoulder), &(elbow - shoulder))
}

fn frame_angles(frame: &TriangulatedFrame, side: Side) -> (f64, f64) {
    let [hip, shoulder, elbow, wrist] = side.joints().map(|j| frame.get(j));
    let elbow_angle = match (shoulder, elbow, wrist) {
        (Some(s), Some(e), Some(w)) => elbow_flexion(s, e, w),
        _ => f64::NAN,
    };
    let shoulder_angle = match (hip, shoulder, elbow) {
        (Some(h), Some(s), Some(e)) => shoulder_flexion(h, s, e),
        _ => f64::NAN,
    };
    (elbow_angle, shoulder_angle)
}

/// Elbow and shoulder flexion of one arm for every frame.
pub fn arm_flexion_series(series: &TriangulatedSeries, side: Side) -> AngleSeries {
    let (elbow, shoulder): (Vec<f64>, Vec<f64>) = series
        .frames()
        .iter()
        .map(|f| frame_angles(f, side))
        .unzip();
    AngleSeries::from_parts(elbow, shoulder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use freethrow_core::JointMap;

    #[test]
    fn straight_arm_has_zero_elbow_flexion() {
        let s = Point3::new(0.0, 0.0, 0.0);
        let e = Point3::new(0.0, -30.0, 0.0);
        let w = Point3::new(0.0, -55.0, 0.0);
        assert_relative_eq!(elbow_flexion(&s, &e, &w), 0.0, epsilon = 1e-9);

        let bent = Point3::new(25.0, -30.0, 0.0);
        assert_relative_eq!(elbow_flexion(&s, &e, &bent), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn raised_arm_flexes_the_shoulder() {
        let hip = Point3::new(0.0, 50.0, 0.0);
        let shoulder = Point3::origin();
        assert_relative_eq!(
            shoulder_flexion(&hip, &shoulder, &Point3::new(0.0, 30.0, 0.0)),
            0.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            shoulder_flexion(&hip, &shoulder, &Point3::new(0.0, 0.0, -30.0)),
            90.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn missing_joints_give_nan() {
        let joints = vec![
            Joint::RightHip,
            Joint::RightShoulder,
            Joint::RightElbow,
            Joint::RightWrist,
        ];
        let mut full = JointMap::new();
        full.insert(Joint::RightHip, Point3::new(0.0, 50.0, 0.0));
        full.insert(Joint::RightShoulder, Point3::origin());
        full.insert(Joint::RightElbow, Point3::new(0.0, 0.0, -30.0));
        full.insert(Joint::RightWrist, Point3::new(0.0, -25.0, -30.0));
        let mut partial = full.clone();
        partial.set(Joint::RightWrist, None);

        let series = TriangulatedSeries::with_frames(joints, vec![full, partial]).expect("series");
        let angles = arm_flexion_series(&series, Side::Right);
        assert_relative_eq!(angles.elbow()[0], 90.0, epsilon = 1e-9);
        assert_relative_eq!(angles.shoulder()[0], 90.0, epsilon = 1e-9);
        assert!(angles.elbow()[1].is_nan());
        assert_relative_eq!(angles.shoulder()[1], 90.0, epsilon = 1e-9);

        let left = arm_flexion_series(&series, Side::Left);
        assert!(left.elbow().iter().all(|v| v.is_nan()));
    }
}
