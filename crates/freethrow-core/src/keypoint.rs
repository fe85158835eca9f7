use crate::{CoreError, Joint};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// One 2D keypoint observation: image coordinates plus detector confidence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint2 {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint2 {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    #[inline]
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Fixed-layout per-joint storage. `None` marks a missing sample.
#[derive(Clone, Debug, PartialEq)]
pub struct JointMap<T> {
    slots: [Option<T>; Joint::COUNT],
}

impl<T> Default for JointMap<T> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T> JointMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, joint: Joint) -> Option<&T> {
        self.slots[joint.index()].as_ref()
    }

    #[inline]
    pub fn set(&mut self, joint: Joint, value: Option<T>) {
        self.slots[joint.index()] = value;
    }

    pub fn insert(&mut self, joint: Joint, value: T) {
        self.set(joint, Some(value));
    }

    /// Present samples in joint order.
    pub fn iter(&self) -> impl Iterator<Item = (Joint, &T)> + '_ {
        Joint::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(j, v)| v.as_ref().map(|v| (*j, v)))
    }

    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl<T: Copy> JointMap<T> {
    #[inline]
    pub fn value(&self, joint: Joint) -> Option<T> {
        self.slots[joint.index()]
    }
}

/// 2D keypoints of one camera view at one instant.
pub type KeypointFrame = JointMap<Keypoint2>;

/// Triangulated joint positions at one instant, in the left-camera frame.
pub type TriangulatedFrame = JointMap<Point3<f64>>;

/// Ordered per-frame samples for a declared set of joints.
///
/// `joints` lists the columns the source table carried; a declared joint
/// without a sample in some frame is missing for that frame, an undeclared
/// joint was never tracked at all.
#[derive(Clone, Debug, PartialEq)]
pub struct JointSeries<T> {
    joints: Vec<Joint>,
    frames: Vec<JointMap<T>>,
}

pub type KeypointSeries = JointSeries<Keypoint2>;
pub type TriangulatedSeries = JointSeries<Point3<f64>>;

impl<T> JointSeries<T> {
    pub fn new(joints: Vec<Joint>) -> Result<Self, CoreError> {
        let mut seen = [false; Joint::COUNT];
        for j in &joints {
            if std::mem::replace(&mut seen[j.index()], true) {
                return Err(CoreError::DuplicateJoint { joint: j.name() });
            }
        }
        Ok(Self {
            joints,
            frames: Vec::new(),
        })
    }

    pub fn with_frames(joints: Vec<Joint>, frames: Vec<JointMap<T>>) -> Result<Self, CoreError> {
        let mut series = Self::new(joints)?;
        series.frames = frames;
        Ok(series)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn declares(&self, joint: Joint) -> bool {
        self.joints.contains(&joint)
    }

    pub fn frames(&self) -> &[JointMap<T>] {
        &self.frames
    }

    pub fn push(&mut self, frame: JointMap<T>) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample(&self, frame: usize, joint: Joint) -> Option<&T> {
        self.frames.get(frame).and_then(|f| f.get(joint))
    }

    /// Number of (frame, declared joint) slots without a sample.
    pub fn missing_count(&self) -> usize {
        self.frames
            .iter()
            .map(|f| {
                self.joints
                    .iter()
                    .filter(|j| f.get(**j).is_none())
                    .count()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_map_tracks_presence() {
        let mut frame = KeypointFrame::new();
        assert_eq!(0, frame.present_count());
        frame.insert(Joint::RightElbow, Keypoint2::new(0.4, 0.5, 0.9));
        frame.insert(Joint::Nose, Keypoint2::new(0.5, 0.1, 0.99));

        assert_eq!(2, frame.present_count());
        assert!(frame.get(Joint::LeftElbow).is_none());
        let order: Vec<Joint> = frame.iter().map(|(j, _)| j).collect();
        assert_eq!(vec![Joint::Nose, Joint::RightElbow], order);

        frame.set(Joint::Nose, None);
        assert_eq!(1, frame.present_count());
    }

    #[test]
    fn series_rejects_duplicate_joints() {
        let err = KeypointSeries::new(vec![Joint::Nose, Joint::LeftHip, Joint::Nose])
            .expect_err("duplicate");
        assert_eq!(CoreError::DuplicateJoint { joint: "nose" }, err);
    }

    #[test]
    fn missing_count_only_covers_declared_joints() {
        let mut series = KeypointSeries::new(vec![Joint::LeftWrist, Joint::RightWrist])
            .expect("series");
        let mut f0 = KeypointFrame::new();
        f0.insert(Joint::LeftWrist, Keypoint2::new(0.1, 0.2, 1.0));
        series.push(f0);
        series.push(KeypointFrame::new());

        assert_eq!(2, series.len());
        assert_eq!(3, series.missing_count());
        assert!(series.sample(0, Joint::LeftWrist).is_some());
        assert!(series.sample(5, Joint::LeftWrist).is_none());
    }
}
