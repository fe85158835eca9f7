//! Closed enumeration of the tracked body landmarks.
//!
//! The order and snake_case names follow the 33-landmark full-body pose
//! topology used by the keypoint tables (`nose`, `left_eye_inner`, ...,
//! `right_foot_index`). Column prefixes are validated against this list at
//! ingestion, so a misspelled joint fails before any geometry runs.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! joints {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Joint {
            $($variant),+
        }

        impl Joint {
            /// All joints in table order.
            pub const ALL: [Joint; Joint::COUNT] = [$(Joint::$variant),+];

            /// Column prefix used in keypoint tables.
            pub fn name(self) -> &'static str {
                match self {
                    $(Joint::$variant => $name),+
                }
            }
        }
    };
}

joints! {
    Nose => "nose",
    LeftEyeInner => "left_eye_inner",
    LeftEye => "left_eye",
    LeftEyeOuter => "left_eye_outer",
    RightEyeInner => "right_eye_inner",
    RightEye => "right_eye",
    RightEyeOuter => "right_eye_outer",
    LeftEar => "left_ear",
    RightEar => "right_ear",
    MouthLeft => "mouth_left",
    MouthRight => "mouth_right",
    LeftShoulder => "left_shoulder",
    RightShoulder => "right_shoulder",
    LeftElbow => "left_elbow",
    RightElbow => "right_elbow",
    LeftWrist => "left_wrist",
    RightWrist => "right_wrist",
    LeftPinky => "left_pinky",
    RightPinky => "right_pinky",
    LeftIndex => "left_index",
    RightIndex => "right_index",
    LeftThumb => "left_thumb",
    RightThumb => "right_thumb",
    LeftHip => "left_hip",
    RightHip => "right_hip",
    LeftKnee => "left_knee",
    RightKnee => "right_knee",
    LeftAnkle => "left_ankle",
    RightAnkle => "right_ankle",
    LeftHeel => "left_heel",
    RightHeel => "right_heel",
    LeftFootIndex => "left_foot_index",
    RightFootIndex => "right_foot_index",
}

impl Joint {
    pub const COUNT: usize = 33;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Joint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Joint::ALL
            .iter()
            .copied()
            .find(|j| j.name() == s)
            .ok_or_else(|| CoreError::UnknownJoint(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_table_order() {
        for (i, joint) in Joint::ALL.iter().enumerate() {
            assert_eq!(i, joint.index());
        }
        assert_eq!(Joint::RightFootIndex.index(), Joint::COUNT - 1);
    }

    #[test]
    fn names_parse_back() {
        for joint in Joint::ALL {
            assert_eq!(joint, joint.name().parse::<Joint>().expect("known joint"));
        }
        assert_eq!(
            Err(CoreError::UnknownJoint("left_elbw".into())),
            "left_elbw".parse::<Joint>()
        );
    }

    #[test]
    fn serde_uses_column_prefix() {
        let json = serde_json::to_string(&Joint::LeftEyeInner).expect("serialize");
        assert_eq!("\"left_eye_inner\"", json);
    }
}
