//! Free-throw phase segmentation.
//!
//! A throw is described by two flexion signals of the shooting arm, elbow
//! and shoulder, sampled at a fixed frame rate. They come either from an
//! OpenCap `.mot` file ([`MotTable`]) or from triangulated keypoints
//! ([`arm_flexion_series`]). [`segment_phases`] turns them into a
//! [`PhaseAnnotation`].
//!
//! ```
//! use freethrow_phases::{segment_phases, AngleSeries, PhaseParams};
//!
//! let elbow: Vec<f64> = (0..40).map(|i| (150.0 - 4.0 * i as f64).max(40.0)).collect();
//! let shoulder = vec![60.0; 40];
//! let series = AngleSeries::new(elbow, shoulder).unwrap();
//! let phases = segment_phases(&series, &PhaseParams::default()).unwrap();
//! assert!(phases.windup_start <= phases.release_frame);
//! ```

mod error;
pub mod kinematics;
pub mod mot;
mod params;
mod segment;

pub use error::{MotError, PhaseError};
pub use kinematics::{arm_flexion_series, Side};
pub use mot::{release_snapshot, MotTable};
pub use params::PhaseParams;
pub use segment::{abs_velocity, arm_speed, segment_phases, AngleSeries, PhaseAnnotation};
