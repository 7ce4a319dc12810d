pub mod keypoint;
pub mod parser;

pub use keypoint::{FaceLandmark, HandLandmark, Landmark, PoseLandmark};
pub use parser::{DetectionResult, HolisticResult, LandmarkSet, LegacyResult, PointSet};
