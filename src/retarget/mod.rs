pub mod engine;
pub mod face;
pub mod hand;
pub mod holistic;
pub mod legacy;
pub mod limits;
pub mod math;

pub use engine::{MotionEngine, Solver};
pub use holistic::{FilteredPose, HolisticSolver};
pub use legacy::LegacySolver;
pub use limits::BiomechanicalLimits;
