pub mod bone;
pub mod memory;
pub mod rig;

pub use bone::{Bone, Finger, Side};
pub use memory::{MemorySkeleton, RigDescription};
pub use rig::{BindError, BoneMap, JointHandle, Rig, Skeleton, Space};
