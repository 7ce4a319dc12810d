pub mod config;
pub mod export;
pub mod filter;
pub mod keyframe;
pub mod landmark;
pub mod retarget;
pub mod skeleton;
