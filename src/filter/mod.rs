pub mod bank;
pub mod kalman;
pub mod one_euro;

pub use bank::{Channel, FilterBank, StreamFilter, StreamKey};
pub use kalman::KalmanFilter;
pub use one_euro::OneEuroFilter;
