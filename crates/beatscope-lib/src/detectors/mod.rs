pub mod ecg;
pub mod landmarks;
