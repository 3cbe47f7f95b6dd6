//! Signal conditioning: smoothing and calibration

mod calibration;
mod filter;

pub use calibration::{CalibrationPolicy, CalibrationRange, CalibrationWindow};
pub use filter::Filter;
