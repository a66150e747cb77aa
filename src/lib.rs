//!
//! Calibration of three-arm positioning rigs from measured arm lengths
//!

pub mod calibration;
pub mod hardware;
pub mod points;
pub mod report;
pub mod run;
pub mod synthetic;
