pub mod display;
pub mod gps;
pub mod tracking;
pub mod units;
