pub mod display;
pub mod gps;
pub mod link;
