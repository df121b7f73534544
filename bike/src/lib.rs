pub mod config;
pub mod peripheral;
pub mod systems;
pub mod track_log;
pub mod tracking;
