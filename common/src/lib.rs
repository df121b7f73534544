//! Code shared between the bike computer and its tooling

pub mod config;
pub mod error;
pub mod protocol;
pub mod shutdown;
pub mod slot;
pub mod ticker;
pub mod types;
pub mod tz;
