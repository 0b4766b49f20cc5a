//! Roster helpers: the random assignment wheel.

pub mod wheel;

pub use wheel::{Assignment, Wheel};
