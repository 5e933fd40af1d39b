//! Inputs shared by the binary and the simulation: scene files and run configuration.

pub mod config;
pub mod scene;
