//! Discrete-time simulator for a fleet of mobile nodes that keep themselves
//! connected to fixed access points by placing peers as radio relays.

pub mod common;
pub mod simulation;
