//! Application boundary: the types that cross between the GAP core
//! and the outside world.
//!
//! Commands flow in from the public API, outbound events flow out to the
//! application handler, and every radio interaction goes through the
//! **port traits** defined in [`ports`], keeping the controller fully
//! testable without a real Link-Controller.

pub mod commands;
pub mod events;
pub mod ports;
