//! BLE GAP peripheral controller.
//!
//! Owns advertising, connection establishment, connection-parameter
//! negotiation and pairing for a single peripheral link. The radio is
//! reached only through the [`LinkController`](app::ports::LinkController)
//! port; its notifications come back through a
//! [`EventDispatcher`](gap::dispatcher::EventDispatcher).
//!
//! Platform-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

// Linked for their embassy-time driver and critical-section implementation.
#[cfg(target_os = "espidf")]
use esp_idf_hal as _;
#[cfg(target_os = "espidf")]
use esp_idf_svc as _;

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod gap;

pub use error::{GapError, Result};
pub use gap::{Gap, GapState};
