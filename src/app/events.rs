//! Outbound GAP events.
//!
//! The controller emits these through the
//! [`GapEventHandler`](super::ports::GapEventHandler) port. Only
//! [`GapEvent::PinCodeVerify`] uses the handler's return value.

/// Structured events delivered to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent {
    /// Link is up and, when pairing is required, authenticated.
    Connected,
    /// Link dropped (any reason, including pairing failure).
    Disconnected,
    StartAdvertising,
    StopAdvertising,
    /// Show this 6-digit PIN to the user.
    PinCodeShow { pin: u32 },
    /// Ask the user whether this value matches the peer's.
    PinCodeVerify { pin: u32 },
    /// Usable ATT payload size after MTU exchange.
    UpdateMtu { size: u16 },
    BeaconStart,
    BeaconStop,
}
