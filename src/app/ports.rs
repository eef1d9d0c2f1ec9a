//! Port traits: the boundary between the GAP core and the outside world.
//!
//! ```text
//!   Application ◀── GapEventHandler ◀── GapController ──▶ LinkController ──▶ radio
//! ```
//!
//! The radio's command surface is the [`LinkController`] port; the radio's
//! notification stream comes back through
//! [`EventDispatcher`](crate::gap::dispatcher::EventDispatcher). The
//! controller consumes both via generics, so the core never touches the
//! radio directly.
//!
//! ## Reentrancy
//!
//! Every port call happens while the controller holds its state guard.
//! - A [`LinkController`] MUST NOT deliver notifications synchronously from
//!   inside a command call.
//! - A [`GapEventHandler`] MUST NOT call back into the controller's API.

use crate::error::LinkStatus;

use super::events::GapEvent;

/// Result of a single Link-Controller command.
pub type LinkResult<T> = core::result::Result<T, LinkStatus>;

// ───────────────────────────────────────────────────────────────
// Link-level value types
// ───────────────────────────────────────────────────────────────

/// Radio-assigned handle of the (single) live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u16);

/// Timing of the live connection as reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionParams {
    /// Connection interval, 1.25 ms units.
    pub interval: u16,
    /// Peripheral latency, in connection events.
    pub latency: u16,
    /// Supervision timeout, 10 ms units.
    pub supervision_timeout: u16,
}

impl ConnectionParams {
    /// Interval in whole milliseconds (for logs).
    pub fn interval_ms(&self) -> u32 {
        u32::from(self.interval) * 5 / 4
    }
}

/// L2CAP connection-parameter-update request sent to the central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParamRequest {
    pub interval_min: u16,
    pub interval_max: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

/// Slot in the radio's configuration data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDataSlot {
    PublicAddress,
    StaticRandomAddress,
    IdentityRootKey,
    EncryptionRootKey,
}

/// Handles allocated by the radio for the built-in GAP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GapServiceHandles {
    pub service: u16,
    pub device_name: u16,
    pub appearance: u16,
}

/// Device I/O capabilities advertised during pairing feature exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

impl From<IoCapability> for u8 {
    fn from(val: IoCapability) -> u8 {
        match val {
            IoCapability::DisplayOnly => 0x00,
            IoCapability::DisplayYesNo => 0x01,
            IoCapability::KeyboardOnly => 0x02,
            IoCapability::NoInputNoOutput => 0x03,
            IoCapability::KeyboardDisplay => 0x04,
        }
    }
}

/// Identity address type advertised in the authentication requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityAddress {
    Public,
    StaticRandom,
}

/// Argument block of the "set authentication requirement" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRequirements {
    pub bonding: u8,
    pub mitm_required: bool,
    pub secure_connections: SecureConnections,
    pub keypress_notifications: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub fixed_pin_allowed: bool,
    pub fixed_pin: u32,
    pub identity_address: IdentityAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureConnections {
    NotSupported,
    Supported,
    Only,
}

/// PHY preference applied to future connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyPreference {
    Le1M,
    Le2M,
}

/// PHYs currently used by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyPair {
    pub tx: u8,
    pub rx: u8,
}

/// Argument block of the "set discoverable" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverableParams<'a> {
    /// Advertising interval bounds, 0.625 ms units.
    pub interval_min: u16,
    pub interval_max: u16,
    pub identity_address: IdentityAddress,
    /// AD-type prefixed complete local name.
    pub local_name: &'a [u8],
    /// AD-type prefixed service UUID list.
    pub service_uuids: &'a [u8],
}

// ───────────────────────────────────────────────────────────────
// Link-Controller port (driven adapter: core → radio)
// ───────────────────────────────────────────────────────────────

/// Command surface of the external radio controller.
///
/// Every command either succeeds or returns the radio's non-zero status.
pub trait LinkController: Send + 'static {
    /// Whether the radio stack has booted and accepts commands.
    fn is_radio_ready(&self) -> bool;

    fn write_config_data(&mut self, slot: ConfigDataSlot, data: &[u8]) -> LinkResult<()>;

    /// `level` is the radio's PA table index.
    fn set_tx_power(&mut self, high_power: bool, level: u8) -> LinkResult<()>;

    fn gatt_init(&mut self) -> LinkResult<()>;

    /// Register the GAP service in the peripheral role.
    fn gap_init(&mut self, device_name_len: u8) -> LinkResult<GapServiceHandles>;

    fn update_char_value(&mut self, service: u16, characteristic: u16, value: &[u8])
    -> LinkResult<()>;

    fn set_default_phy(&mut self, tx: PhyPreference, rx: PhyPreference) -> LinkResult<()>;

    fn set_io_capability(&mut self, capability: IoCapability) -> LinkResult<()>;

    fn set_authentication_requirement(&mut self, req: &AuthRequirements) -> LinkResult<()>;

    fn configure_whitelist(&mut self) -> LinkResult<()>;

    fn set_discoverable(&mut self, params: &DiscoverableParams<'_>) -> LinkResult<()>;

    fn set_non_discoverable(&mut self) -> LinkResult<()>;

    fn set_scan_response_data(&mut self, data: &[u8]) -> LinkResult<()>;

    fn terminate(&mut self, handle: ConnectionHandle, reason: u8) -> LinkResult<()>;

    fn connection_parameter_update_request(
        &mut self,
        handle: ConnectionHandle,
        req: &ConnParamRequest,
    ) -> LinkResult<()>;

    fn read_phy(&mut self, handle: ConnectionHandle) -> LinkResult<PhyPair>;

    fn pass_key_response(&mut self, handle: ConnectionHandle, pin: u32) -> LinkResult<()>;

    fn numeric_comparison_confirm(&mut self, handle: ConnectionHandle, confirm: bool)
    -> LinkResult<()>;

    fn allow_rebond(&mut self, handle: ConnectionHandle) -> LinkResult<()>;

    /// Ask the central to start pairing.
    fn peripheral_security_request(&mut self, handle: ConnectionHandle) -> LinkResult<()>;
}

// ───────────────────────────────────────────────────────────────
// Event handler port (driven adapter: core → application)
// ───────────────────────────────────────────────────────────────

/// Receives every [`GapEvent`] synchronously, under the state guard.
///
/// The return value answers [`GapEvent::PinCodeVerify`]; it is ignored
/// for every other event.
pub trait GapEventHandler: Send + 'static {
    fn on_event(&mut self, event: GapEvent) -> bool;
}

impl<F> GapEventHandler for F
where
    F: FnMut(GapEvent) -> bool + Send + 'static,
{
    fn on_event(&mut self, event: GapEvent) -> bool {
        self(event)
    }
}
