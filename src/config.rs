//! GAP configuration parameters
//!
//! Everything the controller needs to know about the device before the
//! radio is brought up. The caller owns the configuration; the controller
//! takes a copy at init and never mutates it.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GapError, Result};

/// Maximum manufacturer-specific payload (scan response minus AD header).
pub const MAX_MFG_DATA_LEN: usize = 21;

/// Maximum advertised local name length.
pub const MAX_ADV_NAME_LEN: usize = 28;

/// Lowest connection interval the link layer accepts (7.5 ms).
pub const CONN_INTERVAL_FLOOR: u16 = 0x0006;

/// Highest connection interval the link layer accepts (4 s).
pub const CONN_INTERVAL_CEIL: u16 = 0x0C80;

/// Fast advertising lasts this long before dropping to low power.
pub const DEFAULT_FAST_ADV_TIMEOUT_MS: u32 = 60_000;

fn default_fast_adv_timeout_ms() -> u32 {
    DEFAULT_FAST_ADV_TIMEOUT_MS
}

/// How the device authenticates a peer during pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingMethod {
    /// "Just works", falling back to numeric comparison for strict peers.
    None,
    /// Device shows a PIN the peer must type.
    PinShow,
    /// Both sides show a value and the user confirms yes/no.
    PinVerifyYesNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondingMode {
    NoBonding,
    Bonding,
}

impl BondingMode {
    /// Wire value for the authentication-requirement command.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::NoBonding => 0x00,
            Self::Bonding => 0x01,
        }
    }
}

/// Connection-interval window requested from the central (1.25 ms units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnIntervalBounds {
    pub min: u16,
    pub max: u16,
}

/// Primary service advertised in the AD payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceUuid {
    Uuid16(u16),
    /// Little-endian, as transmitted over the air.
    Uuid128([u8; 16]),
}

/// Identity and encryption root keys, sourced from per-device storage.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentityKeys {
    pub irk: [u8; 16],
    pub erk: [u8; 16],
}

impl IdentityKeys {
    fn is_unset(&self) -> bool {
        self.irk.iter().all(|b| *b == 0) || self.erk.iter().all(|b| *b == 0)
    }
}

// Keys never reach the log.
impl fmt::Debug for IdentityKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeys")
            .field("irk", &"<redacted>")
            .field("erk", &"<redacted>")
            .finish()
    }
}

/// Core GAP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapConfig {
    // --- Identity ---
    /// Public device address, least-significant byte first.
    pub mac_address: [u8; 6],
    /// Complete local name placed in the advertising payload.
    pub adv_name: heapless::String<MAX_ADV_NAME_LEN>,
    /// GAP appearance characteristic value.
    pub appearance: u16,
    /// Root keys written to the radio at init.
    pub identity_keys: IdentityKeys,

    // --- Security ---
    pub pairing_method: PairingMethod,
    pub bonding_mode: BondingMode,
    /// Hide generated PINs in the log (device locked).
    pub mask_pin_in_logs: bool,

    // --- Link ---
    pub conn_interval: ConnIntervalBounds,

    // --- Advertising ---
    pub adv_service: ServiceUuid,
    /// Fast → low-power downgrade delay.
    #[serde(default = "default_fast_adv_timeout_ms")]
    pub fast_adv_timeout_ms: u32,
    /// Manufacturer-specific data sent as scan response (empty = none).
    pub mfg_data: heapless::Vec<u8, MAX_MFG_DATA_LEN>,
}

impl Default for GapConfig {
    fn default() -> Self {
        let mut adv_name = heapless::String::new();
        let _ = adv_name.push_str("BleGap");
        Self {
            mac_address: [0x00; 6],
            adv_name,
            appearance: 0x0000,
            identity_keys: IdentityKeys::default(),

            pairing_method: PairingMethod::PinShow,
            bonding_mode: BondingMode::Bonding,
            mask_pin_in_logs: false,

            conn_interval: ConnIntervalBounds {
                min: 0x18, // 30 ms
                max: 0x24, // 45 ms
            },

            adv_service: ServiceUuid::Uuid16(0x3080),
            fast_adv_timeout_ms: DEFAULT_FAST_ADV_TIMEOUT_MS,
            mfg_data: heapless::Vec::new(),
        }
    }
}

impl GapConfig {
    /// Reject configurations the radio would refuse or misbehave with.
    ///
    /// Values are never clamped; the caller has to fix them.
    pub fn validate(&self) -> Result<()> {
        if self.adv_name.is_empty() {
            return Err(GapError::Config("advertised name is empty"));
        }
        let ConnIntervalBounds { min, max } = self.conn_interval;
        if min < CONN_INTERVAL_FLOOR || max > CONN_INTERVAL_CEIL {
            return Err(GapError::Config("connection interval outside 0x0006..=0x0C80"));
        }
        if min > max {
            return Err(GapError::Config("connection interval min above max"));
        }
        if self.fast_adv_timeout_ms == 0 {
            return Err(GapError::Config("fast advertising timeout is zero"));
        }
        if self.identity_keys.is_unset() {
            return Err(GapError::Config("identity root keys not provisioned"));
        }
        Ok(())
    }

    /// Load a configuration from its JSON form and validate it.
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(raw).map_err(|_| GapError::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from its compact `postcard` form and validate it.
    pub fn from_postcard(raw: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(raw).map_err(|_| GapError::Config("malformed postcard"))?;
        config.validate()?;
        Ok(config)
    }
}
