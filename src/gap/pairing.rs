//! Pairing and security.
//!
//! Configures the radio's security manager from the [`PairingMethod`] at
//! init, then answers the security procedures the central drives.

use core::fmt;

use log::{debug, error, info, warn};
use rand_core::{OsRng, RngCore};

use crate::app::events::GapEvent;
use crate::app::ports::{
    AuthRequirements, ConnectionHandle, GapEventHandler, IdentityAddress, IoCapability,
    LinkController, SecureConnections,
};
use crate::config::{BondingMode, PairingMethod};

use super::context::GapContext;
use super::negotiator;

/// Encryption key size range accepted during pairing.
pub const ENCRYPTION_KEY_SIZE_MIN: u8 = 8;
pub const ENCRYPTION_KEY_SIZE_MAX: u8 = 16;

/// HCI reason "authentication failure".
pub const REASON_AUTHENTICATION_FAILURE: u8 = 0x05;

/// Exclusive upper bound of a 6-digit passkey.
const PIN_SPACE: u32 = 1_000_000;

/// I/O capability and authentication requirements for a pairing method.
pub fn auth_profile(method: PairingMethod, bonding: BondingMode) -> (IoCapability, AuthRequirements) {
    let (capability, mitm_required, fixed_pin_allowed, keypress_notifications) = match method {
        PairingMethod::PinShow => (IoCapability::DisplayOnly, true, false, false),
        PairingMethod::PinVerifyYesNo => (IoCapability::DisplayYesNo, true, false, true),
        // Just works; peers that refuse it fall back to numeric comparison.
        PairingMethod::None => (IoCapability::DisplayYesNo, false, true, true),
    };
    let req = AuthRequirements {
        bonding: bonding.as_u8(),
        mitm_required,
        secure_connections: SecureConnections::Supported,
        keypress_notifications,
        min_key_size: ENCRYPTION_KEY_SIZE_MIN,
        max_key_size: ENCRYPTION_KEY_SIZE_MAX,
        fixed_pin_allowed,
        fixed_pin: 0,
        identity_address: IdentityAddress::Public,
    };
    (capability, req)
}

/// Uniform 6-digit passkey in `0..=999_999`.
pub fn generate_pin<R: RngCore>(rng: &mut R) -> u32 {
    // Largest multiple of PIN_SPACE that fits; reject above it.
    let zone = u32::MAX - (u32::MAX % PIN_SPACE);
    loop {
        let v = rng.next_u32();
        if v < zone {
            return v % PIN_SPACE;
        }
    }
}

/// Log formatter for a passkey, honouring the masking flag.
pub struct PinDisplay {
    pub pin: u32,
    pub masked: bool,
}

impl fmt::Display for PinDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.masked {
            f.write_str("******")
        } else {
            write!(f, "{:06}", self.pin)
        }
    }
}

// ── Event handlers (state guard held) ─────────────────────────

pub(crate) fn on_pin_request<L: LinkController, H: GapEventHandler>(
    ctx: &mut GapContext<L, H>,
    handle: ConnectionHandle,
) {
    let pin = generate_pin(&mut OsRng);
    if let Err(s) = ctx.link.pass_key_response(handle, pin) {
        error!("PAIR: pass key response failed: {}", s);
    }
    info!(
        "PAIR: pass key request, pin {}",
        PinDisplay {
            pin,
            masked: ctx.config.mask_pin_in_logs,
        }
    );
    ctx.emit(GapEvent::PinCodeShow { pin });
}

pub(crate) fn on_numeric_compare<L: LinkController, H: GapEventHandler>(
    ctx: &mut GapContext<L, H>,
    handle: ConnectionHandle,
    value: u32,
) {
    info!("PAIR: verify numeric comparison {:06}", value);
    let confirmed = ctx.emit(GapEvent::PinCodeVerify { pin: value });
    if let Err(s) = ctx.link.numeric_comparison_confirm(handle, confirmed) {
        error!("PAIR: numeric comparison confirm failed: {}", s);
    }
}

pub(crate) fn on_pairing_complete<L: LinkController, H: GapEventHandler>(
    ctx: &mut GapContext<L, H>,
    handle: ConnectionHandle,
    status: u8,
    reason: u8,
) {
    if status != 0 {
        error!(
            "PAIR: failed, status 0x{:02X} reason 0x{:02X}, terminating",
            status, reason
        );
        if let Err(s) = ctx.link.terminate(handle, REASON_AUTHENTICATION_FAILURE) {
            error!("PAIR: terminate failed: {}", s);
        }
        return;
    }
    info!("PAIR: complete");
    ctx.secure = true;
    ctx.emit(GapEvent::Connected);
    negotiator::run(ctx);
}

pub(crate) fn on_bond_lost<L: LinkController, H: GapEventHandler>(ctx: &mut GapContext<L, H>) {
    debug!("PAIR: bond lost, allowing rebond");
    let Some(handle) = ctx.connection else {
        warn!("PAIR: bond lost without a live connection");
        return;
    };
    if let Err(s) = ctx.link.allow_rebond(handle) {
        error!("PAIR: allow rebond failed: {}", s);
    }
}
