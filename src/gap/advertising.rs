//! Advertising controller: discoverability, payload buffers and the
//! fast → low-power downgrade.
//!
//! ```text
//!   Idle ──start_advertising──▶ StartingAdvertising ──AdvertiseFast──▶ AdvertisingFast
//!                                                                         │ timeout
//!                                                                         ▼
//!   Idle ◀──────────────stop()──────────────────────────────────── AdvertisingLowPower
//! ```

use std::time::Duration;

use log::{debug, error, info};

use crate::app::events::GapEvent;
use crate::app::ports::{
    DiscoverableParams, GapEventHandler, IdentityAddress, LinkController,
};
use crate::config::{GapConfig, MAX_ADV_NAME_LEN, MAX_MFG_DATA_LEN, ServiceUuid};
use crate::error::{GapError, Result};

use super::GapState;
use super::context::GapContext;

// ── AD types ──────────────────────────────────────────────────
pub const AD_TYPE_16_BIT_SERV_UUID: u8 = 0x02;
pub const AD_TYPE_32_BIT_SERV_UUID: u8 = 0x04;
pub const AD_TYPE_128_BIT_SERV_UUID_CMPLT_LIST: u8 = 0x07;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;

/// Service-UUID block: AD type + up to 16 UUID bytes (+ slack).
pub const SERVICE_UUID_CAPACITY: usize = 20;
/// Manufacturer block: length + AD type + data.
pub const MFG_DATA_CAPACITY: usize = MAX_MFG_DATA_LEN + 2;

/// HCI reason "remote user terminated connection".
pub const REASON_REMOTE_USER_TERMINATED: u8 = 0x13;

/// Advertising cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvMode {
    /// 80–100 ms, right after start or disconnect.
    Fast,
    /// 1–2.5 s, after the initial timeout.
    LowPower,
}

impl AdvMode {
    /// Advertising interval bounds, 0.625 ms units.
    pub const fn interval(self) -> (u16, u16) {
        match self {
            Self::Fast => (0x0080, 0x00A0),
            Self::LowPower => (0x0640, 0x0FA0),
        }
    }

    pub const fn state(self) -> GapState {
        match self {
            Self::Fast => GapState::AdvertisingFast,
            Self::LowPower => GapState::AdvertisingLowPower,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Payload buffers
// ───────────────────────────────────────────────────────────────

/// AD-structured buffers handed to the radio when advertising starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvPayload {
    local_name: heapless::Vec<u8, { MAX_ADV_NAME_LEN + 1 }>,
    service_uuids: heapless::Vec<u8, SERVICE_UUID_CAPACITY>,
    mfg_data: heapless::Vec<u8, MFG_DATA_CAPACITY>,
}

impl AdvPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every buffer from the configuration.
    pub fn from_config(config: &GapConfig) -> Result<Self> {
        let mut payload = Self::new();
        payload.set_local_name(&config.adv_name)?;
        match config.adv_service {
            ServiceUuid::Uuid16(uuid) => payload.set_service_uuid(&uuid.to_le_bytes())?,
            ServiceUuid::Uuid128(uuid) => payload.set_service_uuid(&uuid)?,
        }
        if !config.mfg_data.is_empty() {
            payload.set_manufacturer_data(&config.mfg_data)?;
        }
        Ok(payload)
    }

    pub fn set_local_name(&mut self, name: &str) -> Result<()> {
        self.local_name.clear();
        self.local_name
            .push(AD_TYPE_COMPLETE_LOCAL_NAME)
            .map_err(|_| GapError::PayloadOverflow)?;
        self.local_name
            .extend_from_slice(name.as_bytes())
            .map_err(|_| GapError::PayloadOverflow)
    }

    /// Set the advertised service; the AD type follows the UUID width.
    pub fn set_service_uuid(&mut self, uuid_le: &[u8]) -> Result<()> {
        let ad_type = match uuid_le.len() {
            2 => AD_TYPE_16_BIT_SERV_UUID,
            4 => AD_TYPE_32_BIT_SERV_UUID,
            16 => AD_TYPE_128_BIT_SERV_UUID_CMPLT_LIST,
            _ => return Err(GapError::Config("service UUID must be 2, 4 or 16 bytes")),
        };
        self.service_uuids.clear();
        self.service_uuids
            .push(ad_type)
            .map_err(|_| GapError::PayloadOverflow)?;
        self.service_uuids
            .extend_from_slice(uuid_le)
            .map_err(|_| GapError::PayloadOverflow)
    }

    /// Store `[len + 1, 0xFF, data…]`. Oversized data is an error, never
    /// truncated.
    pub fn set_manufacturer_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_MFG_DATA_LEN {
            return Err(GapError::PayloadOverflow);
        }
        self.mfg_data.clear();
        self.mfg_data
            .extend_from_slice(&[data.len() as u8 + 1, AD_TYPE_MANUFACTURER_SPECIFIC_DATA])
            .map_err(|_| GapError::PayloadOverflow)?;
        self.mfg_data
            .extend_from_slice(data)
            .map_err(|_| GapError::PayloadOverflow)
    }

    /// Local name prefixed with its AD type.
    pub fn local_name(&self) -> &[u8] {
        &self.local_name
    }

    /// Name characters only, as written to the GAP characteristic.
    pub fn device_name(&self) -> &[u8] {
        self.local_name.get(1..).unwrap_or(&[])
    }

    pub fn service_uuids(&self) -> &[u8] {
        &self.service_uuids
    }

    /// Scan-response block, empty when no manufacturer data is configured.
    pub fn manufacturer_data(&self) -> &[u8] {
        &self.mfg_data
    }

    /// Tracked manufacturer block length: 2 + data length, or 0 when unset.
    pub fn mfg_data_len(&self) -> usize {
        self.mfg_data.len()
    }
}

// ───────────────────────────────────────────────────────────────
// Start / stop (called with the state guard held)
// ───────────────────────────────────────────────────────────────

/// Enter (or re-enter) discoverable mode at the given cadence.
pub(crate) fn start<L: LinkController, H: GapEventHandler>(
    ctx: &mut GapContext<L, H>,
    mode: AdvMode,
) {
    let (interval_min, interval_max) = mode.interval();
    debug!("ADV: start {:?} from {:?}", mode, ctx.state);

    ctx.timer.disarm();

    if mode == AdvMode::LowPower
        && matches!(ctx.state, GapState::AdvertisingFast | GapState::AdvertisingLowPower)
    {
        match ctx.link.set_non_discoverable() {
            Ok(()) => debug!("ADV: set_non_discoverable ok"),
            Err(s) => error!("ADV: set_non_discoverable failed: {}", s),
        }
    }

    if ctx.payload.mfg_data_len() > 0 {
        if let Err(s) = ctx.link.set_scan_response_data(ctx.payload.manufacturer_data()) {
            error!("ADV: set_scan_response_data failed: {}", s);
        }
    }

    let params = DiscoverableParams {
        interval_min,
        interval_max,
        identity_address: IdentityAddress::Public,
        local_name: ctx.payload.local_name(),
        service_uuids: ctx.payload.service_uuids(),
    };
    if let Err(s) = ctx.link.set_discoverable(&params) {
        error!("ADV: set_discoverable failed: {}", s);
    }

    ctx.set_state(mode.state());
    ctx.emit(GapEvent::StartAdvertising);
    ctx.timer
        .arm(Duration::from_millis(u64::from(ctx.config.fast_adv_timeout_ms)));
}

/// Leave discoverable mode, dropping any live connection.
pub(crate) fn stop<L: LinkController, H: GapEventHandler>(ctx: &mut GapContext<L, H>) {
    debug!("ADV: stop from {:?}", ctx.state);
    if ctx.state > GapState::Idle {
        if ctx.state == GapState::Connected {
            if let Some(handle) = ctx.connection.take() {
                match ctx.link.terminate(handle, REASON_REMOTE_USER_TERMINATED) {
                    Ok(()) => debug!("ADV: terminate ok"),
                    Err(s) => error!("ADV: terminate failed: {}", s),
                }
            }
        }
        ctx.timer.disarm();
        match ctx.link.set_non_discoverable() {
            Ok(()) => debug!("ADV: set_non_discoverable ok"),
            Err(s) => error!("ADV: set_non_discoverable failed: {}", s),
        }
        ctx.set_state(GapState::Idle);
        info!("ADV: stopped");
    }
    ctx.emit(GapEvent::StopAdvertising);
}
