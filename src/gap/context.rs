//! Runtime state shared by the worker and the event dispatcher.
//!
//! `GapContext` lives behind the single state guard. Every advertising,
//! negotiation and pairing step takes `&mut GapContext`, so holding the
//! guard is the only way to touch it.

use log::{debug, error, info};
use rand_core::{OsRng, RngCore};

use crate::app::events::GapEvent;
use crate::app::ports::{
    ConfigDataSlot, ConnectionHandle, ConnectionParams, GapEventHandler, GapServiceHandles,
    LinkController, PhyPreference,
};
use crate::config::GapConfig;
use crate::error::Result;

use super::GapState;
use super::advertising::AdvPayload;
use super::pairing;
use super::timer::AdvTimer;

/// PA table index for 0 dBm.
const TX_POWER_0_DBM: u8 = 0x19;

pub struct GapContext<L, H> {
    pub(crate) config: GapConfig,
    pub(crate) link: L,
    handler: H,

    pub(crate) state: GapState,
    /// `Some` iff `state == Connected`.
    pub(crate) connection: Option<ConnectionHandle>,
    pub(crate) conn_params: ConnectionParams,
    pub(crate) secure: bool,
    pub(crate) negotiation_round: u8,
    /// Cleared by `stop_advertising`/`shutdown`; gates the restart after a
    /// disconnect.
    pub(crate) enable_adv: bool,

    pub(crate) payload: AdvPayload,
    pub(crate) service: GapServiceHandles,
    pub(crate) timer: AdvTimer,
}

impl<L: LinkController, H: GapEventHandler> GapContext<L, H> {
    pub(crate) fn new(
        config: GapConfig,
        payload: AdvPayload,
        link: L,
        handler: H,
        timer: AdvTimer,
    ) -> Self {
        Self {
            config,
            link,
            handler,
            state: GapState::Idle,
            connection: None,
            conn_params: ConnectionParams::default(),
            secure: false,
            negotiation_round: 0,
            enable_adv: false,
            payload,
            service: GapServiceHandles::default(),
            timer,
        }
    }

    /// Deliver an event to the application; returns the handler's answer.
    pub(crate) fn emit(&mut self, event: GapEvent) -> bool {
        debug!("GAP: emit {:?}", event);
        self.handler.on_event(event)
    }

    pub(crate) fn set_state(&mut self, next: GapState) {
        if self.state != next {
            debug!("GAP: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// One-time radio setup.
    ///
    /// Security, address and GATT failures abort init. Characteristic
    /// updates and PHY preference are best effort.
    pub(crate) fn setup_link(&mut self) -> Result<()> {
        let mac = self.config.mac_address;
        self.link.write_config_data(ConfigDataSlot::PublicAddress, &mac)?;

        let mut random_addr = [0u8; 6];
        OsRng.fill_bytes(&mut random_addr);
        // Static random addresses carry 0b11 in the two top bits.
        random_addr[5] |= 0xC0;
        self.link
            .write_config_data(ConfigDataSlot::StaticRandomAddress, &random_addr)?;

        let keys = self.config.identity_keys;
        self.link
            .write_config_data(ConfigDataSlot::IdentityRootKey, &keys.irk)?;
        self.link
            .write_config_data(ConfigDataSlot::EncryptionRootKey, &keys.erk)?;

        self.link.set_tx_power(true, TX_POWER_0_DBM)?;
        self.link.gatt_init()?;

        let name_len = self.payload.device_name().len() as u8;
        self.service = self.link.gap_init(name_len)?;

        let svc = self.service;
        if let Err(s) =
            self.link
                .update_char_value(svc.service, svc.device_name, self.payload.device_name())
        {
            error!("GAP: failed updating name characteristic: {}", s);
        }
        let appearance = self.config.appearance.to_le_bytes();
        if let Err(s) = self
            .link
            .update_char_value(svc.service, svc.appearance, &appearance)
        {
            error!("GAP: failed updating appearance characteristic: {}", s);
        }

        if let Err(s) = self
            .link
            .set_default_phy(PhyPreference::Le2M, PhyPreference::Le2M)
        {
            error!("GAP: set default PHY failed: {}", s);
        }

        let (capability, auth) =
            pairing::auth_profile(self.config.pairing_method, self.config.bonding_mode);
        self.link.set_io_capability(capability)?;
        self.link.set_authentication_requirement(&auth)?;
        self.link.configure_whitelist()?;

        info!(
            "GAP: link ready (pairing={:?}, bonding={:?})",
            self.config.pairing_method, self.config.bonding_mode
        );
        Ok(())
    }
}
