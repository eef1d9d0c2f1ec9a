//! Simulated Link-Controller for host runs.
//!
//! [`SimRadio`] accepts every command, logs it, and mirrors the radio-side
//! state into a [`SimProbe`] the caller keeps after handing the radio to
//! the controller. [`packets`] builds the HCI event packets a real radio
//! would deliver, so a host scenario can drive the dispatcher end to end.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::app::ports::{
    AuthRequirements, ConfigDataSlot, ConnParamRequest, ConnectionHandle, DiscoverableParams,
    GapServiceHandles, IoCapability, LinkController, LinkResult, PhyPair, PhyPreference,
};

/// Radio-side state visible to the simulation driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimRadioState {
    pub discoverable: bool,
    /// Advertising interval bounds last requested.
    pub adv_interval: Option<(u16, u16)>,
    pub scan_response: heapless::Vec<u8, 31>,
    pub terminated: Option<(ConnectionHandle, u8)>,
    pub last_param_request: Option<ConnParamRequest>,
    pub last_pass_key: Option<u32>,
    pub last_confirm: Option<bool>,
    pub security_requests: u32,
    pub commands: u32,
}

/// Shared view of a [`SimRadio`].
#[derive(Clone, Default)]
pub struct SimProbe {
    inner: Arc<Mutex<SimRadioState>>,
}

impl SimProbe {
    pub fn snapshot(&self) -> SimRadioState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimRadioState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimRadio {
    probe: SimProbe,
    ready: bool,
}

impl SimRadio {
    pub fn new() -> Self {
        Self {
            probe: SimProbe::default(),
            ready: true,
        }
    }

    /// Handle that stays valid after the radio moves into the controller.
    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }

    /// Radio that reports it has not finished booting.
    pub fn not_ready() -> Self {
        Self {
            probe: SimProbe::default(),
            ready: false,
        }
    }

    fn record(&self, f: impl FnOnce(&mut SimRadioState)) -> LinkResult<()> {
        let mut state = self.probe.lock();
        state.commands += 1;
        f(&mut state);
        Ok(())
    }
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkController for SimRadio {
    fn is_radio_ready(&self) -> bool {
        self.ready
    }

    fn write_config_data(&mut self, slot: ConfigDataSlot, data: &[u8]) -> LinkResult<()> {
        debug!("SIM: config data {:?} ({} bytes)", slot, data.len());
        self.record(|_| {})
    }

    fn set_tx_power(&mut self, high_power: bool, level: u8) -> LinkResult<()> {
        debug!("SIM: tx power hp={} level=0x{:02X}", high_power, level);
        self.record(|_| {})
    }

    fn gatt_init(&mut self) -> LinkResult<()> {
        self.record(|_| {})
    }

    fn gap_init(&mut self, device_name_len: u8) -> LinkResult<GapServiceHandles> {
        debug!("SIM: gap init, name length {}", device_name_len);
        self.record(|_| {})?;
        Ok(GapServiceHandles {
            service: 0x0001,
            device_name: 0x0003,
            appearance: 0x0005,
        })
    }

    fn update_char_value(&mut self, _: u16, characteristic: u16, value: &[u8]) -> LinkResult<()> {
        debug!("SIM: char 0x{:04X} <- {:02X?}", characteristic, value);
        self.record(|_| {})
    }

    fn set_default_phy(&mut self, tx: PhyPreference, rx: PhyPreference) -> LinkResult<()> {
        debug!("SIM: default PHY tx={:?} rx={:?}", tx, rx);
        self.record(|_| {})
    }

    fn set_io_capability(&mut self, capability: IoCapability) -> LinkResult<()> {
        debug!("SIM: io capability {:?}", capability);
        self.record(|_| {})
    }

    fn set_authentication_requirement(&mut self, req: &AuthRequirements) -> LinkResult<()> {
        debug!("SIM: auth requirement mitm={}", req.mitm_required);
        self.record(|_| {})
    }

    fn configure_whitelist(&mut self) -> LinkResult<()> {
        self.record(|_| {})
    }

    fn set_discoverable(&mut self, params: &DiscoverableParams<'_>) -> LinkResult<()> {
        debug!(
            "SIM: discoverable 0x{:04X}..0x{:04X}",
            params.interval_min, params.interval_max
        );
        let interval = (params.interval_min, params.interval_max);
        self.record(|s| {
            s.discoverable = true;
            s.adv_interval = Some(interval);
        })
    }

    fn set_non_discoverable(&mut self) -> LinkResult<()> {
        self.record(|s| s.discoverable = false)
    }

    fn set_scan_response_data(&mut self, data: &[u8]) -> LinkResult<()> {
        self.record(|s| {
            s.scan_response.clear();
            let _ = s.scan_response.extend_from_slice(data);
        })
    }

    fn terminate(&mut self, handle: ConnectionHandle, reason: u8) -> LinkResult<()> {
        debug!("SIM: terminate {:?} reason 0x{:02X}", handle, reason);
        self.record(|s| s.terminated = Some((handle, reason)))
    }

    fn connection_parameter_update_request(
        &mut self,
        _: ConnectionHandle,
        req: &ConnParamRequest,
    ) -> LinkResult<()> {
        let req = *req;
        self.record(|s| s.last_param_request = Some(req))
    }

    fn read_phy(&mut self, _: ConnectionHandle) -> LinkResult<PhyPair> {
        self.record(|_| {})?;
        Ok(PhyPair { tx: 2, rx: 2 })
    }

    fn pass_key_response(&mut self, _: ConnectionHandle, pin: u32) -> LinkResult<()> {
        self.record(|s| s.last_pass_key = Some(pin))
    }

    fn numeric_comparison_confirm(&mut self, _: ConnectionHandle, confirm: bool) -> LinkResult<()> {
        self.record(|s| s.last_confirm = Some(confirm))
    }

    fn allow_rebond(&mut self, _: ConnectionHandle) -> LinkResult<()> {
        self.record(|_| {})
    }

    fn peripheral_security_request(&mut self, _: ConnectionHandle) -> LinkResult<()> {
        self.record(|s| s.security_requests += 1)
    }
}

// ───────────────────────────────────────────────────────────────
// HCI packet builders
// ───────────────────────────────────────────────────────────────

/// HCI event packets as a radio would deliver them.
pub mod packets {
    use crate::app::ports::{ConnectionHandle, ConnectionParams};
    use crate::events::{code, le, vendor};

    /// Largest packet any builder produces, with headroom.
    pub type Packet = heapless::Vec<u8, 32>;

    struct Builder(Packet);

    impl Builder {
        fn new(evt: u8) -> Self {
            let mut p = Packet::new();
            let _ = p.extend_from_slice(&[evt, 0]);
            Self(p)
        }

        fn vendor(ecode: u16) -> Self {
            Self::new(code::VENDOR_SPECIFIC).u16(ecode)
        }

        fn le_meta(subevent: u8) -> Self {
            Self::new(code::LE_META).u8(subevent)
        }

        fn u8(mut self, v: u8) -> Self {
            let _ = self.0.push(v);
            self
        }

        fn u16(mut self, v: u16) -> Self {
            let _ = self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn u32(mut self, v: u32) -> Self {
            let _ = self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn handle(self, h: ConnectionHandle) -> Self {
            self.u16(h.0)
        }

        fn params(self, p: ConnectionParams) -> Self {
            self.u16(p.interval).u16(p.latency).u16(p.supervision_timeout)
        }

        fn finish(mut self) -> Packet {
            self.0[1] = (self.0.len() - 2) as u8;
            self.0
        }
    }

    pub fn disconnection_complete(handle: ConnectionHandle, reason: u8) -> Packet {
        Builder::new(code::DISCONNECTION_COMPLETE)
            .u8(0)
            .handle(handle)
            .u8(reason)
            .finish()
    }

    pub fn connection_complete(status: u8, handle: ConnectionHandle, params: ConnectionParams) -> Packet {
        let mut b = Builder::le_meta(le::CONNECTION_COMPLETE)
            .u8(status)
            .handle(handle)
            .u8(0x01) // role: peripheral
            .u8(0x00); // public peer address
        for byte in [0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22] {
            b = b.u8(byte);
        }
        b.params(params).u8(0x00).finish()
    }

    pub fn connection_update_complete(handle: ConnectionHandle, params: ConnectionParams) -> Packet {
        Builder::le_meta(le::CONNECTION_UPDATE_COMPLETE)
            .u8(0)
            .handle(handle)
            .params(params)
            .finish()
    }

    pub fn phy_update_complete(status: u8, handle: ConnectionHandle) -> Packet {
        Builder::le_meta(le::PHY_UPDATE_COMPLETE)
            .u8(status)
            .handle(handle)
            .u8(2)
            .u8(2)
            .finish()
    }

    pub fn pass_key_request(handle: ConnectionHandle) -> Packet {
        Builder::vendor(vendor::GAP_PASS_KEY_REQ).handle(handle).finish()
    }

    pub fn numeric_comparison(handle: ConnectionHandle, value: u32) -> Packet {
        Builder::vendor(vendor::GAP_NUMERIC_COMPARISON_VALUE)
            .handle(handle)
            .u32(value)
            .finish()
    }

    pub fn pairing_complete(handle: ConnectionHandle, status: u8, reason: u8) -> Packet {
        Builder::vendor(vendor::GAP_PAIRING_COMPLETE)
            .handle(handle)
            .u8(status)
            .u8(reason)
            .finish()
    }

    pub fn mtu_exchange(handle: ConnectionHandle, server_rx_mtu: u16) -> Packet {
        Builder::vendor(vendor::ATT_EXCHANGE_MTU_RESP)
            .handle(handle)
            .u16(server_rx_mtu)
            .finish()
    }

    pub fn bond_lost() -> Packet {
        Builder::vendor(vendor::GAP_BOND_LOST).finish()
    }

    pub fn param_update_response(handle: ConnectionHandle, result: u16) -> Packet {
        Builder::vendor(vendor::L2CAP_CONNECTION_UPDATE_RESP)
            .handle(handle)
            .u16(result)
            .finish()
    }
}
