//! Mock Link-Controller and recording event handler for integration tests.
//!
//! Records every radio command so tests can assert on the full command
//! history, and lets a test make selected commands fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use blegap::app::events::GapEvent;
use blegap::app::ports::{
    AuthRequirements, ConfigDataSlot, ConnParamRequest, ConnectionHandle, DiscoverableParams,
    GapEventHandler, GapServiceHandles, IoCapability, LinkController, LinkResult, PhyPair,
    PhyPreference,
};
use blegap::config::{GapConfig, IdentityKeys};
use blegap::error::LinkStatus;

// ── Serialisation of controller tests ─────────────────────────

static SERIAL: Mutex<()> = Mutex::new(());

/// Only one controller may exist per process; tests that create one hold
/// this guard for their whole body.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Link call record ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    WriteConfig,
    TxPower,
    GattInit,
    GapInit,
    UpdateChar,
    DefaultPhy,
    IoCapability,
    AuthRequirement,
    Whitelist,
    Discoverable,
    NonDiscoverable,
    ScanResponse,
    Terminate,
    ParamUpdate,
    ReadPhy,
    PassKey,
    NumericConfirm,
    AllowRebond,
    SecurityRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    WriteConfig(ConfigDataSlot, Vec<u8>),
    TxPower { high_power: bool, level: u8 },
    GattInit,
    GapInit { name_len: u8 },
    UpdateChar { characteristic: u16, value: Vec<u8> },
    DefaultPhy(PhyPreference, PhyPreference),
    IoCapability(IoCapability),
    AuthRequirement(AuthRequirements),
    Whitelist,
    Discoverable {
        interval: (u16, u16),
        local_name: Vec<u8>,
        service_uuids: Vec<u8>,
    },
    NonDiscoverable,
    ScanResponse(Vec<u8>),
    Terminate(ConnectionHandle, u8),
    ParamUpdate(ConnectionHandle, ConnParamRequest),
    ReadPhy(ConnectionHandle),
    PassKey(ConnectionHandle, u32),
    NumericConfirm(ConnectionHandle, bool),
    AllowRebond(ConnectionHandle),
    SecurityRequest(ConnectionHandle),
}

impl LinkCall {
    pub fn op(&self) -> Op {
        match self {
            Self::WriteConfig(..) => Op::WriteConfig,
            Self::TxPower { .. } => Op::TxPower,
            Self::GattInit => Op::GattInit,
            Self::GapInit { .. } => Op::GapInit,
            Self::UpdateChar { .. } => Op::UpdateChar,
            Self::DefaultPhy(..) => Op::DefaultPhy,
            Self::IoCapability(_) => Op::IoCapability,
            Self::AuthRequirement(_) => Op::AuthRequirement,
            Self::Whitelist => Op::Whitelist,
            Self::Discoverable { .. } => Op::Discoverable,
            Self::NonDiscoverable => Op::NonDiscoverable,
            Self::ScanResponse(_) => Op::ScanResponse,
            Self::Terminate(..) => Op::Terminate,
            Self::ParamUpdate(..) => Op::ParamUpdate,
            Self::ReadPhy(_) => Op::ReadPhy,
            Self::PassKey(..) => Op::PassKey,
            Self::NumericConfirm(..) => Op::NumericConfirm,
            Self::AllowRebond(_) => Op::AllowRebond,
            Self::SecurityRequest(_) => Op::SecurityRequest,
        }
    }
}

// ── MockLink ──────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    calls: Vec<LinkCall>,
    failures: HashMap<Op, LinkStatus>,
}

/// Inspection handle kept by the test after the link moves into the
/// controller.
#[derive(Clone, Default)]
pub struct LinkLog {
    inner: Arc<Mutex<Recorder>>,
}

#[allow(dead_code)]
impl LinkLog {
    pub fn calls(&self) -> Vec<LinkCall> {
        self.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().calls.iter().map(LinkCall::op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn last(&self, op: Op) -> Option<LinkCall> {
        self.lock().calls.iter().rev().find(|c| c.op() == op).cloned()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }

    /// Make every later `op` command fail with `status`.
    pub fn fail(&self, op: Op, status: LinkStatus) {
        self.lock().failures.insert(op, status);
    }

    fn lock(&self) -> MutexGuard<'_, Recorder> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MockLink {
    log: LinkLog,
    pub ready: bool,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> (Self, LinkLog) {
        let log = LinkLog::default();
        (
            Self {
                log: log.clone(),
                ready: true,
            },
            log,
        )
    }

    pub fn not_ready() -> Self {
        Self {
            log: LinkLog::default(),
            ready: false,
        }
    }

    fn record(&self, call: LinkCall) -> LinkResult<()> {
        let mut rec = self.log.lock();
        let op = call.op();
        rec.calls.push(call);
        match rec.failures.get(&op) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

impl LinkController for MockLink {
    fn is_radio_ready(&self) -> bool {
        self.ready
    }

    fn write_config_data(&mut self, slot: ConfigDataSlot, data: &[u8]) -> LinkResult<()> {
        self.record(LinkCall::WriteConfig(slot, data.to_vec()))
    }

    fn set_tx_power(&mut self, high_power: bool, level: u8) -> LinkResult<()> {
        self.record(LinkCall::TxPower { high_power, level })
    }

    fn gatt_init(&mut self) -> LinkResult<()> {
        self.record(LinkCall::GattInit)
    }

    fn gap_init(&mut self, device_name_len: u8) -> LinkResult<GapServiceHandles> {
        self.record(LinkCall::GapInit {
            name_len: device_name_len,
        })?;
        Ok(GapServiceHandles {
            service: 0x10,
            device_name: 0x11,
            appearance: 0x12,
        })
    }

    fn update_char_value(&mut self, _: u16, characteristic: u16, value: &[u8]) -> LinkResult<()> {
        self.record(LinkCall::UpdateChar {
            characteristic,
            value: value.to_vec(),
        })
    }

    fn set_default_phy(&mut self, tx: PhyPreference, rx: PhyPreference) -> LinkResult<()> {
        self.record(LinkCall::DefaultPhy(tx, rx))
    }

    fn set_io_capability(&mut self, capability: IoCapability) -> LinkResult<()> {
        self.record(LinkCall::IoCapability(capability))
    }

    fn set_authentication_requirement(&mut self, req: &AuthRequirements) -> LinkResult<()> {
        self.record(LinkCall::AuthRequirement(*req))
    }

    fn configure_whitelist(&mut self) -> LinkResult<()> {
        self.record(LinkCall::Whitelist)
    }

    fn set_discoverable(&mut self, params: &DiscoverableParams<'_>) -> LinkResult<()> {
        self.record(LinkCall::Discoverable {
            interval: (params.interval_min, params.interval_max),
            local_name: params.local_name.to_vec(),
            service_uuids: params.service_uuids.to_vec(),
        })
    }

    fn set_non_discoverable(&mut self) -> LinkResult<()> {
        self.record(LinkCall::NonDiscoverable)
    }

    fn set_scan_response_data(&mut self, data: &[u8]) -> LinkResult<()> {
        self.record(LinkCall::ScanResponse(data.to_vec()))
    }

    fn terminate(&mut self, handle: ConnectionHandle, reason: u8) -> LinkResult<()> {
        self.record(LinkCall::Terminate(handle, reason))
    }

    fn connection_parameter_update_request(
        &mut self,
        handle: ConnectionHandle,
        req: &ConnParamRequest,
    ) -> LinkResult<()> {
        self.record(LinkCall::ParamUpdate(handle, *req))
    }

    fn read_phy(&mut self, handle: ConnectionHandle) -> LinkResult<PhyPair> {
        self.record(LinkCall::ReadPhy(handle))?;
        Ok(PhyPair { tx: 2, rx: 2 })
    }

    fn pass_key_response(&mut self, handle: ConnectionHandle, pin: u32) -> LinkResult<()> {
        self.record(LinkCall::PassKey(handle, pin))
    }

    fn numeric_comparison_confirm(&mut self, handle: ConnectionHandle, confirm: bool) -> LinkResult<()> {
        self.record(LinkCall::NumericConfirm(handle, confirm))
    }

    fn allow_rebond(&mut self, handle: ConnectionHandle) -> LinkResult<()> {
        self.record(LinkCall::AllowRebond(handle))
    }

    fn peripheral_security_request(&mut self, handle: ConnectionHandle) -> LinkResult<()> {
        self.record(LinkCall::SecurityRequest(handle))
    }
}

// ── Recording handler ─────────────────────────────────────────

/// Event handler that records every event and answers verify prompts
/// with a fixed value.
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<GapEvent>>>,
    answer: bool,
}

#[derive(Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GapEvent>>>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn all(&self) -> Vec<GapEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: GapEvent) -> usize {
        self.all().iter().filter(|e| **e == event).count()
    }

    pub fn contains(&self, event: GapEvent) -> bool {
        self.count(event) > 0
    }
}

impl RecordingHandler {
    pub fn new(answer: bool) -> (Self, EventLog) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
                answer,
            },
            EventLog { events },
        )
    }
}

impl GapEventHandler for RecordingHandler {
    fn on_event(&mut self, event: GapEvent) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.answer
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub fn test_config() -> GapConfig {
    GapConfig {
        mac_address: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
        identity_keys: IdentityKeys {
            irk: [0xA5; 16],
            erk: [0x5A; 16],
        },
        ..GapConfig::default()
    }
}

/// Poll `cond` until it holds or a second passes.
pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
