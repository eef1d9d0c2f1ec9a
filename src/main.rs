//! BleGap host simulation: drives the GAP controller against a simulated
//! radio through one complete peripheral session.
//!
//! ```text
//! ┌──────────────┐  packets   ┌──────────────────┐  commands  ┌──────────┐
//! │  scenario    │──────────▶│   Gap controller  │──────────▶│ SimRadio │
//! │  (this file) │           │ worker · timer ·  │           └──────────┘
//! └──────────────┘           │ dispatcher        │──events──▶ LogEventHandler
//!                            └──────────────────┘
//! ```
//!
//! Usage: `blegap-sim [config.json | config.bin]`. A `.json` file is read
//! as JSON, anything else as postcard. Without a file, a default
//! configuration with freshly generated root keys is used.
#![deny(unused_must_use)]

#[cfg(target_os = "espidf")]
fn main() {
    esp_idf_sys::link_patches();
    log::warn!("blegap-sim drives a simulated radio and runs on the host only");
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::thread;
    use std::time::Duration;

    use anyhow::{Context, Result, bail};
    use log::info;
    use rand_core::{OsRng, RngCore};

    use blegap::adapters::device_id;
    use blegap::adapters::log_sink::LogEventHandler;
    use blegap::adapters::sim::{SimRadio, packets};
    use blegap::app::ports::{ConnectionHandle, ConnectionParams};
    use blegap::config::{GapConfig, IdentityKeys};
    use blegap::{Gap, GapState};

    const PEER: ConnectionHandle = ConnectionHandle(0x0001);

    /// Time for the worker to pick up a queued command.
    const SETTLE: Duration = Duration::from_millis(50);

    fn load_config() -> Result<GapConfig> {
        if let Some(path) = std::env::args().nth(1) {
            let raw = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
            let config = if path.ends_with(".json") {
                GapConfig::from_json(&raw)
            } else {
                GapConfig::from_postcard(&raw)
            };
            return config.with_context(|| format!("loading {path}"));
        }
        let mac = device_id::read_mac();
        let mut keys = IdentityKeys::default();
        OsRng.fill_bytes(&mut keys.irk);
        OsRng.fill_bytes(&mut keys.erk);
        let config = GapConfig {
            mac_address: mac,
            adv_name: device_id::advertised_name("BleGap", &mac),
            identity_keys: keys,
            ..GapConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn expect_state<L, H>(gap: &Gap<L, H>, want: GapState) -> Result<()>
    where
        L: blegap::app::ports::LinkController,
        H: blegap::app::ports::GapEventHandler,
    {
        let got = gap.get_state();
        if got != want {
            bail!("expected {:?}, controller is {:?}", want, got);
        }
        info!("SIM: state {:?}", got);
        Ok(())
    }

    pub fn run() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        info!("BleGap simulator v{}", env!("CARGO_PKG_VERSION"));

        let config = load_config()?;
        let radio = SimRadio::new();
        let probe = radio.probe();
        let mut gap = Gap::init(config, radio, LogEventHandler::new(true))?;
        let radio_events = gap.dispatcher();
        expect_state(&gap, GapState::Idle)?;

        // ── Advertise ─────────────────────────────────────────
        gap.start_advertising();
        thread::sleep(SETTLE);
        expect_state(&gap, GapState::AdvertisingFast)?;
        info!("SIM: radio interval {:04X?}", probe.snapshot().adv_interval);

        // ── Connect with a too-fast interval ──────────────────
        let params = ConnectionParams {
            interval: 0x0C,
            latency: 0,
            supervision_timeout: 400,
        };
        radio_events.dispatch(&packets::connection_complete(0, PEER, params));
        expect_state(&gap, GapState::Connected)?;
        if let Some(req) = probe.snapshot().last_param_request {
            info!(
                "SIM: controller asked for 0x{:04X}..0x{:04X}",
                req.interval_min, req.interval_max
            );
        }
        radio_events.dispatch(&packets::mtu_exchange(PEER, 247));

        // ── Pair ──────────────────────────────────────────────
        radio_events.dispatch(&packets::pass_key_request(PEER));
        radio_events.dispatch(&packets::numeric_comparison(PEER, 123_456));
        radio_events.dispatch(&packets::pairing_complete(PEER, 0, 0));
        let agreed = ConnectionParams {
            interval: 0x18,
            ..params
        };
        radio_events.dispatch(&packets::connection_update_complete(PEER, agreed));
        radio_events.dispatch(&packets::phy_update_complete(0, PEER));
        gap.emit_beacon_status(true);

        // ── Peer leaves; advertising resumes ──────────────────
        radio_events.dispatch(&packets::disconnection_complete(PEER, 0x13));
        expect_state(&gap, GapState::AdvertisingFast)?;

        // ── Stop and tear down ────────────────────────────────
        gap.stop_advertising();
        thread::sleep(SETTLE);
        expect_state(&gap, GapState::Idle)?;
        gap.emit_beacon_status(false);

        gap.shutdown();
        expect_state(&gap, GapState::Uninitialized)?;
        radio_events.dispatch(&packets::bond_lost());

        let radio = probe.snapshot();
        info!(
            "SIM: done, {} radio commands, discoverable={}",
            radio.commands, radio.discoverable
        );
        Ok(())
    }
}
