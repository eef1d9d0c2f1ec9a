//! Advertising, connection and pairing flows through a running controller.

use blegap::adapters::sim::packets;
use blegap::app::events::GapEvent;
use blegap::app::ports::{ConnParamRequest, ConnectionHandle, ConnectionParams};
use blegap::config::{GapConfig, PairingMethod};
use blegap::gap::advertising::AD_TYPE_MANUFACTURER_SPECIFIC_DATA;
use blegap::{Gap, GapState};

use crate::mock_link::{
    EventLog, LinkCall, LinkLog, MockLink, Op, RecordingHandler, serial, test_config, wait_for,
};

const PEER: ConnectionHandle = ConnectionHandle(0x0040);

fn params(interval: u16) -> ConnectionParams {
    ConnectionParams {
        interval,
        latency: 0,
        supervision_timeout: 400,
    }
}

fn bring_up(config: GapConfig, answer: bool) -> (Gap<MockLink, RecordingHandler>, LinkLog, EventLog) {
    let (link, log) = MockLink::new();
    let (handler, events) = RecordingHandler::new(answer);
    let gap = Gap::init(config, link, handler).unwrap();
    log.clear();
    (gap, log, events)
}

fn advertising(gap: &Gap<MockLink, RecordingHandler>) {
    gap.start_advertising();
    assert!(wait_for(|| gap.get_state() == GapState::AdvertisingFast));
}

// ── Advertising ───────────────────────────────────────────────

#[test]
fn start_enters_fast_advertising() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);

    let Some(LinkCall::Discoverable {
        interval,
        local_name,
        service_uuids,
    }) = log.last(Op::Discoverable)
    else {
        panic!("radio never made discoverable");
    };
    assert_eq!(interval, (0x0080, 0x00A0));
    assert_eq!(local_name, b"\x09BleGap".to_vec());
    assert_eq!(service_uuids, vec![0x02, 0x80, 0x30]);
    assert_eq!(log.count(Op::ScanResponse), 0);
    assert_eq!(events.all(), vec![GapEvent::StartAdvertising]);
}

#[test]
fn manufacturer_data_goes_into_scan_response() {
    let _g = serial();
    let mut config = test_config();
    config.mfg_data.extend_from_slice(&[0x34, 0x12, 0x01]).unwrap();
    let (gap, log, _) = bring_up(config, true);
    advertising(&gap);

    assert_eq!(
        log.last(Op::ScanResponse),
        Some(LinkCall::ScanResponse(vec![
            4,
            AD_TYPE_MANUFACTURER_SPECIFIC_DATA,
            0x34,
            0x12,
            0x01
        ]))
    );
}

#[test]
fn repeated_start_is_ignored() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);
    gap.start_advertising();
    gap.start_advertising();
    std::thread::sleep(std::time::Duration::from_millis(20));

    assert_eq!(gap.get_state(), GapState::AdvertisingFast);
    assert_eq!(log.count(Op::Discoverable), 1);
    assert_eq!(events.count(GapEvent::StartAdvertising), 1);
}

#[test]
fn stop_returns_to_idle() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);

    gap.stop_advertising();
    assert!(wait_for(|| gap.get_state() == GapState::Idle));
    assert!(wait_for(|| events.contains(GapEvent::StopAdvertising)));
    assert_eq!(log.count(Op::NonDiscoverable), 1);
    assert_eq!(log.count(Op::Terminate), 0);
}

#[test]
fn stop_from_idle_does_nothing() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    gap.stop_advertising();
    std::thread::sleep(std::time::Duration::from_millis(20));

    assert_eq!(gap.get_state(), GapState::Idle);
    assert!(log.calls().is_empty());
    assert!(events.all().is_empty());
}

#[test]
fn fast_advertising_downgrades_after_timeout() {
    let _g = serial();
    let mut config = test_config();
    config.fast_adv_timeout_ms = 50;
    let (gap, log, events) = bring_up(config, true);
    advertising(&gap);

    assert!(wait_for(|| gap.get_state() == GapState::AdvertisingLowPower));
    let ops = log.ops();
    let non_disc = ops.iter().position(|op| *op == Op::NonDiscoverable).unwrap();
    let second_disc = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == Op::Discoverable)
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    assert!(non_disc < second_disc);
    let Some(LinkCall::Discoverable { interval, .. }) = log.last(Op::Discoverable) else {
        panic!("no low-power discoverable command");
    };
    assert_eq!(interval, (0x0640, 0x0FA0));
    assert!(events.count(GapEvent::StartAdvertising) >= 2);

    gap.stop_advertising();
    assert!(wait_for(|| gap.get_state() == GapState::Idle));
}

// ── Connection ────────────────────────────────────────────────

#[test]
fn connection_stops_the_advertising_timer() {
    let _g = serial();
    let mut config = test_config();
    config.fast_adv_timeout_ms = 80;
    let (gap, log, _) = bring_up(config, true);
    advertising(&gap);

    gap.dispatcher()
        .dispatch(&packets::connection_complete(0, PEER, params(0x18)));
    assert_eq!(gap.get_state(), GapState::Connected);
    std::thread::sleep(std::time::Duration::from_millis(200));

    assert_eq!(gap.get_state(), GapState::Connected);
    assert_eq!(log.count(Op::Discoverable), 1);
    assert_eq!(
        log.last(Op::SecurityRequest),
        Some(LinkCall::SecurityRequest(PEER))
    );
}

#[test]
fn failed_connection_changes_nothing() {
    let _g = serial();
    let (gap, log, _) = bring_up(test_config(), true);
    advertising(&gap);

    gap.dispatcher()
        .dispatch(&packets::connection_complete(0x3E, PEER, params(0x18)));
    assert_eq!(gap.get_state(), GapState::AdvertisingFast);
    assert_eq!(log.count(Op::SecurityRequest), 0);
}

#[test]
fn just_works_skips_security_request() {
    let _g = serial();
    let mut config = test_config();
    config.pairing_method = PairingMethod::None;
    let (gap, log, _) = bring_up(config, true);
    advertising(&gap);

    gap.dispatcher()
        .dispatch(&packets::connection_complete(0, PEER, params(0x18)));
    assert_eq!(gap.get_state(), GapState::Connected);
    assert_eq!(log.count(Op::SecurityRequest), 0);
}

#[test]
fn too_fast_central_is_asked_for_the_minimum() {
    let _g = serial();
    let (gap, log, _) = bring_up(test_config(), true);
    advertising(&gap);
    let radio = gap.dispatcher();

    radio.dispatch(&packets::connection_complete(0, PEER, params(0x0C)));
    assert_eq!(
        log.last(Op::ParamUpdate),
        Some(LinkCall::ParamUpdate(
            PEER,
            ConnParamRequest {
                interval_min: 0x18,
                interval_max: 0x18,
                latency: 0,
                supervision_timeout: 400,
            }
        ))
    );

    // Still too fast: the window widens to the configured maximum.
    radio.dispatch(&packets::connection_update_complete(PEER, params(0x10)));
    let Some(LinkCall::ParamUpdate(_, req)) = log.last(Op::ParamUpdate) else {
        panic!("no second request");
    };
    assert_eq!((req.interval_min, req.interval_max), (0x18, 0x24));

    radio.dispatch(&packets::connection_update_complete(PEER, params(0x20)));
    assert_eq!(log.count(Op::ParamUpdate), 2);
}

#[test]
fn slow_interval_is_only_challenged_once_secure() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);
    let radio = gap.dispatcher();

    radio.dispatch(&packets::connection_complete(0, PEER, params(0x50)));
    assert_eq!(log.count(Op::ParamUpdate), 0);

    radio.dispatch(&packets::pairing_complete(PEER, 0, 0));
    assert!(events.contains(GapEvent::Connected));
    let Some(LinkCall::ParamUpdate(_, req)) = log.last(Op::ParamUpdate) else {
        panic!("secure link kept a slow interval");
    };
    assert_eq!((req.interval_min, req.interval_max), (0x18, 0x18));
}

#[test]
fn stop_while_connected_terminates_the_link() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);
    let radio = gap.dispatcher();
    radio.dispatch(&packets::connection_complete(0, PEER, params(0x18)));

    gap.stop_advertising();
    assert!(wait_for(|| gap.get_state() == GapState::Idle));
    assert_eq!(log.last(Op::Terminate), Some(LinkCall::Terminate(PEER, 0x13)));

    // The radio confirms the drop; advertising stays off.
    log.clear();
    radio.dispatch(&packets::disconnection_complete(PEER, 0x16));
    assert_eq!(gap.get_state(), GapState::Idle);
    assert_eq!(log.count(Op::Discoverable), 0);
    assert!(events.contains(GapEvent::Disconnected));
}

#[test]
fn peer_disconnect_restarts_fast_advertising() {
    let _g = serial();
    let mut config = test_config();
    config.fast_adv_timeout_ms = 50;
    let (gap, log, events) = bring_up(config, true);
    advertising(&gap);
    let radio = gap.dispatcher();
    radio.dispatch(&packets::connection_complete(0, PEER, params(0x18)));

    log.clear();
    radio.dispatch(&packets::disconnection_complete(PEER, 0x13));
    assert_eq!(gap.get_state(), GapState::AdvertisingFast);
    let Some(LinkCall::Discoverable { interval, .. }) = log.last(Op::Discoverable) else {
        panic!("advertising not restarted");
    };
    assert_eq!(interval, (0x0080, 0x00A0));
    assert_eq!(events.all().last(), Some(&GapEvent::Disconnected));

    // The restarted cycle downgrades again.
    assert!(wait_for(|| gap.get_state() == GapState::AdvertisingLowPower));
    gap.stop_advertising();
    assert!(wait_for(|| gap.get_state() == GapState::Idle));
}

#[test]
fn disconnect_for_another_handle_keeps_the_link_but_drops_security() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);
    let radio = gap.dispatcher();
    radio.dispatch(&packets::connection_complete(0, PEER, params(0x50)));
    radio.dispatch(&packets::pairing_complete(PEER, 0, 0));
    assert_eq!(log.count(Op::ParamUpdate), 1);

    radio.dispatch(&packets::disconnection_complete(ConnectionHandle(0x0041), 0x08));
    assert_eq!(gap.get_state(), GapState::Connected);
    assert_eq!(events.all().last(), Some(&GapEvent::Disconnected));
    assert_eq!(log.count(Op::Discoverable), 1);

    // No longer secure: the slow interval is accepted without a challenge.
    radio.dispatch(&packets::connection_update_complete(PEER, params(0x50)));
    assert_eq!(log.count(Op::ParamUpdate), 1);
}

// ── Pairing and link events ───────────────────────────────────

#[test]
fn pass_key_request_shows_and_answers_the_same_pin() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    gap.dispatcher().dispatch(&packets::pass_key_request(PEER));

    let Some(LinkCall::PassKey(handle, pin)) = log.last(Op::PassKey) else {
        panic!("no pass key response");
    };
    assert_eq!(handle, PEER);
    assert!(pin <= 999_999);
    assert_eq!(events.all(), vec![GapEvent::PinCodeShow { pin }]);
}

#[test]
fn numeric_comparison_follows_the_application() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), false);
    gap.dispatcher()
        .dispatch(&packets::numeric_comparison(PEER, 123_456));

    assert_eq!(
        events.all(),
        vec![GapEvent::PinCodeVerify { pin: 123_456 }]
    );
    assert_eq!(
        log.last(Op::NumericConfirm),
        Some(LinkCall::NumericConfirm(PEER, false))
    );
}

#[test]
fn pairing_failure_terminates_with_auth_failure() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    advertising(&gap);
    let radio = gap.dispatcher();
    radio.dispatch(&packets::connection_complete(0, PEER, params(0x18)));

    radio.dispatch(&packets::pairing_complete(PEER, 0x01, 0x05));
    assert_eq!(log.last(Op::Terminate), Some(LinkCall::Terminate(PEER, 0x05)));
    assert!(!events.contains(GapEvent::Connected));
}

#[test]
fn bond_lost_allows_rebond_on_live_link() {
    let _g = serial();
    let (gap, log, _) = bring_up(test_config(), true);
    let radio = gap.dispatcher();
    radio.dispatch(&packets::bond_lost());
    assert_eq!(log.count(Op::AllowRebond), 0);

    advertising(&gap);
    radio.dispatch(&packets::connection_complete(0, PEER, params(0x18)));
    radio.dispatch(&packets::bond_lost());
    assert_eq!(log.last(Op::AllowRebond), Some(LinkCall::AllowRebond(PEER)));
}

#[test]
fn mtu_exchange_reports_att_payload() {
    let _g = serial();
    let (gap, _, events) = bring_up(test_config(), true);
    gap.dispatcher().dispatch(&packets::mtu_exchange(PEER, 247));
    assert_eq!(events.all(), vec![GapEvent::UpdateMtu { size: 244 }]);
}

#[test]
fn phy_update_reads_back_the_phy() {
    let _g = serial();
    let (gap, log, _) = bring_up(test_config(), true);
    gap.dispatcher()
        .dispatch(&packets::phy_update_complete(0, PEER));
    assert_eq!(log.last(Op::ReadPhy), Some(LinkCall::ReadPhy(PEER)));
}

#[test]
fn malformed_and_informational_packets_change_nothing() {
    let _g = serial();
    let (gap, log, events) = bring_up(test_config(), true);
    let radio = gap.dispatcher();
    radio.dispatch(&[]);
    radio.dispatch(&[0x3E, 0x05, 0x01]);
    radio.dispatch(&packets::param_update_response(PEER, 0));
    radio.dispatch(&packets::param_update_response(PEER, 1));

    assert_eq!(gap.get_state(), GapState::Idle);
    assert!(log.calls().is_empty());
    assert!(events.all().is_empty());
}
