//! Event dispatcher: the Link-Controller's way into the controller.
//!
//! The radio's delivery context calls [`EventDispatcher::dispatch`] with
//! each raw HCI event packet. Decoding happens before the state guard is
//! taken; routing and every side effect happen under it.

use std::sync::Weak;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::app::events::GapEvent;
use crate::app::ports::{GapEventHandler, LinkController};
use crate::config::PairingMethod;
use crate::events::InboundEvent;

use super::advertising::{self, AdvMode};
use super::context::GapContext;
use super::{GapState, Shared, negotiator, pairing};

/// Settle time between a disconnect and restarting advertising.
pub const DISCONNECT_SETTLE: Duration = Duration::from_micros(666 + 666);

/// Usable ATT payload is the MTU minus the 3-byte ATT header.
const ATT_HEADER_LEN: u16 = 3;

/// Handle for feeding radio notifications into a running controller.
///
/// Cheap to clone. Outlives the controller safely: once it shuts down,
/// dispatched events are dropped with a warning.
pub struct EventDispatcher<L, H> {
    shared: Weak<Shared<L, H>>,
}

impl<L, H> Clone for EventDispatcher<L, H> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<L: LinkController, H: GapEventHandler> EventDispatcher<L, H> {
    pub(crate) fn new(shared: Weak<Shared<L, H>>) -> Self {
        Self { shared }
    }

    /// Decode and handle one HCI event packet. Malformed packets are
    /// logged and dropped.
    pub fn dispatch(&self, packet: &[u8]) {
        match InboundEvent::decode(packet) {
            Ok(event) => self.dispatch_event(event),
            Err(e) => warn!("GAP: dropping malformed event ({} bytes): {}", packet.len(), e),
        }
    }

    /// Handle an already-decoded event.
    pub fn dispatch_event(&self, event: InboundEvent) {
        let Some(shared) = self.shared.upgrade() else {
            warn!("GAP: event after shutdown ignored: {:?}", event);
            return;
        };
        let mut ctx = shared.lock();
        if ctx.state == GapState::Uninitialized {
            warn!("GAP: event after shutdown ignored: {:?}", event);
            return;
        }
        route(&mut *ctx, event);
    }
}

/// Apply one inbound event to the runtime state.
pub(crate) fn route<L: LinkController, H: GapEventHandler>(
    ctx: &mut GapContext<L, H>,
    event: InboundEvent,
) {
    match event {
        InboundEvent::Disconnected { handle, reason, .. } => {
            match ctx.connection {
                Some(live) if live == handle => {
                    ctx.connection = None;
                    ctx.set_state(GapState::Idle);
                    info!("GAP: disconnected, reason 0x{:02X}", reason);
                }
                Some(live) => {
                    warn!("GAP: disconnect for {:?} while {:?} is live", handle, live);
                }
                None => {}
            }
            ctx.secure = false;
            ctx.negotiation_round = 0;
            thread::sleep(DISCONNECT_SETTLE);
            // A live link keeps its state; advertising resumes when it drops.
            if ctx.enable_adv && ctx.connection.is_none() {
                ctx.set_state(GapState::StartingAdvertising);
                advertising::start(ctx, AdvMode::Fast);
            }
            ctx.emit(GapEvent::Disconnected);
        }

        InboundEvent::ConnectionComplete {
            status,
            handle,
            peer_address,
            params,
            ..
        } => {
            if status != 0 {
                error!("GAP: connection failed, status 0x{:02X}", status);
                return;
            }
            info!("GAP: connected to {:02X?}", peer_address);
            ctx.timer.disarm();
            ctx.conn_params = params;
            ctx.connection = Some(handle);
            ctx.set_state(GapState::Connected);
            negotiator::run(ctx);
            if ctx.config.pairing_method != PairingMethod::None {
                if let Err(s) = ctx.link.peripheral_security_request(handle) {
                    error!("PAIR: security request failed: {}", s);
                }
            }
        }

        InboundEvent::ConnectionUpdateComplete { status, params, .. } => {
            if status != 0 {
                warn!("GAP: connection update failed, status 0x{:02X}", status);
                return;
            }
            ctx.conn_params = params;
            negotiator::run(ctx);
        }

        InboundEvent::PhyUpdateComplete { status, handle, .. } => {
            if status == 0 {
                info!("GAP: PHY update ok");
            } else {
                error!("GAP: PHY update failed, status 0x{:02X}", status);
            }
            match ctx.link.read_phy(handle) {
                Ok(phy) => info!("GAP: PHY tx={} rx={}", phy.tx, phy.rx),
                Err(s) => error!("GAP: read PHY failed: {}", s),
            }
        }

        InboundEvent::MtuNegotiated { server_rx_mtu, .. } => {
            info!("GAP: rx MTU {}", server_rx_mtu);
            let size = server_rx_mtu.saturating_sub(ATT_HEADER_LEN);
            ctx.emit(GapEvent::UpdateMtu { size });
        }

        InboundEvent::PinRequest { handle } => pairing::on_pin_request(ctx, handle),
        InboundEvent::NumericCompare { handle, value } => {
            pairing::on_numeric_compare(ctx, handle, value);
        }
        InboundEvent::PairingComplete {
            handle,
            status,
            reason,
        } => pairing::on_pairing_complete(ctx, handle, status, reason),
        InboundEvent::BondLost => pairing::on_bond_lost(ctx),

        InboundEvent::ParamUpdateAccepted { .. } => debug!("GAP: parameter update accepted"),
        InboundEvent::ParamUpdateRejected { result, .. } => {
            debug!("GAP: parameter update rejected ({})", result);
        }
        InboundEvent::LimitedDiscoverable => info!("GAP: limited discoverable"),
        InboundEvent::AuthorizationRequest { .. } => debug!("PAIR: authorization request"),
        InboundEvent::SecurityInitiated => debug!("PAIR: peripheral security initiated"),
        InboundEvent::AddressUnresolved { .. } => debug!("PAIR: address not resolved"),
        InboundEvent::KeypressNotice { kind, .. } => debug!("PAIR: keypress notification {}", kind),
        InboundEvent::ProcedureComplete { procedure, status } => {
            debug!("GAP: procedure 0x{:02X} complete, status 0x{:02X}", procedure, status);
        }
        InboundEvent::Unhandled { code, subcode } => {
            debug!("GAP: unhandled event 0x{:02X}/0x{:04X}", code, subcode);
        }
    }
}
