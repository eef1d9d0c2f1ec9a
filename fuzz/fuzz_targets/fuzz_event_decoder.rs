//! Fuzz target: `InboundEvent::decode`
//!
//! Feeds arbitrary bytes to the HCI event decoder and checks that it never
//! panics and never reports a handle wider than 12 bits.
//!
//! cargo fuzz run fuzz_event_decoder

#![no_main]

use blegap::events::InboundEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(event) = InboundEvent::decode(data) else {
        return;
    };
    let handle = match event {
        InboundEvent::Disconnected { handle, .. }
        | InboundEvent::ConnectionComplete { handle, .. }
        | InboundEvent::ConnectionUpdateComplete { handle, .. }
        | InboundEvent::PhyUpdateComplete { handle, .. }
        | InboundEvent::PinRequest { handle }
        | InboundEvent::NumericCompare { handle, .. }
        | InboundEvent::PairingComplete { handle, .. }
        | InboundEvent::MtuNegotiated { handle, .. } => handle,
        _ => return,
    };
    assert!(handle.0 <= 0x0FFF, "handle flag bits leaked: {:#06X}", handle.0);
});
