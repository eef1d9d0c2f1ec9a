//! Log-based event handler adapter.
//!
//! Implements [`GapEventHandler`] by writing every outbound GAP event to
//! the log. Numeric-comparison prompts are answered with a fixed policy,
//! which is what a headless device without a confirm button does.

use log::info;

use crate::app::events::GapEvent;
use crate::app::ports::GapEventHandler;

/// Adapter that logs every [`GapEvent`].
pub struct LogEventHandler {
    confirm_numeric: bool,
}

impl LogEventHandler {
    /// `confirm_numeric` is the answer given to every `PinCodeVerify`.
    pub fn new(confirm_numeric: bool) -> Self {
        Self { confirm_numeric }
    }
}

impl GapEventHandler for LogEventHandler {
    fn on_event(&mut self, event: GapEvent) -> bool {
        match event {
            GapEvent::Connected => info!("EVENT | connected"),
            GapEvent::Disconnected => info!("EVENT | disconnected"),
            GapEvent::StartAdvertising => info!("EVENT | advertising started"),
            GapEvent::StopAdvertising => info!("EVENT | advertising stopped"),
            GapEvent::PinCodeShow { .. } => info!("EVENT | show pin to user"),
            GapEvent::PinCodeVerify { pin } => {
                info!(
                    "EVENT | verify {:06} -> {}",
                    pin,
                    if self.confirm_numeric { "yes" } else { "no" }
                );
                return self.confirm_numeric;
            }
            GapEvent::UpdateMtu { size } => info!("EVENT | mtu payload {} bytes", size),
            GapEvent::BeaconStart => info!("EVENT | beacon on"),
            GapEvent::BeaconStop => info!("EVENT | beacon off"),
        }
        false
    }
}
