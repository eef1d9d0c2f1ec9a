//! Connection-parameter negotiator.
//!
//! The lower interval bound matters from the first packet (anything faster
//! starves the flash controller); the upper bound is only enforced once the
//! link is secure. The first request asks for exactly the configured
//! minimum; if the central disagrees, later rounds widen the window to the
//! configured maximum. There is no retry cap: every unsatisfying update
//! from the central triggers another request.

use log::{error, info, warn};

use crate::app::ports::{ConnParamRequest, GapEventHandler, LinkController};
use crate::config::ConnIntervalBounds;

use super::context::GapContext;

/// Outcome of checking the reported interval against the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Interval is acceptable; negotiation is over.
    Converged,
    /// Ask the central for an interval within `[min, max]`.
    Request { min: u16, max: u16 },
}

/// Pure decision step.
pub fn evaluate(bounds: ConnIntervalBounds, interval: u16, secure: bool, round: u8) -> Verdict {
    let desired_max = if round == 0 { bounds.min } else { bounds.max };
    let failed = interval < bounds.min || (secure && interval > desired_max);
    if failed {
        Verdict::Request {
            min: bounds.min,
            max: desired_max,
        }
    } else {
        Verdict::Converged
    }
}

/// Check the current parameters and request an update if needed.
pub(crate) fn run<L: LinkController, H: GapEventHandler>(ctx: &mut GapContext<L, H>) {
    let params = ctx.conn_params;
    info!(
        "GAP: conn params interval={} ({} ms) latency={} timeout={}",
        params.interval,
        params.interval_ms(),
        params.latency,
        params.supervision_timeout
    );

    match evaluate(
        ctx.config.conn_interval,
        params.interval,
        ctx.secure,
        ctx.negotiation_round,
    ) {
        Verdict::Converged => {
            info!(
                "GAP: interval accepted after {} round(s)",
                ctx.negotiation_round
            );
            ctx.negotiation_round = 0;
        }
        Verdict::Request { min, max } => {
            warn!(
                "GAP: interval unsuitable, negotiating round {}",
                u16::from(ctx.negotiation_round) + 1
            );
            let Some(handle) = ctx.connection else {
                warn!("GAP: no live connection to negotiate on");
                return;
            };
            let req = ConnParamRequest {
                interval_min: min,
                interval_max: max,
                latency: params.latency,
                supervision_timeout: params.supervision_timeout,
            };
            match ctx.link.connection_parameter_update_request(handle, &req) {
                Ok(()) => ctx.negotiation_round = ctx.negotiation_round.saturating_add(1),
                Err(s) => {
                    error!("GAP: parameter update request failed: {}", s);
                    ctx.negotiation_round = 0;
                }
            }
        }
    }
}
