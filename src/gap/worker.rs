//! Command worker ("BleGapDriver" thread).
//!
//! Blocks on the command queue, takes the state guard once per command and
//! hands it to the advertising controller. Advertising commands are dropped
//! once the state has left advertising, and a downgrade is dropped when the
//! timer has been re-armed since it fired. `Shutdown` ends the loop; the
//! owner joins the thread afterwards.

use std::sync::Arc;

use futures_lite::future::block_on;
use log::{debug, info};

use crate::app::commands::GapCommand;
use crate::app::ports::{GapEventHandler, LinkController};

use super::advertising::{self, AdvMode};
use super::{GapState, Shared};

pub(crate) fn run<L: LinkController, H: GapEventHandler>(shared: Arc<Shared<L, H>>) {
    info!("GAP: worker started");
    loop {
        let command = block_on(shared.queue.receive());
        let mut ctx = shared.lock();
        match command {
            GapCommand::Shutdown => break,
            GapCommand::AdvertiseFast | GapCommand::AdvertiseLowPower { .. }
                if !is_advertising(ctx.state) =>
            {
                debug!("GAP: {:?} is stale in {:?}, dropped", command, ctx.state);
            }
            GapCommand::AdvertiseLowPower { epoch } if !ctx.timer.is_current(epoch) => {
                debug!("GAP: downgrade from an earlier timer arm dropped");
            }
            GapCommand::AdvertiseFast => advertising::start(&mut *ctx, AdvMode::Fast),
            GapCommand::AdvertiseLowPower { .. } => {
                advertising::start(&mut *ctx, AdvMode::LowPower);
            }
            GapCommand::StopAdvertise => advertising::stop(&mut *ctx),
        }
    }
    info!("GAP: worker stopped");
}

/// States in which an advertising command still applies.
fn is_advertising(state: GapState) -> bool {
    matches!(
        state,
        GapState::StartingAdvertising | GapState::AdvertisingFast | GapState::AdvertisingLowPower
    )
}
