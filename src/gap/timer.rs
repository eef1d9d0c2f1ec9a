//! One-shot advertising downgrade timer.
//!
//! A dedicated thread waits on a [`Signal`] for control messages and races
//! an `async-io-mini` reactor timer against the next message while armed.
//! On expiry it posts [`GapCommand::AdvertiseLowPower`] to the worker
//! queue without blocking, tagged with the epoch of the arm that fired.
//!
//! ```text
//!   advertising::start ──Arm(60s)──▶ ┌─────────────┐
//!   connect / stop    ──Disarm───▶  │ timer thread │ ──try_send──▶ worker queue
//!   shutdown          ──Exit─────▶  └─────────────┘
//! ```
//!
//! `Signal` keeps only the latest value, so a re-arm replaces the pending
//! deadline and a deadline can never fire twice. Every arm and disarm bumps
//! the epoch, so a downgrade already sitting in the queue when the timer is
//! re-armed is recognised as stale by [`AdvTimer::is_current`]. The thread
//! never takes the state guard.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, warn};

use crate::app::commands::GapCommand;
use crate::drivers::task_pin::{Core, spawn_on_core};

use super::CommandQueue;

/// Control message for the timer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCtl {
    /// Start (or restart) the countdown for the given epoch.
    Arm { after: Duration, epoch: u32 },
    Disarm,
    /// Leave the thread loop.
    Exit,
}

type TimerSignal = Signal<CriticalSectionRawMutex, TimerCtl>;

/// Cheap handle used under the state guard to arm and disarm the timer.
#[derive(Clone)]
pub struct AdvTimer {
    signal: Arc<TimerSignal>,
    epoch: Arc<AtomicU32>,
}

impl AdvTimer {
    pub fn arm(&self, after: Duration) {
        let epoch = self.bump();
        self.signal.signal(TimerCtl::Arm { after, epoch });
    }

    pub fn disarm(&self) {
        self.bump();
        self.signal.signal(TimerCtl::Disarm);
    }

    /// Whether a downgrade tagged `epoch` belongs to the live arm.
    pub fn is_current(&self, epoch: u32) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }

    #[cfg(test)]
    pub(crate) fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    fn bump(&self) -> u32 {
        self.epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

/// Owner of the timer thread; stopping it joins the thread.
pub struct TimerThread {
    signal: Arc<TimerSignal>,
    handle: JoinHandle<()>,
}

impl TimerThread {
    pub fn stop(self) {
        self.signal.signal(TimerCtl::Exit);
        if self.handle.join().is_err() {
            warn!("ADV: timer thread panicked");
        }
    }
}

/// Start the timer thread, posting downgrades to `queue`.
pub fn spawn(queue: Arc<CommandQueue>) -> io::Result<(AdvTimer, TimerThread)> {
    let signal = Arc::new(TimerSignal::new());
    let thread_signal = Arc::clone(&signal);
    let handle = spawn_on_core(Core::Pro, 4, 8, "BleGapAdvTimer\0", move || {
        future::block_on(run(&thread_signal, &queue));
    })?;
    Ok((
        AdvTimer {
            signal: Arc::clone(&signal),
            epoch: Arc::new(AtomicU32::new(0)),
        },
        TimerThread { signal, handle },
    ))
}

async fn run(signal: &TimerSignal, queue: &CommandQueue) {
    let mut deadline: Option<(Duration, u32)> = None;
    loop {
        let ctl = match deadline.take() {
            None => signal.wait().await,
            Some((after, epoch)) => {
                let expired = async {
                    async_io_mini::Timer::after(after).await;
                    None
                };
                let next = async { Some(signal.wait().await) };
                match future::or(expired, next).await {
                    Some(ctl) => ctl,
                    None => {
                        fire(queue, epoch);
                        continue;
                    }
                }
            }
        };
        match ctl {
            TimerCtl::Arm { after, epoch } => deadline = Some((after, epoch)),
            TimerCtl::Disarm => {}
            TimerCtl::Exit => break,
        }
    }
    debug!("ADV: timer thread exiting");
}

fn fire(queue: &CommandQueue, epoch: u32) {
    debug!("ADV: timeout (epoch {}), downgrading to low power", epoch);
    if queue.try_send(GapCommand::AdvertiseLowPower { epoch }).is_err() {
        warn!("ADV: command queue full, low-power downgrade dropped");
    }
}
