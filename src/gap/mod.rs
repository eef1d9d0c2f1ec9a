//! GAP controller: the single-link peripheral state machine.
//!
//! ```text
//!  Application ──start/stop──▶ command queue ──▶ worker ──┐
//!                                    ▲                      ▼
//!                        adv timer ──┘            ┌──────────────────┐
//!                                                 │ Mutex<GapContext>│──▶ LinkController
//!  Link-Controller ──packets──▶ EventDispatcher ──▶│  (state guard)   │──▶ GapEventHandler
//!                                                 └──────────────────┘
//! ```
//!
//! Lock order: state guard → timer signal → command queue. The timer
//! thread never takes the guard.

pub mod advertising;
pub mod context;
pub mod dispatcher;
pub mod negotiator;
pub mod pairing;
pub mod timer;
pub(crate) mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;
use log::{error, info, warn};

use crate::app::commands::{COMMAND_QUEUE_DEPTH, GapCommand};
use crate::app::events::GapEvent;
use crate::app::ports::{GapEventHandler, LinkController};
use crate::config::GapConfig;
use crate::drivers::task_pin::{Core, spawn_on_core};
use crate::error::{GapError, Result};

use self::advertising::AdvPayload;
use self::context::GapContext;
use self::dispatcher::EventDispatcher;
use self::timer::TimerThread;

/// Lifecycle state. Ordering matters: everything above `Idle` is "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GapState {
    Uninitialized,
    Idle,
    StartingAdvertising,
    AdvertisingFast,
    AdvertisingLowPower,
    Connected,
}

/// Bounded FIFO feeding the worker.
pub type CommandQueue = Channel<CriticalSectionRawMutex, GapCommand, COMMAND_QUEUE_DEPTH>;

/// Set while a controller is alive in this process.
static INSTANCE_CLAIMED: AtomicBool = AtomicBool::new(false);

const WORKER_PRIORITY: u8 = 5;
const WORKER_STACK_KB: usize = 8;

/// State shared between the facade, the worker and dispatchers.
pub(crate) struct Shared<L, H> {
    ctx: Mutex<GapContext<L, H>>,
    pub(crate) queue: Arc<CommandQueue>,
}

impl<L, H> Shared<L, H> {
    /// Take the state guard. A poisoned guard is unrecoverable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, GapContext<L, H>> {
        self.ctx.lock().expect("GAP: state guard poisoned")
    }
}

struct Running<L, H> {
    shared: Arc<Shared<L, H>>,
    worker: JoinHandle<()>,
    timer: TimerThread,
}

// ───────────────────────────────────────────────────────────────
// Gap facade
// ───────────────────────────────────────────────────────────────

/// The GAP controller. At most one may be alive per process.
///
/// Dropping a running controller shuts it down.
pub struct Gap<L: LinkController, H: GapEventHandler> {
    running: Option<Running<L, H>>,
}

impl<L: LinkController, H: GapEventHandler> Gap<L, H> {
    /// Bring up the controller and configure the radio.
    ///
    /// # Panics
    ///
    /// If another controller is already alive in this process.
    pub fn init(config: GapConfig, link: L, handler: H) -> Result<Self> {
        if !link.is_radio_ready() {
            return Err(GapError::RadioNotReady);
        }
        assert!(
            INSTANCE_CLAIMED
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            "GAP: already initialized"
        );

        match Self::bring_up(config, link, handler) {
            Ok(running) => {
                info!("GAP: initialized");
                Ok(Self {
                    running: Some(running),
                })
            }
            Err(e) => {
                error!("GAP: init failed: {}", e);
                INSTANCE_CLAIMED.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn bring_up(config: GapConfig, link: L, handler: H) -> Result<Running<L, H>> {
        config.validate()?;
        let payload = AdvPayload::from_config(&config)?;

        let queue = Arc::new(CommandQueue::new());
        let (adv_timer, timer_thread) = timer::spawn(Arc::clone(&queue)).map_err(|e| {
            error!("GAP: timer thread: {}", e);
            GapError::WorkerSpawn
        })?;

        let mut ctx = GapContext::new(config, payload, link, handler, adv_timer);
        if let Err(e) = ctx.setup_link() {
            timer_thread.stop();
            return Err(e);
        }

        let shared = Arc::new(Shared {
            ctx: Mutex::new(ctx),
            queue,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = match spawn_on_core(
            Core::Pro,
            WORKER_PRIORITY,
            WORKER_STACK_KB,
            "BleGapDriver\0",
            move || worker::run(worker_shared),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                error!("GAP: worker thread: {}", e);
                timer_thread.stop();
                return Err(GapError::WorkerSpawn);
            }
        };

        Ok(Running {
            shared,
            worker,
            timer: timer_thread,
        })
    }

    fn running(&self) -> &Running<L, H> {
        self.running
            .as_ref()
            .expect("GAP: used before init or after shutdown")
    }

    /// Request fast advertising. Only acts from `Idle`.
    pub fn start_advertising(&self) {
        let r = self.running();
        let mut ctx = r.shared.lock();
        if ctx.state != GapState::Idle {
            return;
        }
        info!("GAP: start advertising");
        ctx.set_state(GapState::StartingAdvertising);
        ctx.enable_adv = true;
        if r.shared.queue.try_send(GapCommand::AdvertiseFast).is_err() {
            warn!("GAP: command queue full, start dropped");
            ctx.enable_adv = false;
            ctx.set_state(GapState::Idle);
        }
    }

    /// Request advertising stop (and link teardown). Only acts above `Idle`.
    pub fn stop_advertising(&self) {
        let r = self.running();
        let mut ctx = r.shared.lock();
        if ctx.state <= GapState::Idle {
            return;
        }
        info!("GAP: stop advertising");
        ctx.enable_adv = false;
        if r.shared.queue.try_send(GapCommand::StopAdvertise).is_err() {
            warn!("GAP: command queue full, stop dropped");
        }
    }

    /// Current lifecycle state; `Uninitialized` once shut down.
    pub fn get_state(&self) -> GapState {
        match &self.running {
            Some(r) => r.shared.lock().state,
            None => GapState::Uninitialized,
        }
    }

    /// Tell the application whether the beacon is on the air.
    pub fn emit_beacon_status(&self, active: bool) {
        let mut ctx = self.running().shared.lock();
        ctx.emit(if active {
            GapEvent::BeaconStart
        } else {
            GapEvent::BeaconStop
        });
        info!("GAP: beacon status {}", active);
    }

    /// Handle through which the Link-Controller delivers notifications.
    pub fn dispatcher(&self) -> EventDispatcher<L, H> {
        EventDispatcher::new(Arc::downgrade(&self.running().shared))
    }

    /// Stop the worker and timer and release the instance.
    ///
    /// # Panics
    ///
    /// If the controller is not running (never initialized, or already
    /// shut down).
    pub fn shutdown(&mut self) {
        let Running {
            shared,
            worker,
            timer,
        } = self
            .running
            .take()
            .expect("GAP: shutdown without a running controller");

        shared.lock().enable_adv = false;

        // Enqueued outside the guard: a full queue must not block the worker.
        if !worker.is_finished() {
            block_on(shared.queue.send(GapCommand::Shutdown));
        }
        if worker.join().is_err() {
            error!("GAP: worker panicked");
        }
        timer.stop();

        {
            let mut ctx = shared.lock();
            ctx.state = GapState::Uninitialized;
            ctx.connection = None;
        }
        drop(shared);
        INSTANCE_CLAIMED.store(false, Ordering::Release);
        info!("GAP: shut down");
    }
}

impl<L: LinkController, H: GapEventHandler> Drop for Gap<L, H> {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.shutdown();
        }
    }
}
