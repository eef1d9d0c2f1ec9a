//! Commands queued for the GAP worker.
//!
//! Produced by the public API and by the advertising timer, consumed only
//! by the [`worker`](crate::gap::worker). The set is closed: adding a
//! variant means teaching the worker loop about it.

/// Depth of the worker command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapCommand {
    /// Start (or restart) discoverable advertising at the fast interval.
    AdvertiseFast,
    /// Downgrade to the battery-friendly slow interval. `epoch` names the
    /// timer arm that fired; the worker drops it once the timer moved on.
    AdvertiseLowPower { epoch: u32 },
    /// Stop advertising and drop any live connection.
    StopAdvertise,
    /// Exit the worker loop; the owner tears down afterwards.
    Shutdown,
}
