//! Core-pinned thread spawning for the GAP worker and timer threads.
//!
//! On ESP-IDF, `std::thread` is backed by pthreads over FreeRTOS tasks.
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation on
//! the same thread. On every other target the core and priority are ignored.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for dual-core Xtensa parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU), radio and protocol stacks.
    Pro = 0,
    /// Core 1 (APP_CPU), application logic.
    App = 1,
}

/// Spawn a named thread pinned to `core`.
///
/// `name` must be nul-terminated (e.g. `"BleGapDriver\0"`); the terminator
/// is stripped for the Rust-side thread name.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core<F>(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    // SAFETY: `cfg` is fully initialised by the IDF helper and `name`
    // is a 'static nul-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::debug!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );

    std::thread::Builder::new().name(display_name.into()).spawn(f)
}

/// Smallest stack given to a host thread.
#[cfg(not(target_os = "espidf"))]
const HOST_MIN_STACK_KB: usize = 64;

/// Host fallback: ignores core affinity and priority; stacks are raised
/// to at least [`HOST_MIN_STACK_KB`].
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core<F>(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let display_name = name.trim_end_matches('\0');
    log::debug!("Spawning '{}' (host, stack={}KB)", display_name, stack_kb);

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb.max(HOST_MIN_STACK_KB) * 1024)
        .spawn(f)
}
