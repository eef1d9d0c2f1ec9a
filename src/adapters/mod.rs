//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements        | Connects to                   |
//! |-------------|-------------------|-------------------------------|
//! | `log_sink`  | GapEventHandler   | Serial / host log output      |
//! | `sim`       | LinkController    | In-process simulated radio    |
//! | `device_id` | —                 | Factory MAC (eFuse or fixed)  |
//!
//! The production Link-Controller binding lives with the radio firmware
//! and implements the same port.

pub mod device_id;
pub mod log_sink;
pub mod sim;
