//! Host memory pressure signalling.
//!
//! [`PressureSignal`] is the hub that components subscribe to.
//! [`MemoryWatermarkMonitor`] watches available system memory and raises the
//! signal when it runs low. Hosts with their own notion of pressure can call
//! [`PressureSignal::notify`] directly or implement [`PressureSource`].

mod monitor;
mod signal;

pub use monitor::{
    parse_mem_available, MemoryProbe, MemoryWatermarkMonitor, PressureConfig, ProcMeminfo,
    DEFAULT_LOW_MEMORY_THRESHOLD, DEFAULT_POLL_INTERVAL_SECS,
};
pub use signal::{PressureListener, PressureSignal, PressureSource, PressureSubscription};
