//! Low-memory watermark monitor.
//!
//! Polls available system memory on an interval and raises a
//! [`PressureSignal`] each time it drops below a threshold. Only the
//! transition from above to below notifies; staying low does not repeat the
//! signal until memory recovers first.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::signal::PressureSignal;

/// Default low watermark: 256 MiB available.
pub const DEFAULT_LOW_MEMORY_THRESHOLD: u64 = 256 * 1024 * 1024;

/// Default poll interval (5 seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Watermark monitor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureConfig {
    /// Available bytes below which pressure is signalled (0 disables)
    pub low_memory_threshold: u64,
    /// Time between readings
    pub poll_interval: Duration,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            low_memory_threshold: DEFAULT_LOW_MEMORY_THRESHOLD,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl PressureConfig {
    /// Whether a monitor should run at all.
    pub fn is_enabled(&self) -> bool {
        self.low_memory_threshold > 0 && !self.poll_interval.is_zero()
    }
}

/// Source of available-memory readings.
pub trait MemoryProbe: Send + Sync {
    /// Currently available memory in bytes, if it can be determined.
    fn available_bytes(&self) -> Option<u64>;
}

/// Reads `MemAvailable` from `/proc/meminfo`.
///
/// Yields no reading on platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMeminfo;

impl MemoryProbe for ProcMeminfo {
    #[cfg(target_os = "linux")]
    fn available_bytes(&self) -> Option<u64> {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&content)
    }

    #[cfg(not(target_os = "linux"))]
    fn available_bytes(&self) -> Option<u64> {
        None
    }
}

/// Extract `MemAvailable` in bytes from `/proc/meminfo` content.
pub fn parse_mem_available(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        // Format: "MemAvailable:    8123456 kB"
        let rest = line.strip_prefix("MemAvailable:")?;
        let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
        kb.checked_mul(1024)
    })
}

/// Background task turning low memory readings into pressure notifications.
pub struct MemoryWatermarkMonitor {
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryWatermarkMonitor {
    /// Spawn the monitor on `runtime`.
    pub fn start(
        config: PressureConfig,
        probe: Arc<dyn MemoryProbe>,
        signal: PressureSignal,
        runtime: &Handle,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(run(config, probe, signal, shutdown.clone()));

        Self {
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop polling and wait for the task to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Memory monitor task failed");
            }
        }
    }
}

impl Drop for MemoryWatermarkMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run(
    config: PressureConfig,
    probe: Arc<dyn MemoryProbe>,
    signal: PressureSignal,
    shutdown: CancellationToken,
) {
    if !config.is_enabled() {
        debug!("Memory monitor disabled");
        return;
    }

    info!(
        threshold_mb = config.low_memory_threshold / (1024 * 1024),
        poll_interval_secs = config.poll_interval.as_secs(),
        "Memory monitor starting"
    );

    let mut interval = tokio::time::interval(config.poll_interval);
    let mut below = false;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("Memory monitor shutting down");
                break;
            }

            _ = interval.tick() => {
                let Some(available) = probe.available_bytes() else {
                    continue;
                };

                let now_below = available < config.low_memory_threshold;
                if now_below && !below {
                    warn!(
                        available_mb = available / (1024 * 1024),
                        threshold_mb = config.low_memory_threshold / (1024 * 1024),
                        "Low memory, signalling pressure"
                    );
                    signal.notify();
                } else if !now_below && below {
                    debug!(available_mb = available / (1024 * 1024), "Memory recovered");
                }
                below = now_below;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::PressureSource;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays readings in order, then repeats the last one.
    struct ScriptedProbe {
        readings: Mutex<VecDeque<Option<u64>>>,
        last: Mutex<Option<u64>>,
    }

    impl ScriptedProbe {
        fn new(readings: &[Option<u64>]) -> Arc<Self> {
            Arc::new(Self {
                readings: Mutex::new(readings.iter().copied().collect()),
                last: Mutex::new(None),
            })
        }
    }

    impl MemoryProbe for ScriptedProbe {
        fn available_bytes(&self) -> Option<u64> {
            let mut last = self.last.lock();
            if let Some(next) = self.readings.lock().pop_front() {
                *last = next;
            }
            *last
        }
    }

    const MB: u64 = 1024 * 1024;

    fn config() -> PressureConfig {
        PressureConfig {
            low_memory_threshold: 100 * MB,
            poll_interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_parse_mem_available() {
        let content = "MemTotal:       16384000 kB\n\
                       MemFree:         1000000 kB\n\
                       MemAvailable:    8000000 kB\n\
                       Buffers:          200000 kB\n";
        assert_eq!(parse_mem_available(content), Some(8_000_000 * 1024));
    }

    #[test]
    fn test_parse_mem_available_missing() {
        assert_eq!(parse_mem_available("MemTotal: 1 kB\n"), None);
        assert_eq!(parse_mem_available("MemAvailable: lots kB\n"), None);
    }

    #[test]
    fn test_parse_mem_available_overflow() {
        let content = format!("MemAvailable: {} kB\n", u64::MAX);
        assert_eq!(parse_mem_available(&content), None);
    }

    #[test]
    fn test_default_config_enabled() {
        assert!(PressureConfig::default().is_enabled());
        let disabled = PressureConfig {
            low_memory_threshold: 0,
            ..PressureConfig::default()
        };
        assert!(!disabled.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifies_on_each_drop_below_threshold() {
        let signal = PressureSignal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _subscription = signal.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let probe = ScriptedProbe::new(&[
            Some(500 * MB),
            Some(50 * MB),
            Some(40 * MB),
            None,
            Some(30 * MB),
            Some(200 * MB),
            Some(10 * MB),
        ]);
        let monitor =
            MemoryWatermarkMonitor::start(config(), probe, signal.clone(), &Handle::current());

        tokio::time::sleep(Duration::from_secs(20)).await;
        monitor.shutdown().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reading_never_notifies() {
        let signal = PressureSignal::new();
        let probe = ScriptedProbe::new(&[None]);
        let monitor =
            MemoryWatermarkMonitor::start(config(), probe, signal.clone(), &Handle::current());

        tokio::time::sleep(Duration::from_secs(10)).await;
        monitor.shutdown().await;

        assert_eq!(signal.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_monitor_exits() {
        let signal = PressureSignal::new();
        let config = PressureConfig {
            low_memory_threshold: 100 * MB,
            poll_interval: Duration::ZERO,
        };
        let monitor = MemoryWatermarkMonitor::start(
            config,
            ScriptedProbe::new(&[Some(0)]),
            signal.clone(),
            &Handle::current(),
        );

        monitor.shutdown().await;
        assert_eq!(signal.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let monitor = MemoryWatermarkMonitor::start(
            config(),
            Arc::new(ProcMeminfo),
            PressureSignal::new(),
            &Handle::current(),
        );

        monitor.shutdown().await;
        monitor.shutdown().await;
    }
}
