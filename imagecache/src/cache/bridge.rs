//! Connects host memory pressure to the memory tier.

use std::sync::{Arc, Weak};

use tracing::info;

use crate::cache::memory::MemoryStore;
use crate::pressure::{PressureSource, PressureSubscription};

/// Clears a [`MemoryStore`] whenever its pressure source fires.
///
/// Holds the store weakly and the registration strongly: dropping the bridge
/// deregisters it, and a notification arriving after the store is gone does
/// nothing.
#[derive(Debug)]
pub struct PressureBridge {
    _subscription: PressureSubscription,
}

impl PressureBridge {
    /// Subscribe to `source` on behalf of `memory`.
    pub fn attach(source: &dyn PressureSource, memory: Weak<MemoryStore>) -> Self {
        let subscription = source.subscribe(Arc::new(move || {
            if let Some(memory) = memory.upgrade() {
                let dropped = memory.clear();
                memory.record_pressure_clear();
                info!(dropped, "Memory pressure, cleared image memory cache");
            }
        }));

        Self {
            _subscription: subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::image::CachedImage;
    use crate::cache::types::CacheKey;
    use crate::pressure::PressureSignal;
    use image::RgbaImage;

    fn filled_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(0));
        store.put(
            CacheKey::new("a"),
            CachedImage::new(RgbaImage::new(4, 4), 1.0),
        );
        store
    }

    #[test]
    fn test_signal_clears_memory() {
        let signal = PressureSignal::new();
        let store = filled_store();
        let _bridge = PressureBridge::attach(&signal, Arc::downgrade(&store));

        signal.notify();

        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.stats().memory_pressure_clears, 1);
    }

    #[test]
    fn test_dropped_bridge_deregisters() {
        let signal = PressureSignal::new();
        let store = filled_store();
        let bridge = PressureBridge::attach(&signal, Arc::downgrade(&store));
        assert_eq!(signal.listener_count(), 1);

        drop(bridge);
        signal.notify();

        assert_eq!(signal.listener_count(), 0);
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn test_signal_after_store_dropped_is_harmless() {
        let signal = PressureSignal::new();
        let store = filled_store();
        let _bridge = PressureBridge::attach(&signal, Arc::downgrade(&store));

        drop(store);

        assert_eq!(signal.notify(), 1);
    }
}
