//! Memory pressure broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

/// Callback run on every memory pressure notification.
pub type PressureListener = Arc<dyn Fn() + Send + Sync>;

/// Something that can tell interested parties the host is low on memory.
///
/// Notifications carry no payload. Listeners may run on any thread.
pub trait PressureSource: Send + Sync {
    /// Register `listener` until the returned subscription is dropped.
    fn subscribe(&self, listener: PressureListener) -> PressureSubscription;
}

/// Registration handle returned by [`PressureSource::subscribe`].
///
/// Dropping it deregisters the listener.
#[must_use = "dropping the subscription deregisters the listener"]
pub struct PressureSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl PressureSubscription {
    /// Subscription that runs `unsubscribe` when dropped.
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for PressureSubscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for PressureSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Listeners {
    registered: Mutex<HashMap<u64, PressureListener>>,
    next_id: AtomicU64,
    notifications: AtomicU64,
}

/// In-process pressure hub.
///
/// Cloning yields another handle to the same set of listeners, so the
/// component that detects pressure and the components that react to it can
/// each hold one.
#[derive(Clone, Default)]
pub struct PressureSignal {
    listeners: Arc<Listeners>,
}

impl PressureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every registered listener. Returns how many were run.
    ///
    /// Listeners are called outside the registry lock, so a listener may
    /// subscribe or unsubscribe without deadlocking.
    pub fn notify(&self) -> usize {
        let snapshot: Vec<PressureListener> =
            self.listeners.registered.lock().values().cloned().collect();

        self.listeners.notifications.fetch_add(1, Ordering::Relaxed);
        debug!(listeners = snapshot.len(), "Memory pressure notification");

        for listener in &snapshot {
            listener();
        }
        snapshot.len()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.registered.lock().len()
    }

    /// Total notifications sent so far.
    pub fn notification_count(&self) -> u64 {
        self.listeners.notifications.load(Ordering::Relaxed)
    }
}

impl PressureSource for PressureSignal {
    fn subscribe(&self, listener: PressureListener) -> PressureSubscription {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.registered.lock().insert(id, listener);

        let listeners: Weak<Listeners> = Arc::downgrade(&self.listeners);
        PressureSubscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.registered.lock().remove(&id);
            }
        })
    }
}

impl std::fmt::Debug for PressureSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureSignal")
            .field("listeners", &self.listener_count())
            .field("notifications", &self.notification_count())
            .finish()
    }
}
