// crates/sync-engine/src/monitor.rs
//! Network connectivity monitor

use crate::listeners::{ListenerRegistry, Subscription};
use std::sync::Mutex;

/// Last known connectivity plus transition notifications
///
/// A platform sensor (or `ConnectivityProbe` in `marketsync-network`) feeds
/// readings through [`NetworkMonitor::set_connected`]. Listeners hear about
/// transitions only, never repeated readings of the same state.
pub struct NetworkMonitor {
    connected: Mutex<bool>,
    listeners: ListenerRegistry<bool>,
}

impl NetworkMonitor {
    /// Creates a monitor with an initial reading
    pub fn new(initially_connected: bool) -> Self {
        Self {
            connected: Mutex::new(initially_connected),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Returns the last known connectivity
    pub fn is_connected(&self) -> bool {
        *self
            .connected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a reading, notifying listeners if it changed the state
    ///
    /// Returns true if this reading was a transition.
    pub fn set_connected(&self, connected: bool) -> bool {
        {
            let mut current = self
                .connected
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *current == connected {
                return false;
            }
            *current = connected;
        }

        log::info!(
            "Network transitioned {}",
            if connected { "online" } else { "offline" }
        );
        self.listeners.notify(&connected);
        true
    }

    /// Registers a transition listener
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners.subscribe(move |connected| listener(*connected))
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
