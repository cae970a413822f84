//! Listener registrations of a playback session.
//!
//! Registration returns a [`Subscription`] guard. Dropping the guard (or
//! calling [`Subscription::unsubscribe`]) removes the listener. The guard
//! holds only a weak reference to the registry, so it never keeps a session
//! alive, and a released session drops every registration at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::engine::events::Notification;
use crate::engine::session::PlaybackSession;

pub type SessionListener = Arc<dyn Fn(&PlaybackSession) + Send + Sync>;
pub type BufferingListener = Arc<dyn Fn(&PlaybackSession, i32) + Send + Sync>;
pub type InfoListener = Arc<dyn Fn(&PlaybackSession, i32, i32) + Send + Sync>;
/// Returns `true` when the error was handled, which suppresses the
/// completion notification that otherwise follows it.
pub type ErrorListener = Arc<dyn Fn(&PlaybackSession, i32, i32) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Listener {
    Prepared(SessionListener),
    Completion(SessionListener),
    SeekComplete(SessionListener),
    BufferingUpdate(BufferingListener),
    Info(InfoListener),
    Error(ErrorListener),
}

/// Listeners of one session, in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
    closed: AtomicBool,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if self.closed.load(Ordering::SeqCst) {
            log::debug!("[Listeners] registry closed, ignoring listener {}", id);
            return Subscription {
                registry: Weak::new(),
                id,
            };
        }
        self.entries().push((id, listener));
        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    fn remove(&self, id: u64) {
        self.entries().retain(|(entry, _)| *entry != id);
    }

    /// Drop every registration and refuse new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot taken so listeners may (un)register while being called.
    fn snapshot(&self) -> Vec<Listener> {
        self.entries()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Deliver one notification to every matching listener.
    ///
    /// An error is followed by a completion unless some error listener
    /// reports it handled.
    pub(crate) fn deliver(&self, session: &PlaybackSession, notification: Notification) {
        let listeners = self.snapshot();
        match notification {
            Notification::Prepared => {
                for listener in &listeners {
                    if let Listener::Prepared(f) = listener {
                        f(session);
                    }
                }
            }
            Notification::Completion => self.deliver_completion(session, &listeners),
            Notification::SeekComplete => {
                for listener in &listeners {
                    if let Listener::SeekComplete(f) = listener {
                        f(session);
                    }
                }
            }
            Notification::BufferingUpdate { percent } => {
                for listener in &listeners {
                    if let Listener::BufferingUpdate(f) = listener {
                        f(session, percent);
                    }
                }
            }
            Notification::Info { what, extra } => {
                for listener in &listeners {
                    if let Listener::Info(f) = listener {
                        f(session, what, extra);
                    }
                }
            }
            Notification::Error { what, extra } => {
                let mut handled = false;
                for listener in &listeners {
                    if let Listener::Error(f) = listener {
                        handled |= f(session, what, extra);
                    }
                }
                if !handled {
                    self.deliver_completion(session, &listeners);
                }
            }
        }
    }

    fn deliver_completion(&self, session: &PlaybackSession, listeners: &[Listener]) {
        for listener in listeners {
            if let Listener::Completion(f) = listener {
                f(session);
            }
        }
    }
}

/// Keeps a listener registered while alive.
#[must_use = "dropping a Subscription unregisters its listener"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
}

impl Subscription {
    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.entries().iter().any(|(id, _)| *id == self.id))
            .unwrap_or(false)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_unregisters() {
        let registry = Arc::new(ListenerRegistry::new());
        let first = registry.register(Listener::Prepared(Arc::new(|_: &PlaybackSession| {})));
        let second = registry.register(Listener::Completion(Arc::new(|_: &PlaybackSession| {})));
        assert_eq!(registry.len(), 2);
        assert!(first.is_active());

        drop(first);
        assert_eq!(registry.len(), 1);
        second.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn closed_registry_rejects_listeners() {
        let registry = Arc::new(ListenerRegistry::new());
        let kept = registry.register(Listener::Prepared(Arc::new(|_: &PlaybackSession| {})));
        registry.close();
        assert!(!kept.is_active());

        let late = registry.register(Listener::Prepared(Arc::new(|_: &PlaybackSession| {})));
        assert!(!late.is_active());
        assert!(registry.is_empty());
    }

    #[test]
    fn subscription_outliving_registry_is_inert() {
        let registry = Arc::new(ListenerRegistry::new());
        let subscription = registry.register(Listener::Info(Arc::new(|_: &PlaybackSession, _: i32, _: i32| {})));
        drop(registry);
        assert!(!subscription.is_active());
        drop(subscription);
    }
}
