//! Marshaling of asynchronous substrate signals onto the control thread.
//!
//! Substrates post [`BackendEvent`]s from any thread through an [`EventSink`].
//! The owning session drains its [`EventQueue`] on the control thread, so
//! delivery order matches post order and no two callbacks for one session
//! overlap. Bumping the queue generation discards everything posted before.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

/// `what` code of errors raised by illegal calls.
pub const MEDIA_ERROR_UNKNOWN: i32 = 1;

/// Event kinds reported by the native engine.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Nop = 0,
    Completion = 1,
    Prepared = 2,
    SeekComplete = 3,
    BufferingUpdate = 4,
    Info = 5,
    Error = 6,
}

impl EventKind {
    pub fn from_raw(raw: i32) -> Option<EventKind> {
        let kind = match raw {
            0 => EventKind::Nop,
            1 => EventKind::Completion,
            2 => EventKind::Prepared,
            3 => EventKind::SeekComplete,
            4 => EventKind::BufferingUpdate,
            5 => EventKind::Info,
            6 => EventKind::Error,
            _ => return None,
        };
        Some(kind)
    }
}

/// Signal travelling from a substrate (or an adapter) to the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    Prepared,
    SeekComplete,
    Completion,
    BufferingUpdate { percent: i32 },
    Info { what: i32, extra: i32 },
    /// Failure reported by the substrate.
    Error { what: i32, extra: i32 },
    /// Failure raised by the adapter itself for an illegal call.
    PostedError { what: i32, extra: i32 },
}

impl BackendEvent {
    /// Decode a raw `(kind, arg1, arg2)` triple from the native engine.
    pub fn from_native(kind: i32, arg1: i32, arg2: i32) -> Option<BackendEvent> {
        let event = match EventKind::from_raw(kind)? {
            EventKind::Nop => return None,
            EventKind::Completion => BackendEvent::Completion,
            EventKind::Prepared => BackendEvent::Prepared,
            EventKind::SeekComplete => BackendEvent::SeekComplete,
            EventKind::BufferingUpdate => BackendEvent::BufferingUpdate { percent: arg1 },
            EventKind::Info => BackendEvent::Info {
                what: arg1,
                extra: arg2,
            },
            EventKind::Error => BackendEvent::Error {
                what: arg1,
                extra: arg2,
            },
        };
        Some(event)
    }
}

/// Listener-facing notification produced by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Prepared,
    Completion,
    SeekComplete,
    BufferingUpdate { percent: i32 },
    Info { what: i32, extra: i32 },
    /// Followed by `Completion` unless the error listener handles it.
    Error { what: i32, extra: i32 },
}

#[derive(Debug)]
struct Envelope {
    generation: u64,
    event: BackendEvent,
}

/// Cloneable posting side of an [`EventQueue`].
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Envelope>,
    generation: Arc<AtomicU64>,
}

impl EventSink {
    /// Post an event. Returns `false` once the queue has been dropped.
    pub fn post(&self, event: BackendEvent) -> bool {
        let envelope = Envelope {
            generation: self.generation.load(Ordering::SeqCst),
            event,
        };
        self.tx.send(envelope).is_ok()
    }

    /// Discard every event posted so far.
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Single-consumer, order-preserving event queue of one session.
pub struct EventQueue {
    sink: EventSink,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sink: EventSink {
                tx,
                generation: Arc::new(AtomicU64::new(0)),
            },
            rx: Mutex::new(rx),
        }
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    fn is_current(&self, envelope: &Envelope) -> bool {
        envelope.generation == self.sink.generation.load(Ordering::SeqCst)
    }

    /// Pop the next live event without blocking.
    ///
    /// Returns `None` when the queue is empty or another consumer holds it.
    pub fn try_next(&self) -> Option<BackendEvent> {
        let mut rx = self.rx.try_lock().ok()?;
        while let Ok(envelope) = rx.try_recv() {
            if self.is_current(&envelope) {
                return Some(envelope.event);
            }
        }
        None
    }

    /// Wait for the next live event.
    pub async fn next(&self) -> Option<BackendEvent> {
        let mut rx = self.rx.lock().await;
        while let Some(envelope) = rx.recv().await {
            if self.is_current(&envelope) {
                return Some(envelope.event);
            }
        }
        None
    }

    pub fn cancel_pending(&self) {
        self.sink.cancel_pending();
    }
}
