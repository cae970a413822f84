//! Telemetry collector and helpers.
//!
//! The collector multiplexes state transitions, posted errors, loop-point
//! emulation and effect control transfers into a bounded history plus an
//! async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::effects::EffectCategory;
use crate::state::Transition;

pub mod events;

pub use events::{LifecyclePhase, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            if let Ok(mut history) = self.history.lock() {
                if history.len() == self.history_capacity {
                    history.pop_front();
                    self.dropped_history.fetch_add(1, Ordering::Relaxed);
                }
                history.push_back(event.clone());
            }
        }

        let _ = self.tx.send(event);
    }

    /// Stream of future events; lagged receivers skip what they missed.
    pub fn stream(&self) -> impl Stream<Item = MetricEvent> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|event| event.ok())
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 128)
    }
}

/// Top-level hub wrapping the collector with typed recorders.
pub struct TelemetryHub {
    collector: TelemetryCollector,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_transition(&self, session_id: u64, transition: Transition) {
        self.collector.publish(MetricEvent::StateTransition {
            session_id,
            from: transition.from,
            to: transition.to,
        });
    }

    pub fn record_error_posted(&self, session_id: u64, what: i32, extra: i32) {
        self.collector.publish(MetricEvent::ErrorPosted {
            session_id,
            what,
            extra,
        });
    }

    pub fn record_loop_point(&self, session_id: u64) {
        self.collector
            .publish(MetricEvent::LoopPointEmulated { session_id });
    }

    pub fn record_control_transfer(
        &self,
        audio_session_id: i32,
        category: EffectCategory,
        handle: Option<u64>,
    ) {
        self.collector.publish(MetricEvent::ControlTransferred {
            audio_session_id,
            category,
            handle,
        });
    }

    pub fn record_band_correction(&self, bands: usize, changed: bool) {
        self.collector
            .publish(MetricEvent::BandTableCorrected { bands, changed });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 128)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
