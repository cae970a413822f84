//! Telemetry event types describing session lifecycle and effect control
//! activity exposed to CLI tooling and async subscribers.

use serde::{Deserialize, Serialize};

use crate::effects::EffectCategory;
use crate::state::PlaybackState;

/// Library lifecycle stages reported by load-time instrumentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    LibraryLoaded,
    NativeEngineAvailable,
    NativeEngineUnavailable,
}

/// Metric events published by sessions, adapters and the effect arbiter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    StateTransition {
        session_id: u64,
        from: PlaybackState,
        to: PlaybackState,
    },
    ErrorPosted {
        session_id: u64,
        what: i32,
        extra: i32,
    },
    LoopPointEmulated {
        session_id: u64,
    },
    ControlTransferred {
        audio_session_id: i32,
        category: EffectCategory,
        /// Handle now in control, `None` once the ledger is empty.
        handle: Option<u64>,
    },
    BandTableCorrected {
        bands: usize,
        changed: bool,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
}
