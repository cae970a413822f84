//! Backend abstractions for playback sessions.
//!
//! A [`PlaybackBackend`] wraps one substrate (the stock platform decoder or the
//! native engine) and normalizes it to the [`StateMachine`] contract. Backends
//! never call listeners; asynchronous substrate signals are fed back through
//! [`PlaybackBackend::handle_event`], which returns the notifications the
//! session should deliver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::engine::events::{BackendEvent, EventSink, Notification, MEDIA_ERROR_UNKNOWN};
use crate::engine::source::DataSource;
use crate::error::{PlaybackError, ResultClass, ResultCode};
use crate::state::{IllegalCallPolicy, NotificationSkip, Operation, PlaybackState, StateMachine};
use crate::telemetry;

mod desktop_stub;
pub mod native;
pub mod stock;

pub use desktop_stub::{StubDecoder, StubDecoderControl, StubDecoderPool, StubNativeEngine};
pub use native::{
    EngineRequest, EngineResponse, EngineValue, NativeEngine, NativeEngineAdapter, Opcode,
    PlayerHandle,
};
pub use stock::{DecoderLink, DecoderQuirks, StockBackendAdapter, StockDecoder};

/// Which substrate a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Stock,
    Native,
}

/// Backend shared between its session and any predecessor chained to it.
pub type SharedBackend = Arc<Mutex<Box<dyn PlaybackBackend>>>;

/// Weak reference to the backend that plays after the current one.
///
/// Never keeps the successor alive; a dropped successor reads as absent.
#[derive(Clone)]
pub struct NextPlayer {
    backend: Weak<Mutex<Box<dyn PlaybackBackend>>>,
}

impl NextPlayer {
    pub fn new(backend: &SharedBackend) -> Self {
        Self {
            backend: Arc::downgrade(backend),
        }
    }

    /// Lock the successor and run `f` against it.
    ///
    /// Returns `None` when the successor is gone or its lock is poisoned.
    /// Callers must not hold the successor's own lock.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn PlaybackBackend) -> T) -> Option<T> {
        let backend = self.backend.upgrade()?;
        let mut guard = backend.lock().ok()?;
        Some(f(guard.as_mut()))
    }

    pub fn is_alive(&self) -> bool {
        self.backend.strong_count() > 0
    }
}

impl std::fmt::Debug for NextPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextPlayer")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Common interface of the stock and native playback backends.
///
/// Every mutator consults the state machine first. A legal call is delegated
/// to the substrate and the state advances only when the substrate accepts it.
pub trait PlaybackBackend: Send {
    fn kind(&self) -> BackendKind;
    /// Identifier used in logs and telemetry.
    fn session_id(&self) -> u64;
    fn state(&self) -> PlaybackState;
    fn prior_error_state(&self) -> PlaybackState;

    fn set_source(&mut self, source: &DataSource) -> Result<(), PlaybackError>;
    /// Blocking prepare.
    fn prepare(&mut self) -> Result<(), PlaybackError>;
    fn prepare_async(&mut self) -> Result<(), PlaybackError>;
    fn start(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn reset(&mut self) -> Result<(), PlaybackError>;
    /// Idempotent; safe in every state.
    fn release(&mut self);
    fn seek_to(&mut self, msec: u32) -> Result<(), PlaybackError>;
    fn duration(&mut self) -> Result<u32, PlaybackError>;
    fn current_position(&mut self) -> Result<u32, PlaybackError>;
    fn set_looping(&mut self, looping: bool) -> Result<(), PlaybackError>;
    fn is_looping(&mut self) -> Result<bool, PlaybackError>;
    fn is_playing(&mut self) -> Result<bool, PlaybackError>;
    fn set_volume(&mut self, left: f32, right: f32) -> Result<(), PlaybackError>;
    /// Designate (or clear) the successor. The caller has already verified
    /// that `next` is not this backend.
    fn set_next(&mut self, next: Option<NextPlayer>) -> Result<(), PlaybackError>;
    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<(), PlaybackError>;
    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<(), PlaybackError>;
    fn audio_session_id(&mut self) -> Result<i32, PlaybackError>;
    fn set_audio_session_id(&mut self, audio_session_id: i32) -> Result<(), PlaybackError>;

    /// Apply one queued substrate signal and return what listeners should see.
    fn handle_event(&mut self, event: BackendEvent) -> Vec<Notification>;

    /// Stock decoder link used by a predecessor for gapless chaining.
    fn decoder_link(&self) -> Option<DecoderLink> {
        None
    }

    /// Native player handle used by a predecessor for gapless chaining.
    fn native_handle(&self) -> Option<PlayerHandle> {
        None
    }
}

/// Whether a backend in `state` may be designated as a successor.
pub(crate) fn ready_as_successor(state: PlaybackState) -> bool {
    matches!(
        state,
        PlaybackState::Prepared | PlaybackState::Paused | PlaybackState::PlaybackCompleted
    )
}

/// What a predecessor learns about its prospective successor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SuccessorInfo {
    pub(crate) decoder_link: Option<DecoderLink>,
    pub(crate) native_handle: Option<PlayerHandle>,
}

/// Validate a `set_next` request against both ends of the chain.
///
/// Checks, in order: the successor still exists and has the same backend
/// kind, the successor is ready, and the caller has left Idle.
pub(crate) fn inspect_successor(
    next: &NextPlayer,
    expected: BackendKind,
    caller_state: PlaybackState,
) -> Result<SuccessorInfo, PlaybackError> {
    let (kind, state, info) = next
        .with(|backend| {
            (
                backend.kind(),
                backend.state(),
                SuccessorInfo {
                    decoder_link: backend.decoder_link(),
                    native_handle: backend.native_handle(),
                },
            )
        })
        .ok_or_else(|| PlaybackError::illegal_state("set_next", PlaybackState::End))?;

    if kind != expected {
        return Err(PlaybackError::InvalidArgument {
            reason: format!("next player uses the {:?} backend, expected {:?}", kind, expected),
        });
    }
    if !ready_as_successor(state) {
        return Err(PlaybackError::illegal_state("set_next", state));
    }
    if matches!(
        caller_state,
        PlaybackState::Idle | PlaybackState::Error | PlaybackState::End
    ) {
        return Err(PlaybackError::illegal_state("set_next", caller_state));
    }
    Ok(info)
}

/// Map a failed substrate result without touching any state.
pub(crate) fn substrate_error(code: ResultCode, operation: &'static str) -> PlaybackError {
    code.check(operation)
        .err()
        .unwrap_or(PlaybackError::Engine { code })
}

/// Reject aux send levels the substrates cannot represent.
pub(crate) fn validate_send_level(level: f32) -> Result<f32, PlaybackError> {
    if level.is_nan() || level < 0.0 {
        Err(PlaybackError::InvalidArgument {
            reason: format!("aux send level {} must be a non-negative number", level),
        })
    } else {
        Ok(level)
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of checking a call against the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallGuard {
    /// The call is legal; touch the substrate.
    Proceed,
    /// The call was absorbed (error posted or neutral result); return quietly.
    Skip,
}

/// State bookkeeping shared by both adapters.
///
/// Owns the state machine and the posting side of the session queue, and
/// applies the illegal-call policies uniformly.
pub(crate) struct Lifecycle {
    session_id: u64,
    component: &'static str,
    machine: StateMachine,
    sink: EventSink,
}

impl Lifecycle {
    pub(crate) fn new(component: &'static str, sink: EventSink) -> Self {
        Self {
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            component,
            machine: StateMachine::new(),
            sink,
        }
    }

    pub(crate) fn session_id(&self) -> u64 {
        self.session_id
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.machine.state()
    }

    pub(crate) fn prior_error_state(&self) -> PlaybackState {
        self.machine.prior_error_state()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.machine.is_released()
    }

    pub(crate) fn sink(&self) -> &EventSink {
        &self.sink
    }

    /// Advance to `next`, logging and recording accepted transitions.
    pub(crate) fn enter(&mut self, next: PlaybackState) -> bool {
        match self.machine.transition_to(next) {
            Some(transition) => {
                log::debug!(
                    "[{}] session {}: {} -> {}",
                    self.component,
                    self.session_id,
                    transition.from,
                    transition.to
                );
                telemetry::hub().record_transition(self.session_id, transition);
                true
            }
            None => false,
        }
    }

    pub(crate) fn ensure_not_released(&self) -> Result<(), PlaybackError> {
        if self.machine.is_released() {
            Err(PlaybackError::Released)
        } else {
            Ok(())
        }
    }

    /// Check `op` against the state machine and apply its illegal-call policy.
    pub(crate) fn guard(&mut self, op: Operation) -> Result<CallGuard, PlaybackError> {
        self.ensure_not_released()?;
        if self.machine.can_call(op) {
            return Ok(CallGuard::Proceed);
        }

        let state = self.state();
        match StateMachine::illegal_call_policy(op) {
            IllegalCallPolicy::FailSynchronously => {
                if op == Operation::SetSource && state == PlaybackState::Error {
                    return Ok(CallGuard::Skip);
                }
                log::warn!(
                    "[{}] session {}: {} called in {} state",
                    self.component,
                    self.session_id,
                    op.name(),
                    state
                );
                self.enter(PlaybackState::Error);
                Err(PlaybackError::illegal_state(op.name(), state))
            }
            IllegalCallPolicy::NotifyAsync { skip } => {
                log::warn!(
                    "[{}] session {}: {} called in {} state; posting error",
                    self.component,
                    self.session_id,
                    op.name(),
                    state
                );
                self.fail_and_notify(MEDIA_ERROR_UNKNOWN, 0, skip);
                Ok(CallGuard::Skip)
            }
            IllegalCallPolicy::ReportDefault => Ok(CallGuard::Skip),
        }
    }

    /// Enter Error and post an error notification unless `skip` suppresses it.
    ///
    /// The skip rule is evaluated against the state before entering Error.
    pub(crate) fn fail_and_notify(&mut self, what: i32, extra: i32, skip: NotificationSkip) {
        let suppressed = self.machine.should_skip_notification(skip);
        self.enter(PlaybackState::Error);
        if suppressed {
            log::debug!(
                "[{}] session {}: error notification suppressed",
                self.component,
                self.session_id
            );
        } else {
            self.post_error(what, extra);
        }
    }

    pub(crate) fn post_error(&self, what: i32, extra: i32) {
        telemetry::hub().record_error_posted(self.session_id, what, extra);
        if !self.sink.post(BackendEvent::PostedError { what, extra }) {
            log::warn!(
                "[{}] session {}: event queue closed, dropping error ({}, {})",
                self.component,
                self.session_id,
                what,
                extra
            );
        }
    }

    /// Translate a synchronous substrate failure.
    ///
    /// I/O failures leave the state untouched so the caller may retry; every
    /// other failure moves the session to Error.
    pub(crate) fn substrate_failure(
        &mut self,
        code: ResultCode,
        operation: &'static str,
    ) -> PlaybackError {
        log::warn!(
            "[{}] session {}: {} failed with {}",
            self.component,
            self.session_id,
            operation,
            code
        );
        if code.class() != ResultClass::Io {
            self.enter(PlaybackState::Error);
        }
        substrate_error(code, operation)
    }
}
