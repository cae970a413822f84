//! PlaybackSession: the application-facing facade over one backend.
//!
//! The session forwards every call to its backend under the backend lock,
//! drains the event queue on the caller's thread and delivers notifications
//! to listeners with no lock held. It also binds effect handles to the
//! backend's acoustic session.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::effects::{EffectControlArbiter, EffectHandle, EffectKind};
use crate::engine::backend::{BackendKind, NextPlayer, PlaybackBackend, SharedBackend};
use crate::engine::events::{BackendEvent, EventQueue};
use crate::engine::listeners::{Listener, ListenerRegistry, Subscription};
use crate::engine::source::DataSource;
use crate::error::{EffectError, PlaybackError};
use crate::state::PlaybackState;

/// One playback session.
///
/// Dropping the session releases it.
pub struct PlaybackSession {
    id: u64,
    kind: BackendKind,
    backend: SharedBackend,
    queue: EventQueue,
    listeners: Arc<ListenerRegistry>,
    arbiter: Arc<EffectControlArbiter>,
    dispatching: Mutex<()>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl PlaybackSession {
    /// Wrap a backend built around `queue`'s sink.
    pub fn new(
        backend: Box<dyn PlaybackBackend>,
        queue: EventQueue,
        arbiter: Arc<EffectControlArbiter>,
    ) -> Self {
        let id = backend.session_id();
        let kind = backend.kind();
        log::info!("[PlaybackSession] session {} created on {:?} backend", id, kind);
        Self {
            id,
            kind,
            backend: Arc::new(Mutex::new(backend)),
            queue,
            listeners: Arc::new(ListenerRegistry::new()),
            arbiter,
            dispatching: Mutex::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn PlaybackBackend>>, PlaybackError> {
        self.backend.lock().map_err(|_| PlaybackError::LockPoisoned {
            component: format!("playback_session_{}", self.id),
        })
    }

    fn with_backend<T>(
        &self,
        f: impl FnOnce(&mut dyn PlaybackBackend) -> Result<T, PlaybackError>,
    ) -> Result<T, PlaybackError> {
        let mut backend = self.lock()?;
        f(backend.as_mut())
    }

    /// Current state; `End` once the backend lock is unusable.
    pub fn state(&self) -> PlaybackState {
        self.lock()
            .map(|backend| backend.state())
            .unwrap_or(PlaybackState::End)
    }

    pub fn prior_error_state(&self) -> PlaybackState {
        self.lock()
            .map(|backend| backend.prior_error_state())
            .unwrap_or(PlaybackState::Idle)
    }

    pub fn set_source(&self, source: &DataSource) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.set_source(source))
    }

    /// Blocking prepare.
    pub fn prepare(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.prepare())
    }

    pub fn prepare_async(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.prepare_async())
    }

    pub fn start(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.start())
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.pause())
    }

    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.stop())
    }

    pub fn reset(&self) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.reset())
    }

    /// Release the backend and drop every listener. Safe to repeat.
    pub fn release(&self) {
        match self.backend.lock() {
            Ok(mut backend) => backend.release(),
            Err(poisoned) => poisoned.into_inner().release(),
        }
        self.queue.cancel_pending();
        self.listeners.close();
    }

    pub fn seek_to(&self, msec: u32) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.seek_to(msec))
    }

    pub fn duration(&self) -> Result<u32, PlaybackError> {
        self.with_backend(|backend| backend.duration())
    }

    pub fn current_position(&self) -> Result<u32, PlaybackError> {
        self.with_backend(|backend| backend.current_position())
    }

    pub fn set_looping(&self, looping: bool) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.set_looping(looping))
    }

    pub fn is_looping(&self) -> Result<bool, PlaybackError> {
        self.with_backend(|backend| backend.is_looping())
    }

    pub fn is_playing(&self) -> Result<bool, PlaybackError> {
        self.with_backend(|backend| backend.is_playing())
    }

    pub fn set_volume(&self, left: f32, right: f32) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.set_volume(left, right))
    }

    /// Play `next` gaplessly after this session, or clear the successor.
    pub fn set_next(&self, next: Option<&PlaybackSession>) -> Result<(), PlaybackError> {
        let next = match next {
            Some(other) if Arc::ptr_eq(&self.backend, &other.backend) => {
                return Err(PlaybackError::InvalidArgument {
                    reason: "a session cannot be its own successor".to_string(),
                });
            }
            Some(other) => Some(NextPlayer::new(&other.backend)),
            None => None,
        };
        self.with_backend(|backend| backend.set_next(next))
    }

    pub fn attach_aux_effect(&self, effect_id: i32) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.attach_aux_effect(effect_id))
    }

    pub fn set_aux_effect_send_level(&self, level: f32) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.set_aux_effect_send_level(level))
    }

    pub fn audio_session_id(&self) -> Result<i32, PlaybackError> {
        self.with_backend(|backend| backend.audio_session_id())
    }

    pub fn set_audio_session_id(&self, audio_session_id: i32) -> Result<(), PlaybackError> {
        self.with_backend(|backend| backend.set_audio_session_id(audio_session_id))
    }

    /// Create an effect bound to this session's acoustic session.
    ///
    /// The handle outlives the session; its parameters persist until the
    /// last handle of its category is released.
    pub fn create_effect<K: EffectKind>(&self) -> Result<EffectHandle<K>, EffectError> {
        let audio_session_id = self.audio_session_id().map_err(|err| match err {
            PlaybackError::Released => EffectError::Released,
            PlaybackError::Io { code, .. } | PlaybackError::Engine { code } => {
                EffectError::Engine { code }
            }
            other => EffectError::InvalidArgument {
                reason: other.to_string(),
            },
        })?;
        self.arbiter.create::<K>(audio_session_id)
    }

    pub fn on_prepared<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        self.listeners.register(Listener::Prepared(Arc::new(listener)))
    }

    pub fn on_completion<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        self.listeners
            .register(Listener::Completion(Arc::new(listener)))
    }

    pub fn on_seek_complete<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        self.listeners
            .register(Listener::SeekComplete(Arc::new(listener)))
    }

    pub fn on_buffering_update<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession, i32) + Send + Sync + 'static,
    {
        self.listeners
            .register(Listener::BufferingUpdate(Arc::new(listener)))
    }

    pub fn on_info<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession, i32, i32) + Send + Sync + 'static,
    {
        self.listeners.register(Listener::Info(Arc::new(listener)))
    }

    /// Register an error listener; returning `true` marks the error handled
    /// and suppresses the completion that would follow it.
    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlaybackSession, i32, i32) -> bool + Send + Sync + 'static,
    {
        self.listeners.register(Listener::Error(Arc::new(listener)))
    }

    /// Deliver every queued event. Returns the number of events handled.
    ///
    /// A call made while another dispatch for this session is running (for
    /// instance from inside a listener) returns 0 immediately.
    pub fn dispatch_pending(&self) -> usize {
        let Ok(_dispatching) = self.dispatching.try_lock() else {
            return 0;
        };
        let mut handled = 0;
        while let Some(event) = self.queue.try_next() {
            self.deliver(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next event and deliver it.
    ///
    /// Returns `false` if the queue yielded nothing.
    pub async fn dispatch_next(&self) -> bool {
        let Some(event) = self.queue.next().await else {
            return false;
        };
        let _dispatching = self
            .dispatching
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.deliver(event);
        true
    }

    fn deliver(&self, event: BackendEvent) {
        let notifications = match self.lock() {
            Ok(mut backend) => backend.handle_event(event),
            Err(err) => {
                tracing::error!("[PlaybackSession] dropping {:?}: {}", event, err);
                return;
            }
        };
        for notification in notifications {
            tracing::debug!("[PlaybackSession] session {}: {:?}", self.id, notification);
            self.listeners.deliver(self, notification);
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}
