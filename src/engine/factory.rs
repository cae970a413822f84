//! Session and effect construction.
//!
//! [`PlayerFactory`] picks a backend for each new session from the config
//! preference and the process-wide native capability flag, and owns the
//! effect arbiter every session shares.

use std::sync::Arc;

use crate::config::{BackendPreference, PlayerConfig};
use crate::effects::{EffectControlArbiter, EffectHandle, EffectKind, EffectProfile};
use crate::engine::backend::{
    BackendKind, NativeEngine, NativeEngineAdapter, PlaybackBackend, StockBackendAdapter,
    StockDecoder, StubDecoderPool, StubNativeEngine,
};
use crate::engine::capability;
use crate::engine::events::EventQueue;
use crate::engine::session::PlaybackSession;
use crate::error::{EffectError, PlaybackError};

/// Constructor for fresh stock decoders.
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn StockDecoder> + Send + Sync>;

/// Playback substrates available to the factory.
#[derive(Clone)]
pub struct Substrates {
    pub decoders: DecoderFactory,
    pub native: Option<Arc<dyn NativeEngine>>,
}

impl Substrates {
    pub fn new(decoders: DecoderFactory, native: Option<Arc<dyn NativeEngine>>) -> Self {
        Self { decoders, native }
    }

    /// In-memory decoder pool and native engine for desktop runs.
    pub fn desktop_stub(pool: &StubDecoderPool, native: Option<Arc<StubNativeEngine>>) -> Self {
        Self {
            decoders: Arc::new(pool.factory()),
            native: native.map(|engine| engine as Arc<dyn NativeEngine>),
        }
    }
}

/// Creates playback sessions and effects.
pub struct PlayerFactory {
    config: PlayerConfig,
    substrates: Substrates,
    arbiter: Arc<EffectControlArbiter>,
}

impl PlayerFactory {
    pub fn new(config: PlayerConfig, substrates: Substrates) -> Self {
        let arbiter = EffectControlArbiter::new(
            EffectProfile::default(),
            &config.equalizer.corrector(),
        );
        Self {
            config,
            substrates,
            arbiter: Arc::new(arbiter),
        }
    }

    /// Replace the shared arbiter, e.g. one with a parameter sink attached.
    pub fn with_arbiter(mut self, arbiter: EffectControlArbiter) -> Self {
        self.arbiter = Arc::new(arbiter);
        self
    }

    pub fn arbiter(&self) -> &Arc<EffectControlArbiter> {
        &self.arbiter
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Backend the next [`create_session`](Self::create_session) would use.
    pub fn backend_kind(&self) -> Result<BackendKind, PlaybackError> {
        let native_ready = self.substrates.native.is_some() && capability::native_engine_available();
        match self.config.backend.preference {
            BackendPreference::Stock => Ok(BackendKind::Stock),
            BackendPreference::Auto if native_ready => Ok(BackendKind::Native),
            BackendPreference::Auto => Ok(BackendKind::Stock),
            BackendPreference::Native if native_ready => Ok(BackendKind::Native),
            BackendPreference::Native => Err(PlaybackError::BackendUnavailable {
                reason: "native engine is not loaded".to_string(),
            }),
        }
    }

    pub fn create_session(&self) -> Result<PlaybackSession, PlaybackError> {
        let kind = self.backend_kind()?;
        self.create_session_with(kind)
    }

    /// Create a session on an explicit backend, bypassing the preference.
    pub fn create_session_with(&self, kind: BackendKind) -> Result<PlaybackSession, PlaybackError> {
        let queue = EventQueue::new();
        let backend: Box<dyn PlaybackBackend> = match kind {
            BackendKind::Stock => {
                let decoder = (self.substrates.decoders)();
                let quirks = self.config.compat.apply(decoder.quirks());
                Box::new(StockBackendAdapter::new(decoder, quirks, queue.sink()))
            }
            BackendKind::Native => {
                let engine = match &self.substrates.native {
                    Some(engine) if capability::native_engine_available() => Arc::clone(engine),
                    _ => {
                        return Err(PlaybackError::BackendUnavailable {
                            reason: "native engine is not loaded".to_string(),
                        })
                    }
                };
                Box::new(NativeEngineAdapter::new(engine, queue.sink())?)
            }
        };
        Ok(PlaybackSession::new(backend, queue, Arc::clone(&self.arbiter)))
    }

    /// Create an effect on an acoustic session that need not belong to any
    /// player (e.g. the global output mix).
    pub fn create_effect<K: EffectKind>(
        &self,
        audio_session_id: i32,
    ) -> Result<EffectHandle<K>, EffectError> {
        self.arbiter.create::<K>(audio_session_id)
    }
}

impl Default for PlayerFactory {
    /// Desktop stubs with the default configuration.
    fn default() -> Self {
        let pool = StubDecoderPool::default();
        let substrates = Substrates::desktop_stub(&pool, Some(Arc::new(StubNativeEngine::new())));
        Self::new(PlayerConfig::default(), substrates)
    }
}
