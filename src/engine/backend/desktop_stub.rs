//! Deterministic desktop substrates for tests and CLI tooling.
//!
//! Neither stub produces audio. They track transport state in memory, post
//! the signals a real substrate would post, and accept injected failures so
//! every adapter path can be exercised off-device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::engine::events::{BackendEvent, EventSink};
use crate::engine::source::DataSource;
use crate::error::ResultCode;

use super::native::{EngineRequest, EngineResponse, EngineValue, NativeEngine, Opcode, PlayerHandle};
use super::stock::{DecoderLink, DecoderQuirks, StockDecoder};

/// Content length reported by the stubs unless configured otherwise.
pub const DEFAULT_STUB_DURATION_MS: u32 = 10_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct DecoderShared {
    sink: Option<EventSink>,
    duration_ms: u32,
    position_ms: u32,
    playing: bool,
    looping: bool,
    next: Option<DecoderLink>,
    audio_session_id: i32,
    aux_effect: Option<i32>,
    released: bool,
    failures: HashMap<&'static str, ResultCode>,
    calls: Vec<&'static str>,
}

impl DecoderShared {
    fn enter(&mut self, call: &'static str) -> Result<(), ResultCode> {
        self.calls.push(call);
        if self.released {
            return Err(ResultCode::DeadObject);
        }
        match self.failures.remove(call) {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn post(&self, event: BackendEvent) {
        if let Some(sink) = &self.sink {
            sink.post(event);
        }
    }
}

struct PoolInner {
    quirks: DecoderQuirks,
    duration_ms: u32,
    next_link: AtomicU64,
    next_audio_session: AtomicI32,
    decoders: Mutex<HashMap<DecoderLink, Weak<Mutex<DecoderShared>>>>,
}

impl PoolInner {
    fn find(&self, link: DecoderLink) -> Option<Arc<Mutex<DecoderShared>>> {
        lock(&self.decoders).get(&link).and_then(Weak::upgrade)
    }
}

/// Source of [`StubDecoder`]s sharing one quirk profile.
///
/// The pool knows every decoder it created, which lets a finished decoder
/// start its natively chained successor the way the platform would.
#[derive(Clone)]
pub struct StubDecoderPool {
    inner: Arc<PoolInner>,
}

impl Default for StubDecoderPool {
    fn default() -> Self {
        Self::new(DecoderQuirks::detect(21, false))
    }
}

impl StubDecoderPool {
    pub fn new(quirks: DecoderQuirks) -> Self {
        Self::with_duration(quirks, DEFAULT_STUB_DURATION_MS)
    }

    pub fn with_duration(quirks: DecoderQuirks, duration_ms: u32) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                quirks,
                duration_ms,
                next_link: AtomicU64::new(1),
                next_audio_session: AtomicI32::new(1),
                decoders: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn quirks(&self) -> DecoderQuirks {
        self.inner.quirks
    }

    pub fn create(&self) -> StubDecoder {
        let link = DecoderLink(self.inner.next_link.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(Mutex::new(DecoderShared {
            audio_session_id: self.inner.next_audio_session.fetch_add(1, Ordering::Relaxed),
            ..DecoderShared::default()
        }));
        let mut decoders = lock(&self.inner.decoders);
        decoders.retain(|_, decoder| decoder.strong_count() > 0);
        decoders.insert(link, Arc::downgrade(&shared));
        StubDecoder {
            shared,
            pool: Arc::downgrade(&self.inner),
            quirks: self.inner.quirks,
            link,
            duration_ms: self.inner.duration_ms,
        }
    }

    /// Control surface of the live decoder bound to `audio_session_id`.
    pub fn control(&self, audio_session_id: i32) -> Option<StubDecoderControl> {
        lock(&self.inner.decoders)
            .values()
            .filter_map(Weak::upgrade)
            .find(|shared| lock(shared).audio_session_id == audio_session_id)
            .map(|shared| StubDecoderControl {
                shared,
                pool: Arc::downgrade(&self.inner),
                quirks: self.inner.quirks,
            })
    }

    /// Boxed constructor for [`crate::engine::Substrates`].
    pub fn factory(&self) -> impl Fn() -> Box<dyn StockDecoder> + Send + Sync + 'static {
        let pool = self.clone();
        move || Box::new(pool.create()) as Box<dyn StockDecoder>
    }
}

/// In-memory [`StockDecoder`].
pub struct StubDecoder {
    shared: Arc<Mutex<DecoderShared>>,
    pool: Weak<PoolInner>,
    quirks: DecoderQuirks,
    link: DecoderLink,
    duration_ms: u32,
}

impl StubDecoder {
    pub fn control(&self) -> StubDecoderControl {
        StubDecoderControl {
            shared: Arc::clone(&self.shared),
            pool: self.pool.clone(),
            quirks: self.quirks,
        }
    }

    fn state(&self) -> MutexGuard<'_, DecoderShared> {
        lock(&self.shared)
    }
}

impl StockDecoder for StubDecoder {
    fn attach(&mut self, sink: EventSink) {
        self.state().sink = Some(sink);
    }

    fn quirks(&self) -> DecoderQuirks {
        self.quirks
    }

    fn link(&self) -> DecoderLink {
        self.link
    }

    fn set_source(&mut self, _source: &DataSource) -> Result<(), ResultCode> {
        self.state().enter("set_source")
    }

    fn prepare(&mut self) -> Result<(), ResultCode> {
        let duration_ms = self.duration_ms;
        let mut state = self.state();
        state.enter("prepare")?;
        state.duration_ms = duration_ms;
        Ok(())
    }

    fn prepare_async(&mut self) -> Result<(), ResultCode> {
        let duration_ms = self.duration_ms;
        let mut state = self.state();
        state.enter("prepare_async")?;
        state.duration_ms = duration_ms;
        state.post(BackendEvent::Prepared);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("start")?;
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("pause")?;
        state.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("stop")?;
        state.playing = false;
        state.position_ms = 0;
        Ok(())
    }

    fn seek_to(&mut self, msec: u32) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("seek_to")?;
        state.position_ms = msec;
        state.post(BackendEvent::SeekComplete);
        Ok(())
    }

    fn reset(&mut self) {
        let mut state = self.state();
        state.calls.push("reset");
        state.duration_ms = 0;
        state.position_ms = 0;
        state.playing = false;
        state.looping = false;
        state.next = None;
    }

    fn release(&mut self) {
        let mut state = self.state();
        state.calls.push("release");
        state.released = true;
        state.playing = false;
        state.sink = None;
    }

    fn set_looping(&mut self, looping: bool) {
        let mut state = self.state();
        state.calls.push("set_looping");
        state.looping = looping;
    }

    fn set_next_decoder(&mut self, next: Option<DecoderLink>) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("set_next_decoder")?;
        state.next = next;
        Ok(())
    }

    fn set_volume(&mut self, _left: f32, _right: f32) -> Result<(), ResultCode> {
        self.state().enter("set_volume")
    }

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("attach_aux_effect")?;
        state.aux_effect = Some(effect_id);
        Ok(())
    }

    fn set_aux_effect_send_level(&mut self, _level: f32) -> Result<(), ResultCode> {
        self.state().enter("set_aux_effect_send_level")
    }

    fn audio_session_id(&self) -> i32 {
        self.state().audio_session_id
    }

    fn set_audio_session_id(&mut self, audio_session_id: i32) -> Result<(), ResultCode> {
        let mut state = self.state();
        state.enter("set_audio_session_id")?;
        state.audio_session_id = audio_session_id;
        Ok(())
    }

    fn duration(&self) -> u32 {
        self.state().duration_ms
    }

    fn current_position(&self) -> u32 {
        self.state().position_ms
    }

    fn is_playing(&self) -> bool {
        self.state().playing
    }
}

/// Test-side handle onto a [`StubDecoder`].
#[derive(Clone)]
pub struct StubDecoderControl {
    shared: Arc<Mutex<DecoderShared>>,
    pool: Weak<PoolInner>,
    quirks: DecoderQuirks,
}

impl StubDecoderControl {
    /// Make the next call named `call` fail with `code`.
    pub fn fail_next(&self, call: &'static str, code: ResultCode) {
        lock(&self.shared).failures.insert(call, code);
    }

    /// Overwrite the decoder's playback position.
    pub fn set_position(&self, position_ms: u32) {
        lock(&self.shared).position_ms = position_ms;
    }

    pub fn position(&self) -> u32 {
        lock(&self.shared).position_ms
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared).playing
    }

    pub fn is_looping(&self) -> bool {
        lock(&self.shared).looping
    }

    pub fn next_link(&self) -> Option<DecoderLink> {
        lock(&self.shared).next
    }

    pub fn aux_effect(&self) -> Option<i32> {
        lock(&self.shared).aux_effect
    }

    /// Names of the decoder calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.shared).calls.clone()
    }

    pub fn post(&self, event: BackendEvent) {
        lock(&self.shared).post(event);
    }

    /// Reach the end of the content, reacting the way the platform would.
    pub fn finish_playback(&self) {
        let chained = {
            let mut state = lock(&self.shared);
            if state.looping && self.quirks.seek_complete_on_loop {
                state.position_ms = 0;
                state.post(BackendEvent::SeekComplete);
                return;
            }
            if state.looping && self.quirks.completion_on_loop {
                state.position_ms = 0;
                state.post(BackendEvent::Completion);
                return;
            }
            state.playing = false;
            state.position_ms = state.duration_ms;
            state.post(BackendEvent::Completion);
            if self.quirks.native_next_player {
                state.next
            } else {
                None
            }
        };

        if let Some(next) = chained.and_then(|link| self.pool.upgrade()?.find(link)) {
            let mut next = lock(&next);
            next.playing = true;
            next.position_ms = 0;
        }
    }
}

#[derive(Debug)]
struct StubPlayer {
    sink: EventSink,
    duration_ms: u32,
    position_ms: u32,
    has_source: bool,
    playing: bool,
    looping: bool,
    next: Option<PlayerHandle>,
    audio_session_id: i32,
}

#[derive(Default)]
struct EngineState {
    next_handle: u64,
    players: HashMap<PlayerHandle, StubPlayer>,
    failures: HashMap<Opcode, ResultCode>,
}

/// In-memory [`NativeEngine`].
pub struct StubNativeEngine {
    state: Mutex<EngineState>,
    duration_ms: u32,
}

impl Default for StubNativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubNativeEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            duration_ms: DEFAULT_STUB_DURATION_MS,
        }
    }

    /// Make the next request with `opcode` fail with `code`.
    pub fn fail_next(&self, opcode: Opcode, code: ResultCode) {
        lock(&self.state).failures.insert(opcode, code);
    }

    pub fn live_players(&self) -> usize {
        lock(&self.state).players.len()
    }

    pub fn handle_for_session(&self, audio_session_id: i32) -> Option<PlayerHandle> {
        lock(&self.state)
            .players
            .iter()
            .find(|(_, player)| player.audio_session_id == audio_session_id)
            .map(|(handle, _)| *handle)
    }

    pub fn is_playing(&self, handle: PlayerHandle) -> bool {
        lock(&self.state)
            .players
            .get(&handle)
            .is_some_and(|player| player.playing)
    }

    /// Post a raw `(kind, arg1, arg2)` event as the engine thread would.
    pub fn post_event(&self, handle: PlayerHandle, kind: i32, arg1: i32, arg2: i32) {
        let state = lock(&self.state);
        match (
            state.players.get(&handle),
            BackendEvent::from_native(kind, arg1, arg2),
        ) {
            (Some(player), Some(event)) => {
                player.sink.post(event);
            }
            (None, _) => log::warn!("[StubNativeEngine] no player {:?}", handle),
            (_, None) => log::debug!("[StubNativeEngine] dropping event kind {}", kind),
        }
    }

    /// Reach the end of the content on `handle`.
    ///
    /// Looping players wrap and signal a seek completion; others complete and
    /// hand over to their successor.
    pub fn finish_playback(&self, handle: PlayerHandle) {
        let mut state = lock(&self.state);
        let next = match state.players.get_mut(&handle) {
            Some(player) if player.looping => {
                player.position_ms = 0;
                player.sink.post(BackendEvent::SeekComplete);
                return;
            }
            Some(player) => {
                player.playing = false;
                player.position_ms = player.duration_ms;
                player.sink.post(BackendEvent::Completion);
                player.next
            }
            None => return,
        };
        if let Some(next) = next.and_then(|next| state.players.get_mut(&next)) {
            next.playing = true;
            next.position_ms = 0;
        }
    }
}

impl NativeEngine for StubNativeEngine {
    fn create_player(&self, sink: EventSink) -> Result<PlayerHandle, ResultCode> {
        let mut state = lock(&self.state);
        state.next_handle += 1;
        let next_handle = state.next_handle;
        let handle = PlayerHandle(next_handle);
        state.players.insert(
            handle,
            StubPlayer {
                sink,
                duration_ms: 0,
                position_ms: 0,
                has_source: false,
                playing: false,
                looping: false,
                next: None,
                audio_session_id: 1000 + next_handle as i32,
            },
        );
        Ok(handle)
    }

    fn call(&self, handle: PlayerHandle, request: EngineRequest) -> EngineResponse {
        let duration_ms = self.duration_ms;
        let mut state = lock(&self.state);
        if let Some(code) = state.failures.remove(&request.opcode()) {
            return EngineResponse::failed(code);
        }
        let Some(player) = state.players.get_mut(&handle) else {
            return EngineResponse::failed(ResultCode::InvalidHandle);
        };

        let value = match request {
            EngineRequest::SetSource(_) => {
                player.has_source = true;
                EngineValue::None
            }
            EngineRequest::Prepare | EngineRequest::PrepareAsync if !player.has_source => {
                return EngineResponse::failed(ResultCode::IllegalState);
            }
            EngineRequest::Prepare => {
                player.duration_ms = duration_ms;
                EngineValue::None
            }
            EngineRequest::PrepareAsync => {
                player.duration_ms = duration_ms;
                player.sink.post(BackendEvent::Prepared);
                EngineValue::None
            }
            EngineRequest::Start => {
                player.playing = true;
                EngineValue::None
            }
            EngineRequest::Pause => {
                player.playing = false;
                EngineValue::None
            }
            EngineRequest::Stop => {
                player.playing = false;
                player.position_ms = 0;
                EngineValue::None
            }
            EngineRequest::Reset => {
                player.has_source = false;
                player.playing = false;
                player.looping = false;
                player.duration_ms = 0;
                player.position_ms = 0;
                player.next = None;
                EngineValue::None
            }
            EngineRequest::SeekTo { msec } => {
                player.position_ms = msec.min(player.duration_ms.saturating_sub(1));
                player.sink.post(BackendEvent::SeekComplete);
                EngineValue::None
            }
            EngineRequest::GetDuration => EngineValue::Int(player.duration_ms as i32),
            EngineRequest::GetCurrentPosition => EngineValue::Int(player.position_ms as i32),
            EngineRequest::SetLooping { looping } => {
                player.looping = looping;
                EngineValue::None
            }
            EngineRequest::IsLooping => EngineValue::Bool(player.looping),
            EngineRequest::IsPlaying => EngineValue::Bool(player.playing),
            EngineRequest::SetNext { next } => {
                player.next = next;
                EngineValue::None
            }
            EngineRequest::SetVolume { .. }
            | EngineRequest::AttachAuxEffect { .. }
            | EngineRequest::SetAuxEffectSendLevel { .. } => EngineValue::None,
            EngineRequest::GetAudioSessionId => EngineValue::Int(player.audio_session_id),
        };
        EngineResponse::ok(value)
    }

    fn destroy_player(&self, handle: PlayerHandle) {
        lock(&self.state).players.remove(&handle);
    }
}
