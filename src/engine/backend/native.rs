//! Adapter over the native low-latency engine.
//!
//! The engine is reached only through typed request/response calls on an
//! opaque [`PlayerHandle`]; its asynchronous events arrive on the session
//! queue. How a failed call surfaces depends on the operation: source and
//! prepare failures are raised as-is, asynchronous prepare, reset and chaining
//! raise I/O failures as state failures, and transport calls never raise but
//! move the session to Error and post an error notification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::events::{BackendEvent, EventSink, Notification, MEDIA_ERROR_UNKNOWN};
use crate::engine::source::DataSource;
use crate::error::{PlaybackError, ResultCode};
use crate::state::{NotificationSkip, Operation, PlaybackState};

use super::{
    inspect_successor, validate_send_level, BackendKind, CallGuard, Lifecycle, NextPlayer,
    PlaybackBackend,
};

const COMPONENT: &str = "NativeBackend";

/// Opaque handle of one player inside the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerHandle(pub u64);

/// Operation codes understood by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    SetSource,
    Prepare,
    PrepareAsync,
    Start,
    Pause,
    Stop,
    Reset,
    SeekTo,
    GetDuration,
    GetCurrentPosition,
    SetLooping,
    IsLooping,
    IsPlaying,
    SetVolume,
    SetNext,
    AttachAuxEffect,
    SetAuxEffectSendLevel,
    GetAudioSessionId,
}

/// Typed request sent to the native engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineRequest {
    SetSource(DataSource),
    Prepare,
    PrepareAsync,
    Start,
    Pause,
    Stop,
    Reset,
    SeekTo { msec: u32 },
    GetDuration,
    GetCurrentPosition,
    SetLooping { looping: bool },
    IsLooping,
    IsPlaying,
    SetVolume { left: f32, right: f32 },
    SetNext { next: Option<PlayerHandle> },
    AttachAuxEffect { effect_id: i32 },
    SetAuxEffectSendLevel { level: f32 },
    GetAudioSessionId,
}

impl EngineRequest {
    pub fn opcode(&self) -> Opcode {
        match self {
            EngineRequest::SetSource(_) => Opcode::SetSource,
            EngineRequest::Prepare => Opcode::Prepare,
            EngineRequest::PrepareAsync => Opcode::PrepareAsync,
            EngineRequest::Start => Opcode::Start,
            EngineRequest::Pause => Opcode::Pause,
            EngineRequest::Stop => Opcode::Stop,
            EngineRequest::Reset => Opcode::Reset,
            EngineRequest::SeekTo { .. } => Opcode::SeekTo,
            EngineRequest::GetDuration => Opcode::GetDuration,
            EngineRequest::GetCurrentPosition => Opcode::GetCurrentPosition,
            EngineRequest::SetLooping { .. } => Opcode::SetLooping,
            EngineRequest::IsLooping => Opcode::IsLooping,
            EngineRequest::IsPlaying => Opcode::IsPlaying,
            EngineRequest::SetVolume { .. } => Opcode::SetVolume,
            EngineRequest::SetNext { .. } => Opcode::SetNext,
            EngineRequest::AttachAuxEffect { .. } => Opcode::AttachAuxEffect,
            EngineRequest::SetAuxEffectSendLevel { .. } => Opcode::SetAuxEffectSendLevel,
            EngineRequest::GetAudioSessionId => Opcode::GetAudioSessionId,
        }
    }
}

/// Value carried by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineValue {
    None,
    Int(i32),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineResponse {
    pub code: ResultCode,
    pub value: EngineValue,
}

impl EngineResponse {
    pub fn ok(value: EngineValue) -> Self {
        Self {
            code: ResultCode::Success,
            value,
        }
    }

    pub fn failed(code: ResultCode) -> Self {
        Self {
            code,
            value: EngineValue::None,
        }
    }

    fn int(&self) -> Option<i32> {
        match (self.code, self.value) {
            (ResultCode::Success, EngineValue::Int(value)) => Some(value),
            _ => None,
        }
    }

    fn bool(&self) -> Option<bool> {
        match (self.code, self.value) {
            (ResultCode::Success, EngineValue::Bool(value)) => Some(value),
            _ => None,
        }
    }
}

/// Foreign-function boundary of the native engine.
pub trait NativeEngine: Send + Sync {
    /// Allocate a player whose events are posted to `sink`.
    fn create_player(&self, sink: EventSink) -> Result<PlayerHandle, ResultCode>;
    fn call(&self, handle: PlayerHandle, request: EngineRequest) -> EngineResponse;
    fn destroy_player(&self, handle: PlayerHandle);
}

/// How a failed engine result surfaces to the caller.
#[derive(Debug, Clone, Copy)]
enum Surface {
    /// Raise every failure.
    Raise,
    /// Raise, reporting I/O failures as state failures.
    RaiseExceptIo,
    /// Never raise; enter Error and post a notification instead.
    Notify(NotificationSkip),
}

/// [`PlaybackBackend`] over a [`NativeEngine`] player.
pub struct NativeEngineAdapter {
    lifecycle: Lifecycle,
    engine: Arc<dyn NativeEngine>,
    handle: PlayerHandle,
    duration: u32,
}

impl NativeEngineAdapter {
    pub fn new(engine: Arc<dyn NativeEngine>, sink: EventSink) -> Result<Self, PlaybackError> {
        let handle =
            engine
                .create_player(sink.clone())
                .map_err(|code| PlaybackError::BackendUnavailable {
                    reason: format!("native engine refused to create a player: {}", code),
                })?;
        log::info!("[{}] created player {:?}", COMPONENT, handle);
        Ok(Self {
            lifecycle: Lifecycle::new(COMPONENT, sink),
            engine,
            handle,
            duration: 0,
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle
    }

    fn call(&self, request: EngineRequest) -> EngineResponse {
        let opcode = request.opcode();
        let response = self.engine.call(self.handle, request);
        if !response.code.is_success() {
            log::debug!(
                "[{}] {:?} on {:?} returned {}",
                COMPONENT,
                opcode,
                self.handle,
                response.code
            );
        }
        response
    }

    /// Apply the surfacing policy to `code`.
    ///
    /// Returns `Ok(true)` when the engine accepted the call, `Ok(false)` when a
    /// failure was absorbed (the session is then in Error).
    fn settle(
        &mut self,
        code: ResultCode,
        operation: &'static str,
        surface: Surface,
    ) -> Result<bool, PlaybackError> {
        if code.is_success() {
            return Ok(true);
        }
        if code == ResultCode::InErrorState {
            self.lifecycle.enter(PlaybackState::Error);
            return Ok(false);
        }

        match surface {
            Surface::Raise => Err(self.lifecycle.substrate_failure(code, operation)),
            Surface::RaiseExceptIo => {
                self.lifecycle.enter(PlaybackState::Error);
                code.check_except_io(operation).map(|_| false)
            }
            Surface::Notify(skip) => {
                log::warn!("[{}] {} failed with {}", COMPONENT, operation, code);
                self.lifecycle
                    .fail_and_notify(MEDIA_ERROR_UNKNOWN, code.raw(), skip);
                Ok(false)
            }
        }
    }

    /// Run a call whose failure is only logged.
    fn call_logged(&self, request: EngineRequest, operation: &'static str) -> EngineResponse {
        let response = self.call(request);
        if !response.code.is_success() {
            log::warn!(
                "[{}] {} failed with {}",
                COMPONENT,
                operation,
                response.code
            );
        }
        response
    }

    fn refresh_duration(&mut self) {
        if let Some(duration) = self.call(EngineRequest::GetDuration).int() {
            self.duration = duration.max(0) as u32;
        }
    }
}

impl PlaybackBackend for NativeEngineAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn session_id(&self) -> u64 {
        self.lifecycle.session_id()
    }

    fn state(&self) -> PlaybackState {
        self.lifecycle.state()
    }

    fn prior_error_state(&self) -> PlaybackState {
        self.lifecycle.prior_error_state()
    }

    fn set_source(&mut self, source: &DataSource) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::SetSource)? == CallGuard::Skip {
            return Ok(());
        }
        let code = self.call(EngineRequest::SetSource(source.clone())).code;
        if self.settle(code, "set_source", Surface::Raise)? {
            self.lifecycle.enter(PlaybackState::Initialized);
        }
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::Prepare)?;
        let code = self.call(EngineRequest::Prepare).code;
        if self.settle(code, "prepare", Surface::Raise)? {
            self.refresh_duration();
            self.lifecycle.enter(PlaybackState::Prepared);
        }
        Ok(())
    }

    fn prepare_async(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::PrepareAsync)?;
        let code = self.call(EngineRequest::PrepareAsync).code;
        if self.settle(code, "prepare_async", Surface::RaiseExceptIo)? {
            self.lifecycle.enter(PlaybackState::Preparing);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Start)? == CallGuard::Skip {
            return Ok(());
        }
        let code = self.call(EngineRequest::Start).code;
        if self.settle(code, "start", Surface::Notify(NotificationSkip::Never))? {
            self.lifecycle.enter(PlaybackState::Started);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Pause)? == CallGuard::Skip {
            return Ok(());
        }
        let code = self.call(EngineRequest::Pause).code;
        if self.settle(
            code,
            "pause",
            Surface::Notify(NotificationSkip::BeforeFirstPrepare),
        )? && self.lifecycle.state() == PlaybackState::Started
        {
            self.lifecycle.enter(PlaybackState::Paused);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Stop)? == CallGuard::Skip {
            return Ok(());
        }
        let code = self.call(EngineRequest::Stop).code;
        if self.settle(
            code,
            "stop",
            Surface::Notify(NotificationSkip::BeforeFirstPrepare),
        )? {
            self.lifecycle.enter(PlaybackState::Stopped);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::Reset)?;
        let code = self.call(EngineRequest::Reset).code;
        self.lifecycle.sink().cancel_pending();
        if self.settle(code, "reset", Surface::RaiseExceptIo)? {
            self.duration = 0;
            self.lifecycle.enter(PlaybackState::Idle);
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.lifecycle.is_released() {
            return;
        }
        self.engine.destroy_player(self.handle);
        self.lifecycle.sink().cancel_pending();
        self.lifecycle.enter(PlaybackState::End);
        log::info!("[{}] released player {:?}", COMPONENT, self.handle);
    }

    fn seek_to(&mut self, msec: u32) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::SeekTo)? == CallGuard::Skip {
            return Ok(());
        }
        let code = self.call(EngineRequest::SeekTo { msec }).code;
        self.settle(
            code,
            "seek_to",
            Surface::Notify(NotificationSkip::BeforeFirstPrepare),
        )?;
        Ok(())
    }

    fn duration(&mut self) -> Result<u32, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        if self.lifecycle.state() == PlaybackState::Error {
            return Ok(self.duration);
        }
        if self.lifecycle.guard(Operation::GetDuration)? == CallGuard::Skip {
            return Ok(0);
        }
        self.refresh_duration();
        Ok(self.duration)
    }

    fn current_position(&mut self) -> Result<u32, PlaybackError> {
        if self.lifecycle.guard(Operation::GetCurrentPosition)? == CallGuard::Skip
            || !self.lifecycle.state().is_prepared()
        {
            return Ok(0);
        }
        let position = self
            .call_logged(EngineRequest::GetCurrentPosition, "current_position")
            .int()
            .unwrap_or(0);
        Ok((position.max(0) as u32).min(self.duration))
    }

    fn set_looping(&mut self, looping: bool) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.call_logged(EngineRequest::SetLooping { looping }, "set_looping");
        Ok(())
    }

    fn is_looping(&mut self) -> Result<bool, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Ok(self
            .call_logged(EngineRequest::IsLooping, "is_looping")
            .bool()
            .unwrap_or(false))
    }

    fn is_playing(&mut self) -> Result<bool, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Ok(self
            .call_logged(EngineRequest::IsPlaying, "is_playing")
            .bool()
            .unwrap_or(false))
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.call_logged(EngineRequest::SetVolume { left, right }, "set_volume");
        Ok(())
    }

    fn set_next(&mut self, next: Option<NextPlayer>) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        let next_handle = match &next {
            Some(next) => {
                let info = inspect_successor(next, BackendKind::Native, self.lifecycle.state())?;
                Some(info.native_handle.ok_or_else(|| {
                    PlaybackError::illegal_state("set_next", PlaybackState::End)
                })?)
            }
            None if matches!(
                self.lifecycle.state(),
                PlaybackState::Idle | PlaybackState::Error
            ) =>
            {
                return Err(PlaybackError::illegal_state(
                    "set_next",
                    self.lifecycle.state(),
                ));
            }
            None => None,
        };
        let code = self.call(EngineRequest::SetNext { next: next_handle }).code;
        self.settle(code, "set_next", Surface::RaiseExceptIo)?;
        Ok(())
    }

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.call_logged(
            EngineRequest::AttachAuxEffect { effect_id },
            "attach_aux_effect",
        );
        Ok(())
    }

    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        let level = validate_send_level(level)?;
        self.call_logged(
            EngineRequest::SetAuxEffectSendLevel { level },
            "set_aux_effect_send_level",
        );
        Ok(())
    }

    fn audio_session_id(&mut self) -> Result<i32, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Ok(self
            .call_logged(EngineRequest::GetAudioSessionId, "audio_session_id")
            .int()
            .unwrap_or(0))
    }

    fn set_audio_session_id(&mut self, _audio_session_id: i32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Err(PlaybackError::Unsupported {
            operation: "set_audio_session_id",
        })
    }

    fn handle_event(&mut self, event: BackendEvent) -> Vec<Notification> {
        if self.lifecycle.is_released() {
            return Vec::new();
        }

        match event {
            BackendEvent::Prepared => {
                if self.lifecycle.state() != PlaybackState::Preparing {
                    log::debug!(
                        "[{}] ignoring prepared event in {} state",
                        COMPONENT,
                        self.lifecycle.state()
                    );
                    return Vec::new();
                }
                self.refresh_duration();
                self.lifecycle.enter(PlaybackState::Prepared);
                vec![Notification::Prepared]
            }
            BackendEvent::Completion => {
                if self.lifecycle.state() == PlaybackState::Started {
                    self.lifecycle.enter(PlaybackState::PlaybackCompleted);
                }
                vec![Notification::Completion]
            }
            BackendEvent::SeekComplete => vec![Notification::SeekComplete],
            BackendEvent::BufferingUpdate { percent } => {
                vec![Notification::BufferingUpdate { percent }]
            }
            BackendEvent::Info { what, extra } => vec![Notification::Info { what, extra }],
            BackendEvent::Error { what, extra } => {
                log::warn!("[{}] engine error ({}, {})", COMPONENT, what, extra);
                self.lifecycle.enter(PlaybackState::Error);
                vec![Notification::Error { what, extra }]
            }
            BackendEvent::PostedError { what, extra } => vec![Notification::Error { what, extra }],
        }
    }

    fn native_handle(&self) -> Option<PlayerHandle> {
        if self.lifecycle.is_released() {
            None
        } else {
            Some(self.handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::StubNativeEngine;
    use crate::engine::events::EventQueue;

    fn adapter() -> (NativeEngineAdapter, Arc<StubNativeEngine>, EventQueue) {
        let engine = Arc::new(StubNativeEngine::new());
        let queue = EventQueue::new();
        let adapter = NativeEngineAdapter::new(engine.clone(), queue.sink()).expect("player");
        (adapter, engine, queue)
    }

    fn drain(adapter: &mut NativeEngineAdapter, queue: &EventQueue) -> Vec<Notification> {
        std::iter::from_fn(|| queue.try_next())
            .flat_map(|event| adapter.handle_event(event))
            .collect()
    }

    fn prepared() -> (NativeEngineAdapter, Arc<StubNativeEngine>, EventQueue) {
        let (mut adapter, engine, queue) = adapter();
        adapter
            .set_source(&DataSource::path("/music/a.ogg"))
            .expect("set_source");
        adapter.prepare().expect("prepare");
        (adapter, engine, queue)
    }

    #[test]
    fn opcodes_match_requests() {
        assert_eq!(EngineRequest::SeekTo { msec: 3 }.opcode(), Opcode::SeekTo);
        assert_eq!(
            EngineRequest::SetSource(DataSource::uri("content://x")).opcode(),
            Opcode::SetSource
        );
        assert_eq!(
            EngineRequest::SetNext { next: None }.opcode(),
            Opcode::SetNext
        );
    }

    #[test]
    fn async_prepare_reaches_prepared() {
        let (mut adapter, _engine, queue) = adapter();
        adapter
            .set_source(&DataSource::path("/music/a.ogg"))
            .unwrap();
        adapter.prepare_async().unwrap();
        assert_eq!(adapter.state(), PlaybackState::Preparing);

        assert_eq!(drain(&mut adapter, &queue), vec![Notification::Prepared]);
        assert_eq!(adapter.state(), PlaybackState::Prepared);
        assert!(adapter.duration().unwrap() > 0);
    }

    #[test]
    fn set_source_io_failure_is_retryable() {
        let (mut adapter, engine, _queue) = adapter();
        engine.fail_next(Opcode::SetSource, ResultCode::ContentNotFound);

        let err = adapter
            .set_source(&DataSource::path("/missing.ogg"))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(adapter.state(), PlaybackState::Idle);

        adapter
            .set_source(&DataSource::path("/music/a.ogg"))
            .expect("retry succeeds");
        assert_eq!(adapter.state(), PlaybackState::Initialized);
    }

    #[test]
    fn prepare_async_io_failure_is_state_class() {
        let (mut adapter, engine, _queue) = adapter();
        adapter
            .set_source(&DataSource::path("/music/a.ogg"))
            .unwrap();
        engine.fail_next(Opcode::PrepareAsync, ResultCode::IoError);

        let err = adapter.prepare_async().unwrap_err();
        assert_eq!(
            err,
            PlaybackError::Engine {
                code: ResultCode::IoError
            }
        );
        assert!(!err.is_retryable());
        assert_eq!(adapter.state(), PlaybackState::Error);
    }

    #[test]
    fn start_failure_posts_error_without_raising() {
        let (mut adapter, engine, queue) = prepared();
        engine.fail_next(Opcode::Start, ResultCode::DeadObject);

        assert!(adapter.start().is_ok());
        assert_eq!(adapter.state(), PlaybackState::Error);
        assert_eq!(
            drain(&mut adapter, &queue),
            vec![Notification::Error {
                what: MEDIA_ERROR_UNKNOWN,
                extra: ResultCode::DeadObject.raw()
            }]
        );
    }

    #[test]
    fn in_error_state_result_is_silent() {
        let (mut adapter, engine, queue) = prepared();
        engine.fail_next(Opcode::Pause, ResultCode::InErrorState);
        adapter.start().unwrap();

        assert!(adapter.pause().is_ok());
        assert_eq!(adapter.state(), PlaybackState::Error);
        assert!(drain(&mut adapter, &queue).is_empty());
    }

    #[test]
    fn audio_session_id_cannot_be_changed() {
        let (mut adapter, _engine, _queue) = adapter();
        assert!(adapter.audio_session_id().unwrap() > 0);
        assert_eq!(
            adapter.set_audio_session_id(7),
            Err(PlaybackError::Unsupported {
                operation: "set_audio_session_id"
            })
        );
    }

    #[test]
    fn clearing_successor_requires_initialized_player() {
        let (mut adapter, engine, _queue) = adapter();
        assert_eq!(
            adapter.set_next(None),
            Err(PlaybackError::illegal_state("set_next", PlaybackState::Idle))
        );

        adapter
            .set_source(&DataSource::path("/music/a.ogg"))
            .unwrap();
        adapter.set_next(None).expect("initialized player may clear");

        engine.fail_next(Opcode::PrepareAsync, ResultCode::IoError);
        assert!(adapter.prepare_async().is_err());
        assert_eq!(adapter.state(), PlaybackState::Error);
        assert_eq!(
            adapter.set_next(None),
            Err(PlaybackError::illegal_state("set_next", PlaybackState::Error))
        );
    }

    #[test]
    fn audio_session_ids_follow_player_handles() {
        let engine = Arc::new(StubNativeEngine::new());
        let first = NativeEngineAdapter::new(engine.clone(), EventQueue::new().sink()).unwrap();
        let mut second =
            NativeEngineAdapter::new(engine.clone(), EventQueue::new().sink()).unwrap();

        let id = second.audio_session_id().unwrap();
        assert_eq!(engine.handle_for_session(id), Some(second.handle()));
        assert_ne!(engine.handle_for_session(id), Some(first.handle()));
        assert_eq!(engine.live_players(), 2);
    }

    #[test]
    fn release_destroys_player_once() {
        let (mut adapter, engine, _queue) = prepared();
        assert_eq!(engine.live_players(), 1);
        adapter.release();
        adapter.release();
        assert_eq!(engine.live_players(), 0);
        assert_eq!(adapter.state(), PlaybackState::End);
        assert_eq!(adapter.start(), Err(PlaybackError::Released));
        assert_eq!(adapter.native_handle(), None);
    }

    #[test]
    fn engine_errors_enter_error_state() {
        let (mut adapter, engine, queue) = prepared();
        adapter.start().unwrap();
        engine.post_event(adapter.handle(), 6, 100, -38);

        assert_eq!(
            drain(&mut adapter, &queue),
            vec![Notification::Error {
                what: 100,
                extra: -38
            }]
        );
        assert_eq!(adapter.state(), PlaybackState::Error);
        assert_eq!(adapter.prior_error_state(), PlaybackState::Started);
    }

    #[test]
    fn completion_moves_to_playback_completed() {
        let (mut adapter, engine, queue) = prepared();
        adapter.start().unwrap();
        engine.finish_playback(adapter.handle());

        assert_eq!(drain(&mut adapter, &queue), vec![Notification::Completion]);
        assert_eq!(adapter.state(), PlaybackState::PlaybackCompleted);
        assert!(!adapter.is_playing().unwrap());
    }
}
