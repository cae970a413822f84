//! Adapter over the stock platform decoder.
//!
//! The stock decoder's behavior varies with the platform release: some
//! versions signal a seek completion when a looping track wraps, some report
//! completion while still looping, and older ones cannot chain a successor at
//! all. [`StockBackendAdapter`] hides those differences behind the state
//! machine contract.

use serde::{Deserialize, Serialize};

use crate::engine::events::{BackendEvent, EventSink, Notification};
use crate::engine::source::DataSource;
use crate::error::{PlaybackError, ResultCode};
use crate::state::{Operation, PlaybackState};
use crate::telemetry;

use super::{
    inspect_successor, ready_as_successor, substrate_error, validate_send_level, BackendKind,
    CallGuard, Lifecycle, NextPlayer, PlaybackBackend,
};

const COMPONENT: &str = "StockBackend";

/// Opaque identity of a stock decoder, used to chain decoders natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecoderLink(pub u64);

/// Version-dependent behavior of the stock decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderQuirks {
    pub api_level: u32,
    pub uses_nuplayer: bool,
    /// Signals a seek completion when a looping track wraps.
    pub seek_complete_on_loop: bool,
    /// Reports completion at the loop point while continuing to loop.
    pub completion_on_loop: bool,
    /// Starts a designated successor by itself at end of content.
    pub native_next_player: bool,
}

impl DecoderQuirks {
    pub fn detect(api_level: u32, uses_nuplayer: bool) -> Self {
        Self {
            api_level,
            uses_nuplayer,
            seek_complete_on_loop: api_level >= 14 && !uses_nuplayer,
            completion_on_loop: api_level >= 21 && uses_nuplayer,
            native_next_player: api_level >= 16,
        }
    }

    /// The decoder gives no loop-point signal at all; the adapter loops itself.
    pub fn needs_loop_emulation(&self) -> bool {
        !self.seek_complete_on_loop && !self.completion_on_loop
    }
}

/// Stock platform decoder driven by [`StockBackendAdapter`].
///
/// Fallible calls return the substrate's [`ResultCode`]; asynchronous
/// signals are posted to the sink handed over by [`StockDecoder::attach`].
pub trait StockDecoder: Send {
    fn attach(&mut self, sink: EventSink);
    fn quirks(&self) -> DecoderQuirks;
    fn link(&self) -> DecoderLink;

    fn set_source(&mut self, source: &DataSource) -> Result<(), ResultCode>;
    fn prepare(&mut self) -> Result<(), ResultCode>;
    fn prepare_async(&mut self) -> Result<(), ResultCode>;
    fn start(&mut self) -> Result<(), ResultCode>;
    fn pause(&mut self) -> Result<(), ResultCode>;
    fn stop(&mut self) -> Result<(), ResultCode>;
    fn seek_to(&mut self, msec: u32) -> Result<(), ResultCode>;
    fn reset(&mut self);
    fn release(&mut self);

    fn set_looping(&mut self, looping: bool);
    fn set_next_decoder(&mut self, next: Option<DecoderLink>) -> Result<(), ResultCode>;
    fn set_volume(&mut self, left: f32, right: f32) -> Result<(), ResultCode>;
    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<(), ResultCode>;
    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<(), ResultCode>;
    fn audio_session_id(&self) -> i32;
    fn set_audio_session_id(&mut self, audio_session_id: i32) -> Result<(), ResultCode>;

    fn duration(&self) -> u32;
    fn current_position(&self) -> u32;
    fn is_playing(&self) -> bool;
}

/// [`PlaybackBackend`] over a [`StockDecoder`].
pub struct StockBackendAdapter {
    lifecycle: Lifecycle,
    decoder: Box<dyn StockDecoder>,
    quirks: DecoderQuirks,
    looping: bool,
    duration: u32,
    /// Target of the seek the decoder is currently performing.
    seek_position: Option<u32>,
    /// Latest target requested while a seek was in flight.
    pending_seek: Option<u32>,
    next: Option<NextPlayer>,
}

impl StockBackendAdapter {
    pub fn new(mut decoder: Box<dyn StockDecoder>, quirks: DecoderQuirks, sink: EventSink) -> Self {
        decoder.attach(sink.clone());
        log::info!(
            "[{}] api_level={} nuplayer={} loop_emulation={} native_next={}",
            COMPONENT,
            quirks.api_level,
            quirks.uses_nuplayer,
            quirks.needs_loop_emulation(),
            quirks.native_next_player
        );
        Self {
            lifecycle: Lifecycle::new(COMPONENT, sink),
            decoder,
            quirks,
            looping: false,
            duration: 0,
            seek_position: None,
            pending_seek: None,
            next: None,
        }
    }

    pub fn quirks(&self) -> DecoderQuirks {
        self.quirks
    }

    fn apply_looping(&mut self) {
        if !self.quirks.needs_loop_emulation() {
            self.decoder.set_looping(self.looping);
        }
    }

    /// Hand the successor's decoder to the substrate when it chains natively.
    fn apply_next(&mut self) {
        if !self.quirks.native_next_player {
            return;
        }

        let mut link = self
            .next
            .as_ref()
            .and_then(|next| {
                next.with(|backend| {
                    if ready_as_successor(backend.state()) {
                        backend.decoder_link()
                    } else {
                        None
                    }
                })
            })
            .flatten();

        // NuPlayer prefers the successor over its own loop.
        if self.quirks.uses_nuplayer && self.looping {
            link = None;
        }

        if matches!(
            self.lifecycle.state(),
            PlaybackState::Idle | PlaybackState::End | PlaybackState::Error
        ) {
            return;
        }
        if let Err(code) = self.decoder.set_next_decoder(link) {
            log::warn!("[{}] set_next_decoder failed: {}", COMPONENT, code);
        }
    }

    fn on_prepared(&mut self) {
        self.duration = self.decoder.duration();
        self.apply_looping();
        self.lifecycle.enter(PlaybackState::Prepared);
    }

    fn on_completion(&mut self) -> Vec<Notification> {
        self.seek_position = None;
        self.pending_seek = None;

        let mut looped = false;
        if self.quirks.needs_loop_emulation() && self.looping {
            if let Err(code) = self.decoder.seek_to(0) {
                log::warn!("[{}] loop rewind failed: {}", COMPONENT, code);
            }
            if let Err(code) = self.decoder.start() {
                log::warn!("[{}] loop restart failed: {}", COMPONENT, code);
            }
            looped = true;
        } else if self.quirks.completion_on_loop && self.looping && self.decoder.is_playing() {
            looped = true;
        }

        if looped {
            telemetry::hub().record_loop_point(self.lifecycle.session_id());
            return vec![Notification::SeekComplete];
        }

        if !self.quirks.native_next_player {
            if let Some(next) = &self.next {
                match next.with(|backend| backend.start()) {
                    Some(Err(err)) => {
                        log::warn!("[{}] failed to start next player: {}", COMPONENT, err)
                    }
                    None => log::debug!("[{}] next player is gone", COMPONENT),
                    Some(Ok(())) => {}
                }
            }
        }

        self.lifecycle.enter(PlaybackState::PlaybackCompleted);
        vec![Notification::Completion]
    }

    fn on_seek_complete(&mut self) -> Vec<Notification> {
        let seek_position = self.seek_position.take();
        let pending = self.pending_seek.take();

        if let Some(target) = pending {
            self.seek_position = Some(target);
            if let Err(code) = self.decoder.seek_to(target) {
                log::warn!("[{}] pending seek to {} failed: {}", COMPONENT, target, code);
                self.seek_position = None;
                return vec![Notification::SeekComplete];
            }
            return Vec::new();
        }

        match seek_position {
            Some(_) => vec![Notification::SeekComplete],
            // No seek was requested: this is the decoder's loop-point signal.
            None if self.quirks.seek_complete_on_loop => {
                telemetry::hub().record_loop_point(self.lifecycle.session_id());
                vec![Notification::SeekComplete]
            }
            None => Vec::new(),
        }
    }
}

impl PlaybackBackend for StockBackendAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Stock
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
        match self.decoder.set_source(source) {
            Ok(()) => {
                self.lifecycle.enter(PlaybackState::Initialized);
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "set_source")),
        }
    }

    fn prepare(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::Prepare)?;
        match self.decoder.prepare() {
            Ok(()) => {
                self.on_prepared();
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "prepare")),
        }
    }

    fn prepare_async(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::PrepareAsync)?;
        match self.decoder.prepare_async() {
            Ok(()) => {
                self.lifecycle.enter(PlaybackState::Preparing);
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "prepare_async")),
        }
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Start)? == CallGuard::Skip {
            return Ok(());
        }
        match self.decoder.start() {
            Ok(()) => {
                self.lifecycle.enter(PlaybackState::Started);
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "start")),
        }
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Pause)? == CallGuard::Skip {
            return Ok(());
        }
        match self.decoder.pause() {
            Ok(()) => {
                if self.lifecycle.state() == PlaybackState::Started {
                    self.lifecycle.enter(PlaybackState::Paused);
                }
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "pause")),
        }
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::Stop)? == CallGuard::Skip {
            return Ok(());
        }
        match self.decoder.stop() {
            Ok(()) => {
                self.seek_position = None;
                self.pending_seek = None;
                self.lifecycle.enter(PlaybackState::Stopped);
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "stop")),
        }
    }

    fn reset(&mut self) -> Result<(), PlaybackError> {
        self.lifecycle.guard(Operation::Reset)?;
        self.decoder.reset();
        self.lifecycle.sink().cancel_pending();
        self.looping = false;
        self.seek_position = None;
        self.pending_seek = None;
        self.duration = 0;
        self.lifecycle.enter(PlaybackState::Idle);
        Ok(())
    }

    fn release(&mut self) {
        if self.lifecycle.is_released() {
            return;
        }
        self.decoder.release();
        self.lifecycle.sink().cancel_pending();
        self.seek_position = None;
        self.pending_seek = None;
        self.next = None;
        self.lifecycle.enter(PlaybackState::End);
    }

    fn seek_to(&mut self, msec: u32) -> Result<(), PlaybackError> {
        if self.lifecycle.guard(Operation::SeekTo)? == CallGuard::Skip {
            return Ok(());
        }
        // Some decoders never complete a seek past the last frame.
        let msec = msec.min(self.duration.saturating_sub(1));
        if self.seek_position.is_some() {
            self.pending_seek = Some(msec);
            return Ok(());
        }
        match self.decoder.seek_to(msec) {
            Ok(()) => {
                self.seek_position = Some(msec);
                Ok(())
            }
            Err(code) => Err(self.lifecycle.substrate_failure(code, "seek_to")),
        }
    }

    fn duration(&mut self) -> Result<u32, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        if self.lifecycle.state() == PlaybackState::Error {
            return Ok(self.duration);
        }
        match self.lifecycle.guard(Operation::GetDuration)? {
            CallGuard::Proceed => Ok(self.duration),
            CallGuard::Skip => Ok(0),
        }
    }

    fn current_position(&mut self) -> Result<u32, PlaybackError> {
        if self.lifecycle.guard(Operation::GetCurrentPosition)? == CallGuard::Skip
            || !self.lifecycle.state().is_prepared()
        {
            return Ok(0);
        }
        Ok(self.decoder.current_position().min(self.duration))
    }

    fn set_looping(&mut self, looping: bool) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.looping = looping;
        if !self.lifecycle.state().is_before_prepared() {
            self.apply_looping();
            self.apply_next();
        }
        Ok(())
    }

    fn is_looping(&mut self) -> Result<bool, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Ok(self.looping)
    }

    fn is_playing(&mut self) -> Result<bool, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        if self.quirks.needs_loop_emulation() {
            // The decoder is briefly stopped at each emulated loop point.
            Ok(self.lifecycle.state() == PlaybackState::Started)
        } else {
            Ok(self.decoder.is_playing())
        }
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.decoder
            .set_volume(left, right)
            .map_err(|code| substrate_error(code, "set_volume"))
    }

    fn set_next(&mut self, next: Option<NextPlayer>) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        if let Some(next) = &next {
            inspect_successor(next, BackendKind::Stock, self.lifecycle.state())?;
        } else if matches!(
            self.lifecycle.state(),
            PlaybackState::Idle | PlaybackState::Error
        ) {
            return Err(PlaybackError::illegal_state(
                "set_next",
                self.lifecycle.state(),
            ));
        }
        self.next = next;
        self.apply_next();
        Ok(())
    }

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        if self.lifecycle.state() == PlaybackState::Error {
            return Ok(());
        }
        self.decoder
            .attach_aux_effect(effect_id)
            .map_err(|code| substrate_error(code, "attach_aux_effect"))
    }

    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        let level = validate_send_level(level)?;
        self.decoder
            .set_aux_effect_send_level(level)
            .map_err(|code| substrate_error(code, "set_aux_effect_send_level"))
    }

    fn audio_session_id(&mut self) -> Result<i32, PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        Ok(self.decoder.audio_session_id())
    }

    fn set_audio_session_id(&mut self, audio_session_id: i32) -> Result<(), PlaybackError> {
        self.lifecycle.ensure_not_released()?;
        self.decoder
            .set_audio_session_id(audio_session_id)
            .map_err(|code| substrate_error(code, "set_audio_session_id"))
    }

    fn handle_event(&mut self, event: BackendEvent) -> Vec<Notification> {
        if self.lifecycle.is_released() {
            return Vec::new();
        }

        match event {
            BackendEvent::Prepared => {
                if self.lifecycle.state() != PlaybackState::Preparing {
                    log::debug!(
                        "[{}] ignoring prepared signal in {} state",
                        COMPONENT,
                        self.lifecycle.state()
                    );
                    return Vec::new();
                }
                self.on_prepared();
                vec![Notification::Prepared]
            }
            BackendEvent::Completion => self.on_completion(),
            BackendEvent::SeekComplete => self.on_seek_complete(),
            BackendEvent::BufferingUpdate { percent } => {
                vec![Notification::BufferingUpdate { percent }]
            }
            BackendEvent::Info { what, extra } => vec![Notification::Info { what, extra }],
            BackendEvent::Error { what, extra } => {
                log::warn!("[{}] decoder error ({}, {})", COMPONENT, what, extra);
                self.lifecycle.enter(PlaybackState::Error);
                vec![Notification::Error { what, extra }]
            }
            BackendEvent::PostedError { what, extra } => vec![Notification::Error { what, extra }],
        }
    }

    fn decoder_link(&self) -> Option<DecoderLink> {
        if self.lifecycle.is_released() {
            None
        } else {
            Some(self.decoder.link())
        }
    }
}
