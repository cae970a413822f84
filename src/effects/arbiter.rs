// EffectControlArbiter: ownership ledger for effect handles
//
// Within one acoustic session at most one handle per effect category may
// change shared engine parameters. The most recently created live handle is
// in control; releasing it hands control to the next-most-recent survivor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::effects::band_corrector::BandRangeCorrector;
use crate::effects::handle::EffectHandle;
use crate::effects::kinds::{EffectCategory, EffectKind, EffectProfile, SettingsRecord};
use crate::error::{log_effect_error, EffectError, ResultCode};
use crate::telemetry;

/// Identifier of one effect handle inside its session.
pub type HandleId = u64;

/// Callback told when a handle gains (`true`) or loses (`false`) control.
pub type ControlListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Status codes returned by `set_enabled`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStatus {
    Success = 0,
    Error = -1,
    InvalidOperation = -5,
    DeadObject = -7,
}

impl EffectStatus {
    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Receives parameters committed by the handle in control.
///
/// Implemented by the effect engine; a non-success code rejects the change
/// and leaves the ledger untouched.
pub trait EffectParameterSink: Send + Sync {
    fn commit(
        &self,
        audio_session_id: i32,
        effect_id: i32,
        enabled: bool,
        settings: &SettingsRecord,
    ) -> ResultCode;
}

/// Shared state of one effect category inside a session.
struct ControlLedger {
    effect_id: i32,
    /// Live handles in creation order; the last entry is in control.
    live: Vec<HandleId>,
    enabled: bool,
    settings: SettingsRecord,
    listeners: HashMap<HandleId, ControlListener>,
}

impl ControlLedger {
    fn head(&self) -> Option<HandleId> {
        self.live.last().copied()
    }

    fn listener(&self, id: HandleId) -> Option<ControlListener> {
        self.listeners.get(&id).cloned()
    }
}

/// Control change to report once the ledger lock is released.
type PendingNotice = Option<(ControlListener, bool)>;

fn notify(notice: PendingNotice) {
    if let Some((listener, granted)) = notice {
        listener(granted);
    }
}

/// One acoustic session shared by every effect handle attached to it.
pub struct EffectSession {
    audio_session_id: i32,
    profile: Arc<EffectProfile>,
    sink: Option<Arc<dyn EffectParameterSink>>,
    ledgers: Mutex<HashMap<EffectCategory, ControlLedger>>,
    next_handle: AtomicU64,
    next_effect_id: Arc<AtomicI32>,
}

impl EffectSession {
    pub fn audio_session_id(&self) -> i32 {
        self.audio_session_id
    }

    pub fn profile(&self) -> &EffectProfile {
        &self.profile
    }

    fn lock_ledgers(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EffectCategory, ControlLedger>>, EffectError> {
        self.ledgers.lock().map_err(|_| EffectError::LockPoisoned {
            component: format!("effect_session_{}", self.audio_session_id),
        })
    }

    /// Number of live handles for `category`.
    pub fn live_handles(&self, category: EffectCategory) -> usize {
        self.lock_ledgers()
            .map(|ledgers| ledgers.get(&category).map_or(0, |ledger| ledger.live.len()))
            .unwrap_or(0)
    }

    /// Register a new handle; it takes control immediately.
    pub(crate) fn admit(
        &self,
        category: EffectCategory,
        defaults: impl FnOnce() -> SettingsRecord,
    ) -> Result<HandleId, EffectError> {
        if !self.profile.supports(category) {
            return Err(EffectError::Unsupported { category });
        }

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let notice = {
            let mut ledgers = self.lock_ledgers()?;
            let ledger = ledgers.entry(category).or_insert_with(|| ControlLedger {
                effect_id: self.next_effect_id.fetch_add(1, Ordering::Relaxed) + 1,
                live: Vec::new(),
                enabled: false,
                settings: defaults(),
                listeners: HashMap::new(),
            });

            let previous = ledger.head();
            ledger.live.push(id);
            previous.and_then(|prev| ledger.listener(prev).map(|listener| (listener, false)))
        };

        log::debug!(
            "[EffectArbiter] Handle {} took control of {:?} on session {}",
            id,
            category,
            self.audio_session_id
        );
        telemetry::hub().record_control_transfer(self.audio_session_id, category, Some(id));
        notify(notice);
        Ok(id)
    }

    /// Drop `id` from the ledger, promoting the next survivor if it was head.
    pub(crate) fn withdraw(&self, category: EffectCategory, id: HandleId) {
        let outcome = {
            let mut ledgers = match self.lock_ledgers() {
                Ok(ledgers) => ledgers,
                Err(err) => {
                    log_effect_error(&err, "release");
                    return;
                }
            };
            let Some(ledger) = ledgers.get_mut(&category) else {
                return;
            };

            let was_head = ledger.head() == Some(id);
            ledger.live.retain(|live| *live != id);
            ledger.listeners.remove(&id);

            if ledger.live.is_empty() {
                ledgers.remove(&category);
                Some((None, None))
            } else if was_head {
                let head = ledger.head();
                let notice = head.and_then(|head| ledger.listener(head).map(|l| (l, true)));
                Some((head, notice))
            } else {
                None
            }
        };

        if let Some((head, notice)) = outcome {
            if head.is_some() {
                log::debug!(
                    "[EffectArbiter] Control of {:?} on session {} passed to handle {:?}",
                    category,
                    self.audio_session_id,
                    head
                );
            }
            telemetry::hub().record_control_transfer(self.audio_session_id, category, head);
            notify(notice);
        }
    }

    pub(crate) fn has_control(
        &self,
        category: EffectCategory,
        id: HandleId,
    ) -> Result<bool, EffectError> {
        let ledgers = self.lock_ledgers()?;
        Ok(ledgers
            .get(&category)
            .and_then(|ledger| ledger.head())
            .is_some_and(|head| head == id))
    }

    pub(crate) fn effect_id(&self, category: EffectCategory) -> Result<i32, EffectError> {
        self.read(category, |ledger| ledger.effect_id)
    }

    pub(crate) fn enabled(&self, category: EffectCategory) -> Result<bool, EffectError> {
        self.read(category, |ledger| ledger.enabled)
    }

    pub(crate) fn settings(&self, category: EffectCategory) -> Result<SettingsRecord, EffectError> {
        self.read(category, |ledger| ledger.settings.clone())
    }

    fn read<T>(
        &self,
        category: EffectCategory,
        f: impl FnOnce(&ControlLedger) -> T,
    ) -> Result<T, EffectError> {
        let ledgers = self.lock_ledgers()?;
        ledgers
            .get(&category)
            .map(f)
            .ok_or(EffectError::Released)
    }

    /// Enable or disable the category. Non-head handles get
    /// [`EffectStatus::InvalidOperation`] and change nothing.
    pub(crate) fn set_enabled(
        &self,
        category: EffectCategory,
        id: HandleId,
        enabled: bool,
    ) -> Result<EffectStatus, EffectError> {
        let mut ledgers = self.lock_ledgers()?;
        let ledger = ledgers.get_mut(&category).ok_or(EffectError::Released)?;

        if ledger.head() != Some(id) {
            log::debug!(
                "[EffectArbiter] Handle {} has no control of {:?}; set_enabled ignored",
                id,
                category
            );
            return Ok(EffectStatus::InvalidOperation);
        }

        let code = self.commit(ledger.effect_id, enabled, &ledger.settings);
        match code {
            ResultCode::Success => {
                ledger.enabled = enabled;
                Ok(EffectStatus::Success)
            }
            ResultCode::DeadObject => Ok(EffectStatus::DeadObject),
            ResultCode::ControlLost => Ok(EffectStatus::InvalidOperation),
            _ => Ok(EffectStatus::Error),
        }
    }

    /// Replace the category settings. Non-head handles fail with
    /// [`EffectError::ControlLost`].
    pub(crate) fn set_settings(
        &self,
        category: EffectCategory,
        id: HandleId,
        operation: &'static str,
        settings: SettingsRecord,
    ) -> Result<(), EffectError> {
        let mut ledgers = self.lock_ledgers()?;
        let ledger = ledgers.get_mut(&category).ok_or(EffectError::Released)?;

        if ledger.head() != Some(id) {
            return Err(EffectError::ControlLost { operation });
        }

        let code = self.commit(ledger.effect_id, ledger.enabled, &settings);
        if !code.is_success() {
            return Err(EffectError::from(code));
        }

        ledger.settings = settings;
        Ok(())
    }

    pub(crate) fn set_listener(
        &self,
        category: EffectCategory,
        id: HandleId,
        listener: Option<ControlListener>,
    ) -> Result<(), EffectError> {
        let mut ledgers = self.lock_ledgers()?;
        let ledger = ledgers.get_mut(&category).ok_or(EffectError::Released)?;
        match listener {
            Some(listener) => {
                ledger.listeners.insert(id, listener);
            }
            None => {
                ledger.listeners.remove(&id);
            }
        }
        Ok(())
    }

    fn commit(&self, effect_id: i32, enabled: bool, settings: &SettingsRecord) -> ResultCode {
        match &self.sink {
            Some(sink) => sink.commit(self.audio_session_id, effect_id, enabled, settings),
            None => ResultCode::Success,
        }
    }
}

/// Registry of effect sessions keyed by acoustic session id.
///
/// Sessions are held weakly: once the last handle of a session is dropped the
/// session and all of its shared parameters go away.
pub struct EffectControlArbiter {
    sessions: Mutex<HashMap<i32, Weak<EffectSession>>>,
    profile: Arc<EffectProfile>,
    sink: Option<Arc<dyn EffectParameterSink>>,
    next_effect_id: Arc<AtomicI32>,
}

impl Default for EffectControlArbiter {
    fn default() -> Self {
        Self::new(EffectProfile::default(), &BandRangeCorrector::default())
    }
}

impl EffectControlArbiter {
    /// Create an arbiter for an engine with the given capabilities.
    ///
    /// The equalizer band table is repaired once here and shared by every
    /// equalizer handle.
    pub fn new(profile: EffectProfile, corrector: &BandRangeCorrector) -> Self {
        let equalizer = profile.equalizer.corrected(corrector);
        telemetry::hub().record_band_correction(
            equalizer.number_of_bands(),
            equalizer.bands != profile.equalizer.bands,
        );

        Self {
            sessions: Mutex::new(HashMap::new()),
            profile: Arc::new(EffectProfile {
                equalizer,
                ..profile
            }),
            sink: None,
            next_effect_id: Arc::new(AtomicI32::new(0)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EffectParameterSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn profile(&self) -> &EffectProfile {
        &self.profile
    }

    /// Get or create the session for `audio_session_id`.
    pub fn session(&self, audio_session_id: i32) -> Result<Arc<EffectSession>, EffectError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| EffectError::LockPoisoned {
                component: "effect_arbiter".to_string(),
            })?;

        if let Some(session) = sessions.get(&audio_session_id).and_then(Weak::upgrade) {
            return Ok(session);
        }

        sessions.retain(|_, session| session.strong_count() > 0);

        let session = Arc::new(EffectSession {
            audio_session_id,
            profile: Arc::clone(&self.profile),
            sink: self.sink.clone(),
            ledgers: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
            next_effect_id: Arc::clone(&self.next_effect_id),
        });
        sessions.insert(audio_session_id, Arc::downgrade(&session));
        Ok(session)
    }

    /// Create a handle of kind `K` bound to `audio_session_id`.
    pub fn create<K: EffectKind>(
        &self,
        audio_session_id: i32,
    ) -> Result<EffectHandle<K>, EffectError> {
        let session = self.session(audio_session_id)?;
        EffectHandle::attach(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::kinds::{BassBoost, BassBoostSettings, Equalizer, Virtualizer};
    use std::sync::atomic::AtomicUsize;

    struct RecordingSink {
        commits: AtomicUsize,
        reply: Mutex<ResultCode>,
    }

    impl EffectParameterSink for RecordingSink {
        fn commit(&self, _: i32, _: i32, _: bool, _: &SettingsRecord) -> ResultCode {
            self.commits.fetch_add(1, Ordering::SeqCst);
            *self.reply.lock().unwrap()
        }
    }

    #[test]
    fn sessions_are_shared_while_alive() {
        let arbiter = EffectControlArbiter::default();
        let a = arbiter.session(7).unwrap();
        let b = arbiter.session(7).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &arbiter.session(8).unwrap()));
    }

    #[test]
    fn handles_in_one_category_share_effect_id() {
        let arbiter = EffectControlArbiter::default();
        let first = arbiter.create::<BassBoost>(1).unwrap();
        let second = arbiter.create::<BassBoost>(1).unwrap();
        let other = arbiter.create::<Virtualizer>(1).unwrap();
        assert_eq!(first.id().unwrap(), second.id().unwrap());
        assert_ne!(first.id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn unsupported_category_is_distinct_from_control_loss() {
        let profile = EffectProfile {
            supported: vec![EffectCategory::BassBoost],
            ..EffectProfile::default()
        };
        let arbiter = EffectControlArbiter::new(profile, &BandRangeCorrector::default());
        match arbiter.create::<Equalizer>(1) {
            Err(EffectError::Unsupported { category }) => {
                assert_eq!(category, EffectCategory::Equalizer)
            }
            other => panic!("Expected Unsupported, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn sink_rejection_leaves_ledger_untouched() {
        let sink = Arc::new(RecordingSink {
            commits: AtomicUsize::new(0),
            reply: Mutex::new(ResultCode::Success),
        });
        let arbiter = EffectControlArbiter::default().with_sink(sink.clone());
        let handle = arbiter.create::<BassBoost>(3).unwrap();

        handle
            .set_properties(BassBoostSettings { strength: 300 })
            .unwrap();
        assert_eq!(sink.commits.load(Ordering::SeqCst), 1);

        *sink.reply.lock().unwrap() = ResultCode::DeadObject;
        let err = handle
            .set_properties(BassBoostSettings { strength: 900 })
            .unwrap_err();
        assert!(matches!(err, EffectError::Engine { .. }));
        assert_eq!(handle.properties().unwrap().strength, 300);

        assert_eq!(handle.set_enabled(true).unwrap(), EffectStatus::DeadObject);
        assert!(!handle.enabled().unwrap());
    }

    #[test]
    fn ledger_reset_after_last_release() {
        let arbiter = EffectControlArbiter::default();
        let mut handle = arbiter.create::<BassBoost>(5).unwrap();
        handle
            .set_properties(BassBoostSettings { strength: 700 })
            .unwrap();
        let session = arbiter.session(5).unwrap();
        assert_eq!(session.live_handles(EffectCategory::BassBoost), 1);

        handle.release();
        assert_eq!(session.live_handles(EffectCategory::BassBoost), 0);

        let fresh = arbiter.create::<BassBoost>(5).unwrap();
        assert_eq!(fresh.properties().unwrap(), BassBoostSettings::default());
    }

    #[test]
    fn control_listeners_follow_transfers() {
        let arbiter = EffectControlArbiter::default();
        let first = arbiter.create::<BassBoost>(9).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        first
            .set_control_status_listener(Some(move |granted| {
                sink.lock().unwrap().push(granted);
            }))
            .unwrap();

        let mut second = arbiter.create::<BassBoost>(9).unwrap();
        second.release();

        assert_eq!(*events.lock().unwrap(), vec![false, true]);
    }
}
