use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Initialized,
    Preparing,
    Prepared,
    Started,
    Paused,
    Stopped,
    PlaybackCompleted,
    Error,
    End,
}

impl PlaybackState {
    /// States in which the session has decoded enough to know its duration.
    pub fn is_prepared(self) -> bool {
        matches!(
            self,
            PlaybackState::Prepared
                | PlaybackState::Started
                | PlaybackState::Paused
                | PlaybackState::PlaybackCompleted
        )
    }

    /// States preceding a completed prepare.
    pub fn is_before_prepared(self) -> bool {
        matches!(
            self,
            PlaybackState::Idle | PlaybackState::Initialized | PlaybackState::Preparing
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Initialized => "Initialized",
            PlaybackState::Preparing => "Preparing",
            PlaybackState::Prepared => "Prepared",
            PlaybackState::Started => "Started",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::PlaybackCompleted => "PlaybackCompleted",
            PlaybackState::Error => "Error",
            PlaybackState::End => "End",
        };
        f.write_str(name)
    }
}

/// Operations whose legality depends on the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
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
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::SetSource => "set_source",
            Operation::Prepare => "prepare",
            Operation::PrepareAsync => "prepare_async",
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Stop => "stop",
            Operation::Reset => "reset",
            Operation::SeekTo => "seek_to",
            Operation::GetDuration => "duration",
            Operation::GetCurrentPosition => "current_position",
        }
    }
}

/// When the asynchronous error raised by an illegal call is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSkip {
    /// Always notify.
    Never,
    /// Drop the notification when the session already sits in Error and the
    /// state it left had never completed a prepare.
    BeforeFirstPrepare,
}

/// How an adapter reacts to a call the current state forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalCallPolicy {
    /// Enter Error and fail at the call site.
    FailSynchronously,
    /// Enter Error silently and post an error notification.
    NotifyAsync { skip: NotificationSkip },
    /// Report a neutral value, no state change.
    ReportDefault,
}

/// An accepted state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PlaybackState,
    pub to: PlaybackState,
}

/// Transition authority for one session.
///
/// Holds the current state and the state that was interrupted by the last
/// entry into [`PlaybackState::Error`]. Pure: performs no I/O and never
/// reaches the substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    state: PlaybackState,
    prior_error_state: PlaybackState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            prior_error_state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// State interrupted by the most recent entry into Error.
    ///
    /// Reset to `Idle` whenever the session re-enters Initialized or End.
    pub fn prior_error_state(&self) -> PlaybackState {
        self.prior_error_state
    }

    pub fn is_released(&self) -> bool {
        self.state == PlaybackState::End
    }

    pub fn can_call(&self, op: Operation) -> bool {
        use PlaybackState::*;

        match op {
            Operation::SetSource => self.state == Idle,
            Operation::Prepare | Operation::PrepareAsync => {
                matches!(self.state, Initialized | Stopped)
            }
            Operation::Start => matches!(self.state, Prepared | Started | Paused | PlaybackCompleted),
            Operation::Pause => matches!(self.state, Started | Paused | PlaybackCompleted),
            Operation::Stop => matches!(
                self.state,
                Prepared | Started | Paused | Stopped | PlaybackCompleted
            ),
            Operation::Reset => self.state != End,
            Operation::SeekTo => matches!(self.state, Prepared | Started | Paused | PlaybackCompleted),
            Operation::GetDuration => matches!(
                self.state,
                Prepared | Started | Paused | Stopped | PlaybackCompleted
            ),
            Operation::GetCurrentPosition => !matches!(self.state, Preparing | Error | End),
        }
    }

    /// Reaction an adapter must apply when `can_call(op)` is false.
    pub fn illegal_call_policy(op: Operation) -> IllegalCallPolicy {
        match op {
            Operation::SetSource
            | Operation::Prepare
            | Operation::PrepareAsync
            | Operation::Reset => IllegalCallPolicy::FailSynchronously,
            Operation::Start | Operation::GetDuration => IllegalCallPolicy::NotifyAsync {
                skip: NotificationSkip::Never,
            },
            Operation::Pause | Operation::Stop | Operation::SeekTo => {
                IllegalCallPolicy::NotifyAsync {
                    skip: NotificationSkip::BeforeFirstPrepare,
                }
            }
            Operation::GetCurrentPosition => IllegalCallPolicy::ReportDefault,
        }
    }

    /// Whether an error notification for an illegal call should be dropped.
    ///
    /// Evaluated before the machine enters Error for the call.
    pub fn should_skip_notification(&self, skip: NotificationSkip) -> bool {
        match skip {
            NotificationSkip::Never => false,
            NotificationSkip::BeforeFirstPrepare => {
                self.state == PlaybackState::Error && !self.prior_error_state.is_prepared()
            }
        }
    }

    /// Whether `to` is reachable from `from` in one step.
    pub fn is_legal_transition(from: PlaybackState, to: PlaybackState) -> bool {
        use PlaybackState::*;

        if from == End {
            return false;
        }

        match to {
            Idle => true,
            Initialized => from == Idle,
            Preparing => matches!(from, Initialized | Stopped),
            Prepared => matches!(from, Initialized | Preparing | Stopped),
            Started => matches!(from, Prepared | Started | Paused | PlaybackCompleted),
            Paused => matches!(from, Started | Paused),
            Stopped => matches!(
                from,
                Prepared | Started | Paused | Stopped | PlaybackCompleted
            ),
            PlaybackCompleted => matches!(from, Started | PlaybackCompleted),
            Error => true,
            End => true,
        }
    }

    /// Move to `next` if the table allows it.
    ///
    /// Returns the accepted transition, or `None` when the move is illegal or
    /// leaves the state unchanged. Illegal moves never mutate the machine.
    pub fn transition_to(&mut self, next: PlaybackState) -> Option<Transition> {
        let from = self.state;
        if !Self::is_legal_transition(from, next) {
            return None;
        }

        match next {
            PlaybackState::Error if from != PlaybackState::Error => {
                self.prior_error_state = from;
            }
            PlaybackState::Initialized | PlaybackState::End => {
                self.prior_error_state = PlaybackState::Idle;
            }
            _ => {}
        }

        self.state = next;
        if from == next {
            None
        } else {
            Some(Transition { from, to: next })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::*;

    const ALL_STATES: [PlaybackState; 10] = [
        Idle,
        Initialized,
        Preparing,
        Prepared,
        Started,
        Paused,
        Stopped,
        PlaybackCompleted,
        Error,
        End,
    ];

    fn machine_in(state: PlaybackState) -> StateMachine {
        let path: &[PlaybackState] = match state {
            Idle => &[],
            Initialized => &[Initialized],
            Preparing => &[Initialized, Preparing],
            Prepared => &[Initialized, Prepared],
            Started => &[Initialized, Prepared, Started],
            Paused => &[Initialized, Prepared, Started, Paused],
            Stopped => &[Initialized, Prepared, Stopped],
            PlaybackCompleted => &[Initialized, Prepared, Started, PlaybackCompleted],
            Error => &[Error],
            End => &[End],
        };
        let mut machine = StateMachine::new();
        for step in path {
            machine.transition_to(*step);
        }
        assert_eq!(machine.state(), state);
        machine
    }

    #[test]
    fn starts_idle_with_idle_prior_state() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), Idle);
        assert_eq!(machine.prior_error_state(), Idle);
        assert!(!machine.is_released());
    }

    #[test]
    fn set_source_only_legal_from_idle() {
        for state in ALL_STATES {
            assert_eq!(
                machine_in(state).can_call(Operation::SetSource),
                state == Idle,
                "set_source legality in {state}"
            );
        }
    }

    #[test]
    fn prepare_legal_from_initialized_and_stopped() {
        for state in ALL_STATES {
            let expected = matches!(state, Initialized | Stopped);
            let machine = machine_in(state);
            assert_eq!(machine.can_call(Operation::Prepare), expected, "{state}");
            assert_eq!(machine.can_call(Operation::PrepareAsync), expected, "{state}");
        }
    }

    #[test]
    fn playback_guards_follow_table() {
        for state in ALL_STATES {
            let machine = machine_in(state);
            assert_eq!(
                machine.can_call(Operation::Start),
                matches!(state, Prepared | Started | Paused | PlaybackCompleted)
            );
            assert_eq!(
                machine.can_call(Operation::Stop),
                matches!(state, Prepared | Started | Paused | Stopped | PlaybackCompleted)
            );
            assert_eq!(machine.can_call(Operation::Reset), state != End);
            assert_eq!(
                machine.can_call(Operation::GetCurrentPosition),
                !matches!(state, Preparing | Error | End)
            );
        }
    }

    #[test]
    fn end_is_absorbing() {
        let mut machine = machine_in(End);
        for state in ALL_STATES {
            assert!(machine.transition_to(state).is_none());
            assert_eq!(machine.state(), End);
        }
    }

    #[test]
    fn illegal_transition_never_mutates() {
        for from in ALL_STATES {
            for to in ALL_STATES {
                if StateMachine::is_legal_transition(from, to) {
                    continue;
                }
                let mut machine = machine_in(from);
                let before = machine.clone();
                assert!(machine.transition_to(to).is_none());
                assert_eq!(machine, before, "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn replayed_sequence_matches_table() {
        let script = [
            (Initialized, true),
            (Started, false),
            (Preparing, true),
            (Prepared, true),
            (Started, true),
            (Paused, true),
            (PlaybackCompleted, false),
            (Started, true),
            (PlaybackCompleted, true),
            (Stopped, true),
            (Paused, false),
            (Prepared, true),
            (Idle, true),
            (End, true),
            (Idle, false),
        ];

        let mut machine = StateMachine::new();
        for (target, accepted) in script {
            let before = machine.state();
            let transition = machine.transition_to(target);
            assert_eq!(transition.is_some(), accepted, "{before} -> {target}");
            if accepted {
                assert_eq!(machine.state(), target);
            } else {
                assert_eq!(machine.state(), before);
            }
        }
    }

    #[test]
    fn error_remembers_interrupted_state() {
        let mut machine = machine_in(Paused);
        let transition = machine.transition_to(Error);
        assert_eq!(transition, Some(Transition { from: Paused, to: Error }));
        assert_eq!(machine.prior_error_state(), Paused);

        // re-entering Error keeps the original interrupted state
        assert!(machine.transition_to(Error).is_none());
        assert_eq!(machine.prior_error_state(), Paused);
    }

    #[test]
    fn prior_error_state_cleared_on_initialized_and_end() {
        let mut machine = machine_in(Started);
        machine.transition_to(Error);
        machine.transition_to(Idle);
        assert_eq!(machine.prior_error_state(), Started);
        machine.transition_to(Initialized);
        assert_eq!(machine.prior_error_state(), Idle);

        let mut machine = machine_in(Prepared);
        machine.transition_to(Error);
        machine.transition_to(End);
        assert_eq!(machine.prior_error_state(), Idle);
    }

    #[test]
    fn notification_skip_applies_only_to_error_before_prepare() {
        let mut machine = StateMachine::new();
        assert!(!machine.should_skip_notification(NotificationSkip::BeforeFirstPrepare));

        machine.transition_to(Error);
        assert!(machine.should_skip_notification(NotificationSkip::BeforeFirstPrepare));
        assert!(!machine.should_skip_notification(NotificationSkip::Never));

        let mut machine = machine_in(Started);
        machine.transition_to(Error);
        assert!(!machine.should_skip_notification(NotificationSkip::BeforeFirstPrepare));
    }

    #[test]
    fn illegal_call_policies() {
        assert_eq!(
            StateMachine::illegal_call_policy(Operation::Prepare),
            IllegalCallPolicy::FailSynchronously
        );
        assert_eq!(
            StateMachine::illegal_call_policy(Operation::GetDuration),
            IllegalCallPolicy::NotifyAsync {
                skip: NotificationSkip::Never
            }
        );
        assert_eq!(
            StateMachine::illegal_call_policy(Operation::SeekTo),
            IllegalCallPolicy::NotifyAsync {
                skip: NotificationSkip::BeforeFirstPrepare
            }
        );
        assert_eq!(
            StateMachine::illegal_call_policy(Operation::GetCurrentPosition),
            IllegalCallPolicy::ReportDefault
        );
    }
}
