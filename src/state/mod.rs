//! Playback lifecycle state machine.
//!
//! The machine is the single authority on which calls are legal in which
//! state. Adapters consult it before touching their substrate and report
//! every transition it accepts.

pub mod machine;

pub use machine::{
    IllegalCallPolicy, NotificationSkip, Operation, PlaybackState, StateMachine, Transition,
};
