//! Engine module housing the playback core.
//!
//! This module exposes the trait-based backends (`backend`), the event
//! marshaling queue (`events`), the application-facing `PlaybackSession`
//! facade and the `PlayerFactory` that builds sessions.

pub mod backend;
pub mod capability;
pub mod events;
pub mod factory;
pub mod listeners;
pub mod session;
pub mod source;

pub use backend::{
    BackendKind, DecoderLink, DecoderQuirks, NativeEngine, NativeEngineAdapter, PlaybackBackend,
    StockBackendAdapter, StockDecoder, StubDecoderControl, StubDecoderPool, StubNativeEngine,
};
pub use capability::{mark_native_engine_loaded, native_engine_available};
pub use events::{BackendEvent, EventKind, EventQueue, EventSink, Notification, MEDIA_ERROR_UNKNOWN};
pub use factory::{DecoderFactory, PlayerFactory, Substrates};
pub use listeners::Subscription;
pub use session::PlaybackSession;
pub use source::{DataSource, PlatformDescriptor};
