use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hybrid_player::config::{BackendConfig, BackendPreference, PlayerConfig};
use hybrid_player::engine::{
    BackendKind, DataSource, DecoderQuirks, PlaybackSession, PlayerFactory, StubDecoderControl,
    StubDecoderPool, StubNativeEngine, Substrates, MEDIA_ERROR_UNKNOWN,
};
use hybrid_player::{PlaybackError, PlaybackState};

fn stock_factory(quirks: DecoderQuirks) -> (PlayerFactory, StubDecoderPool) {
    let pool = StubDecoderPool::new(quirks);
    let config = PlayerConfig {
        backend: BackendConfig {
            preference: BackendPreference::Stock,
        },
        ..Default::default()
    };
    let factory = PlayerFactory::new(config, Substrates::desktop_stub(&pool, None));
    (factory, pool)
}

fn control_for(pool: &StubDecoderPool, session: &PlaybackSession) -> StubDecoderControl {
    let audio_session_id = session.audio_session_id().unwrap();
    pool.control(audio_session_id).unwrap()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn release_is_idempotent_and_final() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();

    session.release();
    session.release();
    assert_eq!(session.state(), PlaybackState::End);
    assert_eq!(session.start(), Err(PlaybackError::Released));
    assert_eq!(session.audio_session_id(), Err(PlaybackError::Released));
}

#[test]
fn emulated_loop_reports_one_seek_complete() {
    let (factory, pool) = stock_factory(DecoderQuirks::detect(10, false));
    let session = factory.create_session().unwrap();
    let seeks = counter();
    let completions = counter();
    let _seek = {
        let seeks = Arc::clone(&seeks);
        session.on_seek_complete(move |_| {
            seeks.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _completion = {
        let completions = Arc::clone(&completions);
        session.on_completion(move |_| {
            completions.fetch_add(1, Ordering::SeqCst);
        })
    };

    session.set_source(&DataSource::uri("file:///loop.ogg")).unwrap();
    session.prepare().unwrap();
    session.set_looping(true).unwrap();
    session.start().unwrap();
    let control = control_for(&pool, &session);
    control.finish_playback();
    session.dispatch_pending();

    assert_eq!(seeks.load(Ordering::SeqCst), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(session.state(), PlaybackState::Started);
    assert_eq!(session.current_position().unwrap(), 0);
}

#[test]
fn duration_from_idle_errors_then_completes() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let completions = counter();
    let _error = {
        let errors = Arc::clone(&errors);
        session.on_error(move |_, what, extra| {
            errors.lock().unwrap().push((what, extra));
            false
        })
    };
    let _completion = {
        let completions = Arc::clone(&completions);
        session.on_completion(move |_| {
            completions.fetch_add(1, Ordering::SeqCst);
        })
    };

    assert_eq!(session.duration().unwrap(), 0);
    assert_eq!(session.state(), PlaybackState::Error);
    assert_eq!(session.prior_error_state(), PlaybackState::Idle);

    assert_eq!(session.dispatch_pending(), 1);
    assert_eq!(*errors.lock().unwrap(), vec![(MEDIA_ERROR_UNKNOWN, 0)]);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn handled_error_suppresses_completion() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let completions = counter();
    let _error = session.on_error(|_, _, _| true);
    let _completion = {
        let completions = Arc::clone(&completions);
        session.on_completion(move |_| {
            completions.fetch_add(1, Ordering::SeqCst);
        })
    };

    session.start().unwrap();
    assert_eq!(session.state(), PlaybackState::Error);
    session.dispatch_pending();
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

#[test]
fn position_in_initialized_ignores_stale_decoder() {
    let (factory, pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    control_for(&pool, &session).set_position(4_321);

    assert_eq!(session.state(), PlaybackState::Initialized);
    assert_eq!(session.current_position().unwrap(), 0);
}

#[test]
fn async_prepare_is_delivered_on_dispatch() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let prepared = counter();
    let _prepared = {
        let prepared = Arc::clone(&prepared);
        session.on_prepared(move |s| {
            assert_eq!(s.state(), PlaybackState::Prepared);
            prepared.fetch_add(1, Ordering::SeqCst);
        })
    };

    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare_async().unwrap();
    assert_eq!(session.state(), PlaybackState::Preparing);
    assert_eq!(prepared.load(Ordering::SeqCst), 0);

    session.dispatch_pending();
    assert_eq!(prepared.load(Ordering::SeqCst), 1);
    assert_eq!(session.duration().unwrap(), 10_000);
}

#[test]
fn dropped_subscription_stops_delivery() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let prepared = counter();
    let subscription = {
        let prepared = Arc::clone(&prepared);
        session.on_prepared(move |_| {
            prepared.fetch_add(1, Ordering::SeqCst);
        })
    };
    subscription.unsubscribe();

    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare_async().unwrap();
    session.dispatch_pending();
    assert_eq!(prepared.load(Ordering::SeqCst), 0);
}

#[test]
fn seeks_coalesce_through_the_session() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let seeks = counter();
    let _seek = {
        let seeks = Arc::clone(&seeks);
        session.on_seek_complete(move |_| {
            seeks.fetch_add(1, Ordering::SeqCst);
        })
    };

    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare().unwrap();
    session.seek_to(1_000).unwrap();
    session.seek_to(2_000).unwrap();
    session.seek_to(3_000).unwrap();
    session.dispatch_pending();

    assert_eq!(seeks.load(Ordering::SeqCst), 1);
    assert_eq!(session.current_position().unwrap(), 3_000);
}

#[test]
fn emulated_chaining_starts_the_successor() {
    let (factory, pool) = stock_factory(DecoderQuirks::detect(10, false));
    let first = factory.create_session().unwrap();
    let second = factory.create_session().unwrap();
    for session in [&first, &second] {
        session.set_source(&DataSource::uri("file:///part.ogg")).unwrap();
        session.prepare().unwrap();
    }

    assert!(matches!(
        first.set_next(Some(&first)),
        Err(PlaybackError::InvalidArgument { .. })
    ));
    first.set_next(Some(&second)).unwrap();
    first.start().unwrap();
    control_for(&pool, &first).finish_playback();
    first.dispatch_pending();

    assert_eq!(first.state(), PlaybackState::PlaybackCompleted);
    assert_eq!(second.state(), PlaybackState::Started);
    assert!(control_for(&pool, &second).is_playing());
}

#[test]
fn successor_must_share_the_backend_kind() {
    let pool = StubDecoderPool::new(DecoderQuirks::detect(19, false));
    let factory = PlayerFactory::new(
        PlayerConfig::default(),
        Substrates::desktop_stub(&pool, Some(Arc::new(StubNativeEngine::new()))),
    );
    let stock = factory.create_session_with(BackendKind::Stock).unwrap();
    let native = factory.create_session_with(BackendKind::Native).unwrap();
    for session in [&stock, &native] {
        session.set_source(&DataSource::uri("file:///part.ogg")).unwrap();
        session.prepare().unwrap();
    }

    assert!(matches!(
        stock.set_next(Some(&native)),
        Err(PlaybackError::InvalidArgument { .. })
    ));
}

#[test]
fn native_session_plays_through_the_engine() {
    let pool = StubDecoderPool::default();
    let engine = Arc::new(StubNativeEngine::new());
    let config = PlayerConfig {
        backend: BackendConfig {
            preference: BackendPreference::Native,
        },
        ..Default::default()
    };
    let factory = PlayerFactory::new(config, Substrates::desktop_stub(&pool, Some(engine.clone())));
    let session = factory.create_session().unwrap();
    assert_eq!(session.backend_kind(), BackendKind::Native);
    assert_eq!(
        session.set_audio_session_id(7),
        Err(PlaybackError::Unsupported {
            operation: "set_audio_session_id"
        })
    );

    let completions = counter();
    let _completion = {
        let completions = Arc::clone(&completions);
        session.on_completion(move |_| {
            completions.fetch_add(1, Ordering::SeqCst);
        })
    };
    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare().unwrap();
    session.start().unwrap();

    let handle = engine
        .handle_for_session(session.audio_session_id().unwrap())
        .unwrap();
    assert!(engine.is_playing(handle));
    engine.finish_playback(handle);
    session.dispatch_pending();

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), PlaybackState::PlaybackCompleted);

    drop(session);
    assert_eq!(engine.live_players(), 0);
}

#[tokio::test]
async fn dispatch_next_waits_for_events() {
    let (factory, _pool) = stock_factory(DecoderQuirks::detect(19, false));
    let session = factory.create_session().unwrap();
    let prepared = counter();
    let _prepared = {
        let prepared = Arc::clone(&prepared);
        session.on_prepared(move |_| {
            prepared.fetch_add(1, Ordering::SeqCst);
        })
    };

    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare_async().unwrap();
    assert!(session.dispatch_next().await);
    assert_eq!(prepared.load(Ordering::SeqCst), 1);
}
