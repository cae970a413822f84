use hybrid_player::config::{BackendConfig, BackendPreference, PlayerConfig};
use hybrid_player::effects::{
    BassBoost, EffectStatus, EnvironmentalReverb, EnvironmentalReverbPreset, Equalizer, PreAmp,
    PreAmpSettings, SettingsRecord, Virtualizer,
};
use hybrid_player::engine::{DataSource, DecoderQuirks, PlayerFactory, StubDecoderPool, Substrates};
use hybrid_player::{EffectError, EffectHandle};

fn factory() -> PlayerFactory {
    let pool = StubDecoderPool::new(DecoderQuirks::detect(19, false));
    let config = PlayerConfig {
        backend: BackendConfig {
            preference: BackendPreference::Stock,
        },
        ..Default::default()
    };
    PlayerFactory::new(config, Substrates::desktop_stub(&pool, None))
}

fn controllers(handles: &[&EffectHandle<BassBoost>]) -> usize {
    handles
        .iter()
        .filter(|handle| handle.has_control().unwrap_or(false))
        .count()
}

#[test]
fn newest_handle_controls_and_survivors_are_promoted() {
    let factory = factory();
    let mut a = factory.create_effect::<BassBoost>(42).unwrap();
    assert!(a.has_control().unwrap());
    let mut b = factory.create_effect::<BassBoost>(42).unwrap();
    let mut c = factory.create_effect::<BassBoost>(42).unwrap();
    assert_eq!(controllers(&[&a, &b, &c]), 1);
    assert!(c.has_control().unwrap());

    c.release();
    assert!(b.has_control().unwrap());
    assert_eq!(controllers(&[&a, &b]), 1);

    b.release();
    assert!(a.has_control().unwrap());

    a.release();
    assert_eq!(controllers(&[&a, &b, &c]), 0);
}

#[test]
fn releasing_a_non_head_keeps_control_in_place() {
    let factory = factory();
    let a = factory.create_effect::<BassBoost>(7).unwrap();
    let mut b = factory.create_effect::<BassBoost>(7).unwrap();
    let c = factory.create_effect::<BassBoost>(7).unwrap();

    b.release();
    assert!(c.has_control().unwrap());
    assert!(!a.has_control().unwrap());
}

#[test]
fn set_enabled_and_setters_fail_differently_without_control() {
    let factory = factory();
    let old = factory.create_effect::<BassBoost>(3).unwrap();
    let head = factory.create_effect::<BassBoost>(3).unwrap();

    assert_eq!(old.set_enabled(true).unwrap(), EffectStatus::InvalidOperation);
    assert!(!head.enabled().unwrap());
    assert!(matches!(
        old.set_strength(500),
        Err(EffectError::ControlLost { .. })
    ));

    assert_eq!(head.set_enabled(true).unwrap(), EffectStatus::Success);
    head.set_strength(500).unwrap();
    assert!(old.enabled().unwrap());
    assert_eq!(old.rounded_strength().unwrap(), 500);
    assert_eq!(old.id().unwrap(), head.id().unwrap());
}

#[test]
fn categories_are_arbitrated_independently() {
    let factory = factory();
    let bass = factory.create_effect::<BassBoost>(9).unwrap();
    let virtualizer = factory.create_effect::<Virtualizer>(9).unwrap();
    let _newer_bass = factory.create_effect::<BassBoost>(9).unwrap();

    assert!(!bass.has_control().unwrap());
    assert!(virtualizer.has_control().unwrap());
    assert_ne!(bass.id().unwrap(), virtualizer.id().unwrap());
}

#[test]
fn handles_outlive_their_session() {
    let factory = factory();
    let session = factory.create_session().unwrap();
    session.set_source(&DataSource::uri("file:///a.ogg")).unwrap();
    session.prepare().unwrap();

    let bass = session.create_effect::<BassBoost>().unwrap();
    bass.set_strength(250).unwrap();
    session.stop().unwrap();
    session.reset().unwrap();
    assert_eq!(bass.rounded_strength().unwrap(), 250);

    session.release();
    assert!(matches!(
        session.create_effect::<BassBoost>(),
        Err(EffectError::Released)
    ));
    bass.set_strength(750).unwrap();
    assert_eq!(bass.rounded_strength().unwrap(), 750);
}

#[test]
fn last_release_discards_shared_parameters() {
    let factory = factory();
    let mut first = factory.create_effect::<BassBoost>(11).unwrap();
    first.set_enabled(true).unwrap();
    first.set_strength(900).unwrap();
    first.release();
    assert!(matches!(first.enabled(), Err(EffectError::Released)));

    let fresh = factory.create_effect::<BassBoost>(11).unwrap();
    assert!(!fresh.enabled().unwrap());
    assert_eq!(fresh.rounded_strength().unwrap(), 0);
}

#[test]
fn equalizer_reports_the_corrected_band_table() {
    let factory = factory();
    let equalizer = factory.create_effect::<Equalizer>(5).unwrap();
    let bands = equalizer.number_of_bands().unwrap();
    assert!(bands > 0);

    let mut previous_max = -1;
    for band in 0..bands {
        let (min, max) = equalizer.band_freq_range(band).unwrap();
        let center = equalizer.center_freq(band).unwrap();
        assert!(min <= center && center <= max);
        assert!(min > previous_max);
        previous_max = max;
    }
    assert!(previous_max <= 24_000_000);
}

#[test]
fn environmental_reverb_follows_the_newest_handle() {
    let factory = factory();
    let mut older = factory.create_effect::<EnvironmentalReverb>(21).unwrap();
    let newer = factory.create_effect::<EnvironmentalReverb>(21).unwrap();

    assert!(matches!(
        older.set_decay_time(2_000),
        Err(EffectError::ControlLost { .. })
    ));
    newer.load_preset(EnvironmentalReverbPreset::ConcertHall).unwrap();
    newer.set_density(800).unwrap();
    assert_eq!(older.decay_time().unwrap(), 3_920);
    assert_eq!(older.density().unwrap(), 800);
    assert!(matches!(
        newer.set_reverb_level(3_000),
        Err(EffectError::InvalidArgument { .. })
    ));

    drop(newer);
    assert!(older.has_control().unwrap());
    older.set_room_level(-500).unwrap();
    assert_eq!(older.room_level().unwrap(), -500);
    older.release();
}

#[test]
fn preamp_is_arbitrated_apart_from_other_categories() {
    let factory = factory();
    let preamp = factory.create_effect::<PreAmp>(22).unwrap();
    let bass = factory.create_effect::<BassBoost>(22).unwrap();
    let newer = factory.create_effect::<PreAmp>(22).unwrap();

    assert_eq!(preamp.level().unwrap(), 1.0);
    assert!(matches!(
        preamp.set_level(0.5),
        Err(EffectError::ControlLost { .. })
    ));
    newer.set_level(0.5).unwrap();
    assert_eq!(preamp.properties().unwrap(), PreAmpSettings { level: 0.5 });
    assert!(newer.set_level(2.5).is_err());
    assert_ne!(preamp.id().unwrap(), bass.id().unwrap());
}

#[test]
fn settings_text_restores_properties_on_another_handle() {
    let factory = factory();
    let source = factory.create_effect::<EnvironmentalReverb>(23).unwrap();
    source.load_preset(EnvironmentalReverbPreset::Cave).unwrap();
    let text = SettingsRecord::EnvironmentalReverb(source.properties().unwrap()).to_string();
    drop(source);

    let restored = factory.create_effect::<EnvironmentalReverb>(24).unwrap();
    match text.parse::<SettingsRecord>().unwrap() {
        SettingsRecord::EnvironmentalReverb(settings) => restored.set_properties(settings).unwrap(),
        other => panic!("Expected environmental reverb settings, got {:?}", other),
    }
    assert_eq!(
        restored.properties().unwrap(),
        EnvironmentalReverbPreset::Cave.settings()
    );

    let bass = factory.create_effect::<BassBoost>(24).unwrap();
    bass.set_properties("BassBoost;strength=640".parse().unwrap())
        .unwrap();
    assert_eq!(bass.properties().unwrap().to_string(), "BassBoost;strength=640");
    assert!("BassBoost;strength=640;extra=1"
        .parse::<hybrid_player::effects::BassBoostSettings>()
        .is_err());

    let equalizer = factory.create_effect::<Equalizer>(24).unwrap();
    equalizer.use_preset(3).unwrap();
    assert_eq!(
        equalizer.properties().unwrap().to_string(),
        "Equalizer;curPreset=3;numBands=5;band1Level=0;band2Level=0;band3Level=0;band4Level=0;band5Level=0"
    );
}
