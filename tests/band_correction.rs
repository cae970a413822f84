use hybrid_player::config::{EqualizerConfig, PlayerConfig};
use hybrid_player::effects::{BandRangeCorrector, BandTable, Equalizer};
use hybrid_player::error::BandTableError;
use hybrid_player::engine::{PlayerFactory, StubDecoderPool, Substrates};

const AOSP_CENTERS: [i32; 5] = [60_000, 230_000, 910_000, 3_600_000, 14_000_000];
const AOSP_RANGES: [(i32, i32); 5] = [
    (30_000, 120_000),
    (120_001, 460_000),
    (460_001, 1_800_000),
    (1_800_001, 7_000_000),
    (7_000_001, 1),
];

#[test]
fn valid_table_passes_through_untouched() {
    let table = BandTable::from_parts(&[50, 150], &[(0, 99), (100, 199)]).unwrap();
    let corrector = BandRangeCorrector::default();
    assert!(corrector.classify(&table).is_empty());
    assert_eq!(corrector.correct(&table).unwrap(), table);
}

#[test]
fn inverted_second_band_is_repaired() {
    let table = BandTable::from_parts(&[50, 95], &[(0, 100), (101, 90)]).unwrap();
    let corrector = BandRangeCorrector::default();
    assert!(!corrector.classify(&table).is_empty());

    let repaired = corrector.correct(&table).unwrap();
    assert!(corrector.classify(&repaired).is_empty());
    assert_eq!(repaired.len(), 2);
}

#[test]
fn configured_sample_rate_caps_the_last_band() {
    let config = EqualizerConfig {
        sample_rate_hz: 44_100,
        significant_figures: 2,
    };
    let corrector = config.corrector();
    assert_eq!(corrector.nyquist(), 22_050_000);

    let table = BandTable::from_parts(&AOSP_CENTERS, &AOSP_RANGES).unwrap();
    let repaired = corrector.correct(&table).unwrap();
    assert!(corrector.classify(&repaired).is_empty());

    let last = repaired.bands[4];
    assert!(last.max > last.center);
    assert!(last.max <= 22_050_000);
}

#[test]
fn factory_equalizers_use_the_configured_ceiling() {
    let config = PlayerConfig {
        equalizer: EqualizerConfig {
            sample_rate_hz: 32_000,
            significant_figures: 2,
        },
        ..Default::default()
    };
    let pool = StubDecoderPool::default();
    let factory = PlayerFactory::new(config, Substrates::desktop_stub(&pool, None));

    let equalizer = factory.create_effect::<Equalizer>(1).unwrap();
    let last = equalizer.number_of_bands().unwrap() - 1;
    let (min, max) = equalizer.band_freq_range(last).unwrap();
    assert!(min < max);
    assert!(max <= 16_000_000);
}

#[test]
fn inverted_band_with_a_gap_is_left_unrepaired() {
    let table = BandTable::from_parts(&[50, 300], &[(0, 100), (200, 150)]).unwrap();
    let err = BandRangeCorrector::default().correct(&table).unwrap_err();
    assert!(matches!(err, BandTableError::Unrepairable { .. }));
}
