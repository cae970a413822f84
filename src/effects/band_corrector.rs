//! Repair of frequency band tables reported by defective equalizers.
//!
//! Some platform equalizers report band ranges whose upper bound was derived
//! from the wrong ratio, centers that fall outside their own band, or ranges
//! with gaps and overlaps between neighbours. [`BandRangeCorrector`] detects
//! these defects and rebuilds a consistent table, or reports that it cannot.
//!
//! All frequencies are in milli-Hertz.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::BandTableError;

/// Nyquist ceiling for a 48 kHz output, in milli-Hertz.
pub const NYQUIST_FREQUENCY_MILLIHERTZ: i32 = 24_000_000;

/// Significant figures kept when a frequency is recomputed.
pub const DEFAULT_SIGNIFICANT_FIGURES: u32 = 2;

/// Largest precision an `i32` milli-Hertz value can carry.
pub const MAX_SIGNIFICANT_FIGURES: u32 = 9;

bitflags! {
    /// Defects found in a band table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Violations: u32 {
        const RANGE_INVERSION = 1 << 0;
        const RANGE_GAP = 1 << 1;
        const RANGE_OVERLAP = 1 << 2;
        const CENTER_WRONG_ORDER = 1 << 8;
        const CENTER_OUT_OF_RANGE = 1 << 9;
    }
}

/// One equalizer band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub center: i32,
    pub min: i32,
    pub max: i32,
}

impl Band {
    pub fn new(center: i32, min: i32, max: i32) -> Self {
        Self { center, min, max }
    }

    pub fn contains(&self, frequency: i32) -> bool {
        self.min <= frequency && frequency <= self.max
    }
}

/// Ordered table of equalizer bands, lowest band first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandTable {
    pub bands: Vec<Band>,
}

impl BandTable {
    pub fn new(bands: Vec<Band>) -> Self {
        Self { bands }
    }

    /// Build a table from parallel center and range arrays.
    pub fn from_parts(centers: &[i32], ranges: &[(i32, i32)]) -> Result<Self, BandTableError> {
        if centers.len() != ranges.len() {
            return Err(BandTableError::Malformed {
                reason: format!(
                    "{} centers but {} ranges",
                    centers.len(),
                    ranges.len()
                ),
            });
        }

        let bands = centers
            .iter()
            .zip(ranges)
            .map(|(&center, &(min, max))| Band::new(center, min, max))
            .collect();
        Ok(Self { bands })
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn centers(&self) -> Vec<i32> {
        self.bands.iter().map(|band| band.center).collect()
    }

    pub fn ranges(&self) -> Vec<(i32, i32)> {
        self.bands.iter().map(|band| (band.min, band.max)).collect()
    }

    /// Index of the band covering `frequency`.
    ///
    /// Frequencies below the first band map to band 0 and frequencies above
    /// the last band map to the last band. Returns `None` for an empty table.
    pub fn band_for_frequency(&self, frequency: i32) -> Option<usize> {
        let last = self.bands.len().checked_sub(1)?;
        if frequency < self.bands[0].min {
            return Some(0);
        }
        if let Some(index) = self.bands.iter().position(|band| band.contains(frequency)) {
            return Some(index);
        }
        // inside a gap or above the table: pick the last band starting below
        let index = self
            .bands
            .iter()
            .rposition(|band| band.min <= frequency)
            .unwrap_or(last);
        Some(index)
    }
}

/// Stateless band table repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRangeCorrector {
    nyquist: i32,
    significant_figures: u32,
}

impl Default for BandRangeCorrector {
    fn default() -> Self {
        Self::new(NYQUIST_FREQUENCY_MILLIHERTZ, DEFAULT_SIGNIFICANT_FIGURES)
    }
}

impl BandRangeCorrector {
    /// Out-of-range settings fall back to the defaults with a warning.
    pub fn new(nyquist: i32, significant_figures: u32) -> Self {
        let nyquist = if nyquist > 0 {
            nyquist
        } else {
            log::warn!(
                "[BandCorrector] Nyquist ceiling {} is not positive, using {}",
                nyquist,
                NYQUIST_FREQUENCY_MILLIHERTZ
            );
            NYQUIST_FREQUENCY_MILLIHERTZ
        };
        let significant_figures = if (1..=MAX_SIGNIFICANT_FIGURES).contains(&significant_figures) {
            significant_figures
        } else {
            log::warn!(
                "[BandCorrector] {} significant figures outside 1..={}, using {}",
                significant_figures,
                MAX_SIGNIFICANT_FIGURES,
                DEFAULT_SIGNIFICANT_FIGURES
            );
            DEFAULT_SIGNIFICANT_FIGURES
        };
        Self {
            nyquist,
            significant_figures,
        }
    }

    /// Corrector whose ceiling is half of `sample_rate_hz`.
    pub fn for_sample_rate(sample_rate_hz: u32, significant_figures: u32) -> Self {
        let nyquist = (u64::from(sample_rate_hz) * 1000 / 2).min(i32::MAX as u64) as i32;
        Self::new(nyquist, significant_figures)
    }

    pub fn nyquist(&self) -> i32 {
        self.nyquist
    }

    pub fn significant_figures(&self) -> u32 {
        self.significant_figures
    }

    /// Aggregate violations over the whole table.
    pub fn classify(&self, table: &BandTable) -> Violations {
        self.classify_bands(table)
            .into_iter()
            .fold(Violations::empty(), |acc, flags| acc | flags)
    }

    /// Per-band violations. Gap, overlap and ordering defects are recorded on
    /// the upper band of the offending pair.
    pub fn classify_bands(&self, table: &BandTable) -> Vec<Violations> {
        let bands = &table.bands;
        bands
            .iter()
            .enumerate()
            .map(|(index, band)| {
                let mut flags = Violations::empty();

                if band.max < band.min {
                    flags |= Violations::RANGE_INVERSION;
                }
                if !band.contains(band.center) {
                    flags |= Violations::CENTER_OUT_OF_RANGE;
                }

                if index > 0 {
                    let prev = &bands[index - 1];
                    let expected_min = i64::from(prev.max) + 1;
                    let min = i64::from(band.min);
                    if expected_min < min {
                        flags |= Violations::RANGE_GAP;
                    } else if expected_min > min {
                        flags |= Violations::RANGE_OVERLAP;
                    }
                    if prev.center > band.center {
                        flags |= Violations::CENTER_WRONG_ORDER;
                    }
                }

                flags
            })
            .collect()
    }

    /// Repair `table`.
    ///
    /// A valid table is returned unchanged. Otherwise the known "upper bound
    /// from the lower-bound ratio" defect is tried first, then the generic
    /// reconstruction. Inverted ranges are only rebuilt when they match the
    /// known defect. A candidate is accepted only when it classifies clean.
    pub fn correct(&self, table: &BandTable) -> Result<BandTable, BandTableError> {
        let per_band = self.classify_bands(table);
        let violations = per_band
            .iter()
            .fold(Violations::empty(), |acc, flags| acc | *flags);

        if violations.is_empty() {
            return Ok(table.clone());
        }

        log::debug!(
            "[BandCorrector] Correcting {} bands, violations={:?}",
            table.len(),
            violations
        );

        let known_defect =
            violations == Violations::RANGE_INVERSION | Violations::CENTER_OUT_OF_RANGE;
        if known_defect {
            if let Some(candidate) = self.correct_range_max(table, &per_band) {
                if self.classify(&candidate).is_empty() {
                    return Ok(candidate);
                }
            }
        } else if violations.contains(Violations::RANGE_INVERSION) {
            log::warn!(
                "[BandCorrector] Inverted ranges outside the known defect: {:?}",
                violations
            );
            return Err(BandTableError::Unrepairable {
                remaining: violations,
            });
        }

        let remaining = match self.reconstruct(table, violations) {
            Some(candidate) => {
                let remaining = self.classify(&candidate);
                if remaining.is_empty() {
                    return Ok(candidate);
                }
                remaining
            }
            None => violations,
        };

        log::warn!(
            "[BandCorrector] Unable to repair band table: remaining={:?}",
            remaining
        );
        Err(BandTableError::Unrepairable { remaining })
    }

    /// Recompute upper bounds that were derived from the wrong ratio.
    ///
    /// The defective bound is mirrored about the center on a log scale:
    /// `max = center * (center / min)`.
    fn correct_range_max(&self, table: &BandTable, per_band: &[Violations]) -> Option<BandTable> {
        let defect = Violations::RANGE_INVERSION | Violations::CENTER_OUT_OF_RANGE;
        let mut bands = Vec::with_capacity(table.len());

        for (band, flags) in table.bands.iter().zip(per_band) {
            if flags.is_empty() {
                bands.push(*band);
                continue;
            }

            let repairable = *flags == defect
                && band.min > 0
                && band.center > band.min
                && band.center >= band.max;
            if !repairable {
                return None;
            }

            let ratio = f64::from(band.center) / f64::from(band.min);
            let max = self.round_frequency(ratio * f64::from(band.center));
            bands.push(Band::new(band.center, band.min, max));
        }

        Some(BandTable { bands })
    }

    /// Generic reconstruction: fill inverted upper bounds, rebuild centers as
    /// geometric means and close gaps and overlaps.
    fn reconstruct(&self, table: &BandTable, violations: Violations) -> Option<BandTable> {
        let count = table.len();
        let mut bands = table.bands.clone();

        // An inverted upper bound carries no information; the gap pass below
        // rewrites it for every band but the last, which extends to the ceiling.
        for index in 0..count {
            if bands[index].max < bands[index].min {
                bands[index].max = if index + 1 < count {
                    table.bands[index + 1].min.saturating_sub(1)
                } else {
                    self.nyquist
                };
            }
        }

        let centers_defective = violations
            .intersects(Violations::CENTER_OUT_OF_RANGE | Violations::CENTER_WRONG_ORDER);
        if centers_defective {
            for index in 0..count {
                let Band { center, min, max } = bands[index];
                if min > 0 && min < max {
                    let center = f64::from(min) * (f64::from(max) / f64::from(min)).sqrt();
                    bands[index].center = self.round_frequency(center);
                } else if !(min <= center && center <= max) {
                    return None;
                }

                if index > 0 && bands[index - 1].center >= bands[index].center {
                    return None;
                }
            }
        }

        for index in 0..count {
            let Band { center, min, max } = bands[index];
            let max = if index + 1 < count {
                bands[index + 1].min.saturating_sub(1)
            } else {
                max
            };

            if !(min < center && center < max) {
                return None;
            }
            bands[index].max = max;
        }

        Some(BandTable { bands })
    }

    /// Round to the configured significant figures, clamped to the ceiling.
    pub fn round_frequency(&self, frequency: f64) -> i32 {
        if !(frequency > 0.0) {
            return 0;
        }

        let exp10 = frequency.log10().floor() as i32;
        let digits = self.significant_figures.min(MAX_SIGNIFICANT_FIGURES) as i32;
        let coeff = 10f64.powi(digits - exp10 - 1);
        let rounded = (frequency * coeff).round();
        let value = (rounded / coeff + 0.5) as i64;

        value.min(i64::from(self.nyquist)) as i32
    }
}

/// Repair `table` with the default 48 kHz ceiling.
pub fn correct(table: &BandTable) -> Result<BandTable, BandTableError> {
    BandRangeCorrector::default().correct(table)
}
