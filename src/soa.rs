//! The duration/SOA relation for tactile apparent motion.
//!
//! Stimulus onset asynchrony (SOA) is the time between the onsets of two
//! consecutive pulses. Psychophysical experiments on apparent motion found
//! the SOA that produces the most continuous sensation to be linear in the
//! pulse duration:
//!
//! ```text
//! soa = 0.32 * duration + 47.3 ms
//! ```
//!
//! Motion feels continuous only when consecutive pulses overlap, that is
//! when `duration > soa`. With the default constants this holds for
//! durations above roughly 70 ms.
//!
//! All public quantities are in seconds. A [TimingConfig] may be written in
//! milliseconds; it is converted once, when the model is built.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Unit that a [TimingConfig]'s constants are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Seconds
    #[default]
    Seconds,
    /// Milliseconds
    Milliseconds,
}

impl TimeUnit {
    /// Convert a value in this unit to seconds.
    pub fn to_seconds(self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value,
            TimeUnit::Milliseconds => value / 1000.0,
        }
    }

    /// Convert a value in seconds to this unit.
    pub fn from_seconds(self, seconds: f64) -> f64 {
        match self {
            TimeUnit::Seconds => seconds,
            TimeUnit::Milliseconds => seconds * 1000.0,
        }
    }
}

/// Constants of the duration/SOA relation and the validated duration range.
/// `base`, `min_duration` and `max_duration` are expressed in `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Dimensionless slope of the relation
    pub slope: f64,
    /// Intercept of the relation
    pub base: f64,
    /// Unit of `base` and the duration range
    pub unit: TimeUnit,
    /// Shortest duration the relation was validated for
    pub min_duration: f64,
    /// Longest duration the relation was validated for
    pub max_duration: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            slope: 0.32,
            base: 0.0473,
            unit: TimeUnit::Seconds,
            min_duration: 0.040,
            max_duration: 0.160,
        }
    }
}

impl TimingConfig {
    /// The same relation written in milliseconds, `soa = 0.32 d + 47.3`.
    pub fn milliseconds() -> Self {
        Self {
            slope: 0.32,
            base: 47.3,
            unit: TimeUnit::Milliseconds,
            min_duration: 40.0,
            max_duration: 160.0,
        }
    }
}

/// A duration and the SOA that goes with it, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParameters {
    /// How long each pulse lasts
    pub duration: f64,
    /// Time between consecutive onsets
    pub soa: f64,
}

impl TimingParameters {
    /// `duration - soa`; positive when consecutive pulses overlap.
    pub fn overlap(&self) -> f64 {
        self.duration - self.soa
    }
}

/// The outcome of [SoaTimingModel::validate].
#[derive(Debug, Clone, PartialEq)]
pub struct TimingValidation {
    /// Whether consecutive pulses overlap
    pub is_continuous: bool,
    /// `duration - soa`, in seconds
    pub overlap_seconds: f64,
    /// Human readable notes about the pair
    pub warnings: Vec<String>,
}

/// Converts between pulse duration and SOA. Holds only constants; every
/// method is a pure function of its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaTimingModel {
    slope: f64,
    base: f64,
    min_duration: f64,
    max_duration: f64,
}

impl Default for SoaTimingModel {
    fn default() -> Self {
        Self {
            slope: 0.32,
            base: 0.0473,
            min_duration: 0.040,
            max_duration: 0.160,
        }
    }
}

impl SoaTimingModel {
    /// Build a model, converting the constants to seconds and rejecting
    /// ones that would produce a non-positive SOA within the duration range.
    pub fn new(config: TimingConfig) -> Result<Self, ConfigError> {
        let unit = config.unit;
        let model = Self {
            slope: config.slope,
            base: unit.to_seconds(config.base),
            min_duration: unit.to_seconds(config.min_duration),
            max_duration: unit.to_seconds(config.max_duration),
        };

        if !(model.slope.is_finite() && model.slope > 0.0) {
            return Err(ConfigError::InvalidTiming(format!(
                "slope must be positive, got {}",
                model.slope
            )));
        }
        if !model.base.is_finite() {
            return Err(ConfigError::InvalidTiming("base is not finite".to_owned()));
        }
        if !(model.min_duration > 0.0 && model.min_duration < model.max_duration) {
            return Err(ConfigError::InvalidTiming(format!(
                "duration range [{}, {}] is empty or non-positive",
                model.min_duration, model.max_duration
            )));
        }
        if !model.max_duration.is_finite() {
            return Err(ConfigError::InvalidTiming(
                "max duration is not finite".to_owned(),
            ));
        }
        // The relation is increasing, so the shortest duration has the
        // smallest SOA.
        if model.soa_from_duration(model.min_duration) <= 0.0 {
            return Err(ConfigError::InvalidTiming(format!(
                "SOA at {}s would not be positive",
                model.min_duration
            )));
        }

        Ok(model)
    }

    /// Shortest validated duration, in seconds.
    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    /// Longest validated duration, in seconds.
    pub fn max_duration(&self) -> f64 {
        self.max_duration
    }

    /// `soa = slope * duration + base`
    pub fn soa_from_duration(&self, duration: f64) -> f64 {
        self.slope * duration + self.base
    }

    /// Inverse of [soa_from_duration](Self::soa_from_duration), clamped to
    /// the validated duration range.
    pub fn duration_from_soa(&self, soa: f64) -> f64 {
        ((soa - self.base) / self.slope).clamp(self.min_duration, self.max_duration)
    }

    /// The pair for a requested pulse duration.
    pub fn for_duration(&self, duration: f64) -> Result<TimingParameters, ValidationError> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ValidationError::NonPositiveTime {
                name: "duration",
                value: duration,
            });
        }
        Ok(TimingParameters {
            duration,
            soa: self.soa_from_duration(duration),
        })
    }

    /// The pair for a requested SOA. If the implied duration had to be
    /// clamped, the SOA is recomputed from the clamped duration so that the
    /// pair still satisfies the relation.
    pub fn for_soa(&self, soa: f64) -> Result<TimingParameters, ValidationError> {
        if !(soa.is_finite() && soa > 0.0) {
            return Err(ValidationError::NonPositiveTime {
                name: "soa",
                value: soa,
            });
        }
        let duration = self.duration_from_soa(soa);
        let consistent = self.soa_from_duration(duration);
        if (consistent - soa).abs() > 1e-9 {
            warn!(
                "SOA {:.4}s is outside the validated range, using {:.4}s (duration {:.4}s)",
                soa, consistent, duration
            );
        }
        Ok(TimingParameters {
            duration,
            soa: consistent,
        })
    }

    /// Check whether a duration/SOA pair produces continuous motion. Never
    /// fails: discrete taps are sometimes what the caller wants.
    pub fn validate(&self, duration: f64, soa: f64) -> TimingValidation {
        let overlap = duration - soa;
        let mut warnings = Vec::new();

        if duration < self.min_duration {
            warnings.push(format!(
                "duration {:.1}ms is below the validated minimum of {:.1}ms",
                duration * 1000.0,
                self.min_duration * 1000.0
            ));
        } else if duration > self.max_duration {
            warnings.push(format!(
                "duration {:.1}ms is above the validated maximum of {:.1}ms",
                duration * 1000.0,
                self.max_duration * 1000.0
            ));
        }

        if overlap <= 0.0 {
            warnings.push(format!(
                "duration {:.1}ms <= SOA {:.1}ms, no overlap: motion will feel like discrete taps",
                duration * 1000.0,
                soa * 1000.0
            ));
        }

        TimingValidation {
            is_continuous: overlap > 0.0,
            overlap_seconds: overlap,
            warnings,
        }
    }
}
