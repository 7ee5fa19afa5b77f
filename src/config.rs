//! Run-time configuration, read from a [ron] file.
//!
//! Every section falls back to its defaults, so a file only needs to name
//! what it changes:
//!
//! ```text
//! (
//!     layout: [(0, 0.0, 0.0), (1, 40.0, 0.0), (2, 20.0, 35.0)],
//!     timing: (unit: Milliseconds, base: 47.3, min_duration: 40.0, max_duration: 160.0),
//!     schedule: (failure_policy: AbortOnFirst),
//! )
//! ```
//!
//! [BrushConfig::engine] turns a configuration into a ready
//! [MotionScheduleBuilder].

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, str::FromStr};

use crate::command_sink::DeviceMapping;
use crate::error::ConfigError;
use crate::layout::{Actuator, ActuatorId, ActuatorLayout};
use crate::phantom::{PhantomConfig, PhantomSynthesizer};
use crate::playback::{PlaybackConfig, PlaybackOptions};
use crate::schedule::{MotionScheduleBuilder, ScheduleConfig};
use crate::serial_sink::DEFAULT_BAUD_RATE;
use crate::soa::{SoaTimingModel, TimingConfig};

/// The serial link and the intensity-to-duty mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// See [DeviceMapping]
    pub mapping: DeviceMapping,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            mapping: DeviceMapping::default(),
        }
    }
}

/// Everything the command line tool can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    /// Actuators as `(id, x, y)`
    pub layout: Vec<(ActuatorId, f64, f64)>,
    /// See [TimingConfig]
    pub timing: TimingConfig,
    /// See [PhantomConfig]
    pub phantom: PhantomConfig,
    /// See [ScheduleConfig]
    pub schedule: ScheduleConfig,
    /// See [DeviceConfig]
    pub device: DeviceConfig,
    /// See [PlaybackConfig]
    pub playback: PlaybackConfig,
}

impl Default for BrushConfig {
    /// Four actuators in a line, 60 mm apart.
    fn default() -> Self {
        Self {
            layout: vec![(0, 0.0, 0.0), (1, 60.0, 0.0), (2, 120.0, 0.0), (3, 180.0, 0.0)],
            timing: TimingConfig::default(),
            phantom: PhantomConfig::default(),
            schedule: ScheduleConfig::default(),
            device: DeviceConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl BrushConfig {
    /// Read a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        fs::read_to_string(path)?.parse()
    }

    /// The configuration as pretty RON text.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)
    }

    /// The configured actuator layout.
    pub fn actuator_layout(&self) -> Result<ActuatorLayout, ConfigError> {
        ActuatorLayout::new(
            self.layout
                .iter()
                .map(|&(id, x, y)| Actuator::new(id, x, y))
                .collect(),
        )
    }

    /// Wire up the layout, synthesizer, and timing model into a schedule
    /// builder. Checks the device and playback sections too, so that a bad
    /// file is rejected before anything is planned or played.
    pub fn engine(&self) -> Result<MotionScheduleBuilder, ConfigError> {
        self.playback_options()?;
        let synthesizer = PhantomSynthesizer::new(self.actuator_layout()?, self.phantom)?;
        let timing = SoaTimingModel::new(self.timing)?;
        MotionScheduleBuilder::new(synthesizer, timing, self.schedule)
    }

    /// Options for [play](crate::playback::play).
    pub fn playback_options(&self) -> Result<PlaybackOptions, ConfigError> {
        self.device.mapping.validate()?;
        self.playback.validate()?;
        Ok(PlaybackOptions {
            config: self.playback,
            mapping: self.device.mapping,
        })
    }
}

impl FromStr for BrushConfig {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ron::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{FailurePolicy, MotionRequest, Pace, TimingRequest};
    use crate::layout::Point;
    use crate::soa::TimeUnit;
    use std::io::Write;

    #[test]
    fn default_round_trips_through_a_file() {
        let config = BrushConfig::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_ron_string().unwrap().as_bytes()).unwrap();

        assert_eq!(BrushConfig::from_path(file.path()).unwrap(), config);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let config = BrushConfig::from_str(
            "(
                layout: [(0, 0.0, 0.0), (1, 40.0, 0.0), (2, 20.0, 35.0)],
                timing: (unit: Milliseconds, base: 47.3, min_duration: 40.0, max_duration: 160.0),
                schedule: (failure_policy: AbortOnFirst),
            )",
        )
        .unwrap();

        assert_eq!(config.layout.len(), 3);
        assert_eq!(config.timing.unit, TimeUnit::Milliseconds);
        assert_eq!(config.timing.slope, 0.32);
        assert_eq!(config.schedule.failure_policy, FailurePolicy::AbortOnFirst);
        assert_eq!(config.schedule.guard_interval, 0.010);
        assert_eq!(config.phantom, PhantomConfig::default());
        assert_eq!(config.device.baud_rate, 115200);

        let engine = config.engine().unwrap();
        assert!((engine.timing_model().soa_from_duration(0.1) - 0.0793).abs() < 1e-9);
        assert_eq!(engine.synthesizer().layout().len(), 3);
    }

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(BrushConfig::from_str("()").unwrap(), BrushConfig::default());
    }

    #[test]
    fn default_engine_plans_the_line() {
        let engine = BrushConfig::default().engine().unwrap();
        let schedule = engine
            .build_schedule(&MotionRequest {
                path: vec![Point::new(0.0, 0.0).into(), Point::new(180.0, 0.0).into()],
                intensity: 1.0,
                pace: Pace::TravelTime(0.6),
                timing: TimingRequest::Duration(0.1),
            })
            .unwrap();
        assert_eq!(schedule.terminal_stop().actuators, vec![0, 1, 2, 3]);
    }

    #[test]
    fn bad_configs() {
        assert!(matches!(
            BrushConfig::from_str("(layout: [(0, 0.0, 0.0), (0, 1.0, 1.0)])")
                .unwrap()
                .engine(),
            Err(ConfigError::DuplicateActuatorId(0))
        ));
        assert!(matches!(
            BrushConfig::from_str("(layout: [])").unwrap().engine(),
            Err(ConfigError::EmptyLayout)
        ));
        assert!(matches!(
            BrushConfig::from_str("(timing: (slope: -1.0))").unwrap().engine(),
            Err(ConfigError::InvalidTiming(_))
        ));
        assert!(matches!(
            BrushConfig::from_str("(device: (mapping: (min_active_duty: 10, max_duty: 5)))")
                .unwrap()
                .engine(),
            Err(ConfigError::InvalidParameter { name: "min_active_duty", .. })
        ));
        assert!(matches!(
            BrushConfig::from_str("(device: (mapping: (frequency_index: 9)))")
                .unwrap()
                .playback_options(),
            Err(ConfigError::InvalidParameter { name: "frequency_index", .. })
        ));
        assert!(matches!(
            BrushConfig::from_str("(schedule: (guard_interval: -0.5))").unwrap().engine(),
            Err(ConfigError::InvalidParameter { name: "guard_interval", .. })
        ));
        assert!(matches!(
            BrushConfig::from_str("(schedule: (min_intensity: -1.0))").unwrap().engine(),
            Err(ConfigError::InvalidParameter { name: "min_intensity", .. })
        ));
        assert!(matches!(
            BrushConfig::from_str("(playback: (tick: 0.0))").unwrap().engine(),
            Err(ConfigError::InvalidParameter { name: "tick", .. })
        ));
        assert!(matches!(
            BrushConfig::from_str("(layout: oops)"),
            Err(ConfigError::RonSpannedError(_))
        ));
        assert!(matches!(
            BrushConfig::from_path("/definitely/not/here.ron"),
            Err(ConfigError::IoError(_))
        ));
    }
}
