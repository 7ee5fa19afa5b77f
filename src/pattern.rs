//! Fixed vibration patterns that stay put instead of travelling along a
//! path: a steady buzz, a train of pulses, or actuators taking turns.
//!
//! A [Pattern] is turned into an ordinary [Schedule] by
//! [MotionScheduleBuilder::build_pattern], so it is merged, terminated, and
//! played back exactly like a motion.

use log::debug;

use crate::error::{ScheduleError, ValidationError};
use crate::layout::ActuatorId;
use crate::schedule::{MotionScheduleBuilder, Schedule, ScheduleEvent};
use crate::soa::TimingParameters;

/// One actuator and how hard a pattern drives it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternDrive {
    /// Which actuator
    pub actuator_id: ActuatorId,
    /// How hard to drive it
    pub intensity: f64,
}

impl PatternDrive {
    /// Drive `actuator_id` at `intensity`.
    pub fn new(actuator_id: ActuatorId, intensity: f64) -> Self {
        Self {
            actuator_id,
            intensity,
        }
    }
}

/// A pattern of drives that does not depend on a path. All times are in
/// seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Every actuator on together for `duration`
    Static {
        /// What to drive
        drives: Vec<PatternDrive>,
        /// How long
        duration: f64,
    },
    /// Every actuator on together for `pulse`, off for `pause`, `pulses`
    /// times over
    Pulse {
        /// What to drive
        drives: Vec<PatternDrive>,
        /// Length of each pulse
        pulse: f64,
        /// Gap between pulses
        pause: f64,
        /// Number of pulses
        pulses: usize,
    },
    /// One actuator at a time in the given order, each on for `on` and
    /// followed by `pause`
    Sequential {
        /// What to drive, in order
        drives: Vec<PatternDrive>,
        /// How long each actuator stays on
        on: f64,
        /// Gap before the next actuator starts
        pause: f64,
    },
}

impl Pattern {
    /// The actuators and intensities the pattern drives.
    pub fn drives(&self) -> &[PatternDrive] {
        match self {
            Pattern::Static { drives, .. }
            | Pattern::Pulse { drives, .. }
            | Pattern::Sequential { drives, .. } => drives,
        }
    }

    /// How long one drive lasts and how far apart drives start.
    pub fn timing(&self) -> TimingParameters {
        match *self {
            Pattern::Static { duration, .. } => TimingParameters {
                duration,
                soa: duration,
            },
            Pattern::Pulse { pulse, pause, .. } => TimingParameters {
                duration: pulse,
                soa: pulse + pause,
            },
            Pattern::Sequential { on, pause, .. } => TimingParameters {
                duration: on,
                soa: on + pause,
            },
        }
    }

    fn check_times(&self) -> Result<(), ValidationError> {
        let (on, pause) = match *self {
            Pattern::Static { duration, .. } => (("duration", duration), None),
            Pattern::Pulse {
                pulse,
                pause,
                pulses,
                ..
            } => {
                if pulses == 0 {
                    return Err(ValidationError::EmptyPattern);
                }
                (("pulse", pulse), Some(pause))
            }
            Pattern::Sequential { on, pause, .. } => (("on", on), Some(pause)),
        };
        let (name, value) = on;
        if !(value.is_finite() && value > 0.0) {
            return Err(ValidationError::NonPositiveTime { name, value });
        }
        match pause {
            Some(value) if !(value.is_finite() && value >= 0.0) => {
                Err(ValidationError::NegativeTime {
                    name: "pause",
                    value,
                })
            }
            _ => Ok(()),
        }
    }

    /// Every drive, unmerged.
    fn raw_events(&self) -> Vec<ScheduleEvent> {
        let TimingParameters { duration, soa } = self.timing();
        let event = |drive: &PatternDrive, onset_time: f64| ScheduleEvent {
            actuator_id: drive.actuator_id,
            onset_time,
            duration,
            intensity: drive.intensity,
        };

        match self {
            Pattern::Static { drives, .. } => drives.iter().map(|d| event(d, 0.0)).collect(),
            Pattern::Pulse { drives, pulses, .. } => (0..*pulses)
                .flat_map(|n| drives.iter().map(move |d| event(d, n as f64 * soa)))
                .collect(),
            Pattern::Sequential { drives, .. } => drives
                .iter()
                .enumerate()
                .map(|(n, d)| event(d, n as f64 * soa))
                .collect(),
        }
    }
}

impl MotionScheduleBuilder {
    /// Build the schedule for a fixed pattern. Every actuator must be in
    /// the layout and every intensity in range.
    pub fn build_pattern(&self, pattern: &Pattern) -> Result<Schedule, ScheduleError> {
        let drives = pattern.drives();
        if drives.is_empty() {
            return Err(ValidationError::EmptyPattern.into());
        }
        pattern.check_times()?;

        let layout = self.synthesizer().layout();
        for (index, drive) in drives.iter().enumerate() {
            if layout.get(drive.actuator_id).is_none() {
                return Err(ValidationError::UnknownActuator {
                    index,
                    id: drive.actuator_id,
                }
                .into());
            }
            self.synthesizer().check_intensity(drive.intensity)?;
        }

        let schedule = Schedule::from_events(
            pattern.raw_events(),
            pattern.timing(),
            self.config().guard_interval,
        );
        debug!(
            "Built pattern: {} events, ends at {:.3}s",
            schedule.events().len(),
            schedule.total_time()
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Actuator, ActuatorLayout};
    use crate::phantom::{PhantomConfig, PhantomSynthesizer};
    use crate::schedule::ScheduleConfig;
    use crate::soa::SoaTimingModel;

    fn builder() -> MotionScheduleBuilder {
        let layout = ActuatorLayout::new(vec![
            Actuator::new(0, 0.0, 0.0),
            Actuator::new(1, 60.0, 0.0),
            Actuator::new(2, 120.0, 0.0),
        ])
        .unwrap();
        MotionScheduleBuilder::new(
            PhantomSynthesizer::new(layout, PhantomConfig::default()).unwrap(),
            SoaTimingModel::default(),
            ScheduleConfig::default(),
        )
        .unwrap()
    }

    fn drives(ids: &[ActuatorId]) -> Vec<PatternDrive> {
        ids.iter().map(|&id| PatternDrive::new(id, 0.5)).collect()
    }

    fn onsets(schedule: &Schedule, id: ActuatorId) -> Vec<f64> {
        schedule
            .events()
            .iter()
            .filter(|e| e.actuator_id == id)
            .map(|e| e.onset_time)
            .collect()
    }

    #[test]
    fn static_pattern_is_one_block() {
        let pattern = Pattern::Static {
            drives: vec![PatternDrive::new(2, 0.25), PatternDrive::new(0, 1.0)],
            duration: 1.0,
        };
        let schedule = builder().build_pattern(&pattern).unwrap();

        let events: Vec<_> = schedule
            .events()
            .iter()
            .map(|e| (e.actuator_id, e.onset_time, e.duration, e.intensity))
            .collect();
        assert_eq!(events, vec![(0, 0.0, 1.0, 1.0), (2, 0.0, 1.0, 0.25)]);
        assert_eq!(schedule.terminal_stop().actuators, vec![0, 2]);
        assert!((schedule.total_time() - 1.01).abs() < 1e-12);
    }

    #[test]
    fn pulses_repeat_with_pauses() {
        let pattern = Pattern::Pulse {
            drives: drives(&[0, 1]),
            pulse: 0.1,
            pause: 0.1,
            pulses: 5,
        };
        let schedule = builder().build_pattern(&pattern).unwrap();

        assert_eq!(schedule.events().len(), 10);
        let expected = [0.0, 0.2, 0.4, 0.6, 0.8];
        for id in [0, 1] {
            let got = onsets(&schedule, id);
            assert_eq!(got.len(), 5);
            for (g, e) in got.iter().zip(expected) {
                assert!((g - e).abs() < 1e-12);
            }
        }
        // The last pulse ends at 0.9s
        assert!((schedule.total_time() - 0.91).abs() < 1e-12);
        assert_eq!(schedule.timing().soa, 0.2);
    }

    #[test]
    fn pulses_without_pauses_merge() {
        let pattern = Pattern::Pulse {
            drives: drives(&[1]),
            pulse: 0.1,
            pause: 0.0,
            pulses: 3,
        };
        let schedule = builder().build_pattern(&pattern).unwrap();
        assert_eq!(schedule.events().len(), 1);
        assert!((schedule.events()[0].duration - 0.3).abs() < 1e-12);
    }

    #[test]
    fn sequential_takes_turns() {
        let pattern = Pattern::Sequential {
            drives: drives(&[2, 0, 1]),
            on: 0.5,
            pause: 0.1,
        };
        let schedule = builder().build_pattern(&pattern).unwrap();

        let order: Vec<_> = schedule.events().iter().map(|e| e.actuator_id).collect();
        assert_eq!(order, vec![2, 0, 1]);
        assert_eq!(onsets(&schedule, 0), vec![0.6]);
        assert!((onsets(&schedule, 1)[0] - 1.2).abs() < 1e-12);
        for w in schedule.events().windows(2) {
            assert!(w[1].onset_time >= w[0].stop_time());
        }
    }

    #[test]
    fn bad_patterns_are_rejected() {
        let b = builder();
        let cases = [
            Pattern::Static {
                drives: vec![],
                duration: 1.0,
            },
            Pattern::Pulse {
                drives: drives(&[0]),
                pulse: 0.1,
                pause: 0.1,
                pulses: 0,
            },
        ];
        for pattern in &cases {
            assert!(matches!(
                b.build_pattern(pattern),
                Err(ScheduleError::Invalid(ValidationError::EmptyPattern))
            ));
        }

        assert!(matches!(
            b.build_pattern(&Pattern::Sequential {
                drives: drives(&[0, 7]),
                on: 0.1,
                pause: 0.1,
            }),
            Err(ScheduleError::Invalid(ValidationError::UnknownActuator { index: 1, id: 7 }))
        ));
        assert!(matches!(
            b.build_pattern(&Pattern::Static {
                drives: vec![PatternDrive::new(0, 1.5)],
                duration: 1.0,
            }),
            Err(ScheduleError::Invalid(ValidationError::IntensityOutOfRange { .. }))
        ));
        assert!(matches!(
            b.build_pattern(&Pattern::Static {
                drives: drives(&[0]),
                duration: 0.0,
            }),
            Err(ScheduleError::Invalid(ValidationError::NonPositiveTime { name: "duration", .. }))
        ));
        assert!(matches!(
            b.build_pattern(&Pattern::Pulse {
                drives: drives(&[0]),
                pulse: 0.1,
                pause: -0.1,
                pulses: 2,
            }),
            Err(ScheduleError::Invalid(ValidationError::NegativeTime { name: "pause", .. }))
        ));
    }
}
