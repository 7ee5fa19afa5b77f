//! Turning a path into a timed list of actuator drives.
//!
//! The [MotionScheduleBuilder] samples the path, renders a phantom at every
//! sample, and lays the resulting drives out one SOA (or one pulse, if
//! that is longer) apart. Drives of the same actuator that touch or
//! overlap are merged into one continuous drive, so an actuator that
//! carries the phantom across several samples is never flickered off and
//! on again. Every schedule ends with a stop for every actuator it uses.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

use crate::error::{ConfigError, ScheduleError, SynthesisError, ValidationError};
use crate::layout::{ActuatorId, Point};
use crate::phantom::{PhantomRequest, PhantomSynthesizer};
use crate::soa::{SoaTimingModel, TimingParameters, TimingValidation};
use crate::trajectory::{path_length, validate_path, TrajectorySampler};

/// One actuator driven at a constant intensity for a while.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleEvent {
    /// Which actuator
    pub actuator_id: ActuatorId,
    /// Seconds from the start of playback
    pub onset_time: f64,
    /// How long to drive it, in seconds
    pub duration: f64,
    /// How hard to drive it
    pub intensity: f64,
}

impl ScheduleEvent {
    /// When the drive ends.
    pub fn stop_time(&self) -> f64 {
        self.onset_time + self.duration
    }
}

/// The final "everything off" at the end of every schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalStop {
    /// When to send it, a guard interval after the last drive ends
    pub at: f64,
    /// Every actuator the schedule turns on, ascending
    pub actuators: Vec<ActuatorId>,
}

/// An ordered, merged list of drives plus the terminal stop. Built once per
/// play request and handed to playback as an immutable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    events: Vec<ScheduleEvent>,
    terminal_stop: TerminalStop,
    timing: TimingParameters,
    skipped: Vec<(usize, SynthesisError)>,
}

impl Schedule {
    /// Drives sorted by `(onset_time, actuator_id)`.
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    /// The stop that closes the schedule.
    pub fn terminal_stop(&self) -> &TerminalStop {
        &self.terminal_stop
    }

    /// The duration/SOA pair the schedule was built with.
    pub fn timing(&self) -> TimingParameters {
        self.timing
    }

    /// Samples that were skipped, and why.
    pub fn skipped_samples(&self) -> &[(usize, SynthesisError)] {
        &self.skipped
    }

    /// Time of the terminal stop, i.e. how long playback takes.
    pub fn total_time(&self) -> f64 {
        self.terminal_stop.at
    }

    /// Whether no actuator is ever driven.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What to do when a sample cannot be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log it, leave the sample out, and keep going
    #[default]
    SkipInvalid,
    /// Stop and return what was built so far with the error
    AbortOnFirst,
}

/// Tuning for the [MotionScheduleBuilder].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fixed sampling interval in seconds; the pulse duration when `None`
    pub sampling_interval: Option<f64>,
    /// See [FailurePolicy]
    pub failure_policy: FailurePolicy,
    /// Delay between the last drive ending and the terminal stop, seconds
    pub guard_interval: f64,
    /// Contributions at or below this intensity are left out
    pub min_intensity: f64,
}

impl ScheduleConfig {
    /// Reject intervals and thresholds that are NaN, infinite, or negative,
    /// and a sampling interval that is not positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("guard_interval", self.guard_interval),
            ("min_intensity", self.min_intensity),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        if let Some(value) = self.sampling_interval {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "sampling_interval",
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sampling_interval: None,
            failure_policy: FailurePolicy::SkipInvalid,
            guard_interval: 0.010,
            min_intensity: 1e-6,
        }
    }
}

/// How the caller pins down the timing of a motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingRequest {
    /// Pulse duration in seconds; the SOA follows from it
    Duration(f64),
    /// SOA in seconds; the duration follows from it
    Soa(f64),
}

/// How fast the phantom travels along the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pace {
    /// The whole stroke takes this many seconds
    TravelTime(f64),
    /// The phantom moves this many layout units (mm) per second
    Speed(f64),
}

/// One vertex of a path: an actuator's position, or any point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waypoint {
    /// Wherever this actuator sits
    Actuator(ActuatorId),
    /// A position in layout coordinates
    Point(Point),
}

impl From<Point> for Waypoint {
    fn from(value: Point) -> Self {
        Self::Point(value)
    }
}

impl From<ActuatorId> for Waypoint {
    fn from(value: ActuatorId) -> Self {
        Self::Actuator(value)
    }
}

/// Everything needed to build one schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Ordered polyline the phantom should travel along
    pub path: Vec<Waypoint>,
    /// Intensity the phantom should be felt at
    pub intensity: f64,
    /// How long the stroke takes
    pub pace: Pace,
    /// Pulse timing
    pub timing: TimingRequest,
}

/// Builds [Schedule]s. Owns its synthesizer and timing model; construct
/// one and keep it for as long as the layout stays the same.
#[derive(Debug, Clone)]
pub struct MotionScheduleBuilder {
    synthesizer: PhantomSynthesizer,
    timing: SoaTimingModel,
    config: ScheduleConfig,
}

impl MotionScheduleBuilder {
    /// Compose a builder from its parts, rejecting an unusable
    /// [ScheduleConfig].
    pub fn new(
        synthesizer: PhantomSynthesizer,
        timing: SoaTimingModel,
        config: ScheduleConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            synthesizer,
            timing,
            config,
        })
    }

    /// The phantom synthesizer in use.
    pub fn synthesizer(&self) -> &PhantomSynthesizer {
        &self.synthesizer
    }

    /// The timing model in use.
    pub fn timing_model(&self) -> &SoaTimingModel {
        &self.timing
    }

    /// The schedule configuration in use.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Replace every [Waypoint::Actuator] with that actuator's position.
    pub fn resolve_path(&self, path: &[Waypoint]) -> Result<Vec<Point>, ValidationError> {
        let layout = self.synthesizer.layout();
        path.iter()
            .enumerate()
            .map(|(index, waypoint)| match *waypoint {
                Waypoint::Point(p) => Ok(p),
                Waypoint::Actuator(id) => layout
                    .get(id)
                    .map(|a| a.position)
                    .ok_or(ValidationError::UnknownActuator { index, id }),
            })
            .collect()
    }

    /// Resolve a [TimingRequest] to a duration/SOA pair, logging any
    /// validation warnings.
    pub fn timing_for(
        &self,
        request: TimingRequest,
    ) -> Result<(TimingParameters, TimingValidation), ValidationError> {
        let params = match request {
            TimingRequest::Duration(d) => self.timing.for_duration(d)?,
            TimingRequest::Soa(s) => self.timing.for_soa(s)?,
        };
        let validation = self.timing.validate(params.duration, params.soa);
        for w in &validation.warnings {
            warn!("{}", w);
        }
        Ok((params, validation))
    }

    /// Build the schedule for a motion request.
    pub fn build_schedule(&self, request: &MotionRequest) -> Result<Schedule, ScheduleError> {
        self.synthesizer.check_intensity(request.intensity)?;
        let mut path = self.resolve_path(&request.path)?;
        validate_path(&path)?;

        let (timing, _) = self.timing_for(request.timing)?;
        let travel_time = match request.pace {
            Pace::TravelTime(t) => t,
            Pace::Speed(speed) => {
                if !(speed.is_finite() && speed > 0.0) {
                    return Err(ValidationError::NonPositiveSpeed(speed).into());
                }
                let length = path_length(&path);
                if length > 0.0 {
                    length / speed
                } else {
                    // Going nowhere at any speed is a single pulse
                    path.truncate(1);
                    timing.duration
                }
            }
        };
        let interval = self.config.sampling_interval.unwrap_or(timing.duration);
        let sampler = TrajectorySampler::new(interval)?;
        let samples = sampler.sample(&path, travel_time)?;

        // Consecutive onsets are at least this far apart, so an actuator is
        // never re-triggered before its previous pulse has ended.
        let step = timing.soa.max(timing.duration);

        let mut raw = Vec::new();
        let mut skipped = Vec::new();
        let mut onset: Option<f64> = None;

        for (i, sample) in samples.iter().enumerate() {
            let current = match onset {
                None => sample.time_offset,
                Some(previous) => sample.time_offset.max(previous + step),
            };
            onset = Some(current);

            let phantom = PhantomRequest {
                virtual_position: sample.position,
                desired_intensity: request.intensity,
            };
            match self.synthesizer.synthesize(&phantom) {
                Ok(result) => raw.extend(
                    result
                        .contributions
                        .iter()
                        .filter(|c| c.intensity > self.config.min_intensity)
                        .map(|c| ScheduleEvent {
                            actuator_id: c.actuator_id,
                            onset_time: current,
                            duration: timing.duration,
                            intensity: c.intensity,
                        }),
                ),
                Err(error) => match self.config.failure_policy {
                    FailurePolicy::SkipInvalid => {
                        warn!("Skipping sample {} at {}: {}", i, sample.position, error);
                        skipped.push((i, error));
                    }
                    FailurePolicy::AbortOnFirst => {
                        let partial = self.finish(raw, timing, skipped);
                        return Err(ScheduleError::Aborted {
                            partial: Box::new(partial),
                            sample_index: i,
                            source: error,
                        });
                    }
                },
            }
        }

        let schedule = self.finish(raw, timing, skipped);
        debug!(
            "Built schedule: {} samples, {} events, ends at {:.3}s",
            samples.len(),
            schedule.events.len(),
            schedule.total_time()
        );
        Ok(schedule)
    }

    fn finish(
        &self,
        raw: Vec<ScheduleEvent>,
        timing: TimingParameters,
        skipped: Vec<(usize, SynthesisError)>,
    ) -> Schedule {
        Schedule {
            skipped,
            ..Schedule::from_events(raw, timing, self.config.guard_interval)
        }
    }
}

impl Schedule {
    /// Build a schedule from hand-placed drives. They are merged and sorted
    /// like built ones, and the terminal stop lands `guard_interval` after
    /// the last drive ends. A negative or NaN guard counts as zero.
    pub fn from_events(raw: Vec<ScheduleEvent>, timing: TimingParameters, guard_interval: f64) -> Self {
        let events = merge_events(raw);
        let last_stop = events
            .iter()
            .map(ScheduleEvent::stop_time)
            .fold(0.0, f64::max);
        let mut actuators: Vec<ActuatorId> = events.iter().map(|e| e.actuator_id).collect();
        actuators.sort_unstable();
        actuators.dedup();

        Schedule {
            events,
            terminal_stop: TerminalStop {
                at: last_stop + guard_interval.max(0.0),
                actuators,
            },
            timing,
            skipped: Vec::new(),
        }
    }
}

/// Onsets this close to the previous stop count as touching it.
const MERGE_TOLERANCE: f64 = 1e-9;

/// Merge drives of the same actuator that overlap or touch into a single
/// drive at the strongest of their intensities, then sort everything by
/// `(onset_time, actuator_id)`.
pub fn merge_events(raw: Vec<ScheduleEvent>) -> Vec<ScheduleEvent> {
    let mut per_actuator: BTreeMap<ActuatorId, Vec<ScheduleEvent>> = BTreeMap::new();
    for event in raw {
        per_actuator.entry(event.actuator_id).or_default().push(event);
    }

    let mut merged: Vec<ScheduleEvent> = Vec::new();
    for (_, mut events) in per_actuator {
        events.sort_by(|l, r| {
            l.onset_time
                .partial_cmp(&r.onset_time)
                .unwrap_or(Ordering::Equal)
        });

        let mut current: Option<ScheduleEvent> = None;
        for event in events {
            current = Some(match current {
                Some(mut open) if event.onset_time <= open.stop_time() + MERGE_TOLERANCE => {
                    let stop = open.stop_time().max(event.stop_time());
                    open.duration = stop - open.onset_time;
                    open.intensity = open.intensity.max(event.intensity);
                    open
                }
                Some(closed) => {
                    merged.push(closed);
                    event
                }
                None => event,
            });
        }
        merged.extend(current);
    }

    merged.sort_by(|l, r| {
        l.onset_time
            .partial_cmp(&r.onset_time)
            .unwrap_or(Ordering::Equal)
            .then(l.actuator_id.cmp(&r.actuator_id))
    });
    merged
}
