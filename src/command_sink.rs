//! `CommandSink`
//!
//! The boundary between the scheduling core and whatever actually moves
//! the actuators. The core speaks normalised intensities in seconds; the
//! device speaks 4-bit duty cycles and 3-bit frequency indices. The
//! conversion happens here, in [DeviceMapping], and nowhere else.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SinkError};
use crate::layout::ActuatorId;

/// A single on/off instruction in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    /// Actuator address, `0..=127`
    pub actuator_id: ActuatorId,
    /// Duty cycle, `0..=15`
    pub duty: u8,
    /// Vibration frequency index, `0..=7`
    pub frequency: u8,
    /// `true` to start, `false` to stop
    pub start: bool,
    /// How long the device should wait before executing, in milliseconds
    pub delay_ms: u16,
}

impl DeviceCommand {
    /// A command that turns `actuator_id` off immediately.
    pub fn stop(actuator_id: ActuatorId) -> Self {
        Self {
            actuator_id,
            duty: 0,
            frequency: 0,
            start: false,
            delay_ms: 0,
        }
    }
}

/// Anything that can deliver [DeviceCommand]s to actuators. Expected to be
/// quick; a failed send is reported, never retried here.
pub trait CommandSink {
    /// Deliver one command.
    fn send(&mut self, command: DeviceCommand) -> Result<(), SinkError>;

    /// Deliver several commands at once. The default sends them one by
    /// one and reports the first failure, after trying them all.
    fn send_batch(&mut self, commands: &[DeviceCommand]) -> Result<(), SinkError> {
        let mut first_error = None;
        for &command in commands {
            if let Err(e) = self.send(command) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn send(&mut self, command: DeviceCommand) -> Result<(), SinkError> {
        (**self).send(command)
    }

    fn send_batch(&mut self, commands: &[DeviceCommand]) -> Result<(), SinkError> {
        (**self).send_batch(commands)
    }
}

/// Strongest duty cycle the device understands.
pub const MAX_DUTY: u8 = 15;

/// Highest vibration frequency index the device understands.
pub const MAX_FREQUENCY_INDEX: u8 = 7;

/// How normalised intensities become device units. Check one read from a
/// file with [DeviceMapping::validate] before using it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMapping {
    /// Intensity that maps to `max_duty`
    pub max_intensity: f64,
    /// Strongest duty cycle
    pub max_duty: u8,
    /// Weakest duty cycle that still counts as "on"
    pub min_active_duty: u8,
    /// Frequency index used for every "on" command
    pub frequency_index: u8,
}

impl Default for DeviceMapping {
    fn default() -> Self {
        Self {
            max_intensity: 1.0,
            max_duty: MAX_DUTY,
            min_active_duty: 1,
            frequency_index: 4,
        }
    }
}

impl DeviceMapping {
    /// Check that the mapping only produces commands the device accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_intensity.is_finite() && self.max_intensity > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "max_intensity",
                value: self.max_intensity,
            });
        }
        let ranges = [
            ("max_duty", self.max_duty, MAX_DUTY),
            ("min_active_duty", self.min_active_duty, self.max_duty),
            ("frequency_index", self.frequency_index, MAX_FREQUENCY_INDEX),
        ];
        for (name, value, max) in ranges {
            if value > max {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value: value as f64,
                });
            }
        }
        Ok(())
    }

    /// Duty cycle for an "on" command at `intensity`.
    pub fn duty_for(&self, intensity: f64) -> u8 {
        let scaled = (intensity / self.max_intensity * self.max_duty as f64).round();
        // `as` saturates, and NaN becomes 0 before the clamp
        (scaled as u8).max(self.min_active_duty).min(self.max_duty)
    }

    /// The command that starts `actuator_id` at `intensity`.
    pub fn start(&self, actuator_id: ActuatorId, intensity: f64) -> DeviceCommand {
        DeviceCommand {
            actuator_id,
            duty: self.duty_for(intensity),
            frequency: self.frequency_index,
            start: true,
            delay_ms: 0,
        }
    }

    /// The command that stops `actuator_id`.
    pub fn stop(&self, actuator_id: ActuatorId) -> DeviceCommand {
        DeviceCommand::stop(actuator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakySink {
        sent: Vec<DeviceCommand>,
    }

    impl CommandSink for FlakySink {
        fn send(&mut self, command: DeviceCommand) -> Result<(), SinkError> {
            if command.actuator_id == 2 {
                return Err(SinkError::Injected(2));
            }
            self.sent.push(command);
            Ok(())
        }
    }

    #[test]
    fn duty_mapping() {
        let m = DeviceMapping::default();
        assert_eq!(m.duty_for(1.0), 15);
        assert_eq!(m.duty_for(0.5), 8);
        assert_eq!(m.duty_for(0.0), 1);
        assert_eq!(m.duty_for(3.0), 15);
        assert_eq!(m.duty_for(f64::NAN), 1);
    }

    #[test]
    fn raw_unit_mapping() {
        let m = DeviceMapping {
            max_intensity: 15.0,
            ..DeviceMapping::default()
        };
        assert_eq!(m.duty_for(12.0), 12);
        let cmd = m.start(3, 12.0);
        assert!(cmd.start);
        assert_eq!(cmd.frequency, 4);
        assert_eq!(m.stop(3), DeviceCommand::stop(3));
    }

    #[test]
    fn mapping_validation() {
        assert!(DeviceMapping::default().validate().is_ok());

        let inverted = DeviceMapping {
            min_active_duty: 10,
            max_duty: 5,
            ..DeviceMapping::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidParameter { name: "min_active_duty", .. })
        ));
        // Even unchecked, an inverted range never panics
        assert_eq!(inverted.duty_for(1.0), 5);

        let too_strong = DeviceMapping {
            max_duty: 16,
            ..DeviceMapping::default()
        };
        assert!(matches!(
            too_strong.validate(),
            Err(ConfigError::InvalidParameter { name: "max_duty", .. })
        ));

        let bad_frequency = DeviceMapping {
            frequency_index: 8,
            ..DeviceMapping::default()
        };
        assert!(bad_frequency.validate().is_err());

        for max_intensity in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let m = DeviceMapping {
                max_intensity,
                ..DeviceMapping::default()
            };
            assert!(matches!(
                m.validate(),
                Err(ConfigError::InvalidParameter { name: "max_intensity", .. })
            ));
        }
    }

    #[test]
    fn default_batch_tries_everything() {
        let mut sink = FlakySink { sent: Vec::new() };
        let batch: Vec<_> = (0..4).map(DeviceCommand::stop).collect();
        assert!(matches!(sink.send_batch(&batch), Err(SinkError::Injected(2))));
        assert_eq!(sink.sent.len(), 3);
    }
}
