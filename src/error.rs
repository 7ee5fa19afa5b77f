//! The error families used throughout the crate. Each one is a plain enum
//! with a hand-written [Display](std::fmt::Display), so that a failure
//! always says whether it came from bad configuration, a bad request, the
//! phantom synthesis policy, or the device transport.

use std::{borrow::Cow, fmt, io};

use crate::gui::BrushGuiError;
use crate::layout::{ActuatorId, Point};
use crate::schedule::Schedule;

/// Returned when a layout, timing model, or configuration file is unusable.
/// These are fatal at construction time.
#[derive(Debug)]
pub enum ConfigError {
    /// Two actuators in the layout were given the same id.
    DuplicateActuatorId(ActuatorId),

    /// A component that needs at least one actuator was given none.
    EmptyLayout,

    /// An actuator was placed at a NaN or infinite coordinate.
    NonFinitePosition(ActuatorId),

    /// The SOA slope/base constants or the duration range are unusable.
    InvalidTiming(String),

    /// A tolerance, interval, or intensity limit was zero, negative, or NaN.
    InvalidParameter {
        /// Name of the offending parameter
        name: &'static str,
        /// The value we were given
        value: f64,
    },

    /// Returned when io fails while reading a configuration file.
    IoError(io::Error),

    /// Returned when serialization of the configuration fails.
    RonError(ron::Error),

    /// Returned when deserialization of the configuration fails.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::DuplicateActuatorId(id) => Cow::from(format!("duplicate actuator id {}", id)),
            CE::EmptyLayout => Cow::from("actuator layout is empty"),
            CE::NonFinitePosition(id) => {
                Cow::from(format!("actuator {} has a non-finite position", id))
            }
            CE::InvalidTiming(why) => Cow::from(format!("invalid timing constants: {}", why)),
            CE::InvalidParameter { name, value } => {
                Cow::from(format!("invalid value {} for {}", value, name))
            }
            CE::IoError(error) => Cow::from(format!("io error: {}", error)),
            CE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            CE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

/// Returned by geometric queries on a layout that has no actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyLayoutError;

impl fmt::Display for EmptyLayoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "query on an empty actuator layout")
    }
}

impl std::error::Error for EmptyLayoutError {}

/// A request was rejected at the API boundary before any computation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The requested intensity is NaN or outside `[0, max]`.
    IntensityOutOfRange {
        /// What was asked for
        value: f64,
        /// The configured ceiling
        max: f64,
    },

    /// A trajectory point has a NaN or infinite coordinate.
    NonFiniteCoordinate {
        /// Index of the point in the trajectory
        index: usize,
    },

    /// A trajectory point has a negative coordinate.
    NegativeCoordinate {
        /// Index of the point in the trajectory
        index: usize,
    },

    /// The trajectory does not have enough points to sample.
    InsufficientPoints(usize),

    /// A duration, SOA, or travel time was zero, negative, or NaN.
    NonPositiveTime {
        /// Which quantity was wrong
        name: &'static str,
        /// The value we were given
        value: f64,
    },

    /// A pause between drives was negative or NaN.
    NegativeTime {
        /// Which quantity was wrong
        name: &'static str,
        /// The value we were given
        value: f64,
    },

    /// A travel speed was zero, negative, or NaN.
    NonPositiveSpeed(f64),

    /// A path or pattern names an actuator the layout does not have.
    UnknownActuator {
        /// Position in the path or pattern
        index: usize,
        /// The id that was not found
        id: ActuatorId,
    },

    /// A pattern would drive nothing: no actuators, or no pulses.
    EmptyPattern,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ValidationError as VE;
        match self {
            VE::IntensityOutOfRange { value, max } => {
                write!(f, "intensity {} is outside [0, {}]", value, max)
            }
            VE::NonFiniteCoordinate { index } => {
                write!(f, "trajectory point {} is not finite", index)
            }
            VE::NegativeCoordinate { index } => {
                write!(f, "trajectory point {} has a negative coordinate", index)
            }
            VE::InsufficientPoints(n) => {
                write!(f, "trajectory needs at least one point, got {}", n)
            }
            VE::NonPositiveTime { name, value } => {
                write!(f, "{} must be positive, got {}", name, value)
            }
            VE::NegativeTime { name, value } => {
                write!(f, "{} must not be negative, got {}", name, value)
            }
            VE::NonPositiveSpeed(speed) => write!(f, "speed must be positive, got {}", speed),
            VE::UnknownActuator { index, id } => {
                write!(f, "entry {} names actuator {}, which is not in the layout", index, id)
            }
            VE::EmptyPattern => write!(f, "pattern drives no actuators"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A phantom could not be rendered at the requested position.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// The request itself was malformed.
    Invalid(ValidationError),

    /// The layout has no actuators to render with.
    EmptyLayout,

    /// Strict triangle containment is on and no actuator triangle contains
    /// the position.
    OutsideTriangles(Point),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SynthesisError::Invalid(error) => write!(f, "invalid phantom request: {}", error),
            SynthesisError::EmptyLayout => write!(f, "no actuators to render a phantom with"),
            SynthesisError::OutsideTriangles(p) => {
                write!(f, "{} lies outside every actuator triangle", p)
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<ValidationError> for SynthesisError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<EmptyLayoutError> for SynthesisError {
    fn from(_: EmptyLayoutError) -> Self {
        Self::EmptyLayout
    }
}

/// Building a motion schedule failed.
#[derive(Debug)]
pub enum ScheduleError {
    /// The timing or sampling parameters could not be constructed.
    Config(ConfigError),

    /// The motion request was rejected before any sample was synthesized.
    Invalid(ValidationError),

    /// Synthesis failed and the builder is configured to abort. Carries the
    /// schedule built from every sample before the failing one.
    Aborted {
        /// What was built before the failure, already merged and terminated
        partial: Box<Schedule>,
        /// Index of the sample that failed
        sample_index: usize,
        /// Why it failed
        source: SynthesisError,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScheduleError::Config(error) => write!(f, "bad configuration: {}", error),
            ScheduleError::Invalid(error) => write!(f, "bad request: {}", error),
            ScheduleError::Aborted {
                sample_index,
                source,
                ..
            } => write!(
                f,
                "synthesis policy violation at sample {}: {}",
                sample_index, source
            ),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<ConfigError> for ScheduleError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ValidationError> for ScheduleError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// The downstream command transport could not deliver a command. Never
/// fatal to playback.
#[derive(Debug)]
pub enum SinkError {
    /// A field of a command does not fit the wire format.
    CommandOutOfRange {
        /// Name of the field
        field: &'static str,
        /// The value we were given
        value: u32,
    },

    /// More commands than fit in a single frame.
    BatchTooLarge(usize),

    /// A frame could not be decoded.
    MalformedFrame(String),

    /// Returned when writing to the port fails.
    IoError(io::Error),

    /// A failure injected by a test or dry-run sink.
    Injected(ActuatorId),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SinkError as SE;
        let msg = match self {
            SE::CommandOutOfRange { field, value } => {
                Cow::from(format!("{} {} does not fit the wire format", field, value))
            }
            SE::BatchTooLarge(n) => Cow::from(format!("{} commands do not fit in one frame", n)),
            SE::MalformedFrame(why) => Cow::from(format!("malformed frame: {}", why)),
            SE::IoError(error) => Cow::from(format!("io error: {}", error)),
            SE::Injected(id) => Cow::from(format!("injected failure for actuator {}", id)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SinkError {}

impl From<io::Error> for SinkError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// Top-level error for the command line tool.
#[derive(Debug)]
pub enum BrushError {
    /// See [ConfigError]
    Config(ConfigError),
    /// See [ValidationError]
    Validation(ValidationError),
    /// See [SynthesisError]
    Synthesis(SynthesisError),
    /// See [ScheduleError]
    Schedule(ScheduleError),
    /// See [SinkError]
    Sink(SinkError),
    /// See [BrushGuiError]
    Gui(BrushGuiError),
}

impl fmt::Display for BrushError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BrushError::Config(e) => write!(f, "{}", e),
            BrushError::Validation(e) => write!(f, "{}", e),
            BrushError::Synthesis(e) => write!(f, "{}", e),
            BrushError::Schedule(e) => write!(f, "{}", e),
            BrushError::Sink(e) => write!(f, "{}", e),
            BrushError::Gui(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BrushError {}

impl From<ConfigError> for BrushError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ValidationError> for BrushError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SynthesisError> for BrushError {
    fn from(value: SynthesisError) -> Self {
        Self::Synthesis(value)
    }
}

impl From<ScheduleError> for BrushError {
    fn from(value: ScheduleError) -> Self {
        Self::Schedule(value)
    }
}

impl From<SinkError> for BrushError {
    fn from(value: SinkError) -> Self {
        Self::Sink(value)
    }
}

impl From<BrushGuiError> for BrushError {
    fn from(value: BrushGuiError) -> Self {
        Self::Gui(value)
    }
}
