// Commandline argument parser using clap for HapticBrush

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::layout::{ActuatorId, Point};
use crate::path_parser::Polyline;
use crate::pattern::{Pattern, PatternDrive};
use crate::schedule::{MotionRequest, Pace, TimingRequest};

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct BrushArgs {
    #[command(subcommand, long_about)]
    /// What to do
    pub command: CommandTask,

    /// RON configuration file. Built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Show how a single phantom is split across actuators
    #[command(about)]
    Phantom(PhantomCommand),

    /// Show the duration/SOA pair for a duration or an SOA
    #[command(about)]
    Soa(SoaCommand),

    /// Print the schedule for a motion along a path
    #[command(about)]
    Plan(PlanCommand),

    /// Play a motion along a path on the actuators
    #[command(about)]
    Play(PlayCommand),

    /// Print, or play, a buzz or pulse pattern that stays in place
    #[command(about)]
    Pattern(PatternCommand),

    /// Print the configuration in effect as RON
    #[command(about)]
    Config,
}

/// Exactly one of a pulse duration or an SOA, in seconds.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct TimingArgs {
    /// Pulse duration in seconds, e.g. 0.1
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Stimulus onset asynchrony in seconds, e.g. 0.08
    #[arg(short, long)]
    pub soa: Option<f64>,
}

impl TimingArgs {
    pub fn request(&self) -> TimingRequest {
        match (self.duration, self.soa) {
            (_, Some(soa)) => TimingRequest::Soa(soa),
            (duration, None) => TimingRequest::Duration(duration.unwrap_or_default()),
        }
    }
}

/// Exactly one of a travel time or a speed.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct PaceArgs {
    /// Seconds it takes to travel the whole path
    #[arg(short, long)]
    pub travel_time: Option<f64>,

    /// Travel speed in layout units (mm) per second
    #[arg(long)]
    pub speed: Option<f64>,
}

impl PaceArgs {
    pub fn pace(&self) -> Pace {
        match (self.travel_time, self.speed) {
            (_, Some(speed)) => Pace::Speed(speed),
            (travel_time, None) => Pace::TravelTime(travel_time.unwrap_or_default()),
        }
    }
}

/// Where commands go when playing.
#[derive(Debug, Args, Clone)]
pub struct DeviceArgs {
    /// Serial port of the actuator controller. Without it, a list of ports
    /// to choose from is shown
    #[arg(long)]
    pub port: Option<PathBuf>,

    /// Play into a dummy device instead of real hardware
    #[arg(long, conflicts_with = "port")]
    pub dry_run: bool,

    /// Play without the terminal monitor and wait for the motion to finish
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PhantomCommand {
    /// Where the phantom should be felt, as `x,y`
    #[arg(short, long, allow_hyphen_values = true)]
    pub at: Point,

    /// Perceived intensity, on the configured scale
    #[arg(short, long, default_value_t = 1.0)]
    pub intensity: f64,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct SoaCommand {
    #[command(flatten)]
    pub timing: TimingArgs,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PlanCommand {
    /// Points or actuator ids along the path, e.g. "0,0; 60,0; 120,30"
    /// or "0 90,0 3"
    #[arg(short, long, allow_hyphen_values = true)]
    pub path: Polyline,

    #[command(flatten)]
    pub pace: PaceArgs,

    #[command(flatten)]
    pub timing: TimingArgs,

    /// Perceived intensity, on the configured scale
    #[arg(short, long, default_value_t = 1.0)]
    pub intensity: f64,
}

impl PlanCommand {
    pub fn motion_request(&self) -> MotionRequest {
        MotionRequest {
            path: self.path.0.clone(),
            intensity: self.intensity,
            pace: self.pace.pace(),
            timing: self.timing.request(),
        }
    }
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PlayCommand {
    #[command(flatten)]
    pub plan: PlanCommand,

    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternKind {
    /// All actuators on together for `--on` seconds
    Static,
    /// All actuators pulsing together, `--pulses` times
    Pulse,
    /// One actuator after another
    Sequential,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PatternCommand {
    /// Which pattern
    #[arg(value_enum)]
    pub kind: PatternKind,

    /// Actuator ids, in order, e.g. 0,1,2
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub actuators: Vec<ActuatorId>,

    /// Intensity for every actuator, on the configured scale
    #[arg(short, long, default_value_t = 1.0)]
    pub intensity: f64,

    /// Seconds each drive or pulse lasts
    #[arg(long, default_value_t = 0.1)]
    pub on: f64,

    /// Seconds between pulses, or between one actuator and the next
    #[arg(long, default_value_t = 0.1)]
    pub pause: f64,

    /// Number of pulses
    #[arg(long, default_value_t = 5)]
    pub pulses: usize,

    /// Play the pattern instead of printing it
    #[arg(long)]
    pub play: bool,

    #[command(flatten)]
    pub device: DeviceArgs,
}

impl PatternCommand {
    pub fn pattern(&self) -> Pattern {
        let drives = self
            .actuators
            .iter()
            .map(|&id| PatternDrive::new(id, self.intensity))
            .collect();
        match self.kind {
            PatternKind::Static => Pattern::Static {
                drives,
                duration: self.on,
            },
            PatternKind::Pulse => Pattern::Pulse {
                drives,
                pulse: self.on,
                pause: self.pause,
                pulses: self.pulses,
            },
            PatternKind::Sequential => Pattern::Sequential {
                drives,
                on: self.on,
                pause: self.pause,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Waypoint;

    #[test]
    fn plan_arguments() {
        let args = BrushArgs::try_parse_from([
            "hapticbrush",
            "plan",
            "--path",
            "0,0; 180,0",
            "--travel-time",
            "0.6",
            "--duration",
            "0.1",
        ])
        .unwrap();

        let CommandTask::Plan(plan) = args.command else {
            panic!("parsed the wrong subcommand");
        };
        let request = plan.motion_request();
        assert_eq!(
            request.path,
            vec![
                Waypoint::Point(Point::new(0.0, 0.0)),
                Waypoint::Point(Point::new(180.0, 0.0))
            ]
        );
        assert_eq!(request.pace, Pace::TravelTime(0.6));
        assert_eq!(request.timing, TimingRequest::Duration(0.1));
        assert_eq!(request.intensity, 1.0);
    }

    #[test]
    fn timing_is_one_or_the_other() {
        assert!(BrushArgs::try_parse_from(["hapticbrush", "soa"]).is_err());
        assert!(BrushArgs::try_parse_from(["hapticbrush", "soa", "-d", "0.1", "-s", "0.08"]).is_err());

        let args = BrushArgs::try_parse_from(["hapticbrush", "soa", "--soa", "0.08"]).unwrap();
        let CommandTask::Soa(soa) = args.command else {
            panic!("parsed the wrong subcommand");
        };
        assert_eq!(soa.timing.request(), TimingRequest::Soa(0.08));
    }

    #[test]
    fn play_arguments() {
        let args = BrushArgs::try_parse_from([
            "hapticbrush",
            "play",
            "-p",
            "0,0 60,0",
            "-t",
            "0.3",
            "-d",
            "0.06",
            "--dry-run",
            "--config",
            "brush.ron",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("brush.ron")));
        let CommandTask::Play(play) = args.command else {
            panic!("parsed the wrong subcommand");
        };
        assert!(play.device.dry_run);
        assert!(!play.device.headless);

        assert!(BrushArgs::try_parse_from([
            "hapticbrush", "play", "-p", "0,0", "-t", "1", "-d", "0.1", "--dry-run", "--port", "/dev/ttyUSB0",
        ])
        .is_err());
    }

    #[test]
    fn bad_points_are_rejected() {
        assert!(BrushArgs::try_parse_from(["hapticbrush", "phantom", "--at", "30"]).is_err());
        assert!(BrushArgs::try_parse_from(["hapticbrush", "phantom", "--at", "30,0"]).is_ok());
    }

    #[test]
    fn travel_time_or_speed() {
        let args = BrushArgs::try_parse_from([
            "hapticbrush", "plan", "-p", "0 3", "--speed", "120", "-d", "0.1",
        ])
        .unwrap();
        let CommandTask::Plan(plan) = args.command else {
            panic!("parsed the wrong subcommand");
        };
        let request = plan.motion_request();
        assert_eq!(request.pace, Pace::Speed(120.0));
        assert_eq!(request.path, vec![Waypoint::Actuator(0), Waypoint::Actuator(3)]);

        assert!(BrushArgs::try_parse_from([
            "hapticbrush", "plan", "-p", "0 3", "--speed", "120", "-t", "1", "-d", "0.1",
        ])
        .is_err());
        assert!(BrushArgs::try_parse_from(["hapticbrush", "plan", "-p", "0 3", "-d", "0.1"]).is_err());
    }

    #[test]
    fn pattern_arguments() {
        let args = BrushArgs::try_parse_from([
            "hapticbrush", "pattern", "pulse", "-a", "2,0,1", "--on", "0.05", "--pulses", "3",
        ])
        .unwrap();
        let CommandTask::Pattern(cmd) = args.command else {
            panic!("parsed the wrong subcommand");
        };
        assert!(!cmd.play);
        assert_eq!(
            cmd.pattern(),
            Pattern::Pulse {
                drives: vec![
                    PatternDrive::new(2, 1.0),
                    PatternDrive::new(0, 1.0),
                    PatternDrive::new(1, 1.0)
                ],
                pulse: 0.05,
                pause: 0.1,
                pulses: 3,
            }
        );

        assert!(BrushArgs::try_parse_from(["hapticbrush", "pattern", "static"]).is_err());
        assert!(BrushArgs::try_parse_from(["hapticbrush", "pattern", "wobble", "-a", "0"]).is_err());
    }
}
