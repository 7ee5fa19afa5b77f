//! Command line front end: inspect phantoms and SOA timing, plan motions,
//! and play them on an actuator controller.

use clap::Parser;
use hapticbrush::{
    args::{BrushArgs, CommandTask, DeviceArgs},
    command_sink::CommandSink,
    config::BrushConfig,
    dummy_sink::DummySink,
    error::BrushError,
    gui::{playback_monitor, port_selector, PortChoice, SelectorInfo},
    phantom::PhantomRequest,
    playback::{play, PlaybackReport},
    schedule::Schedule,
    serial_sink::{available_ports, SerialSink},
};

use log::{info, warn};

// Example:
// cargo run -- plan --path "0,0; 180,0" --travel-time 0.6 --duration 0.1
// cargo run -- play --path "0,0; 180,0" --travel-time 0.6 --soa 0.08 --dry-run
// cargo run -- --config brush.ron phantom --at 30,0 --intensity 0.8
// cargo run -- play --path "0 3" --speed 200 --duration 0.07 --dry-run --headless
// cargo run -- pattern pulse --actuators 0,1 --on 0.1 --pause 0.1 --pulses 5

fn main() -> Result<(), BrushError> {
    env_logger::init();
    let args = BrushArgs::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            BrushConfig::from_path(path)?
        }
        None => BrushConfig::default(),
    };

    match args.command {
        CommandTask::Phantom(cmd) => {
            let engine = config.engine()?;
            let result = engine.synthesizer().synthesize(&PhantomRequest {
                virtual_position: cmd.at,
                desired_intensity: cmd.intensity,
            })?;
            println!("{:?} phantom at {}", result.kind, cmd.at);
            for c in &result.contributions {
                println!("\tactuator {:>3}  intensity {:.4}", c.actuator_id, c.intensity);
            }
            println!("perceived intensity {:.4}", result.perceived_intensity());
        }

        CommandTask::Soa(cmd) => {
            let engine = config.engine()?;
            let (timing, validation) = engine.timing_for(cmd.timing.request())?;
            println!("duration {:.4}s  soa {:.4}s", timing.duration, timing.soa);
            println!(
                "overlap {:.4}s ({})",
                validation.overlap_seconds,
                if validation.is_continuous { "continuous" } else { "discrete" }
            );
            for warning in &validation.warnings {
                println!("warning: {}", warning);
            }
        }

        CommandTask::Plan(cmd) => {
            let schedule = config.engine()?.build_schedule(&cmd.motion_request())?;
            print_schedule(&schedule);
        }

        CommandTask::Play(cmd) => {
            let schedule = config.engine()?.build_schedule(&cmd.plan.motion_request())?;
            for (i, error) in schedule.skipped_samples() {
                warn!("Sample {} left out: {}", i, error);
            }
            if let Some(report) = play_schedule(schedule, &config, &cmd.device)? {
                print_report(&report);
            }
        }

        CommandTask::Pattern(cmd) => {
            let schedule = config.engine()?.build_pattern(&cmd.pattern())?;
            if !cmd.play {
                print_schedule(&schedule);
            } else if let Some(report) = play_schedule(schedule, &config, &cmd.device)? {
                print_report(&report);
            }
        }

        CommandTask::Config => println!("{}", config.to_ron_string()?),
    }

    Ok(())
}

/// Returns `None` if the user backed out of choosing a port.
fn play_schedule(
    schedule: Schedule,
    config: &BrushConfig,
    device: &DeviceArgs,
) -> Result<Option<PlaybackReport>, BrushError> {
    let options = config.playback_options()?;

    let choice = match (&device.port, device.dry_run) {
        (_, true) => PortChoice::DryRun,
        (Some(port), false) => PortChoice::Port(port.clone()),
        (None, false) => port_selector(
            available_ports()?,
            SelectorInfo {
                baud_rate: config.device.baud_rate,
                actuators: config.layout.len(),
                total_time: schedule.total_time(),
            },
        )?,
    };
    let sink: Box<dyn CommandSink + Send> = match choice {
        PortChoice::Port(port) => Box::new(SerialSink::open(port, config.device.baud_rate)?),
        PortChoice::DryRun => {
            info!("Dry run, nothing is sent to hardware");
            Box::new(DummySink::builder().build())
        }
        PortChoice::Quit => {
            println!("No port selected");
            return Ok(None);
        }
    };

    let handle = play(schedule, sink, options);
    let report = if device.headless {
        handle.wait()
    } else {
        playback_monitor(handle)?
    };
    Ok(Some(report))
}

fn print_schedule(schedule: &Schedule) {
    let timing = schedule.timing();
    println!(
        "duration {:.4}s  soa {:.4}s  {} events",
        timing.duration,
        timing.soa,
        schedule.events().len()
    );
    for e in schedule.events() {
        println!(
            "\t{:>8.4}s  actuator {:>3}  for {:.4}s  intensity {:.4}",
            e.onset_time, e.actuator_id, e.duration, e.intensity
        );
    }
    let stop = schedule.terminal_stop();
    println!("\t{:>8.4}s  stop {:?}", stop.at, stop.actuators);
    for (i, error) in schedule.skipped_samples() {
        println!("skipped sample {}: {}", i, error);
    }
}

fn print_report(report: &PlaybackReport) {
    println!(
        "{:?}: {} commands sent, {} failed, {} stop-all broadcasts",
        report.status,
        report.commands_sent,
        report.failures.len(),
        report.stop_all_broadcasts
    );
    if !report.active_at_exit.is_empty() {
        println!("stopped while active: {:?}", report.active_at_exit);
    }
    if !report.active_after_stop.is_empty() {
        warn!("Still tracked as on after stopping: {:?}", report.active_after_stop);
    }
    for f in &report.failures {
        let target = match f.actuator_id {
            Some(id) => format!("actuator {}", id),
            None => "broadcast".to_owned(),
        };
        println!("\t{:>8.4}s  {:?} {} failed: {}", f.at, f.kind, target, f.error);
    }
}
