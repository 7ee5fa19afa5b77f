//! Real-time playback of a [Schedule].
//!
//! [play] moves the schedule and a [CommandSink] onto a dedicated thread,
//! which walks the schedule against a monotonic clock. It starts drives
//! when their onset arrives and stops them when they end. Between deadlines
//! it sleeps, never for longer than one tick.
//!
//! Whatever happens, playback ends with a stop for every actuator that was
//! ever turned on. Cancelling with [PlaybackHandle::stop] sends those stops
//! right away, it never just abandons the loop. A failed send is logged and
//! recorded in the [PlaybackReport], and playback carries on.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        mpsc::{self, TryRecvError},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crate::command_sink::{CommandSink, DeviceMapping};
use crate::error::{ConfigError, SinkError};
use crate::layout::ActuatorId;
use crate::schedule::{Schedule, ScheduleEvent};

/// Timing knobs for the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Longest the loop sleeps between checks, in seconds
    pub tick: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { tick: 0.001 }
    }
}

impl PlaybackConfig {
    /// The tick has to be a positive number of seconds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_finite() && self.tick > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidParameter {
                name: "tick",
                value: self.tick,
            })
        }
    }
}

/// Everything [play] needs besides the schedule and the sink.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackOptions {
    /// Loop timing
    pub config: PlaybackConfig,
    /// How intensities become device commands
    pub mapping: DeviceMapping,
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Ran to the end and every command went through
    Completed,
    /// Ran to the end, but some commands failed
    Degraded,
    /// Stopped early by [PlaybackHandle::stop]
    Cancelled,
}

/// Which kind of command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Turning an actuator on
    Start,
    /// Turning an actuator off
    Stop,
    /// The final broadcast stop
    StopAll,
}

/// One command that the sink could not deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct SendFailure {
    /// Target actuator, or `None` for a broadcast
    pub actuator_id: Option<ActuatorId>,
    /// Seconds into playback
    pub at: f64,
    /// What we were trying to do
    pub kind: CommandKind,
    /// Why it failed
    pub error: String,
}

/// Summary handed back when playback ends.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    /// How it ended
    pub status: PlaybackStatus,
    /// Commands the sink accepted
    pub commands_sent: usize,
    /// Commands the sink rejected
    pub failures: Vec<SendFailure>,
    /// How many stop-all broadcasts were sent
    pub stop_all_broadcasts: usize,
    /// Actuators still on when the loop ended, which the final sweep
    /// turned off
    pub active_at_exit: Vec<ActuatorId>,
    /// Actuators still on after the final sweep. Always empty
    pub active_after_stop: Vec<ActuatorId>,
}

/// A live view of a running playback, for progress displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackProgress {
    /// Seconds since playback started
    pub elapsed: f64,
    /// Seconds the whole schedule takes
    pub total_time: f64,
    /// Actuators currently on, ascending
    pub active: Vec<ActuatorId>,
    /// Commands the sink accepted so far
    pub commands_sent: usize,
    /// Commands the sink rejected so far
    pub failures: usize,
    /// Whether the playback thread has finished
    pub finished: bool,
}

enum Signal {
    Stop,
}

/// Owner of a running playback. Dropping it cancels the playback the same
/// way [PlaybackHandle::stop] does.
pub struct PlaybackHandle {
    handle: Option<thread::JoinHandle<PlaybackReport>>,
    tx: mpsc::Sender<Signal>,
    progress: Arc<Mutex<PlaybackProgress>>,
}

/// Start playing `schedule` on `sink` in a new thread.
pub fn play<S>(schedule: Schedule, sink: S, options: PlaybackOptions) -> PlaybackHandle
where
    S: CommandSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Signal>();
    let progress = Arc::new(Mutex::new(PlaybackProgress {
        total_time: schedule.total_time(),
        ..PlaybackProgress::default()
    }));
    let th_progress = Arc::clone(&progress);

    let handle = thread::spawn(move || {
        let mut player = Player::new(sink, options.mapping);
        let report = player.run(&schedule, options.config, &rx, &th_progress);
        th_progress.lock().unwrap().finished = true;
        report
    });

    PlaybackHandle {
        handle: Some(handle),
        tx,
        progress,
    }
}

impl PlaybackHandle {
    /// Cancel playback. Every active actuator is turned off, followed by a
    /// stop for every actuator that was ever turned on.
    pub fn stop(mut self) -> PlaybackReport {
        // The thread may already have finished and dropped its receiver
        let _ = self.tx.send(Signal::Stop);
        self.join()
    }

    /// Block until playback finishes on its own.
    pub fn wait(mut self) -> PlaybackReport {
        self.join()
    }

    /// Whether the playback thread has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Where playback is right now.
    pub fn progress(&self) -> PlaybackProgress {
        self.progress.lock().unwrap().clone()
    }

    fn join(&mut self) -> PlaybackReport {
        // Same `Option` and `.take()` dance as any owned `JoinHandle`: joining
        // consumes it, so it has to be moved out of the struct first.
        match self.handle.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => unreachable!("playback joined twice"),
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.handle.take() {
            let _ = self.tx.send(Signal::Stop);
            let _ = thread.join();
        }
    }
}

/// The state owned by the playback thread.
struct Player<S> {
    sink: S,
    mapping: DeviceMapping,
    /// Actuator to scheduled stop time
    active: BTreeMap<ActuatorId, f64>,
    ever_on: BTreeSet<ActuatorId>,
    commands_sent: usize,
    failures: Vec<SendFailure>,
    stop_all_broadcasts: usize,
}

impl<S: CommandSink> Player<S> {
    fn new(sink: S, mapping: DeviceMapping) -> Self {
        Self {
            sink,
            mapping,
            active: BTreeMap::new(),
            ever_on: BTreeSet::new(),
            commands_sent: 0,
            failures: Vec::new(),
            stop_all_broadcasts: 0,
        }
    }

    fn run(
        &mut self,
        schedule: &Schedule,
        config: PlaybackConfig,
        rx: &mpsc::Receiver<Signal>,
        progress: &Mutex<PlaybackProgress>,
    ) -> PlaybackReport {
        let events = schedule.events();
        let terminal_at = schedule.terminal_stop().at;
        let tick = config.tick.max(0.0);
        let mut next = 0;

        info!(
            "Playback started: {} events over {:.3}s",
            events.len(),
            terminal_at
        );
        let epoch = Instant::now();

        let cancelled = loop {
            match rx.try_recv() {
                Ok(Signal::Stop) | Err(TryRecvError::Disconnected) => break true,
                Err(TryRecvError::Empty) => {}
            }

            let now = epoch.elapsed().as_secs_f64();
            self.stop_due(now);
            while let Some(event) = events.get(next).filter(|e| e.onset_time <= now) {
                self.start(event, now);
                next += 1;
            }

            if next == events.len() && now >= terminal_at {
                break false;
            }
            self.publish(progress, now);

            let deadline = events
                .get(next)
                .map(|e| e.onset_time)
                .into_iter()
                .chain(self.active.values().copied())
                .fold(terminal_at, f64::min);
            let nap = (deadline - now).clamp(0.0, tick);
            if nap > 0.0 {
                spin_sleep::sleep(Duration::from_secs_f64(nap));
            }
        };

        let now = epoch.elapsed().as_secs_f64();
        let active_at_exit: Vec<ActuatorId> = self.active.keys().copied().collect();
        if cancelled {
            warn!("Playback cancelled at {:.3}s, stopping {} actuators", now, active_at_exit.len());
        }
        self.stop_everything(now);
        self.publish(progress, now);
        let active_after_stop: Vec<ActuatorId> = self.active.keys().copied().collect();

        let status = match (cancelled, self.failures.is_empty()) {
            (true, _) => PlaybackStatus::Cancelled,
            (false, true) => PlaybackStatus::Completed,
            (false, false) => PlaybackStatus::Degraded,
        };
        info!(
            "Playback finished ({:?}): {} commands sent, {} failed",
            status,
            self.commands_sent,
            self.failures.len()
        );

        PlaybackReport {
            status,
            commands_sent: self.commands_sent,
            failures: std::mem::take(&mut self.failures),
            stop_all_broadcasts: self.stop_all_broadcasts,
            active_at_exit,
            active_after_stop,
        }
    }

    fn start(&mut self, event: &ScheduleEvent, now: f64) {
        let command = self.mapping.start(event.actuator_id, event.intensity);
        debug!("{:.4}s: start {:?}", now, command);
        // Even if the start fails, the actuator gets a stop later
        self.ever_on.insert(event.actuator_id);
        self.active.insert(event.actuator_id, event.stop_time());
        let result = self.sink.send(command);
        self.record(result, Some(event.actuator_id), CommandKind::Start, 1, now);
    }

    fn stop_due(&mut self, now: f64) {
        let due: Vec<ActuatorId> = self
            .active
            .iter()
            .filter(|&(_, &stop)| stop <= now)
            .map(|(&id, _)| id)
            .collect();
        let mut lost = false;
        for id in due {
            lost |= !self.stop(id, now);
        }
        if lost {
            self.recover(now);
        }
    }

    /// Returns whether the sink took the command.
    fn stop(&mut self, actuator_id: ActuatorId, now: f64) -> bool {
        self.active.remove(&actuator_id);
        let command = self.mapping.stop(actuator_id);
        debug!("{:.4}s: stop {:?}", now, command);
        let result = self.sink.send(command);
        let delivered = result.is_ok();
        self.record(result, Some(actuator_id), CommandKind::Stop, 1, now);
        delivered
    }

    /// A stop went missing, so an actuator may still be running. Broadcast
    /// a stop to every actuator that should be off by now, leaving the ones
    /// mid-drive alone.
    fn recover(&mut self, now: f64) {
        let stops: Vec<_> = self
            .ever_on
            .iter()
            .filter(|id| !self.active.contains_key(*id))
            .map(|&id| self.mapping.stop(id))
            .collect();
        info!("Broadcasting stop to {} idle actuators after a lost stop", stops.len());
        self.stop_all_broadcasts += 1;
        let result = self.sink.send_batch(&stops);
        self.record(result, None, CommandKind::StopAll, stops.len(), now);
    }

    /// Turn off whatever is still on, then broadcast a stop to every
    /// actuator that was ever on, so a lost stop cannot leave one running.
    fn stop_everything(&mut self, now: f64) {
        let still_on: Vec<ActuatorId> = self.active.keys().copied().collect();
        for id in still_on {
            // The broadcast below covers a lost stop
            self.stop(id, now);
        }
        if self.ever_on.is_empty() {
            return;
        }

        let stops: Vec<_> = self.ever_on.iter().map(|&id| self.mapping.stop(id)).collect();
        info!("Broadcasting stop to {} actuators", stops.len());
        self.stop_all_broadcasts += 1;
        let result = self.sink.send_batch(&stops);
        self.record(result, None, CommandKind::StopAll, stops.len(), now);
    }

    fn record(
        &mut self,
        result: Result<(), SinkError>,
        actuator_id: Option<ActuatorId>,
        kind: CommandKind,
        count: usize,
        now: f64,
    ) {
        match result {
            Ok(()) => self.commands_sent += count,
            Err(error) => {
                match actuator_id {
                    Some(id) => warn!("{:?} command for actuator {} may have failed: {}", kind, id, error),
                    None => warn!("{:?} broadcast may have failed: {}", kind, error),
                }
                self.failures.push(SendFailure {
                    actuator_id,
                    at: now,
                    kind,
                    error: error.to_string(),
                });
            }
        }
    }

    fn publish(&self, progress: &Mutex<PlaybackProgress>, now: f64) {
        let mut progress = progress.lock().unwrap();
        progress.elapsed = now;
        progress.active = self.active.keys().copied().collect();
        progress.commands_sent = self.commands_sent;
        progress.failures = self.failures.len();
    }
}
