//! A [CommandSink] that drives nothing. It records what it is sent, runs
//! every command through the wire codec so malformed ones fail the same way
//! they would on the device, and can be told to fail on purpose.

use crate::command_sink::{CommandSink, DeviceCommand};
use crate::device_codec::{decode_frame, encode_frame};
use crate::error::SinkError;
use crate::layout::ActuatorId;

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Instant,
};

/// A command as the dummy sink saw it, with the time it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedCommand {
    /// Seconds since the sink was built
    pub at: f64,
    /// What was sent
    pub command: DeviceCommand,
}

/// Shared, append-only record of everything a [DummySink] delivered.
pub type CommandLog = Arc<Mutex<Vec<LoggedCommand>>>;

/// See the module docs. Build one with [DummySink::builder].
pub struct DummySink {
    log: CommandLog,
    epoch: Instant,
    failure_rate: f64,
    failing: HashSet<ActuatorId>,
    rng: StdRng,
}

impl DummySink {
    /// Start building a sink that, by default, never fails.
    pub fn builder() -> DummySinkBuilder {
        DummySinkBuilder::default()
    }

    /// A handle to the command record, usable after the sink has been
    /// moved onto another thread.
    pub fn log(&self) -> CommandLog {
        Arc::clone(&self.log)
    }

    fn should_fail(&mut self, command: &DeviceCommand) -> bool {
        self.failing.contains(&command.actuator_id)
            || (self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate.min(1.0)))
    }
}

impl CommandSink for DummySink {
    fn send(&mut self, command: DeviceCommand) -> Result<(), SinkError> {
        // Round trip through the wire format, as the device would see it
        let frame = encode_frame(&[command])?;
        let delivered = decode_frame(&frame)?;

        if self.should_fail(&command) {
            return Err(SinkError::Injected(command.actuator_id));
        }

        let at = self.epoch.elapsed().as_secs_f64();
        debug!("Dummy sink received {:?} at {:.4}s", command, at);
        // Calling `.unwrap()` because a poisoned log means a test already
        // panicked while holding it.
        self.log
            .lock()
            .unwrap()
            .extend(delivered.into_iter().map(|command| LoggedCommand { at, command }));
        Ok(())
    }
}

/// Configures a [DummySink].
#[derive(Debug, Clone, Default)]
pub struct DummySinkBuilder {
    failure_rate: f64,
    failing: HashSet<ActuatorId>,
    seed: Option<u64>,
}

impl DummySinkBuilder {
    /// Fail this fraction of sends at random.
    pub fn failure_rate(self, failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Always fail sends addressed to `actuator_id`.
    pub fn fail_actuator(mut self, actuator_id: ActuatorId) -> Self {
        self.failing.insert(actuator_id);
        self
    }

    /// Seed the failure generator, for reproducible runs.
    pub fn seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    /// Build the sink.
    pub fn build(self) -> DummySink {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        DummySink {
            log: Arc::new(Mutex::new(Vec::new())),
            epoch: Instant::now(),
            failure_rate: self.failure_rate,
            failing: self.failing,
            rng,
        }
    }
}
