//! The real transport: the actuator controller on a serial port.

use log::{debug, info};
use serial2::SerialPort;
use std::{io::Write, path::Path, path::PathBuf, time::Duration};

use crate::command_sink::{CommandSink, DeviceCommand};
use crate::device_codec::{encode_frame, COMMANDS_PER_FRAME};
use crate::error::SinkError;

/// Baud rate the controller firmware listens at.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial ports that might have a controller on them.
pub fn available_ports() -> Result<Vec<PathBuf>, SinkError> {
    Ok(SerialPort::available_ports()?)
}

/// A [CommandSink] that writes 100-byte frames to a serial port.
pub struct SerialSink {
    port: SerialPort,
}

impl SerialSink {
    /// Open `path` at `baud_rate`. Writes time out after a second so that a
    /// stuck device cannot stall playback.
    pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self, SinkError> {
        let mut port = SerialPort::open(path.as_ref(), baud_rate)?;
        port.set_write_timeout(Duration::from_secs(1))?;
        info!("Opened {} at {} baud", path.as_ref().display(), baud_rate);
        Ok(Self { port })
    }

    fn write_frame(&mut self, commands: &[DeviceCommand]) -> Result<(), SinkError> {
        let frame = encode_frame(commands)?;
        self.port.write_all(&frame)?;
        debug!("Wrote frame with {} commands", commands.len());
        Ok(())
    }
}

impl CommandSink for SerialSink {
    fn send(&mut self, command: DeviceCommand) -> Result<(), SinkError> {
        self.write_frame(&[command])
    }

    fn send_batch(&mut self, commands: &[DeviceCommand]) -> Result<(), SinkError> {
        let mut first_error = None;
        for chunk in commands.chunks(COMMANDS_PER_FRAME) {
            if let Err(e) = self.write_frame(chunk) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_is_an_io_error() {
        assert!(matches!(
            SerialSink::open("/definitely/not/a/serial/port", DEFAULT_BAUD_RATE),
            Err(SinkError::IoError(_))
        ));
    }
}
