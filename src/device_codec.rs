//! The actuator controller's wire format.
//!
//! Every command is five bytes:
//!
//! ```text
//! byte 0   0 0 g g g g g s     g = address / 16, s = start (1) or stop (0)
//! byte 1   0 1 a a a a a a     a = address % 16
//! byte 2   1 d d d d f f f     d = duty 0..=15, f = frequency index 0..=7
//! byte 3-4 delay in milliseconds, little endian
//! ```
//!
//! Commands are sent in fixed frames of 100 bytes: up to twenty commands,
//! with the unused slots filled with `0xFF`.

use nom::{
    bytes::complete::take_while,
    combinator::map_opt,
    multi::many_m_n,
    number::complete::{le_u16, u8 as byte},
    sequence::{terminated, tuple},
    Finish, IResult,
};

use crate::command_sink::{DeviceCommand, MAX_DUTY, MAX_FREQUENCY_INDEX};
use crate::error::SinkError;
use crate::layout::ActuatorId;

/// Bytes per encoded command.
pub const COMMAND_LEN: usize = 5;
/// Commands that fit in one frame.
pub const COMMANDS_PER_FRAME: usize = 20;
/// Bytes per frame.
pub const FRAME_LEN: usize = COMMAND_LEN * COMMANDS_PER_FRAME;

const PADDING: u8 = 0xFF;
const MAX_ADDRESS: ActuatorId = 127;

/// Encode a single command, rejecting fields that do not fit.
pub fn encode_command(command: &DeviceCommand) -> Result<[u8; COMMAND_LEN], SinkError> {
    if command.actuator_id > MAX_ADDRESS {
        return Err(SinkError::CommandOutOfRange {
            field: "address",
            value: command.actuator_id as u32,
        });
    }
    if command.duty > MAX_DUTY {
        return Err(SinkError::CommandOutOfRange {
            field: "duty",
            value: command.duty as u32,
        });
    }
    if command.frequency > MAX_FREQUENCY_INDEX {
        return Err(SinkError::CommandOutOfRange {
            field: "frequency",
            value: command.frequency as u32,
        });
    }

    let group = (command.actuator_id / 16) as u8;
    let address = (command.actuator_id % 16) as u8;
    let [delay_low, delay_high] = command.delay_ms.to_le_bytes();

    Ok([
        (group << 2) | command.start as u8,
        0x40 | (address & 0x3F),
        0x80 | ((command.duty & 0x0F) << 3) | (command.frequency & 0x07),
        delay_low,
        delay_high,
    ])
}

/// Encode up to [COMMANDS_PER_FRAME] commands into one padded frame.
pub fn encode_frame(commands: &[DeviceCommand]) -> Result<[u8; FRAME_LEN], SinkError> {
    if commands.len() > COMMANDS_PER_FRAME {
        return Err(SinkError::BatchTooLarge(commands.len()));
    }
    let mut frame = [PADDING; FRAME_LEN];
    for (slot, command) in frame.chunks_exact_mut(COMMAND_LEN).zip(commands) {
        slot.copy_from_slice(&encode_command(command)?);
    }
    Ok(frame)
}

fn parse_command(input: &[u8]) -> IResult<&[u8], DeviceCommand> {
    map_opt(
        tuple((byte, byte, byte, le_u16)),
        |(b0, b1, b2, delay_ms): (u8, u8, u8, u16)| {
            // The fixed marker bits tell a command from padding
            if b0 & 0xC0 != 0 || b1 & 0xC0 != 0x40 || b2 & 0x80 != 0x80 {
                return None;
            }
            Some(DeviceCommand {
                actuator_id: (b0 >> 2) as ActuatorId * 16 + (b1 & 0x3F) as ActuatorId,
                duty: (b2 >> 3) & 0x0F,
                frequency: b2 & 0x07,
                start: b0 & 0x01 == 1,
                delay_ms,
            })
        },
    )(input)
}

fn parse_frame(input: &[u8]) -> IResult<&[u8], Vec<DeviceCommand>> {
    terminated(
        many_m_n(0, COMMANDS_PER_FRAME, parse_command),
        take_while(|b| b == PADDING),
    )(input)
}

/// Decode a frame back into its commands, stopping at the padding.
pub fn decode_frame(frame: &[u8]) -> Result<Vec<DeviceCommand>, SinkError> {
    if frame.len() != FRAME_LEN {
        return Err(SinkError::MalformedFrame(format!(
            "expected {} bytes, got {}",
            FRAME_LEN,
            frame.len()
        )));
    }
    match parse_frame(frame).finish() {
        Ok(([], commands)) => Ok(commands),
        Ok((rest, _)) => Err(SinkError::MalformedFrame(format!(
            "{} trailing bytes after the commands",
            rest.len()
        ))),
        Err(e) => Err(SinkError::MalformedFrame(format!("{:?}", e.code))),
    }
}
