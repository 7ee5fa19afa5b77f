//! HapticBrush draws continuous strokes of touch with a sparse grid of
//! vibrotactile actuators.
//!
//! Two perceptual effects make this work. Driving two or three neighbouring
//! actuators at once, with the energy split by distance, is felt as a single
//! *phantom* vibration somewhere between them. Triggering a sequence of
//! short pulses at the right stimulus onset asynchrony (SOA) is felt as one
//! vibration gliding across the skin rather than a series of taps.
//!
//! The pieces, in the order data flows through them:
//!
//! - [layout] holds the actuator positions and the geometry queries on them.
//! - [phantom] splits one virtual vibration into per-actuator intensities.
//! - [soa] relates pulse duration to SOA.
//! - [trajectory] samples a path in time.
//! - [schedule] turns a path into a merged, timed list of drives, and
//!   [pattern] does the same for buzzes and pulses that stay in place.
//! - [playback] plays a schedule into a [command_sink::CommandSink] in real
//!   time, on its own thread, and always leaves every actuator off.
//! - [device_codec], [serial_sink] and [dummy_sink] speak to the actuator
//!   controller, or pretend to.
//! - [config], [args], [path_parser] and [gui] make up the command line tool.

#![warn(missing_docs)]
#[allow(missing_docs)]
pub mod args;
pub mod command_sink;
pub mod config;
pub mod device_codec;
pub mod dummy_sink;
pub mod error;
pub mod gui;
pub mod layout;
pub mod path_parser;
pub mod pattern;
pub mod phantom;
pub mod playback;
pub mod schedule;
pub mod serial_sink;
pub mod soa;
pub mod trajectory;
