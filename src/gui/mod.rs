//! Terminal screens for playing motions and patterns.

mod error;
mod playback_monitor;
mod port_selector;

pub use error::BrushGuiError;
pub use playback_monitor::playback_monitor;
pub use port_selector::{port_selector, PortChoice, SelectorInfo};
