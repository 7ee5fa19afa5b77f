use std::{error::Error, fmt::Display};

/// Something went wrong while drawing to, or reading from, the terminal.
#[derive(Debug)]
pub enum BrushGuiError {
    /// The terminal could not be written to or read from
    IOError(std::io::Error),
}

impl Display for BrushGuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrushGuiError::IOError(e) => write!(f, "terminal error: {}", e),
        }
    }
}

impl Error for BrushGuiError {}

impl From<std::io::Error> for BrushGuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}
