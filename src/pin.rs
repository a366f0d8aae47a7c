//! PIN reading functionality

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading PINs from various sources
pub trait PinReader {
    /// Read a PIN as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the PIN wrapped in `Zeroizing` so it is wiped from memory
    /// when dropped.
    fn read_pin(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed PIN (for testing)
pub struct ConstantPinReader {
    pin: Zeroizing<Vec<u8>>,
}

impl ConstantPinReader {
    pub fn new(pin: Vec<u8>) -> Self {
        Self {
            pin: Zeroizing::new(pin),
        }
    }
}

impl PinReader for ConstantPinReader {
    fn read_pin(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.pin).clone()))
    }
}

/// Reads a PIN from any io::Read source
///
/// The whole stream is consumed. One trailing line ending (`\n` or `\r\n`)
/// is removed so `echo 1234 | xcreeptor --pin-stdin ...` works.
pub struct ReaderPinReader {
    reader: Box<dyn Read>,
}

impl ReaderPinReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PinReader for ReaderPinReader {
    fn read_pin(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            XcreeptorError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading PIN: {}", e),
                e,
            )
        })?;
        if data.ends_with(b"\n") {
            data.pop();
            if data.ends_with(b"\r") {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads a PIN from the terminal with no echo
pub struct TerminalPinReader {
    prompt: &'static str,
}

impl TerminalPinReader {
    pub fn new(prompt: &'static str) -> Self {
        Self { prompt }
    }
}

impl Default for TerminalPinReader {
    fn default() -> Self {
        Self::new("PIN (xcreeptor): ")
    }
}

impl PinReader for TerminalPinReader {
    /// Read a PIN from the terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_pin(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::PinUnavailable,
                "cannot read PIN from terminal - stdin is not a terminal (use --pin-stdin)",
            ));
        }

        io::stderr().write_all(self.prompt.as_bytes()).map_err(|e| {
            XcreeptorError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            XcreeptorError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // rpassword returns a plain String; move it into a zeroizing buffer
        let pin = rpassword::read_password().map_err(|e| {
            XcreeptorError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PinUnavailable,
                format!("failure reading PIN: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(pin.into_bytes()))
    }
}
