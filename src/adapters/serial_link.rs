//! Serial device link adapter.
//!
//! Implements [`LinkPort`] over anything the OS exposes as a serial port:
//! a USB-UART bridge or a Bluetooth RFCOMM tty bound to an SPP module.
//! Pairing and binding the RFCOMM device happen outside this crate.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use serialport::SerialPort;

use crate::app::ports::{ConnectionState, LinkPort};
use crate::error::LinkError;

/// Factory rate of the common SPP relay modules.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

pub struct SerialLink {
    baud_rate: u32,
    path: Option<String>,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// A closed link; call [`LinkPort::connect`] to open it.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            path: None,
            port: None,
        }
    }

    /// Open `path` right away.
    pub fn open(path: &str, baud_rate: u32) -> anyhow::Result<Self> {
        let port = open_port(path, baud_rate)?;
        info!("SerialLink: opened {} at {} baud", path, baud_rate);
        Ok(Self {
            baud_rate,
            path: Some(path.to_string()),
            port: Some(port),
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

fn open_port(path: &str, baud_rate: u32) -> anyhow::Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .timeout(WRITE_TIMEOUT)
        .open()
        .with_context(|| format!("opening serial device {path}"))
}

impl LinkPort for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        match port.write_all(bytes).and_then(|()| port.flush()) {
            Ok(()) => Ok(()),
            Err(e) => {
                // A vanished RFCOMM device surfaces as a write error.
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected
                ) {
                    warn!("SerialLink: device gone, closing");
                    self.port = None;
                }
                Err(LinkError::WriteFailed(e.to_string()))
            }
        }
    }

    fn state(&self) -> ConnectionState {
        if self.port.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn connect(&mut self, target: &str) -> Result<(), LinkError> {
        self.port = None;
        let port =
            open_port(target, self.baud_rate).map_err(|e| LinkError::OpenFailed(format!("{e:#}")))?;
        info!("SerialLink: connected to {} at {} baud", target, self.baud_rate);
        self.path = Some(target.to_string());
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!("SerialLink: closed {}", self.path.as_deref().unwrap_or("?"));
        }
    }
}
