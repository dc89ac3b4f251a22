//! The link to the device.
//!
//! [`Transport`] is what a [`Session`](crate::session::Session) talks to.
//! [`SerialTransport`] drives a real port through the `serialport` crate;
//! [`SimulatedTransport`] keeps everything in memory for tests and for
//! running without hardware.

use crate::error::TransportError;
use crate::settings::SerialSettings;
use log::{debug, info, warn};
use serde::Serialize;
use serialport::{SerialPort, SerialPortType};
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read, Write};

const UNKNOWN: &str = "Unknown";

/// One entry of the port list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub path: String,
    pub manufacturer: String,
    pub vendor_id: String,
    pub product_id: String,
}

impl PortInfo {
    /// A port with nothing known about it but its path.
    pub fn bare(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            manufacturer: UNKNOWN.to_string(),
            vendor_id: UNKNOWN.to_string(),
            product_id: UNKNOWN.to_string(),
        }
    }

    /// A USB adapter; ids are rendered as four hex digits.
    pub fn usb(path: impl Into<String>, vid: u16, pid: u16, manufacturer: Option<String>) -> Self {
        let mut port = PortInfo::bare(path);
        port.vendor_id = format!("{:04x}", vid);
        port.product_id = format!("{:04x}", pid);
        if let Some(manufacturer) = manufacturer.filter(|m| !m.is_empty()) {
            port.manufacturer = manufacturer;
        }
        port
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                PortInfo::usb(info.port_name, usb.vid, usb.pid, usb.manufacturer)
            }
            _ => PortInfo::bare(info.port_name),
        }
    }
}

pub trait Transport {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, TransportError>;

    fn open(&mut self, settings: &SerialSettings) -> Result<(), TransportError>;

    /// Close the connection. Returns whether one was open.
    fn close(&mut self) -> bool;

    fn is_open(&self) -> bool;

    /// Name of the open port, if any.
    fn port_name(&self) -> Option<&str>;

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next complete inbound line without its terminator, or `None` when
    /// nothing complete arrived within the read timeout.
    fn read_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// Longest inbound line kept. Anything longer is dropped up to its newline.
const MAX_LINE_BYTES: usize = 4096;

/// Bytes of a line that is still arriving.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    // an over-long line is being skipped
    discarding: bool,
}

impl LineBuffer {
    /// One complete line, or `None` while the line is unfinished or dropped.
    fn read_from<R: BufRead>(&mut self, reader: &mut R) -> io::Result<Option<String>> {
        let room = (MAX_LINE_BYTES - self.pending.len()) as u64;
        Read::take(&mut *reader, room).read_until(b'\n', &mut self.pending)?;

        if self.pending.last() == Some(&b'\n') {
            let bytes = std::mem::take(&mut self.pending);
            if std::mem::take(&mut self.discarding) {
                return Ok(None);
            }
            return Ok(Some(String::from_utf8_lossy(&bytes).trim_end().to_string()));
        }
        if self.pending.len() >= MAX_LINE_BYTES {
            if !self.discarding {
                warn!("Dropping inbound line longer than {} bytes", MAX_LINE_BYTES);
            }
            self.pending.clear();
            self.discarding = true;
        }
        Ok(None)
    }
}

struct OpenPort {
    name: String,
    reader: BufReader<Box<dyn SerialPort>>,
    line: LineBuffer,
}

/// A real serial port.
#[derive(Default)]
pub struct SerialTransport {
    port: Option<OpenPort>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for SerialTransport {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, TransportError> {
        let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
        debug!("Found {} serial ports", ports.len());
        Ok(ports.into_iter().map(PortInfo::from).collect())
    }

    fn open(&mut self, settings: &SerialSettings) -> Result<(), TransportError> {
        let port = serialport::new(&settings.port, settings.baud)
            .timeout(settings.timeout())
            .open()
            .map_err(|source| TransportError::Open { port: settings.port.clone(), source })?;
        info!("Opened {} at {} baud", settings.port, settings.baud);
        self.port = Some(OpenPort {
            name: settings.port.clone(),
            reader: BufReader::new(port),
            line: LineBuffer::default(),
        });
        Ok(())
    }

    fn close(&mut self) -> bool {
        match self.port.take() {
            Some(port) => {
                info!("Closed {}", port.name);
                true
            }
            None => false,
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_name(&self) -> Option<&str> {
        self.port.as_ref().map(|p| p.name.as_str())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        let writer = port.reader.get_mut();
        writer.write_all(frame)?;
        writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        match port.line.read_from(&mut port.reader) {
            Ok(line) => Ok(line),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory stand-in for a device.
///
/// Frames written are kept for inspection; inbound lines are queued with
/// [`push_inbound`](Self::push_inbound). With [`with_waveform`](Self::with_waveform)
/// it also makes up a three-channel telemetry stream when nothing is queued.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    ports: Vec<PortInfo>,
    open: Option<String>,
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<String>,
    waveform: Option<u32>,
}

/// Upper end of the simulated analog readings.
const WAVE_RESOLUTION: u32 = 1024;

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::with_ports(vec![PortInfo::bare("SIM0")])
    }

    pub fn with_ports(ports: Vec<PortInfo>) -> Self {
        Self { ports, ..Self::default() }
    }

    pub fn with_waveform(mut self) -> Self {
        self.waveform = Some(0);
        self
    }

    pub fn set_ports(&mut self, ports: Vec<PortInfo>) {
        self.ports = ports;
    }

    pub fn push_inbound(&mut self, line: impl Into<String>) {
        self.inbound.push_back(line.into());
    }

    /// Every frame sent so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }

    fn next_wave_sample(&mut self) -> Option<String> {
        let step = self.waveform.as_mut()?;
        *step = (*step + 16) % (2 * WAVE_RESOLUTION);
        let triangle = |phase: u32| {
            let t = (*step + phase) % (2 * WAVE_RESOLUTION);
            if t < WAVE_RESOLUTION {
                t
            } else {
                2 * WAVE_RESOLUTION - 1 - t
            }
        };
        Some(format!("{},{},{}", triangle(0), triangle(341), triangle(683)))
    }
}

impl Transport for SimulatedTransport {
    fn list_ports(&mut self) -> Result<Vec<PortInfo>, TransportError> {
        Ok(self.ports.clone())
    }

    fn open(&mut self, settings: &SerialSettings) -> Result<(), TransportError> {
        if !self.ports.iter().any(|p| p.path == settings.port) {
            return Err(TransportError::Open {
                port: settings.port.clone(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such port"),
            });
        }
        info!("Opened simulated {} at {} baud", settings.port, settings.baud);
        self.open = Some(settings.port.clone());
        Ok(())
    }

    fn close(&mut self) -> bool {
        self.open.take().is_some()
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn port_name(&self) -> Option<&str> {
        self.open.as_deref()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.open.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        if self.open.is_none() {
            return Err(TransportError::NotConnected);
        }
        match self.inbound.pop_front() {
            Some(line) => Ok(Some(line)),
            None => Ok(self.next_wave_sample()),
        }
    }
}
