//! One user's working context: a transport, a library and the form.
//!
//! Nothing here is global. Two sessions over two transports do not see
//! each other.

use crate::config::Configuration;
use crate::error::{Error, Result, TransportError};
use crate::form::FormState;
use crate::record::PersistedRecord;
use crate::settings::{AppSettings, SerialSettings};
use crate::store::{ConfigLibrary, Store};
use crate::telemetry::{TelemetryHistory, TimedSample};
use crate::transport::{PortInfo, Transport};
use crate::wire::encode_wire_line;
use log::{debug, info};

/// Result of a port scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortScan {
    pub ports: Vec<PortInfo>,
    /// Whether the list differs from the previous scan.
    pub changed: bool,
}

pub struct Session<T, S> {
    transport: T,
    library: ConfigLibrary<S>,
    serial: SerialSettings,
    last_ports: Option<Vec<PortInfo>>,
    form: FormState,
    telemetry: TelemetryHistory,
}

impl<T: Transport, S: Store> Session<T, S> {
    pub fn new(transport: T, store: S, settings: &AppSettings) -> Self {
        Self {
            transport,
            library: ConfigLibrary::new(store),
            serial: settings.serial.clone(),
            last_ports: None,
            form: FormState::new(settings.rules(), settings.time_unit),
            telemetry: TelemetryHistory::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn library(&self) -> &ConfigLibrary<S> {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ConfigLibrary<S> {
        &mut self.library
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn telemetry(&self) -> &TelemetryHistory {
        &self.telemetry
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn refresh_ports(&mut self) -> Result<PortScan> {
        let ports = self.transport.list_ports()?;
        let changed = self.last_ports.as_ref() != Some(&ports);
        if changed {
            debug!("Port list changed: {} ports", ports.len());
            self.last_ports = Some(ports.clone());
        }
        Ok(PortScan { ports, changed })
    }

    /// Open `port` (or the configured port, or the first one found). Any
    /// open connection is closed first.
    pub fn connect(&mut self, port: Option<&str>) -> Result<()> {
        if self.transport.close() {
            debug!("Closed previous connection before reconnecting");
        }
        let port = match port.filter(|p| !p.is_empty()) {
            Some(port) => port.to_string(),
            None if !self.serial.port.is_empty() => self.serial.port.clone(),
            None => self
                .refresh_ports()?
                .ports
                .into_iter()
                .next()
                .map(|p| p.path)
                .ok_or(TransportError::NoPort)?,
        };
        let settings = SerialSettings { port, ..self.serial.clone() };
        self.transport.open(&settings)?;
        self.serial = settings;
        self.telemetry.clear();
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if !self.transport.close() {
            return Err(TransportError::NotConnected.into());
        }
        info!("Disconnected from {}", self.serial.port);
        Ok(())
    }

    /// Validate, encode and write `config`. Returns the line sent.
    pub fn send_configuration(&mut self, config: &Configuration) -> Result<String> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::Invalid(errors));
        }
        if !self.transport.is_open() {
            return Err(TransportError::NotConnected.into());
        }
        let line = encode_wire_line(config);
        debug!("Sending {:?}", line);
        self.transport.send(line.as_bytes())?;
        Ok(line)
    }

    /// Send whatever the form currently holds.
    pub fn send_form(&mut self) -> Result<String> {
        let config = self.form.configuration()?;
        self.send_configuration(&config)
    }

    /// Save the form under `name`.
    pub fn save(&mut self, name: &str) -> Result<PersistedRecord> {
        let config = self.form.configuration()?;
        self.library.save(&config, name)
    }

    /// Put a saved record into the form.
    pub fn load_record(&mut self, id: &str) -> Result<PersistedRecord> {
        let record = self.library.get(id)?;
        self.form.load(&record.config);
        Ok(record)
    }

    /// Read one inbound line and record it if it is telemetry.
    pub fn poll_telemetry(&mut self) -> Result<Option<TimedSample>> {
        let Some(line) = self.transport.read_line()? else {
            return Ok(None);
        };
        let sample = self.telemetry.ingest(&line);
        if sample.is_none() {
            debug!("Device: {}", line);
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Field, ForceStatus};
    use crate::store::MemoryStore;
    use crate::transport::SimulatedTransport;

    fn session() -> Session<SimulatedTransport, MemoryStore> {
        let transport =
            SimulatedTransport::with_ports(vec![PortInfo::bare("SIM0"), PortInfo::bare("SIM1")]);
        Session::new(transport, MemoryStore::new(), &AppSettings::default())
    }

    #[test]
    fn port_scan_reports_changes_once() {
        let mut s = session();
        assert!(s.refresh_ports().unwrap().changed);
        assert!(!s.refresh_ports().unwrap().changed);

        s.transport_mut().set_ports(vec![PortInfo::bare("SIM1")]);
        let scan = s.refresh_ports().unwrap();
        assert!(scan.changed);
        assert_eq!(scan.ports.len(), 1);
    }

    #[test]
    fn connect_defaults_to_first_port_and_reconnects() {
        let mut s = session();
        s.connect(None).unwrap();
        assert_eq!(s.transport().port_name(), Some("SIM0"));

        s.connect(Some("SIM1")).unwrap();
        assert_eq!(s.transport().port_name(), Some("SIM1"));

        s.disconnect().unwrap();
        assert!(matches!(s.disconnect(), Err(Error::Transport(TransportError::NotConnected))));
    }

    #[test]
    fn connect_without_ports_fails() {
        let mut s = Session::new(
            SimulatedTransport::with_ports(Vec::new()),
            MemoryStore::new(),
            &AppSettings::default(),
        );
        assert!(matches!(s.connect(None), Err(Error::Transport(TransportError::NoPort))));
    }

    #[test]
    fn send_writes_the_wire_line() {
        let mut s = session();
        s.connect(None).unwrap();
        s.form_mut().set_field(Field::FadeIn, "100");
        s.form_mut().set_field(Field::FadeOut, "200");

        let line = s.send_form().unwrap();
        assert_eq!(line, "CFG,1,100,200,0,0,0,0,1,100,0,0\n");
        assert_eq!(s.transport().sent(), &[line.into_bytes()]);
    }

    #[test]
    fn send_is_refused_while_invalid_or_disconnected() {
        let mut s = session();
        assert!(matches!(
            s.send_form(),
            Err(Error::Transport(TransportError::NotConnected))
        ));

        s.connect(None).unwrap();
        s.form_mut().set_field(Field::MaxBrightness, "101");
        assert!(matches!(s.send_form(), Err(Error::Invalid(_))));
        assert!(s.transport().sent().is_empty());
    }

    #[test]
    fn save_and_load_go_through_the_form() {
        let mut s = session();
        s.form_mut().set_field(Field::ForceStatus, "1");
        let saved = s.save("Always on").unwrap();
        assert_eq!(saved.config.force_status, ForceStatus::AlwaysOn);

        s.form_mut().set_field(Field::ForceStatus, "0");
        s.load_record(&saved.id).unwrap();
        assert_eq!(s.form().form().get(Field::ForceStatus), "1");
        assert!(s.load_record("missing").is_err());
    }

    #[test]
    fn telemetry_is_collected_from_inbound_lines() {
        let mut s = session();
        s.connect(None).unwrap();
        s.transport_mut().push_inbound("OK");
        s.transport_mut().push_inbound("5,6,7");

        assert!(s.poll_telemetry().unwrap().is_none());
        let sample = s.poll_telemetry().unwrap().unwrap();
        assert_eq!(sample.sample.channel2, 6);
        assert_eq!(s.telemetry().len(), 1);
        assert!(s.poll_telemetry().unwrap().is_none());
    }
}
