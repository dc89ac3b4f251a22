//! Configuration tool for a serial-attached lighting controller.
//!
//! The controller takes one text line per program, `CFG,<11 fields>\n`.
//! This crate validates and encodes those lines, keeps a library of named
//! configurations, and talks to the device over a serial port.

pub mod config;
pub mod derive;
pub mod error;
pub mod export;
pub mod form;
pub mod record;
pub mod session;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod validate;
pub mod wire;

pub use config::{ConfigForm, Configuration, Field, ForceStatus, Program, TargetChannel, TimeUnit};
pub use derive::{apply_derived_constraints, DerivationRules};
pub use error::{Error, ParseError, Result, StoreError, TransportError};
pub use export::ImportFormat;
pub use form::FormState;
pub use record::{PersistedRecord, RecordFactory};
pub use session::Session;
pub use settings::AppSettings;
pub use store::{ConfigLibrary, ImportMode, JsonFileStore, MemoryStore, Store};
pub use transport::{PortInfo, SerialTransport, SimulatedTransport, Transport};
pub use validate::{validate, ValidationErrors};
pub use wire::{decode_wire_line, encode_wire_line};
