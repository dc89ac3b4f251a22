use crate::config::Field;
use crate::validate::ValidationErrors;

/// Shape failures while decoding a wire line, an export line or a JSON blob.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Expected a line starting with CFG, found {found:?}")]
    MalformedTag { found: String },

    #[error("Expected at least {expected} comma-separated values, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("Invalid value {value:?} for {field}")]
    InvalidField { field: Field, value: String },

    #[error("Invalid configuration name {0:?}")]
    InvalidName(String),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        ParseError::AtLine { line, source: Box::new(self) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port not connected")]
    NotConnected,

    #[error("No serial port found")]
    NoPort,

    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to list serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    #[error("Serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Invalid(ValidationErrors),

    #[error("No saved configuration with id {0}")]
    UnknownRecord(String),

    #[error("Imported record {index} ({name:?}) is invalid: {errors}")]
    InvalidImport {
        index: usize,
        name: String,
        errors: ValidationErrors,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
