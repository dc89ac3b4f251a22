//! The `CFG,...` text line.
//!
//! The device reads `CFG,<11 fields>\n`. The CSV export uses the same line
//! with the record name slipped in after the tag. Encoding never validates;
//! decoding only checks shape and that each token fits its type.

use crate::config::{Configuration, Field};
use crate::error::ParseError;
use log::debug;

pub const TAG: &str = "CFG";

/// Which layout a caller expects when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShape {
    /// `CFG` + 11 fields, as sent to the device.
    Wire,
    /// `CFG` + name + 11 fields, as found in an export file.
    Named,
}

impl LineShape {
    pub fn token_count(self) -> usize {
        match self {
            LineShape::Wire => 1 + Field::ALL.len(),
            LineShape::Named => 2 + Field::ALL.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub name: Option<String>,
    pub config: Configuration,
}

fn fields_csv(config: &Configuration) -> String {
    Field::ALL
        .iter()
        .map(|field| config.value(*field).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// The exact payload written to the device, newline included.
pub fn encode_wire_line(config: &Configuration) -> String {
    format!("{},{}\n", TAG, fields_csv(config))
}

/// An export line: `CFG,<name>,<fields>` without a line terminator.
pub fn encode_named_line(name: &str, config: &Configuration) -> String {
    format!("{},{},{}", TAG, name, fields_csv(config))
}

fn coded<T: TryFrom<u8>>(token: &str) -> Option<T> {
    token.parse::<u8>().ok().and_then(|code| T::try_from(code).ok())
}

pub fn decode_wire_line(line: &str) -> Result<Configuration, ParseError> {
    decode_line(line, LineShape::Wire).map(|decoded| decoded.config)
}

pub fn decode_line(line: &str, shape: LineShape) -> Result<DecodedLine, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();

    if tokens[0] != TAG {
        return Err(ParseError::MalformedTag { found: tokens[0].to_string() });
    }
    let expected = shape.token_count();
    if tokens.len() < expected {
        return Err(ParseError::FieldCountMismatch { expected, found: tokens.len() });
    }
    if tokens.len() > expected {
        debug!("Ignoring {} trailing values in {:?}", tokens.len() - expected, line);
    }

    let (name, values) = match shape {
        LineShape::Wire => (None, &tokens[1..expected]),
        LineShape::Named => {
            let name = tokens[1];
            if name.is_empty() {
                return Err(ParseError::InvalidName(name.to_string()));
            }
            (Some(name.to_string()), &tokens[2..expected])
        }
    };

    let mut config = Configuration::default();
    for (field, token) in Field::ALL.into_iter().zip(values) {
        let invalid = || ParseError::InvalidField { field, value: token.to_string() };
        match field {
            Field::Program => {
                config.program = coded(token).ok_or_else(invalid)?;
            }
            Field::ChannelsQty => config.channels_qty = token.parse().map_err(|_| invalid())?,
            Field::MaxBrightness => config.max_brightness = token.parse().map_err(|_| invalid())?,
            Field::ForceStatus => {
                config.force_status = coded(token).ok_or_else(invalid)?;
            }
            Field::TargetChannel => {
                config.target_channel = coded(token).ok_or_else(invalid)?;
            }
            timing => {
                if let Some(slot) = config.timing_mut(timing) {
                    *slot = token.parse().map_err(|_| invalid())?;
                }
            }
        }
    }

    Ok(DecodedLine { name, config })
}
