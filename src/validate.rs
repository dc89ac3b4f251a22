//! Per-field checks for a [`ConfigForm`].
//!
//! Every field is checked on its own; one bad field never hides another.
//! The result is advisory: nothing here refuses anything, callers look at
//! [`ValidationErrors::is_empty`] before they send or save.

use crate::config::{
    ConfigForm, Configuration, Field, ForceStatus, Program, TargetChannel, TimeUnit,
    UNSIGNED_LONG_MAX,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field → message for every field that is currently invalid, plus the
/// record name when one was required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    #[serde(flatten)]
    fields: BTreeMap<Field, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.name.is_none()
    }

    pub fn len(&self) -> usize {
        self.fields.len() + usize::from(self.name.is_some())
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields.iter().map(|(f, m)| (*f, m.as_str()))
    }

    pub fn name_error(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name_error(&mut self, message: String) {
        self.name = Some(message);
    }

    /// Recheck a single field and update (or clear) its entry.
    pub fn revalidate(&mut self, field: Field, raw: &str, unit: TimeUnit) {
        match validate_field(field, raw, unit) {
            Some(message) => {
                self.fields.insert(field, message);
            }
            None => {
                self.fields.remove(&field);
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.iter().map(|(field, message)| (field.name(), message));
        let mut first = true;
        for (label, message) in fields.chain(self.name_error().map(|m| ("name", m))) {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", label, message)?;
            first = false;
        }
        Ok(())
    }
}

/// Check every operational field of `form`.
pub fn validate(form: &ConfigForm, unit: TimeUnit) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for field in Field::ALL {
        errors.revalidate(field, form.get(field), unit);
    }
    errors
}

/// Error message for one raw value, or `None` when it is acceptable.
pub fn validate_field(field: Field, raw: &str, unit: TimeUnit) -> Option<String> {
    parse_field(field, raw, unit).err()
}

/// A persisted name travels as a CSV column, so commas and line breaks are out.
pub fn validate_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        Some("Please enter a name".to_string())
    } else if name.contains([',', '\n', '\r']) {
        Some("Name must not contain commas or line breaks".to_string())
    } else {
        None
    }
}

/// Parse a raw value into the number it stands for on the wire
/// (milliseconds for timing fields, the code for enums).
pub(crate) fn parse_field(field: Field, raw: &str, unit: TimeUnit) -> Result<u32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Value is required".to_string());
    }
    let number: f64 = raw
        .parse()
        .ok()
        .filter(|n: &f64| n.is_finite())
        .ok_or_else(|| "Must be a valid number".to_string())?;

    if field.is_enumerated() {
        let codes = match field {
            Field::Program => Program::CODES,
            Field::ForceStatus => ForceStatus::CODES,
            _ => TargetChannel::CODES,
        };
        return match codes.iter().find(|code| f64::from(**code) == number) {
            Some(code) => Ok(u32::from(*code)),
            None => Err(format!("Must be one of {}", join_codes(codes))),
        };
    }

    if number < 0.0 {
        return Err("Must be positive".to_string());
    }

    let value = if field.is_timing() {
        let millis = number * unit.factor();
        let millis = match unit {
            TimeUnit::Milliseconds => millis,
            TimeUnit::Seconds => millis.round(),
        };
        if millis.fract() != 0.0 {
            return Err("Must be an integer".to_string());
        }
        if millis > UNSIGNED_LONG_MAX as f64 {
            return Err(format!("Must not exceed {} ms", UNSIGNED_LONG_MAX));
        }
        millis
    } else {
        if number.fract() != 0.0 {
            return Err("Must be an integer".to_string());
        }
        number
    };

    match field {
        Field::ChannelsQty if !(1.0..=3.0).contains(&value) => {
            Err("Must be between 1 and 3".to_string())
        }
        Field::MaxBrightness if !(1.0..=100.0).contains(&value) => {
            Err("Must be between 1 and 100".to_string())
        }
        _ => Ok(value as u32),
    }
}

fn join_codes(codes: &[u8]) -> String {
    codes.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
}

impl ConfigForm {
    /// Convert to the typed record, or report every invalid field.
    pub fn to_configuration(&self, unit: TimeUnit) -> Result<Configuration, ValidationErrors> {
        let errors = validate(self, unit);
        if !errors.is_empty() {
            return Err(errors);
        }
        let value = |field| parse_field(field, self.get(field), unit).unwrap_or_default();
        let code = |field| u8::try_from(value(field)).unwrap_or_default();

        let mut config = Configuration {
            program: Program::try_from(code(Field::Program)).unwrap_or(Program::A),
            channels_qty: code(Field::ChannelsQty),
            max_brightness: code(Field::MaxBrightness),
            force_status: ForceStatus::try_from(code(Field::ForceStatus))
                .unwrap_or(ForceStatus::None),
            target_channel: TargetChannel::try_from(code(Field::TargetChannel))
                .unwrap_or(TargetChannel::All),
            ..Configuration::default()
        };
        for field in Field::TIMING {
            if let Some(slot) = config.timing_mut(field) {
                *slot = value(field);
            }
        }
        Ok(config)
    }
}

impl Configuration {
    /// Range checks for a record that did not come from a form (decoded or
    /// imported), plus the single-channel rule a form gets from derivation.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = validate(
            &ConfigForm::from_configuration(self, TimeUnit::Milliseconds),
            TimeUnit::Milliseconds,
        );
        if self.target_channel != TargetChannel::All
            && self.channels_qty != 1
            && !errors.contains(Field::ChannelsQty)
        {
            errors.fields.insert(
                Field::ChannelsQty,
                "Must be 1 when a single channel is targeted".to_string(),
            );
        }
        errors
    }
}
