//! The lighting program record and its raw form counterpart.
//!
//! [`Configuration`] is the typed value that goes on the wire and into the
//! store. [`ConfigForm`] is what a user is editing: every field is still raw
//! text, so half-typed and invalid input can be held and reported on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest value the device can hold in a timing field.
pub const UNSIGNED_LONG_MAX: u64 = u32::MAX as u64;

/// Every operational field, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Program,
    FadeIn,
    FadeOut,
    OnDuration,
    OffDuration,
    Offset,
    StartDelay,
    ChannelsQty,
    MaxBrightness,
    ForceStatus,
    TargetChannel,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Program,
        Field::FadeIn,
        Field::FadeOut,
        Field::OnDuration,
        Field::OffDuration,
        Field::Offset,
        Field::StartDelay,
        Field::ChannelsQty,
        Field::MaxBrightness,
        Field::ForceStatus,
        Field::TargetChannel,
    ];

    /// The six millisecond fields that a forced status pins to zero.
    pub const TIMING: [Field; 6] = [
        Field::FadeIn,
        Field::FadeOut,
        Field::OnDuration,
        Field::OffDuration,
        Field::Offset,
        Field::StartDelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Program => "program",
            Field::FadeIn => "fadeIn",
            Field::FadeOut => "fadeOut",
            Field::OnDuration => "onDuration",
            Field::OffDuration => "offDuration",
            Field::Offset => "offset",
            Field::StartDelay => "startDelay",
            Field::ChannelsQty => "channelsQty",
            Field::MaxBrightness => "maxBrightness",
            Field::ForceStatus => "forceStatus",
            Field::TargetChannel => "targetChannel",
        }
    }

    /// Column title used in the CSV export header.
    pub fn label(self) -> &'static str {
        match self {
            Field::Program => "Program",
            Field::FadeIn => "FadeIn",
            Field::FadeOut => "FadeOut",
            Field::OnDuration => "OnDuration",
            Field::OffDuration => "OffDuration",
            Field::Offset => "Offset",
            Field::StartDelay => "StartDelay",
            Field::ChannelsQty => "ChannelsQty",
            Field::MaxBrightness => "MaxBrightness",
            Field::ForceStatus => "ForceStatus",
            Field::TargetChannel => "TargetChannel",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    pub fn is_timing(self) -> bool {
        Field::TIMING.contains(&self)
    }

    /// Enumerated fields are checked for membership, not parsed as amounts.
    pub fn is_enumerated(self) -> bool {
        matches!(self, Field::Program | Field::ForceStatus | Field::TargetChannel)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// small integer-backed enums that travel as their numeric code
macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const CODES: &'static [u8] = &[$($code),+];

            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("{} is not a valid {}", other, stringify!($name))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.code())
            }
        }
    };
}

coded_enum!(
    /// Which of the three built-in light programs to run.
    Program { A = 1, B = 2, C = 3 }
);

coded_enum!(
    /// Output override that bypasses the timing fields.
    ForceStatus { None = 0, AlwaysOn = 1, AlwaysOff = 2 }
);

coded_enum!(
    /// A single output channel, or all of them.
    TargetChannel { All = 0, Channel1 = 1, Channel2 = 2, Channel3 = 3 }
);

impl Program {
    pub fn letter(self) -> char {
        match self {
            Program::A => 'A',
            Program::B => 'B',
            Program::C => 'C',
        }
    }
}

/// One lighting program as the device understands it. Timing is in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub program: Program,
    pub fade_in: u32,
    pub fade_out: u32,
    pub on_duration: u32,
    pub off_duration: u32,
    pub offset: u32,
    pub start_delay: u32,
    pub channels_qty: u8,
    pub max_brightness: u8,
    pub force_status: ForceStatus,
    pub target_channel: TargetChannel,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            program: Program::A,
            fade_in: 0,
            fade_out: 0,
            on_duration: 0,
            off_duration: 0,
            offset: 0,
            start_delay: 0,
            channels_qty: 1,
            max_brightness: 100,
            force_status: ForceStatus::None,
            target_channel: TargetChannel::All,
        }
    }
}

impl Configuration {
    /// Numeric value of a field; enums yield their code.
    pub fn value(&self, field: Field) -> u32 {
        match field {
            Field::Program => self.program.code().into(),
            Field::FadeIn => self.fade_in,
            Field::FadeOut => self.fade_out,
            Field::OnDuration => self.on_duration,
            Field::OffDuration => self.off_duration,
            Field::Offset => self.offset,
            Field::StartDelay => self.start_delay,
            Field::ChannelsQty => self.channels_qty.into(),
            Field::MaxBrightness => self.max_brightness.into(),
            Field::ForceStatus => self.force_status.code().into(),
            Field::TargetChannel => self.target_channel.code().into(),
        }
    }

    pub(crate) fn timing_mut(&mut self, field: Field) -> Option<&mut u32> {
        match field {
            Field::FadeIn => Some(&mut self.fade_in),
            Field::FadeOut => Some(&mut self.fade_out),
            Field::OnDuration => Some(&mut self.on_duration),
            Field::OffDuration => Some(&mut self.off_duration),
            Field::Offset => Some(&mut self.offset),
            Field::StartDelay => Some(&mut self.start_delay),
            _ => None,
        }
    }
}

/// Unit the user types timing values in. The device always gets ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    pub fn factor(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Seconds => 1000.0,
        }
    }

    /// Render a millisecond amount in this unit, without trailing zeros.
    pub fn display_millis(self, millis: u32) -> String {
        match self {
            TimeUnit::Milliseconds => millis.to_string(),
            TimeUnit::Seconds if millis % 1000 == 0 => (millis / 1000).to_string(),
            TimeUnit::Seconds => {
                let text = format!("{}.{:03}", millis / 1000, millis % 1000);
                text.trim_end_matches('0').to_string()
            }
        }
    }
}

/// Raw, user-editable field values keyed by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigForm {
    values: BTreeMap<Field, String>,
}

impl Default for ConfigForm {
    fn default() -> Self {
        ConfigForm::from_configuration(&Configuration::default(), TimeUnit::Milliseconds)
    }
}

impl ConfigForm {
    /// A form with every field blank.
    pub fn empty() -> Self {
        Self { values: BTreeMap::new() }
    }

    pub fn from_configuration(config: &Configuration, unit: TimeUnit) -> Self {
        let values = Field::ALL
            .into_iter()
            .map(|field| {
                let value = config.value(field);
                let text = if field.is_timing() {
                    unit.display_millis(value)
                } else {
                    value.to_string()
                };
                (field, text)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_enums_reject_unknown_codes() {
        assert_eq!(Program::try_from(2u8).unwrap(), Program::B);
        assert!(Program::try_from(0u8).is_err());
        assert!(ForceStatus::try_from(3u8).is_err());
        assert_eq!(TargetChannel::try_from(3u8).unwrap(), TargetChannel::Channel3);
    }

    #[test]
    fn configuration_serializes_enums_as_codes() {
        let config = Configuration {
            program: Program::C,
            force_status: ForceStatus::AlwaysOff,
            ..Configuration::default()
        };
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["program"], 3);
        assert_eq!(json["forceStatus"], 2);
        assert_eq!(json["maxBrightness"], 100);
    }

    #[test]
    fn seconds_display_drops_trailing_zeros() {
        assert_eq!(TimeUnit::Seconds.display_millis(1500), "1.5");
        assert_eq!(TimeUnit::Seconds.display_millis(2000), "2");
        assert_eq!(TimeUnit::Seconds.display_millis(1), "0.001");
        assert_eq!(TimeUnit::Milliseconds.display_millis(1500), "1500");
    }

    #[test]
    fn default_form_matches_default_configuration() {
        let form = ConfigForm::default();
        assert_eq!(form.get(Field::Program), "1");
        assert_eq!(form.get(Field::ChannelsQty), "1");
        assert_eq!(form.get(Field::MaxBrightness), "100");
        assert_eq!(form.get(Field::FadeIn), "0");
        assert_eq!(form.get(Field::TargetChannel), "0");
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("FADEIN"), Some(Field::FadeIn));
        assert_eq!(Field::from_name("name"), None);
    }
}
