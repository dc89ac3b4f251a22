//! Named, saved configurations.

use crate::config::{Configuration, Field, ForceStatus, Program, TargetChannel};
use crate::error::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A configuration promoted to the saved collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredRecord")]
pub struct PersistedRecord {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub config: Configuration,
}

impl PersistedRecord {
    /// One-line description for listings.
    pub fn summary(&self) -> String {
        let c = &self.config;
        let mut text = format!(
            "Program {} | {} ch | {}%",
            c.program.letter(),
            c.channels_qty,
            c.max_brightness
        );
        if c.target_channel != TargetChannel::All {
            text.push_str(&format!(" | channel {}", c.target_channel));
        }
        match c.force_status {
            ForceStatus::AlwaysOn => text.push_str(" | always ON"),
            ForceStatus::AlwaysOff => text.push_str(" | always OFF"),
            ForceStatus::None => text.push_str(&format!(
                " | fade {}/{} ms | on {} ms | off {} ms | offset {} ms | delay {} ms",
                c.fade_in, c.fade_out, c.on_duration, c.off_duration, c.offset, c.start_delay
            )),
        }
        text
    }
}

/// Hands out ids and timestamps for new records.
///
/// Ids are random v4 UUIDs. Timestamps never go backwards across calls on
/// the same factory, even if the wall clock does.
#[derive(Debug, Default)]
pub struct RecordFactory {
    last_timestamp: Option<DateTime<Utc>>,
}

impl RecordFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_record(&mut self, config: Configuration, name: &str) -> PersistedRecord {
        PersistedRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            timestamp: self.next_timestamp(),
            config,
        }
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(stamp);
        stamp
    }
}

// on-disk shape, tolerant of older saves: numbers may be strings,
// brightness/status/target may be missing, `alwaysOn` may stand in for forceStatus
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    program: Value,
    #[serde(default)]
    fade_in: Option<Value>,
    #[serde(default)]
    fade_out: Option<Value>,
    #[serde(default)]
    on_duration: Option<Value>,
    #[serde(default)]
    off_duration: Option<Value>,
    #[serde(default)]
    offset: Option<Value>,
    #[serde(default)]
    start_delay: Option<Value>,
    channels_qty: Value,
    #[serde(default)]
    max_brightness: Option<Value>,
    #[serde(default)]
    force_status: Option<Value>,
    #[serde(default)]
    target_channel: Option<Value>,
    #[serde(default)]
    always_on: Option<bool>,
}

fn number(field: Field, value: &Value) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidField { field, value: value.to_string() };
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .ok_or_else(invalid),
        Value::String(s) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn narrow<T: TryFrom<u64>>(field: Field, value: &Value) -> Result<T, ParseError> {
    T::try_from(number(field, value)?)
        .map_err(|_| ParseError::InvalidField { field, value: value.to_string() })
}

fn coded<T: TryFrom<u8>>(field: Field, value: &Value) -> Result<T, ParseError> {
    T::try_from(narrow::<u8>(field, value)?)
        .map_err(|_| ParseError::InvalidField { field, value: value.to_string() })
}

impl TryFrom<StoredRecord> for PersistedRecord {
    type Error = ParseError;

    fn try_from(raw: StoredRecord) -> Result<Self, Self::Error> {
        let force_status = match (&raw.force_status, raw.always_on) {
            (Some(value), _) => coded(Field::ForceStatus, value)?,
            (None, Some(true)) => ForceStatus::AlwaysOn,
            (None, _) => ForceStatus::None,
        };

        let mut config = Configuration {
            program: coded::<Program>(Field::Program, &raw.program)?,
            channels_qty: narrow(Field::ChannelsQty, &raw.channels_qty)?,
            max_brightness: match &raw.max_brightness {
                Some(value) => narrow(Field::MaxBrightness, value)?,
                None => 100,
            },
            force_status,
            target_channel: match &raw.target_channel {
                Some(value) => coded(Field::TargetChannel, value)?,
                None => TargetChannel::All,
            },
            ..Configuration::default()
        };

        let timing = [
            (Field::FadeIn, &raw.fade_in),
            (Field::FadeOut, &raw.fade_out),
            (Field::OnDuration, &raw.on_duration),
            (Field::OffDuration, &raw.off_duration),
            (Field::Offset, &raw.offset),
            (Field::StartDelay, &raw.start_delay),
        ];
        for (field, value) in timing {
            if let (Some(value), Some(slot)) = (value, config.timing_mut(field)) {
                *slot = narrow(field, value)?;
            }
        }

        let id = match raw.id {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        Ok(PersistedRecord {
            id,
            name: raw.name,
            timestamp: raw.timestamp.unwrap_or_default(),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn factory_assigns_unique_ids_and_ordered_timestamps() {
        let mut factory = RecordFactory::new();
        let records: Vec<_> = (0..50)
            .map(|i| factory.to_record(Configuration::default(), &format!("cfg {i}")))
            .collect();

        let mut ids: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), records.len());

        for pair in records.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn record_json_flattens_configuration() {
        let mut factory = RecordFactory::new();
        let record = factory.to_record(Configuration::default(), "  Porch ");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Porch");
        assert_eq!(json["channelsQty"], 1);
        assert_eq!(json["targetChannel"], 0);
        assert!(json["timestamp"].is_string());

        let back: PersistedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn loads_records_with_string_numbers_and_missing_fields() {
        let record: PersistedRecord = serde_json::from_value(json!({
            "id": "1717171717171",
            "name": "old",
            "timestamp": "2024-05-31T16:08:37.171Z",
            "program": "2",
            "fadeIn": "150",
            "fadeOut": 0,
            "onDuration": "1000",
            "offDuration": "1000",
            "offset": "0",
            "startDelay": "0",
            "channelsQty": "3"
        }))
        .unwrap();

        assert_eq!(record.id, "1717171717171");
        assert_eq!(record.config.program, Program::B);
        assert_eq!(record.config.fade_in, 150);
        assert_eq!(record.config.channels_qty, 3);
        assert_eq!(record.config.max_brightness, 100);
        assert_eq!(record.config.force_status, ForceStatus::None);
        assert_eq!(record.config.target_channel, TargetChannel::All);
    }

    #[test]
    fn always_on_flag_maps_to_force_status() {
        let record: PersistedRecord = serde_json::from_value(json!({
            "id": "a",
            "name": "legacy",
            "program": 1,
            "channelsQty": 1,
            "alwaysOn": true
        }))
        .unwrap();
        assert_eq!(record.config.force_status, ForceStatus::AlwaysOn);
    }

    #[test]
    fn rejects_out_of_type_values() {
        let result: Result<PersistedRecord, _> = serde_json::from_value(json!({
            "id": "a",
            "name": "bad",
            "program": 1,
            "channelsQty": 1,
            "fadeIn": 4294967296u64
        }));
        assert!(result.is_err());
    }

    #[test]
    fn summary_hides_timing_when_forced() {
        let mut factory = RecordFactory::new();
        let config = Configuration {
            force_status: ForceStatus::AlwaysOff,
            fade_in: 10,
            ..Configuration::default()
        };
        let summary = factory.to_record(config, "x").summary();
        assert!(summary.contains("always OFF"));
        assert!(!summary.contains("fade"));
    }
}
