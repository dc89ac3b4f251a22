//! Bulk export and import of the saved collection.
//!
//! Two formats: a CSV-like text (one `CFG,<name>,...` line per record, with a
//! header) and a plain JSON array of records. Parsing is all-or-nothing; the
//! caller only ever sees a complete batch or an error.

use crate::config::Field;
use crate::error::ParseError;
use crate::record::{PersistedRecord, RecordFactory};
use crate::wire::{self, LineShape};
use log::debug;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    /// Guess from a file extension; anything that is not `.json` is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ImportFormat::Json,
            _ => ImportFormat::Csv,
        }
    }
}

pub fn csv_header() -> String {
    let mut columns = vec![wire::TAG, "Name"];
    columns.extend(Field::ALL.iter().map(|f| f.label()));
    columns.join(",")
}

pub fn export_csv(records: &[PersistedRecord]) -> String {
    let mut out = csv_header();
    out.push('\n');
    for record in records {
        out.push_str(&wire::encode_named_line(&record.name, &record.config));
        out.push('\n');
    }
    out
}

fn is_header(line: &str) -> bool {
    let mut tokens = line.split(',').map(str::trim);
    matches!(
        (tokens.next(), tokens.next()),
        (Some(tag), Some(name)) if tag.eq_ignore_ascii_case("cfg") && name.eq_ignore_ascii_case("name")
    )
}

/// Parse CSV export text into fresh records.
///
/// A leading header is skipped, as is any line whose first value is not
/// `CFG` (hand-edited files carry notes and blank lines). A `CFG` line that
/// does not decode fails the whole import.
pub fn import_csv(text: &str, factory: &mut RecordFactory) -> Result<Vec<PersistedRecord>, ParseError> {
    let mut records = Vec::new();
    let mut seen_data = false;

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !seen_data {
            seen_data = true;
            if is_header(line) {
                continue;
            }
        }
        if line.split(',').next().map(str::trim) != Some(wire::TAG) {
            debug!("Skipping line {} of import: not a {} line", index + 1, wire::TAG);
            continue;
        }

        let decoded = wire::decode_line(line, LineShape::Named).map_err(|e| e.at_line(index + 1))?;
        let name = decoded.name.unwrap_or_default();
        records.push(factory.to_record(decoded.config, &name));
    }

    Ok(records)
}

pub fn export_json(records: &[PersistedRecord]) -> Result<String, ParseError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn import_json(text: &str) -> Result<Vec<PersistedRecord>, ParseError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ForceStatus, Program, TargetChannel};

    fn record(name: &str) -> PersistedRecord {
        let config = Configuration {
            program: Program::B,
            fade_in: 250,
            fade_out: 750,
            on_duration: 1000,
            off_duration: 4294967295,
            offset: 5,
            start_delay: 6,
            channels_qty: 1,
            max_brightness: 80,
            force_status: ForceStatus::None,
            target_channel: TargetChannel::Channel3,
        };
        RecordFactory::new().to_record(config, name)
    }

    #[test]
    fn header_lists_every_column() {
        assert_eq!(
            csv_header(),
            "CFG,Name,Program,FadeIn,FadeOut,OnDuration,OffDuration,Offset,StartDelay,ChannelsQty,MaxBrightness,ForceStatus,TargetChannel"
        );
    }

    #[test]
    fn csv_export_imports_back() {
        let original = record("Garden path");
        let text = export_csv(std::slice::from_ref(&original));
        let imported = import_csv(&text, &mut RecordFactory::new()).unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, original.name);
        assert_eq!(imported[0].config, original.config);
    }

    #[test]
    fn unrelated_lines_are_skipped() {
        let text = "CFG,Porch,1,100,200,300,400,0,0,1,100,0,0\nthis line is a note\n";
        let imported = import_csv(text, &mut RecordFactory::new()).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "Porch");
    }

    #[test]
    fn header_is_case_insensitive_and_optional() {
        let text = "cfg,NAME,whatever\r\nCFG,A,1,0,0,0,0,0,0,1,100,0,0\r\n";
        assert_eq!(import_csv(text, &mut RecordFactory::new()).unwrap().len(), 1);

        let text = "CFG,A,1,0,0,0,0,0,0,1,100,0,0\nCFG,B,2,0,0,0,0,0,0,1,100,0,0";
        assert_eq!(import_csv(text, &mut RecordFactory::new()).unwrap().len(), 2);
    }

    #[test]
    fn short_cfg_line_rejects_whole_batch() {
        let text = "CFG,A,1,0,0,0,0,0,0,1,100,0,0\nCFG,B,1,0,0\n";
        let err = import_csv(text, &mut RecordFactory::new()).unwrap_err();
        match err {
            ParseError::AtLine { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(*source, ParseError::FieldCountMismatch { expected: 13, found: 5 }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn json_export_keeps_ids_and_timestamps() {
        let records = vec![record("one"), record("two")];
        let text = export_json(&records).unwrap();
        assert_eq!(import_json(&text).unwrap(), records);
    }

    #[test]
    fn json_import_requires_an_array() {
        assert!(matches!(import_json("{\"configs\": []}"), Err(ParseError::Json(_))));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ImportFormat::from_path(Path::new("a/b.JSON")), ImportFormat::Json);
        assert_eq!(ImportFormat::from_path(Path::new("serial-configs.csv")), ImportFormat::Csv);
        assert_eq!(ImportFormat::from_path(Path::new("noext")), ImportFormat::Csv);
    }
}
