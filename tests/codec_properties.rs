//! End-to-end checks of the CFG line codec and the export format.

use lumicfg::config::{ConfigForm, Configuration, Field, ForceStatus, Program, TargetChannel, TimeUnit};
use lumicfg::derive::{apply_derived_constraints, DerivationRules};
use lumicfg::error::ParseError;
use lumicfg::export::{export_csv, import_csv};
use lumicfg::record::RecordFactory;
use lumicfg::validate::validate;
use lumicfg::wire::{decode_wire_line, encode_wire_line};

fn configurations() -> Vec<Configuration> {
    let mut out = Vec::new();
    for program in [Program::A, Program::B, Program::C] {
        for force_status in [ForceStatus::None, ForceStatus::AlwaysOn, ForceStatus::AlwaysOff] {
            for (target_channel, channels_qty) in [
                (TargetChannel::All, 3),
                (TargetChannel::Channel1, 1),
                (TargetChannel::Channel3, 1),
            ] {
                out.push(Configuration {
                    program,
                    fade_in: 0,
                    fade_out: 17,
                    on_duration: 60_000,
                    off_duration: u32::MAX,
                    offset: 250,
                    start_delay: 1,
                    channels_qty,
                    max_brightness: 1 + (program.code() * 30),
                    force_status,
                    target_channel,
                });
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Wire line
// ---------------------------------------------------------------------------

#[test]
fn valid_configurations_survive_the_wire() {
    for config in configurations() {
        assert!(config.validate().is_empty(), "{config:?}");
        let line = encode_wire_line(&config);
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches(',').count(), 11);
        assert_eq!(decode_wire_line(&line).unwrap(), config);
    }
}

#[test]
fn reference_line_is_byte_exact() {
    let form = ConfigForm::default()
        .with(Field::Program, "1")
        .with(Field::FadeIn, "100")
        .with(Field::FadeOut, "200")
        .with(Field::OnDuration, "300")
        .with(Field::OffDuration, "400");
    let config = form.to_configuration(TimeUnit::Milliseconds).unwrap();
    assert_eq!(encode_wire_line(&config), "CFG,1,100,200,300,400,0,0,1,100,0,0\n");
}

#[test]
fn seconds_entry_is_sent_as_milliseconds() {
    let form = ConfigForm::from_configuration(&Configuration::default(), TimeUnit::Seconds)
        .with(Field::FadeIn, "0.25")
        .with(Field::OnDuration, "3");
    let config = form.to_configuration(TimeUnit::Seconds).unwrap();
    assert_eq!(encode_wire_line(&config), "CFG,1,250,0,3000,0,0,0,1,100,0,0\n");
}

#[test]
fn foreign_tag_is_a_malformed_tag() {
    assert!(matches!(decode_wire_line("XYZ,1,2,3"), Err(ParseError::MalformedTag { .. })));
}

// ---------------------------------------------------------------------------
// Validation and derived fields
// ---------------------------------------------------------------------------

#[test]
fn boundary_values() {
    let cases = [
        (Field::ChannelsQty, "0", false),
        (Field::ChannelsQty, "4", false),
        (Field::ChannelsQty, "1", true),
        (Field::MaxBrightness, "0", false),
        (Field::MaxBrightness, "101", false),
        (Field::MaxBrightness, "100", true),
        (Field::OffDuration, "-1", false),
        (Field::OffDuration, "4294967296", false),
        (Field::OffDuration, "4294967295", true),
    ];
    for (field, raw, ok) in cases {
        let errors = validate(&ConfigForm::default().with(field, raw), TimeUnit::Milliseconds);
        assert_eq!(errors.is_empty(), ok, "{field} = {raw}");
    }
}

#[test]
fn targeting_a_channel_pins_quantity() {
    for qty in ["1", "2", "3", "", "x"] {
        let form = ConfigForm::default()
            .with(Field::ChannelsQty, qty)
            .with(Field::TargetChannel, "2");
        let form = apply_derived_constraints(form, DerivationRules::default());
        assert_eq!(form.get(Field::ChannelsQty), "1");
    }
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

#[test]
fn export_then_import_keeps_name_and_fields() {
    let mut factory = RecordFactory::new();
    let records: Vec<_> = configurations()
        .into_iter()
        .enumerate()
        .map(|(i, c)| factory.to_record(c, &format!("Scene {i}")))
        .collect();

    let imported = import_csv(&export_csv(&records), &mut RecordFactory::new()).unwrap();
    assert_eq!(imported.len(), records.len());
    for (before, after) in records.iter().zip(&imported) {
        assert_eq!(after.name, before.name);
        assert_eq!(after.config, before.config);
        assert_ne!(after.id, before.id);
    }
}

#[test]
fn import_skips_unrelated_lines() {
    let text = "CFG,Porch,1,100,200,300,400,0,0,1,100,0,0\nnot a config line\n";
    let imported = import_csv(text, &mut RecordFactory::new()).unwrap();
    assert_eq!(imported.len(), 1);
}
