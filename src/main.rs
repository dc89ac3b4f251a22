use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use lumicfg::config::{Field, TimeUnit};
use lumicfg::export::ImportFormat;
use lumicfg::settings::{get_settings_path, AppSettings};
use lumicfg::store::{ImportMode, JsonFileStore};
use lumicfg::transport::{SerialTransport, SimulatedTransport, Transport};
use lumicfg::wire::{decode_wire_line, encode_wire_line};
use lumicfg::Session;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Configure a serial lighting controller", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serial port to use instead of the saved setting
    #[arg(long, global = true)]
    port: Option<String>,

    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Timing values are given in seconds
    #[arg(long, global = true)]
    seconds: bool,

    /// Saved configurations file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Talk to an in-memory device instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Check a configuration and report every invalid field
    Validate(FieldArgs),
    /// Print the line that would be sent
    Encode(FieldArgs),
    /// Parse a CFG line
    Decode { line: String },
    /// Send a configuration to the device
    Send {
        /// Send a saved configuration instead of the given fields
        #[arg(long)]
        id: Option<String>,
        /// Also save it under this name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Save a configuration
    Save {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// List saved configurations
    List,
    /// Show one saved configuration
    Show { id: String },
    /// Delete a saved configuration
    Delete { id: String },
    /// Write every saved configuration out
    Export {
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Defaults to stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Read saved configurations from a file
    Import {
        path: PathBuf,
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Keep existing configurations
        #[arg(long, conflicts_with = "replace")]
        append: bool,
        /// Drop existing configurations
        #[arg(long)]
        replace: bool,
    },
    /// Print telemetry samples as they arrive
    Monitor {
        /// Stop after this many samples
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ImportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ImportFormat::Csv,
            FormatArg::Json => ImportFormat::Json,
        }
    }
}

/// Raw form values. Anything left out keeps its default.
#[derive(Args)]
struct FieldArgs {
    /// 1, 2 or 3
    #[arg(long, allow_hyphen_values = true)]
    program: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    fade_in: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    fade_out: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    on_duration: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    off_duration: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    start_delay: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    channels_qty: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    max_brightness: Option<String>,
    /// 0 none, 1 always on, 2 always off
    #[arg(long, allow_hyphen_values = true)]
    force_status: Option<String>,
    /// 0 for all channels
    #[arg(long, allow_hyphen_values = true)]
    target_channel: Option<String>,
}

impl FieldArgs {
    fn value(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Program => &self.program,
            Field::FadeIn => &self.fade_in,
            Field::FadeOut => &self.fade_out,
            Field::OnDuration => &self.on_duration,
            Field::OffDuration => &self.off_duration,
            Field::Offset => &self.offset,
            Field::StartDelay => &self.start_delay,
            Field::ChannelsQty => &self.channels_qty,
            Field::MaxBrightness => &self.max_brightness,
            Field::ForceStatus => &self.force_status,
            Field::TargetChannel => &self.target_channel,
        };
        value.as_deref()
    }

    fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.value(*f).is_none())
    }
}

fn fill_form<T: Transport, S: lumicfg::Store>(session: &mut Session<T, S>, fields: &FieldArgs) {
    // wire order puts forceStatus and targetChannel last, so the fields
    // they lock are already set when they are applied
    for field in Field::ALL {
        if let Some(value) = fields.value(field) {
            if !session.form_mut().set_field(field, value) {
                warn!("{} is locked by another field and was ignored", field);
            }
        }
    }
}

fn report_form<T: Transport, S: lumicfg::Store>(session: &Session<T, S>) -> Result<()> {
    let errors = session.form().errors();
    if errors.is_empty() {
        return Ok(());
    }
    for (field, message) in errors.iter() {
        eprintln!("  {}: {}", field, message);
    }
    Err(anyhow!("Please fix all errors before sending ({} invalid)", errors.len()))
}

fn run<T: Transport>(cli: Cli, transport: T, settings: AppSettings) -> Result<()> {
    let store_path = settings.store_path();
    let store = JsonFileStore::open(&store_path)
        .with_context(|| format!("Failed to open {}", store_path.display()))?;
    let mut session = Session::new(transport, store, &settings);
    debug!("Using store {}", store_path.display());

    match cli.command {
        Command::Ports => {
            let scan = session.refresh_ports().context("Failed to list serial ports")?;
            if scan.ports.is_empty() {
                println!("No serial ports found");
            }
            for port in scan.ports {
                println!(
                    "{}\t{}\t{}:{}",
                    port.path, port.manufacturer, port.vendor_id, port.product_id
                );
            }
        }
        Command::Validate(fields) => {
            fill_form(&mut session, &fields);
            report_form(&session)?;
            println!("OK");
        }
        Command::Encode(fields) => {
            fill_form(&mut session, &fields);
            report_form(&session)?;
            print!("{}", encode_wire_line(&session.form().configuration()?));
        }
        Command::Decode { line } => {
            let config = decode_wire_line(&line).context("Failed to decode line")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            let errors = config.validate();
            if !errors.is_empty() {
                warn!("Decoded configuration is out of range: {}", errors);
            }
        }
        Command::Send { id, name, fields } => {
            match &id {
                Some(id) => {
                    if !fields.is_empty() {
                        bail!("Give either --id or field values, not both");
                    }
                    session.load_record(id)?;
                }
                None => fill_form(&mut session, &fields),
            }
            report_form(&session)?;
            session.connect(cli.port.as_deref()).context("Failed to connect")?;
            let line = session.send_form().context("Failed to send configuration")?;
            print!("{}", line);
            if let Some(name) = name {
                let record = session.save(&name)?;
                println!("Saved as {}", record.id);
            }
            session.disconnect()?;
        }
        Command::Save { name, fields } => {
            fill_form(&mut session, &fields);
            report_form(&session)?;
            let record = session.save(&name)?;
            println!("{}", record.id);
        }
        Command::List => {
            for record in session.library().list()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id,
                    record.name,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.summary()
                );
            }
        }
        Command::Show { id } => {
            let record = session.library().get(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Delete { id } => {
            if !session.library_mut().delete(&id)? {
                bail!("No saved configuration with id {}", id);
            }
        }
        Command::Export { format, output } => {
            let format = match (format, &output) {
                (Some(format), _) => format.into(),
                (None, Some(path)) => ImportFormat::from_path(path),
                (None, None) => ImportFormat::Csv,
            };
            let text = session.library().export(format)?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{}", text),
            }
        }
        Command::Import { path, format, append, replace } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let format = format.map(ImportFormat::from).unwrap_or_else(|| ImportFormat::from_path(&path));
            let mode = match (append, replace, format) {
                (true, _, _) => ImportMode::Append,
                (_, true, _) => ImportMode::Replace,
                (_, _, ImportFormat::Csv) => ImportMode::Append,
                (_, _, ImportFormat::Json) => ImportMode::Replace,
            };
            let count = session
                .library_mut()
                .import(&text, format, mode)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!("Imported {} configurations", count);
        }
        Command::Monitor { count } => {
            session.connect(cli.port.as_deref()).context("Failed to connect")?;
            let mut seen = 0;
            while count.map_or(true, |limit| seen < limit) {
                match session.poll_telemetry()? {
                    Some(timed) => {
                        let s = timed.sample;
                        println!(
                            "{}\t{}\t{}\t{}",
                            timed.received_at.format("%H:%M:%S%.3f"),
                            s.channel1,
                            s.channel2,
                            s.channel3
                        );
                        seen += 1;
                    }
                    None => std::thread::sleep(Duration::from_millis(16)),
                }
            }
            session.disconnect()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings = AppSettings::load_or_default(&get_settings_path());
    if let Some(port) = &cli.port {
        settings.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        settings.serial.baud = baud;
    }
    if cli.seconds {
        settings.time_unit = TimeUnit::Seconds;
    }
    if let Some(store) = &cli.store {
        settings.store_path = Some(store.clone());
    }

    if cli.simulate {
        if cli.port.is_none() {
            settings.serial.port.clear();
        }
        run(cli, SimulatedTransport::new().with_waveform(), settings)
    } else {
        run(cli, SerialTransport::new(), settings)
    }
}
