//! User settings, kept as JSON next to the saved configurations.

use crate::config::TimeUnit;
use crate::derive::DerivationRules;
use crate::error::StoreError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "lumicfg";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SerialSettings {
    /// Empty means "pick the first port found".
    pub port: String,
    pub baud: u32,
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self { port: String::new(), baud: 9600, timeout_ms: 50 }
    }
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub serial: SerialSettings,
    pub time_unit: TimeUnit,
    pub lock_timing_on_force: bool,
    pub store_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            time_unit: TimeUnit::Milliseconds,
            lock_timing_on_force: true,
            store_path: None,
        }
    }
}

impl AppSettings {
    pub fn rules(&self) -> DerivationRules {
        DerivationRules { lock_timing_on_force: self.lock_timing_on_force }
    }

    /// Where saved configurations live, unless overridden.
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| config_dir().join("store.json"))
    }

    /// Read settings from `path`. A missing or broken file yields defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        let loaded = File::open(path).map_err(|e| e.to_string()).and_then(|f| {
            serde_json::from_reader::<_, AppSettings>(BufReader::new(f)).map_err(|e| e.to_string())
        });
        match loaded {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

pub fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    ensure_dir(path)
}

/// Create `path` if needed. A failure is only logged; the first write into
/// it will report the real error.
fn ensure_dir(path: PathBuf) -> PathBuf {
    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(&path) {
            warn!("Failed to create {}: {}", path.display(), e);
        }
    }
    path
}

pub fn get_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncreatable_config_dir_is_returned_anyway() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, "").unwrap();

        let wanted = file.join("sub");
        assert_eq!(ensure_dir(wanted.clone()), wanted);
        assert!(!wanted.exists());

        let fresh = dir.path().join("a").join("b");
        assert_eq!(ensure_dir(fresh.clone()), fresh);
        assert!(fresh.is_dir());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_or_default(&dir.path().join("nope.json"));
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.serial.baud, 9600);
        assert!(settings.rules().lock_timing_on_force);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"serial": {"port": "/dev/ttyACM0"}, "time_unit": "s"}"#).unwrap();

        let settings = AppSettings::load_or_default(&path);
        assert_eq!(settings.serial.port, "/dev/ttyACM0");
        assert_eq!(settings.serial.baud, 9600);
        assert_eq!(settings.serial.timeout(), Duration::from_millis(50));
        assert_eq!(settings.time_unit, TimeUnit::Seconds);
    }

    #[test]
    fn broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppSettings::load_or_default(&path), AppSettings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("settings.json");
        let settings = AppSettings {
            serial: SerialSettings { port: "COM7".into(), baud: 115200, timeout_ms: 100 },
            time_unit: TimeUnit::Seconds,
            lock_timing_on_force: false,
            store_path: Some(dir.path().join("configs.json")),
        };
        settings.save(&path).unwrap();
        assert_eq!(AppSettings::load_or_default(&path), settings);
        assert_eq!(settings.store_path(), dir.path().join("configs.json"));
    }
}
