use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use crate::data::export::ExportOptions;
use crate::data::loader::LoadOptions;

// ---------------------------------------------------------------------------
// Key-value persistence
// ---------------------------------------------------------------------------

/// Synchronous string store backing the persisted settings.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, used when no config directory is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys live in one JSON object file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$MINEWATCH_CONFIG_DIR/settings.json`, else `<config dir>/minewatch/settings.json`.
    pub fn default_location() -> Option<Self> {
        let dir = std::env::var_os("MINEWATCH_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("minewatch")))?;
        Some(Self::new(dir.join("settings.json")))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking every save.
        let mut all = self.read_all().unwrap_or_default();
        all.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&all).context("serialising settings")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

const SETTINGS_KEY: &str = "settings";
const DEFAULT_ACCENT: Color32 = Color32::from_rgb(0x4f, 0x46, 0xe5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    SansSerif,
    Monospace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsOptions {
    pub load: LoadOptions,
    pub export: ExportOptions,
}

/// User preferences. Missing fields in a saved file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub font_family: FontFamily,
    pub font_size: f32,
    pub language: String,
    pub accent_color: String,
    pub high_contrast: bool,
    pub time_format: String,
    /// Minutes without input before the workspace is cleared; 0 disables.
    pub idle_timeout_minutes: u32,
    pub analytics: AnalyticsOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_family: FontFamily::SansSerif,
            font_size: 16.0,
            language: "ru".to_string(),
            accent_color: "#4f46e5".to_string(),
            high_contrast: false,
            time_format: "24".to_string(),
            idle_timeout_minutes: 15,
            analytics: AnalyticsOptions::default(),
        }
    }
}

impl Settings {
    /// Read settings from the store, falling back to defaults on any problem.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::warn!("Could not read settings, using defaults: {e:#}");
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings: {e}");
            Self::default()
        })
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(self).context("serialising settings")?;
        store.set(SETTINGS_KEY, &raw)?;
        log::info!("Settings saved");
        Ok(())
    }

    /// Accent colour from `#rrggbb`; anything else gives the default accent.
    pub fn accent_rgb(&self) -> Color32 {
        parse_hex_color(&self.accent_color).unwrap_or(DEFAULT_ACCENT)
    }

    pub fn zoom_factor(&self) -> f32 {
        (self.font_size / 16.0).clamp(0.5, 2.5)
    }
}

fn parse_hex_color(s: &str) -> Option<Color32> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::export::QuoteStyle;
    use crate::data::model::RaggedRows;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_saved_settings_merge_with_defaults() {
        let mut store = MemoryStore::default();
        store
            .set(SETTINGS_KEY, r#"{"theme":"dark","idle_timeout_minutes":5,"analytics":{"load":{"ragged_rows":"skip"}}}"#)
            .unwrap();

        let settings = Settings::load(&store);
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.idle_timeout_minutes, 5);
        assert_eq!(settings.analytics.load.ragged_rows, RaggedRows::Skip);
        assert_eq!(settings.analytics.load.delimiter, ',');
        assert_eq!(settings.analytics.export.quote_style, QuoteStyle::Rfc4180);
        assert_eq!(settings.language, "ru");
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let mut store = MemoryStore::default();
        store.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn json_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested").join("settings.json"));

        let mut settings = Settings::default();
        settings.accent_color = "#10b981".into();
        settings.analytics.export.quote_style = QuoteStyle::Legacy;
        settings.save(&mut store).unwrap();

        let reopened = JsonFileStore::new(store.path().to_path_buf());
        assert_eq!(Settings::load(&reopened), settings);
    }

    #[test]
    fn accent_color_parsing() {
        let mut settings = Settings::default();
        assert_eq!(settings.accent_rgb(), Color32::from_rgb(0x4f, 0x46, 0xe5));
        settings.accent_color = "#FF8000".into();
        assert_eq!(settings.accent_rgb(), Color32::from_rgb(255, 128, 0));
        settings.accent_color = "orange".into();
        assert_eq!(settings.accent_rgb(), DEFAULT_ACCENT);
    }
}
