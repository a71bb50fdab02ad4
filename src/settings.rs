use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::navigation::CountdownMode;
use crate::render::Rgb;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdfdeck";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Length of every slide dissolve
    #[serde(default = "default_dissolve_ms")]
    pub dissolve_ms: u64,

    #[serde(default = "default_max_resident_bitmaps")]
    pub max_resident_bitmaps: usize,

    /// Pages on each side of the current slide rendered ahead of time
    #[serde(default = "default_prefetch_radius")]
    pub prefetch_radius: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,

    #[serde(default = "default_slow_tick_ms")]
    pub slow_tick_ms: u64,

    #[serde(default = "default_repeat_delay_ms")]
    pub repeat_delay_ms: u64,

    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,

    #[serde(default)]
    pub countdown_mode: CountdownMode,

    #[serde(default = "default_placeholder_color")]
    pub placeholder_color: Rgb,

    #[serde(default = "default_timer_color")]
    pub timer_color: Rgb,

    #[serde(default = "default_overtime_color")]
    pub overtime_color: Rgb,

    /// Share of the presenter width given to the next-slide thumbnail
    #[serde(default = "default_thumbnail_ratio")]
    pub thumbnail_ratio: f32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_dissolve_ms() -> u64 {
    350
}

fn default_max_resident_bitmaps() -> usize {
    crate::cache::DEFAULT_MAX_RESIDENT
}

fn default_prefetch_radius() -> usize {
    crate::cache::DEFAULT_PREFETCH_RADIUS
}

fn default_workers() -> usize {
    crate::cache::DEFAULT_WORKERS
}

fn default_fast_tick_ms() -> u64 {
    16
}

fn default_slow_tick_ms() -> u64 {
    500
}

fn default_repeat_delay_ms() -> u64 {
    400
}

fn default_repeat_interval_ms() -> u64 {
    100
}

fn default_placeholder_color() -> Rgb {
    Rgb::new(0x2B, 0x30, 0x3B)
}

fn default_timer_color() -> Rgb {
    Rgb::new(0xC0, 0xC5, 0xCE)
}

fn default_overtime_color() -> Rgb {
    Rgb::new(0xEC, 0x5F, 0x67)
}

fn default_thumbnail_ratio() -> f32 {
    0.38
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            dissolve_ms: default_dissolve_ms(),
            max_resident_bitmaps: default_max_resident_bitmaps(),
            prefetch_radius: default_prefetch_radius(),
            workers: default_workers(),
            fast_tick_ms: default_fast_tick_ms(),
            slow_tick_ms: default_slow_tick_ms(),
            repeat_delay_ms: default_repeat_delay_ms(),
            repeat_interval_ms: default_repeat_interval_ms(),
            countdown_mode: CountdownMode::default(),
            placeholder_color: default_placeholder_color(),
            timer_color: default_timer_color(),
            overtime_color: default_overtime_color(),
            thumbnail_ratio: default_thumbnail_ratio(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path` (or the default location).
///
/// A missing file is created with defaults. Unreadable or malformed files
/// are logged and defaults are used; configuration never stops the show.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using default settings");
                return Settings::default();
            }
        },
    };

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_file(&settings, &path);
        return settings;
    }

    load_settings_from_path(&path).unwrap_or_default()
}

fn load_settings_from_path(path: &Path) -> Option<Settings> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                Some(settings)
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                None
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Version 0 files predate the thumbnail setting and stored it as a percentage.
    if settings.version == 0 && settings.thumbnail_ratio > 1.0 {
        settings.thumbnail_ratio /= 100.0;
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
        && let Err(e) = fs::create_dir_all(parent)
    {
        error!("Failed to create config directory {parent:?}: {e}");
        return;
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdfdeck settings
# ============================================================================
# Times are in milliseconds. Colours are hex RRGGBB.
# countdown_mode: "down" shows time left, "up" shows time spent.
# Command line flags (--dissolve-ms, --count-up) override these values.

"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let settings = load_settings(Some(&path));
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let reloaded = load_settings(Some(&path));
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 1\ndissolve_ms: 0\ncountdown_mode: up\ntimer_color: \"#00FF00\"\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.dissolve_ms, 0);
        assert_eq!(settings.countdown_mode, CountdownMode::Up);
        assert_eq!(settings.timer_color, Rgb::new(0, 0xFF, 0));
        assert_eq!(settings.workers, default_workers());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "dissolve_ms: [not a number\n").unwrap();

        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn old_versions_are_migrated_and_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\nthumbnail_ratio: 40\n").unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.version, CURRENT_VERSION);
        assert!((settings.thumbnail_ratio - 0.4).abs() < 1e-6);

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("version: 1"));
    }
}
