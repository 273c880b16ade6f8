//! Persisted settings
//!
//! A flat JSON object on disk with an in-memory cache. `load` only touches
//! the filesystem when forced or uninitialized; `update` merges a patch into
//! the cache and writes through atomically. A missing or malformed file is
//! never an error for the caller, it just means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::behavior::BehaviorMode;
use crate::constants::{paths, scale};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetConfig {
    /// Index into [`scale::SCALE_OPTIONS`]
    #[serde(default = "default_scale_index")]
    pub scale_index: usize,

    /// Index into [`scale::OPACITY_OPTIONS`]
    #[serde(default = "default_opacity_index")]
    pub opacity_index: usize,

    /// Movement speed multiplier applied on top of the per-state multipliers
    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default)]
    pub auto_startup: bool,

    #[serde(default)]
    pub follow_mouse: bool,

    #[serde(default = "default_click_through")]
    pub click_through: bool,

    #[serde(default)]
    pub behavior_mode: BehaviorMode,
}

fn default_scale_index() -> usize {
    scale::DEFAULT_SCALE_INDEX
}

fn default_opacity_index() -> usize {
    scale::DEFAULT_OPACITY_INDEX
}

fn default_speed() -> f32 {
    1.0
}

fn default_click_through() -> bool {
    true
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            scale_index: default_scale_index(),
            opacity_index: default_opacity_index(),
            speed: default_speed(),
            auto_startup: false,
            follow_mouse: false,
            click_through: default_click_through(),
            behavior_mode: BehaviorMode::default(),
        }
    }
}

impl PetConfig {
    /// Scale factor selected by `scale_index`; out-of-range indices fall back
    /// to the default step rather than panicking.
    pub fn scale(&self) -> f32 {
        scale::SCALE_OPTIONS
            .get(self.scale_index)
            .copied()
            .unwrap_or(scale::SCALE_OPTIONS[scale::DEFAULT_SCALE_INDEX])
    }

    /// Window opacity selected by `opacity_index`
    pub fn opacity(&self) -> f32 {
        scale::OPACITY_OPTIONS
            .get(self.opacity_index)
            .copied()
            .unwrap_or(scale::OPACITY_OPTIONS[scale::DEFAULT_OPACITY_INDEX])
    }

    /// Clamp values a hand-edited file may have pushed out of range
    fn validate_and_clamp(&mut self) {
        if self.scale_index >= scale::SCALE_OPTIONS.len() {
            warn!(scale_index = self.scale_index, "scale_index out of range, using default");
            self.scale_index = scale::DEFAULT_SCALE_INDEX;
        }
        if self.opacity_index >= scale::OPACITY_OPTIONS.len() {
            warn!(opacity_index = self.opacity_index, "opacity_index out of range, using default");
            self.opacity_index = scale::DEFAULT_OPACITY_INDEX;
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            warn!(speed = self.speed, "speed not a positive number, using 1.0");
            self.speed = default_speed();
        } else if self.speed > 10.0 {
            warn!(speed = self.speed, "speed exceeds maximum, clamping to 10.0");
            self.speed = 10.0;
        }
    }
}

/// Partial update merged into the cached config by [`ConfigStore::update`].
/// Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub scale_index: Option<usize>,
    pub opacity_index: Option<usize>,
    pub speed: Option<f32>,
    pub auto_startup: Option<bool>,
    pub follow_mouse: Option<bool>,
    pub click_through: Option<bool>,
    pub behavior_mode: Option<BehaviorMode>,
}

impl ConfigPatch {
    fn apply(&self, config: &mut PetConfig) {
        if let Some(v) = self.scale_index {
            config.scale_index = v;
        }
        if let Some(v) = self.opacity_index {
            config.opacity_index = v;
        }
        if let Some(v) = self.speed {
            config.speed = v;
        }
        if let Some(v) = self.auto_startup {
            config.auto_startup = v;
        }
        if let Some(v) = self.follow_mouse {
            config.follow_mouse = v;
        }
        if let Some(v) = self.click_through {
            config.click_through = v;
        }
        if let Some(v) = self.behavior_mode {
            config.behavior_mode = v;
        }
    }
}

/// Handle to the persisted config. Constructed once and passed around;
/// the tick loop is the single writer.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cache: Option<PetConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, cache: None }
    }

    /// Store rooted at the dirs-resolved user config directory
    pub fn at_default_path() -> Self {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::CONFIG_FILENAME);
        Self::new(path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Return the cached config, reading from disk only when forced or on
    /// first use. Read and parse failures substitute defaults.
    pub fn load(&mut self, force_refresh: bool) -> PetConfig {
        if !force_refresh
            && let Some(cached) = &self.cache
        {
            return cached.clone();
        }

        let mut config = match self.read_from_disk() {
            Ok(config) => config,
            Err(ConfigError::Io { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                PetConfig::default()
            }
            Err(err) => {
                warn!(error = %err, "config unreadable, using defaults");
                PetConfig::default()
            }
        };
        config.validate_and_clamp();
        self.cache = Some(config.clone());
        config
    }

    /// Merge `patch` into the cache and write the result through to disk.
    /// The cache is updated even when the write fails, so the running
    /// process keeps the requested settings.
    pub fn update(&mut self, patch: ConfigPatch) -> Result<PetConfig, ConfigError> {
        let mut config = self.load(false);
        patch.apply(&mut config);
        config.validate_and_clamp();
        self.cache = Some(config.clone());
        self.write_to_disk(&config)?;
        Ok(config)
    }

    /// Drop the cache so the next `load` rereads the file
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    fn read_from_disk(&self) -> Result<PetConfig, ConfigError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write via a temp file in the same directory plus rename, so readers
    /// never observe a partially written config.
    fn write_to_disk(&self, config: &PetConfig) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_string_pretty(config).expect("config serializes");
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        info!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join(paths::CONFIG_FILENAME))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.load(false), PetConfig::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), "{not json at all").unwrap();
        assert_eq!(store.load(true), PetConfig::default());
    }

    #[test]
    fn load_without_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let first = store.load(false);
        let second = store.load(false);
        assert_eq!(first, second);
    }

    #[test]
    fn cached_load_ignores_disk_changes_until_forced() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.load(false);
        fs::write(store.path(), r#"{"scale_index": 7}"#).unwrap();

        assert_eq!(store.load(false).scale_index, scale::DEFAULT_SCALE_INDEX);
        assert_eq!(store.load(true).scale_index, 7);
    }

    #[test]
    fn update_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .update(ConfigPatch {
                scale_index: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.load(true).scale_index, 3);

        // A fresh store over the same file sees the written value too
        let mut fresh = ConfigStore::new(store.path().clone());
        assert_eq!(fresh.load(false).scale_index, 3);
    }

    #[test]
    fn update_preserves_unpatched_fields() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .update(ConfigPatch {
                follow_mouse: Some(true),
                ..Default::default()
            })
            .unwrap();
        let config = store
            .update(ConfigPatch {
                opacity_index: Some(2),
                ..Default::default()
            })
            .unwrap();

        assert!(config.follow_mouse);
        assert_eq!(config.opacity_index, 2);
        assert_eq!(config.scale_index, scale::DEFAULT_SCALE_INDEX);
    }

    #[test]
    fn partial_file_fills_missing_keys_with_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        fs::write(store.path(), r#"{"follow_mouse": true}"#).unwrap();

        let config = store.load(true);
        assert!(config.follow_mouse);
        assert!(config.click_through);
        assert_eq!(config.speed, 1.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"scale_index": 99, "opacity_index": 99, "speed": -4.0}"#,
        )
        .unwrap();

        let config = store.load(true);
        assert_eq!(config.scale_index, scale::DEFAULT_SCALE_INDEX);
        assert_eq!(config.opacity_index, scale::DEFAULT_OPACITY_INDEX);
        assert_eq!(config.speed, 1.0);
    }

    #[test]
    fn behavior_mode_round_trips_as_lowercase_string() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .update(ConfigPatch {
                behavior_mode: Some(BehaviorMode::Clingy),
                ..Default::default()
            })
            .unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(r#""behavior_mode": "clingy""#));
        assert_eq!(store.load(true).behavior_mode, BehaviorMode::Clingy);
    }
}
