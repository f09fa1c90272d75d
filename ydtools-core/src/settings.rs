//! The monitor's own settings file.
//!
//! Stored in the same `key="value"` format as the daemon configuration, at
//! [`paths::app_settings_path`]. Missing keys are filled with defaults on
//! load, which marks the store changed so the first run writes a full file.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths::{self, expand_home};
use crate::store::{ConfigStore, Value};
use crate::value_set::ValueSet;

pub const KEY_NOTIFICATIONS: &str = "notifications";
pub const KEY_THEME: &str = "theme";
pub const KEY_FM_EXTENSIONS: &str = "fmextensions";
pub const KEY_AUTOSTART: &str = "autostart";
pub const KEY_DAEMONS: &str = "daemons";

#[derive(Debug, Clone)]
pub struct AppSettings {
    store: ConfigStore,
    first_run: bool,
}

impl AppSettings {
    /// Loads the settings under `home`, filling in defaults.
    pub fn load(home: &Path) -> Self {
        Self::load_from(paths::app_settings_path(home))
    }

    /// Loads the settings at an explicit path.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let mut store = ConfigStore::new(path);
        let first_run = store.load().is_err();
        if first_run {
            tracing::info!(path = %store.path().display(), "no settings yet, using defaults");
        }

        let before = store.len();
        store.set_default(KEY_NOTIFICATIONS, true);
        store.set_default(KEY_THEME, false);
        store.set_default(KEY_FM_EXTENSIONS, true);
        store.set_default(KEY_AUTOSTART, false);
        store.set_default(KEY_DAEMONS, paths::DEFAULT_DAEMON_CONFIG);
        if store.len() != before {
            store.mark_changed();
        }

        Self { store, first_run }
    }

    /// `true` when no settings file existed before this load.
    pub fn first_run(&self) -> bool {
        self.first_run
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn changed(&self) -> bool {
        self.store.changed()
    }

    pub fn notifications(&self) -> bool {
        self.flag(KEY_NOTIFICATIONS, true)
    }

    pub fn theme(&self) -> bool {
        self.flag(KEY_THEME, false)
    }

    pub fn fm_extensions(&self) -> bool {
        self.flag(KEY_FM_EXTENSIONS, true)
    }

    pub fn autostart(&self) -> bool {
        self.flag(KEY_AUTOSTART, false)
    }

    pub fn set_flag(&mut self, key: &str, on: bool) {
        if self.store.get_bool(key) != Some(on) {
            self.store.set(key, on);
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.store.get_bool(key).unwrap_or(default)
    }

    /// Configured daemon config paths as written (unexpanded).
    pub fn daemon_entries(&self) -> Vec<String> {
        self.store
            .get(KEY_DAEMONS)
            .map(|set| set.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Configured daemon config paths with `~` expanded.
    pub fn daemons(&self, home: &Path) -> Vec<PathBuf> {
        self.daemon_entries()
            .iter()
            .map(|raw| expand_home(raw, home))
            .collect()
    }

    /// Adds a daemon config path. Returns `false` when it was already listed.
    pub fn add_daemon(&mut self, raw: &str) -> bool {
        let mut set = self.daemon_set();
        let value = Value::from(raw);
        if set.contains(&value) {
            return false;
        }
        set.add(value);
        self.store.set(KEY_DAEMONS, set);
        true
    }

    /// Removes a daemon config path. Returns `false` when it was not listed.
    pub fn remove_daemon(&mut self, raw: &str) -> bool {
        let mut set = self.daemon_set();
        let value = Value::from(raw);
        if !set.contains(&value) {
            return false;
        }
        set.remove(&value);
        self.store.set(KEY_DAEMONS, set);
        true
    }

    fn daemon_set(&self) -> ValueSet<Value> {
        self.store.get(KEY_DAEMONS).cloned().unwrap_or_default()
    }

    /// Saves when anything changed since load or the last save.
    pub fn save_if_changed(&mut self) -> Result<bool, ConfigError> {
        if !self.store.changed() {
            return Ok(false);
        }
        self.store.save()?;
        Ok(true)
    }
}
