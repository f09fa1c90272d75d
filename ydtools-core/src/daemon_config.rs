//! The sync daemon's own `config.cfg`, seen through the monitor.
//!
//! The daemon writes `dir`, `auth` and friends itself; the monitor only
//! manages the keys below. `read-only` and `overwrite` are flags spelled as
//! empty-string sentinels (`read-only=""`). The two `...indicator` keys are
//! monitor extensions the daemon ignores.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths::expand_home;
use crate::store::{ConfigFormat, ConfigStore, Value};
use crate::value_set::ValueSet;

pub const KEY_DIR: &str = "dir";
pub const KEY_AUTH: &str = "auth";
pub const KEY_READ_ONLY: &str = "read-only";
pub const KEY_OVERWRITE: &str = "overwrite";
pub const KEY_START_ON_START: &str = "startonstartofindicator";
pub const KEY_STOP_ON_EXIT: &str = "stoponexitfromindicator";
pub const KEY_EXCLUDE_DIRS: &str = "exclude-dirs";

/// Typed view over the daemon configuration file.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    store: ConfigStore,
    pub read_only: bool,
    /// Only meaningful together with `read_only`.
    pub overwrite: bool,
    /// Start the daemon when monitoring begins.
    pub start_on_start: bool,
    /// Stop the daemon when monitoring ends.
    pub stop_on_exit: bool,
    pub exclude_dirs: ValueSet<String>,
}

impl DaemonConfig {
    /// Unloaded config bound to `path`, with defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: ConfigStore::new(path),
            read_only: false,
            overwrite: false,
            start_on_start: true,
            stop_on_exit: false,
            exclude_dirs: ValueSet::new(),
        }
    }

    /// Config bound to `path` and loaded; read failures keep the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(path);
        let _ = config.load();
        config
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Raw store with every key from the file.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Synced directory as written by the daemon (unexpanded).
    pub fn dir(&self) -> Option<&str> {
        self.store.get_text(KEY_DIR).filter(|d| !d.is_empty())
    }

    /// Credentials file as written by the daemon (unexpanded).
    pub fn auth(&self) -> Option<&str> {
        self.store.get_text(KEY_AUTH).filter(|a| !a.is_empty())
    }

    /// Synced directory with `~` expanded against `home`.
    pub fn dir_path(&self, home: &Path) -> Option<PathBuf> {
        self.dir().map(|d| expand_home(d, home))
    }

    /// `true` when the file loaded and both `dir` and `auth` exist on disk.
    pub fn is_configured(&self, home: &Path) -> bool {
        let exists = |raw: Option<&str>| raw.map(|r| expand_home(r, home).exists()).unwrap_or(false);
        self.store.read_success() && exists(self.dir()) && exists(self.auth())
    }

    /// Reads the file and derives the typed fields.
    ///
    /// On failure the fields keep their defaults and the error is returned.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        self.store.load()?;

        let is_sentinel = |key: &str| self.store.get_text(key) == Some("");
        self.read_only = is_sentinel(KEY_READ_ONLY);
        self.overwrite = is_sentinel(KEY_OVERWRITE);
        self.start_on_start = self.store.get_bool(KEY_START_ON_START).unwrap_or(true);
        self.stop_on_exit = self.store.get_bool(KEY_STOP_ON_EXIT).unwrap_or(false);
        self.exclude_dirs = self.parse_exclude_dirs();
        Ok(())
    }

    // Items are directory names: no boolean decoding. A quoted `"a,b,c"`
    // arrives as one item and needs a second pass.
    fn parse_exclude_dirs(&self) -> ValueSet<String> {
        let Some(raw) = self.store.raw_value(KEY_EXCLUDE_DIRS) else {
            return ValueSet::new();
        };
        let format = ConfigFormat::text_only();
        let Some(mut values) = format.parse_values(raw) else {
            return ValueSet::new();
        };
        let split = values
            .as_single()
            .and_then(|joined| format.parse_values(&joined.to_string()));
        if let Some(split) = split {
            values = split;
        }
        values.iter().map(ToString::to_string).collect()
    }

    /// Writes the managed keys back into the daemon's file.
    ///
    /// Only managed keys are touched; `overwrite` is written only together
    /// with `read_only`.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let sentinel = |on: bool| -> ValueSet<Value> {
            if on {
                ValueSet::single(Value::from(""))
            } else {
                ValueSet::new()
            }
        };

        let mut file = ConfigStore::new(self.store.path());
        file.set(KEY_READ_ONLY, sentinel(self.read_only));
        file.set(KEY_OVERWRITE, sentinel(self.overwrite && self.read_only));
        file.set(KEY_START_ON_START, self.start_on_start);
        file.set(KEY_STOP_ON_EXIT, self.stop_on_exit);
        let excluded: ValueSet<Value> = if self.exclude_dirs.is_empty() {
            ValueSet::new()
        } else {
            let joined: Vec<&str> = self.exclude_dirs.iter().map(String::as_str).collect();
            ValueSet::single(Value::from(joined.join(", ")))
        };
        file.set(KEY_EXCLUDE_DIRS, excluded);
        file.save()?;

        self.store.load()?;
        Ok(())
    }
}
