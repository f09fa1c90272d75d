//! Well-known configuration locations.
//!
//! Every helper takes `home` explicitly; only [`home`] consults the
//! environment. Tests always pass a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Directory name of the monitor's own settings under `~/.config`.
pub const APP_HOME_NAME: &str = "yd-tools";
/// File stem of the monitor's settings file.
pub const APP_NAME: &str = "yandex-disk-indicator";
/// Default daemon configuration, relative to the home directory.
pub const DEFAULT_DAEMON_CONFIG: &str = "~/.config/yandex-disk/config.cfg";

/// `<home>/.config/yd-tools/`
pub fn app_config_dir(home: &Path) -> PathBuf {
    home.join(".config").join(APP_HOME_NAME)
}

/// `<home>/.config/yd-tools/yandex-disk-indicator.conf`
pub fn app_settings_path(home: &Path) -> PathBuf {
    app_config_dir(home).join(format!("{APP_NAME}.conf"))
}

/// `<home>/.config/yandex-disk/config.cfg`
pub fn default_daemon_config(home: &Path) -> PathBuf {
    expand_home(DEFAULT_DAEMON_CONFIG, home)
}

/// Replaces a leading `~` with `home`. Other paths are returned as is.
pub fn expand_home(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

/// Current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
