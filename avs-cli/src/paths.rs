//! Configuration file discovery

use std::path::{Path, PathBuf};

use avs_router::CONFIG_FILE_NAME;

/// Directory name under the user's configuration directory
pub const APP_DIR: &str = "avswitch";

/// Default configuration directory
///
/// On Linux and macOS this follows XDG (`$XDG_CONFIG_HOME/avswitch`, falling
/// back to `~/.config/avswitch`). On Windows it is `%APPDATA%\avswitch`.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    }
    #[cfg(not(windows))]
    {
        xdg_config_dir(std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from), dirs::home_dir())
    }
}

/// XDG lookup with the environment passed in
#[cfg_attr(windows, allow(dead_code))]
fn xdg_config_dir(xdg_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg_home
        .filter(|p| p.is_absolute())
        .or_else(|| home.map(|h| h.join(".config")))
        .map(|p| p.join(APP_DIR))
}

/// Pick the configuration file: explicit path first, then the default location
///
/// An explicit directory is treated as containing `config.json`.
pub fn resolve_config(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) if path.is_dir() => Some(path.join(CONFIG_FILE_NAME)),
        Some(path) => Some(path.to_path_buf()),
        None => config_dir().map(|dir| dir.join(CONFIG_FILE_NAME)),
    }
}
