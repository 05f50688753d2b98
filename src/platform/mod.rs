// ncdbookmarks platform abstraction
// Resolves the configuration directory per OS and expands `~` in configured paths.
//
// Uses `cfg(target_os)` for conditional compilation to select the correct
// platform-specific implementation at compile time.

use std::env;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Directory used by earlier releases. Preferred when it exists.
pub const LEGACY_DIR: &str = "~/.ncdbookmarks";

/// Returns the configuration directory: `~/.ncdbookmarks` if present, else
/// the platform-specific one.
///
/// - **Linux**: `~/.config/ncdbookmarks` (or `$XDG_CONFIG_HOME/ncdbookmarks`)
/// - **macOS**: `~/Library/Application Support/ncdbookmarks`
/// - **Windows**: `%APPDATA%/ncdbookmarks`
pub fn get_config_dir() -> PathBuf {
    let legacy = expand_home(LEGACY_DIR);
    if legacy.is_dir() {
        return legacy;
    }
    platform_config_dir()
}

fn platform_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Returns the user's home directory.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
