// ncdbookmarks platform paths for Linux
// Config: ~/.config/ncdbookmarks

use std::env;
use std::path::PathBuf;

/// Uses `$XDG_CONFIG_HOME/ncdbookmarks` if set, otherwise `~/.config/ncdbookmarks`.
pub fn get_config_dir() -> PathBuf {
    match env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("ncdbookmarks"),
        _ => super::home_dir().join(".config").join("ncdbookmarks"),
    }
}
