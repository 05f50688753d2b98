// ncdbookmarks platform paths for macOS
// Config: ~/Library/Application Support/ncdbookmarks

use std::path::PathBuf;

pub fn get_config_dir() -> PathBuf {
    super::home_dir()
        .join("Library")
        .join("Application Support")
        .join("ncdbookmarks")
}
