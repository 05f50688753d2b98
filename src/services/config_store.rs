// Config store
// Loads and saves the YAML configuration and reads secrets from key files.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::platform;
use crate::types::config::SyncConfig;
use crate::types::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Trait defining the config store interface.
pub trait ConfigStoreTrait {
    fn load(&mut self) -> Result<SyncConfig, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn create_default(&mut self) -> Result<bool, ConfigError>;
    fn set_config(&mut self, config: SyncConfig);
    fn get_config_path(&self) -> &Path;
}

/// Config store persisting `SyncConfig` as YAML on disk.
pub struct ConfigStore {
    config_path: PathBuf,
    config: SyncConfig,
}

impl ConfigStore {
    /// Creates a new ConfigStore.
    ///
    /// If `path_override` is `Some`, uses that path (a leading `~` is expanded).
    /// Otherwise, uses `config.yaml` in the platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => platform::expand_home(&p),
            None => platform::get_config_dir().join(CONFIG_FILE_NAME),
        };
        Self::at(config_path)
    }

    /// Creates a ConfigStore for an already resolved path.
    pub fn at(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: SyncConfig::default(),
        }
    }
}

impl ConfigStoreTrait for ConfigStore {
    /// Loads the config file. A missing file yields the defaults.
    fn load(&mut self) -> Result<SyncConfig, ConfigError> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            self.config = SyncConfig::default();
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        let mut config: SyncConfig = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        validate(&config)?;
        resolve_key_files(&mut config)?;

        self.config = config;
        Ok(self.config.clone())
    }

    /// Saves the current config, creating parent directories if needed.
    fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let yaml = serde_yaml::to_string(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&self.config_path, yaml)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))?;
        restrict_permissions(&self.config_path)?;

        Ok(())
    }

    /// Writes the default config if no file exists yet. Returns whether it did.
    fn create_default(&mut self) -> Result<bool, ConfigError> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.set_config(SyncConfig::default());
        self.save()?;
        tracing::info!(path = %self.config_path.display(), "wrote default config");
        Ok(true)
    }

    fn set_config(&mut self, config: SyncConfig) {
        self.config = config;
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}

fn validate(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.diigo_batch_size == 0 {
        return Err(ConfigError::InvalidValue("diigo_batch_size must be positive".to_string()));
    }
    if config.nc_batch_size == 0 {
        return Err(ConfigError::InvalidValue("nc_batch_size must be positive".to_string()));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| ConfigError::IoError(format!("Failed to restrict config permissions: {}", e)))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

/// Reads a secret from a key file, trimming surrounding whitespace.
pub fn read_key_file(path: &str) -> Result<Zeroizing<String>, ConfigError> {
    let path = platform::expand_home(path);
    if !path.exists() {
        return Err(ConfigError::KeyFileNotFound(path.display().to_string()));
    }
    let content = Zeroizing::new(
        fs::read_to_string(&path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read key file: {}", e)))?,
    );
    Ok(Zeroizing::new(content.trim().to_string()))
}

/// Fills a blank Nextcloud password from its key file.
pub fn resolve_key_files(config: &mut SyncConfig) -> Result<(), ConfigError> {
    let nc = &mut config.nc_bookmarks;
    if nc.password.trim().is_empty() && !nc.password_file.trim().is_empty() {
        let key = read_key_file(&nc.password_file)?;
        nc.password = key.as_str().to_string();
    }
    Ok(())
}

/// Names of the credential fields that are blank.
pub fn missing_credentials(config: &SyncConfig) -> Vec<&'static str> {
    let checks = [
        ("diigo.user", config.diigo.user.as_str()),
        ("diigo.password", config.diigo.password.as_str()),
        ("diigo.apikey", config.diigo.apikey.as_str()),
        ("nc_bookmarks.user", config.nc_bookmarks.user.as_str()),
        ("nc_bookmarks.password", config.nc_bookmarks.password.as_str()),
        ("nc_bookmarks.nc_url", config.nc_bookmarks.nc_url.as_str()),
    ];
    checks
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}
