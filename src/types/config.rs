use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Top-level configuration, stored as `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub diigo: DiigoCredentials,
    pub nc_bookmarks: NextcloudCredentials,
    pub diigo_dump_path: String,
    pub nc_dump_path: String,
    pub diigo_batch_size: u32,
    pub nc_batch_size: u32,
    pub session_path: String,
    pub ollama: OllamaSettings,
    pub folders: FolderNames,
    pub retry: RetrySettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            diigo: DiigoCredentials::default(),
            nc_bookmarks: NextcloudCredentials::default(),
            diigo_dump_path: "~/.ncdbookmarks/diigo_dump.csv".to_string(),
            nc_dump_path: "~/.ncdbookmarks/nc_dump.csv".to_string(),
            diigo_batch_size: 100,
            nc_batch_size: 100,
            session_path: "~/.ncdbookmarks/session_cookies.yaml".to_string(),
            ollama: OllamaSettings::default(),
            folders: FolderNames::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// Diigo login: HTTP basic auth plus the API key for the documented API.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct DiigoCredentials {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub apikey: String,
}

impl std::fmt::Debug for DiigoCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiigoCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("apikey", &"***")
            .finish()
    }
}

/// Nextcloud login: an app password is recommended.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct NextcloudCredentials {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Key file holding the password; read when `password` is blank.
    #[serde(default)]
    pub password_file: String,
    #[serde(default)]
    pub nc_url: String,
}

impl std::fmt::Debug for NextcloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextcloudCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("password_file", &self.password_file)
            .field("nc_url", &self.nc_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaSettings {
    pub model: String,
    pub url: String,
    pub temperature: f32,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            model: "aya".to_string(),
            url: "http://localhost:11434".to_string(),
            temperature: 0.3,
        }
    }
}

/// Names of the Nextcloud folders the importer files bookmarks into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FolderNames {
    pub diigo: String,
    pub unread: String,
    pub private: String,
    pub unreachable: String,
}

impl Default for FolderNames {
    fn default() -> Self {
        Self {
            diigo: "DIIGO".to_string(),
            unread: "LESEN".to_string(),
            private: "PRIVAT".to_string(),
            unreachable: "Abgelaufen".to_string(),
        }
    }
}

/// Wait times for the two retry policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Cooldown before re-issuing a failed list or bulk delete. Retried without limit.
    pub cooldown_secs: u64,
    /// Delay before retrying a single-item delete.
    pub single_retry_delay_secs: u64,
    /// How often a single-item delete is retried before the record is skipped.
    pub single_retry_attempts: u32,
    /// Pause between single-item deletes.
    pub delete_pause_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            single_retry_delay_secs: 60,
            single_retry_attempts: 1,
            delete_pause_secs: 2,
        }
    }
}

impl RetrySettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn single_retry_delay(&self) -> Duration {
        Duration::from_secs(self.single_retry_delay_secs)
    }

    pub fn delete_pause(&self) -> Duration {
        Duration::from_secs(self.delete_pause_secs)
    }
}
