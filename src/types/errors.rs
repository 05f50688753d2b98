use std::fmt;

// === SourceError ===

/// Errors returned by the Diigo clients (documented API and interaction API).
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Credentials are missing or blank. Not retried.
    AuthMissing(String),
    /// The interaction API session is no longer valid (it answered with HTML instead of JSON).
    AuthExpired,
    /// The call was rejected with 403. Expected from the bulk endpoints.
    Forbidden,
    /// Server-side failure or unparseable body. Retried by the orchestrator.
    Transient(String),
    /// A local file (session cookies, key file) was not found.
    NotFound(String),
    /// Any other API failure.
    Api(String),
}

impl SourceError {
    /// Returns true for failures the orchestrator waits out and retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::AuthMissing(what) => write!(f, "Diigo credentials missing: {}", what),
            SourceError::AuthExpired => write!(f, "Diigo session expired"),
            SourceError::Forbidden => write!(f, "Diigo refused the request (403 Forbidden)"),
            SourceError::Transient(msg) => write!(f, "Diigo transient error: {}", msg),
            SourceError::NotFound(what) => write!(f, "Diigo resource not found: {}", what),
            SourceError::Api(msg) => write!(f, "Diigo API error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

// === DestinationError ===

/// Errors returned by the Nextcloud Bookmarks client.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationError {
    /// Credentials or instance URL are missing or blank.
    AuthMissing(String),
    /// The instance rejected the credentials.
    Forbidden,
    /// Server-side failure or unparseable body.
    Transient(String),
    /// Folder or bookmark not found.
    NotFound(String),
    /// The API answered with a non-success status.
    Api(String),
}

impl fmt::Display for DestinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationError::AuthMissing(what) => {
                write!(f, "Nextcloud credentials missing: {}", what)
            }
            DestinationError::Forbidden => write!(f, "Nextcloud refused the request"),
            DestinationError::Transient(msg) => write!(f, "Nextcloud transient error: {}", msg),
            DestinationError::NotFound(what) => write!(f, "Nextcloud resource not found: {}", what),
            DestinationError::Api(msg) => write!(f, "Nextcloud API error: {}", msg),
        }
    }
}

impl std::error::Error for DestinationError {}

// === CsvStoreError ===

/// Errors related to the CSV mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvStoreError {
    /// The CSV file does not exist.
    NotFound(String),
    /// The batch lacks required columns for its kind.
    SchemaMismatch(Vec<String>),
    /// A file system error occurred.
    Io(String),
    /// The CSV could not be parsed or written.
    Csv(String),
}

impl fmt::Display for CsvStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvStoreError::NotFound(path) => write!(f, "CSV file not found: {}", path),
            CsvStoreError::SchemaMismatch(missing) => {
                write!(f, "Missing columns: {}", missing.join(", "))
            }
            CsvStoreError::Io(msg) => write!(f, "CSV I/O error: {}", msg),
            CsvStoreError::Csv(msg) => write!(f, "CSV format error: {}", msg),
        }
    }
}

impl std::error::Error for CsvStoreError {}

// === SummarizeError ===

/// Errors related to description generation.
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeError {
    /// The bookmarked page could not be fetched. Carries the HTTP status if there was one.
    Unreachable(Option<u16>),
    /// The model server failed or returned an unusable answer.
    ModelError(String),
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarizeError::Unreachable(Some(status)) => {
                write!(f, "Page unreachable (status {})", status)
            }
            SummarizeError::Unreachable(None) => write!(f, "Page unreachable"),
            SummarizeError::ModelError(msg) => write!(f, "Model error: {}", msg),
        }
    }
}

impl std::error::Error for SummarizeError {}

// === ConfigError ===

/// Errors related to configuration and key files.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config.
    IoError(String),
    /// Failed to serialize or deserialize the config.
    SerializationError(String),
    /// A key file was not found.
    KeyFileNotFound(String),
    /// A config value is invalid.
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::SerializationError(msg) => {
                write!(f, "Config serialization error: {}", msg)
            }
            ConfigError::KeyFileNotFound(path) => write!(f, "Key file {} not found", path),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// === SyncError ===

/// Errors that abort a batch job.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    Source(SourceError),
    Destination(DestinationError),
    Store(CsvStoreError),
    Config(ConfigError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Source(e) => write!(f, "{}", e),
            SyncError::Destination(e) => write!(f, "{}", e),
            SyncError::Store(e) => write!(f, "{}", e),
            SyncError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Source(e) => Some(e),
            SyncError::Destination(e) => Some(e),
            SyncError::Store(e) => Some(e),
            SyncError::Config(e) => Some(e),
        }
    }
}

impl From<SourceError> for SyncError {
    fn from(e: SourceError) -> Self {
        SyncError::Source(e)
    }
}

impl From<DestinationError> for SyncError {
    fn from(e: DestinationError) -> Self {
        SyncError::Destination(e)
    }
}

impl From<CsvStoreError> for SyncError {
    fn from(e: CsvStoreError) -> Self {
        SyncError::Store(e)
    }
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        SyncError::Config(e)
    }
}
