//! App Core for ncdbookmarks.
//!
//! Loads the configuration once and builds the concrete clients each batch job
//! needs. Jobs borrow their clients, so every job method creates them on demand.

use std::path::{Path, PathBuf};

use crate::managers::batch_orchestrator::{
    BatchOrchestrator, ExportOptions, ExportReport, JobSettings, PrivatizeReport, UploadReport,
};
use crate::managers::csv_store::{CsvStore, CsvStoreTrait, CsvSummary};
use crate::managers::destination_jobs::{DestinationJobs, ImproveReport};
use crate::platform;
use crate::services::config_store::{self, ConfigStore, ConfigStoreTrait};
use crate::services::destination_client::NextcloudClient;
use crate::services::normalizer::tag_frequencies;
use crate::services::progress::ConsoleProgress;
use crate::services::retry::ThreadSleeper;
use crate::services::session::CookieFileSession;
use crate::services::source_client::{DiigoClient, SourceClientTrait};
use crate::services::summarizer::OllamaSummarizer;
use crate::types::bookmark::SourceItem;
use crate::types::config::SyncConfig;
use crate::types::errors::{ConfigError, DestinationError, SourceError, SyncError};

/// Central application struct: configuration plus the shared CSV store.
pub struct App {
    pub config: SyncConfig,
    pub settings: JobSettings,
    pub store: CsvStore,
    config_path: PathBuf,
}

impl App {
    /// Loads the configuration from `config_override` or the default location.
    pub fn new(config_override: Option<String>) -> Result<Self, SyncError> {
        let mut config_store = ConfigStore::new(config_override);
        let config = config_store.load()?;
        let config_path = config_store.get_config_path().to_path_buf();
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self::with_config(config, config_path))
    }

    pub fn with_config(config: SyncConfig, config_path: PathBuf) -> Self {
        let settings = JobSettings::from_config(&config);
        Self {
            config,
            settings,
            store: CsvStore::new(),
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Writes a default config file at the config path if there is none.
    pub fn init_config(&self) -> Result<bool, SyncError> {
        Ok(ConfigStore::at(self.config_path.clone()).create_default()?)
    }

    /// Credential fields still blank in the loaded configuration.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        config_store::missing_credentials(&self.config)
    }

    pub fn source_client(&self) -> Result<DiigoClient, SourceError> {
        let sessions = CookieFileSession::new(platform::expand_home(&self.config.session_path));
        DiigoClient::new(&self.config.diigo, Box::new(sessions))
    }

    pub fn destination_client(&self) -> Result<NextcloudClient, DestinationError> {
        NextcloudClient::new(&self.config.nc_bookmarks)
    }

    pub fn summarizer(&self) -> Result<OllamaSummarizer, SyncError> {
        OllamaSummarizer::new(self.config.ollama.clone())
            .map_err(|e| SyncError::from(ConfigError::InvalidValue(format!("Ollama client: {}", e))))
    }

    /// Export from Diigo, optionally recreating in Nextcloud and deleting from Diigo.
    pub fn export(&self, options: ExportOptions) -> Result<ExportReport, SyncError> {
        let mut source = self.source_client()?;
        let mut progress = ConsoleProgress::new();
        let sleeper = ThreadSleeper;
        let mut destination = if options.recreate {
            Some(self.destination_client()?)
        } else {
            None
        };
        let mut summarizer = if options.use_llm {
            Some(self.summarizer()?)
        } else {
            None
        };

        let mut orchestrator = BatchOrchestrator::new(
            &mut source,
            &self.store,
            &sleeper,
            &mut progress,
            self.settings.clone(),
        );
        if let Some(destination) = destination.as_mut() {
            orchestrator = orchestrator.with_destination(destination);
        }
        if let Some(summarizer) = summarizer.as_mut() {
            orchestrator = orchestrator.with_summarizer(summarizer);
        }
        orchestrator.export_delete(options)
    }

    pub fn privatize(&self) -> Result<PrivatizeReport, SyncError> {
        let mut source = self.source_client()?;
        let mut progress = ConsoleProgress::new();
        let sleeper = ThreadSleeper;
        BatchOrchestrator::new(&mut source, &self.store, &sleeper, &mut progress, self.settings.clone())
            .privatize()
    }

    /// Export and delete through the documented API.
    pub fn export_delete_documented(&self) -> Result<ExportReport, SyncError> {
        let mut source = self.source_client()?;
        let mut progress = ConsoleProgress::new();
        let sleeper = ThreadSleeper;
        BatchOrchestrator::new(&mut source, &self.store, &sleeper, &mut progress, self.settings.clone())
            .export_delete_documented()
    }

    /// Writes a Diigo CSV back to Diigo.
    pub fn upload_to_diigo(&self, path: &Path) -> Result<UploadReport, SyncError> {
        let mut source = self.source_client()?;
        let mut progress = ConsoleProgress::new();
        let sleeper = ThreadSleeper;
        BatchOrchestrator::new(&mut source, &self.store, &sleeper, &mut progress, self.settings.clone())
            .upload_csv(path)
    }

    /// Dumps Nextcloud to the configured destination CSV.
    pub fn nc_dump(&self) -> Result<usize, SyncError> {
        let mut destination = self.destination_client()?;
        let mut progress = ConsoleProgress::new();
        DestinationJobs::new(&mut destination, &self.store, &mut progress, self.settings.clone())
            .dump(&self.settings.nc_dump_path)
    }

    /// Reconciles a Diigo CSV into Nextcloud.
    pub fn nc_upload(&self, path: &Path, use_llm: bool) -> Result<ExportReport, SyncError> {
        let mut destination = self.destination_client()?;
        let mut progress = ConsoleProgress::new();
        let mut summarizer = if use_llm { Some(self.summarizer()?) } else { None };
        let mut jobs =
            DestinationJobs::new(&mut destination, &self.store, &mut progress, self.settings.clone());
        if let Some(summarizer) = summarizer.as_mut() {
            jobs = jobs.with_summarizer(summarizer);
        }
        jobs.upload(path)
    }

    pub fn improve_descriptions(&self) -> Result<ImproveReport, SyncError> {
        let mut destination = self.destination_client()?;
        let mut summarizer = self.summarizer()?;
        let mut progress = ConsoleProgress::new();
        DestinationJobs::new(&mut destination, &self.store, &mut progress, self.settings.clone())
            .with_summarizer(&mut summarizer)
            .improve_descriptions()
    }

    /// Tag counts over a CSV file, most frequent first.
    pub fn tag_tally(&self, path: &Path) -> Result<Vec<(String, usize)>, SyncError> {
        let records = self.store.load(path)?.to_records();
        Ok(tag_frequencies(&records))
    }

    pub fn inspect(&self, path: &Path) -> Result<CsvSummary, SyncError> {
        Ok(self.store.inspect(path)?)
    }

    /// Full-text search on Diigo, first page only.
    pub fn search(&self, what: &str) -> Result<Vec<SourceItem>, SyncError> {
        let mut source = self.source_client()?;
        let size = self.settings.diigo_batch_size;
        Ok(source.search(what, 0, size)?)
    }
}
