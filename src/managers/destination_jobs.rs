//! Nextcloud-side batch jobs: dump to CSV, upload a CSV, and fill in generated
//! descriptions.

use std::path::Path;

use crate::managers::batch_orchestrator::{ExportReport, JobSettings};
use crate::managers::csv_store::{CsvStoreTrait, RecordBatch};
use crate::managers::reconciler::{FolderIds, Reconciler};
use crate::services::destination_client::DestinationClientTrait;
use crate::services::normalizer::record_from_destination;
use crate::services::progress::{Marker, ProgressSink};
use crate::services::summarizer::SummarizerTrait;
use crate::types::bookmark::{BookmarkFields, DestinationBookmark, FolderId, RecordKind};
use crate::types::description::{fill_placeholder, prepare_for_generation};
use crate::types::errors::{
    ConfigError, CsvStoreError, DestinationError, SummarizeError, SyncError,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImproveReport {
    pub checked: usize,
    pub generated: usize,
    pub unreachable: usize,
    pub failed: usize,
}

/// What the description pass does with one bookmark.
#[derive(Debug, Clone, PartialEq)]
pub enum ImproveAction {
    /// Already has a generated description.
    Keep,
    Update(BookmarkFields),
    /// Page unreachable: file into the unreachable folder, keep the placeholder.
    MarkUnreachable(BookmarkFields),
    /// Model failed; retry on a later pass.
    Retry(String),
}

/// Decides what happens to `bookmark`, calling the summarizer if needed.
pub fn improve_bookmark(
    bookmark: &DestinationBookmark,
    summarizer: &mut dyn SummarizerTrait,
    unreachable_folder: FolderId,
) -> ImproveAction {
    let Some(pending) = prepare_for_generation(&bookmark.description) else {
        return ImproveAction::Keep;
    };
    let mut fields = BookmarkFields {
        url: bookmark.url.clone(),
        title: bookmark.title.clone(),
        description: pending,
        tags: bookmark.tags.clone(),
        folders: bookmark.folders.clone(),
    };
    match summarizer.summarize(&bookmark.url, &bookmark.description) {
        Ok(generated) => {
            fields.description = fill_placeholder(&fields.description, &generated);
            ImproveAction::Update(fields)
        }
        Err(SummarizeError::Unreachable(_)) => {
            if !fields.folders.contains(&unreachable_folder) {
                fields.folders.push(unreachable_folder);
            }
            ImproveAction::MarkUnreachable(fields)
        }
        Err(SummarizeError::ModelError(msg)) => ImproveAction::Retry(msg),
    }
}

/// Runs the Nextcloud-side batch jobs.
pub struct DestinationJobs<'a> {
    destination: &'a mut dyn DestinationClientTrait,
    store: &'a dyn CsvStoreTrait,
    progress: &'a mut dyn ProgressSink,
    settings: JobSettings,
    summarizer: Option<&'a mut dyn SummarizerTrait>,
}

impl<'a> DestinationJobs<'a> {
    pub fn new(
        destination: &'a mut dyn DestinationClientTrait,
        store: &'a dyn CsvStoreTrait,
        progress: &'a mut dyn ProgressSink,
        settings: JobSettings,
    ) -> Self {
        Self {
            destination,
            store,
            progress,
            settings,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: &'a mut dyn SummarizerTrait) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Pages through every Nextcloud bookmark and appends it to `path`.
    /// Returns the number of bookmarks read.
    pub fn dump(&mut self, path: &Path) -> Result<usize, SyncError> {
        self.store.backup(path)?;
        let limit = self.settings.nc_batch_size;
        let mut total = 0;
        let mut page = 0;
        loop {
            let bookmarks = self.destination.list_page(page, limit)?;
            if bookmarks.is_empty() {
                break;
            }
            self.progress.push(Marker::Reading);
            let records: Vec<_> = bookmarks.iter().map(record_from_destination).collect();
            self.store
                .append(path, RecordBatch::from_records(&records, RecordKind::Destination))?;
            total += records.len();
            self.progress.mark(Marker::Done);
            page += 1;
        }
        self.progress.finish();
        tracing::info!(path = %path.display(), bookmarks = total, "Nextcloud dump written");
        Ok(total)
    }

    /// Reconciles every row of a CSV file into Nextcloud.
    pub fn upload(&mut self, path: &Path) -> Result<ExportReport, SyncError> {
        let batch = self.store.load(path)?;
        let missing = batch.missing_columns();
        if !missing.is_empty() {
            return Err(CsvStoreError::SchemaMismatch(missing).into());
        }
        let records = batch.to_records();
        let folders = FolderIds::resolve(&mut *self.destination, &self.settings.folder_names)?;
        let reconciler = Reconciler::new(folders);
        tracing::info!(path = %path.display(), records = records.len(), "uploading CSV to Nextcloud");

        let mut report = ExportReport {
            exported: records.len(),
            ..Default::default()
        };
        for record in &records {
            self.progress.push(Marker::Checking);
            let summarizer = self.summarizer.as_deref_mut();
            if summarizer.is_some() {
                self.progress.mark(Marker::Reflecting);
            }
            match reconciler.process(&mut *self.destination, summarizer, record) {
                Ok(applied) => {
                    report.count(&applied);
                    self.progress.mark(Marker::Done);
                }
                Err(e @ (DestinationError::Forbidden | DestinationError::AuthMissing(_))) => {
                    return Err(e.into())
                }
                Err(e) => {
                    tracing::warn!(url = %record.url, error = %e, "could not upload bookmark");
                    report.failed += 1;
                }
            }
        }
        self.progress.finish();
        Ok(report)
    }

    /// Generates descriptions for every bookmark that still lacks one.
    pub fn improve_descriptions(&mut self) -> Result<ImproveReport, SyncError> {
        let summarizer = self.summarizer.as_deref_mut().ok_or_else(|| {
            ConfigError::InvalidValue("description generation needs a summarizer".to_string())
        })?;
        let unreachable =
            self.destination.get_or_create_folder(&self.settings.folder_names.unreachable)?;
        let limit = self.settings.nc_batch_size;
        let mut report = ImproveReport::default();
        let mut page = 0;
        loop {
            let bookmarks = self.destination.list_page(page, limit)?;
            if bookmarks.is_empty() {
                break;
            }
            for bookmark in &bookmarks {
                self.progress.push(Marker::Checking);
                report.checked += 1;
                let action = improve_bookmark(bookmark, &mut *summarizer, unreachable);
                let fields = match action {
                    ImproveAction::Keep => {
                        self.progress.mark(Marker::Done);
                        continue;
                    }
                    ImproveAction::Retry(msg) => {
                        tracing::warn!(url = %bookmark.url, error = %msg, "description generation failed");
                        report.failed += 1;
                        continue;
                    }
                    ImproveAction::MarkUnreachable(fields) => {
                        self.progress.mark(Marker::Unreachable);
                        report.unreachable += 1;
                        fields
                    }
                    ImproveAction::Update(fields) => {
                        self.progress.mark(Marker::Reflecting);
                        report.generated += 1;
                        fields
                    }
                };
                match self.destination.update(bookmark.id, &fields) {
                    Ok(_) => self.progress.mark(Marker::Done),
                    Err(e @ (DestinationError::Forbidden | DestinationError::AuthMissing(_))) => {
                        return Err(e.into())
                    }
                    Err(e) => {
                        tracing::warn!(url = %bookmark.url, error = %e, "could not update bookmark");
                        report.failed += 1;
                    }
                }
            }
            page += 1;
        }
        self.progress.finish();
        tracing::info!(
            checked = report.checked,
            generated = report.generated,
            unreachable = report.unreachable,
            "description pass finished"
        );
        Ok(report)
    }
}
