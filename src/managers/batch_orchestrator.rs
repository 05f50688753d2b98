//! Batch Export/Delete Orchestrator.
//!
//! Drives paginated traversal of Diigo. Each page goes through
//! `Reading -> Dumping -> [Reconciling] -> [Deleting]`:
//!
//! - the raw page is appended to the CSV dump before anything is deleted;
//! - with recreation enabled, each record is reconciled into Nextcloud in page order;
//! - with deletion enabled, the page is bulk-deleted, falling back to one delete
//!   per record when the bulk call is refused.
//!
//! Deleting shrinks the collection, so the page cursor stays put after a page
//! with deletions and only advances when nothing was deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::managers::csv_store::{CsvStoreTrait, RecordBatch};
use crate::managers::reconciler::{Applied, FolderIds, Reconciler};
use crate::services::destination_client::DestinationClientTrait;
use crate::services::normalizer::record_from_source_item;
use crate::services::progress::{Marker, ProgressSink};
use crate::services::retry::{retry_bounded, retry_until_settled, RetryPolicy, Sleeper};
use crate::services::source_client::{BookmarkWrite, ItemUpdate, SourceClientTrait};
use crate::services::summarizer::SummarizerTrait;
use crate::platform;
use crate::types::bookmark::{LinkId, SortKey, SourceItem, Visibility};
use crate::types::config::{FolderNames, SyncConfig};
use crate::types::errors::{ConfigError, DestinationError, SourceError, SyncError};

/// Page size of the documented API listing.
pub const DOCUMENTED_PAGE_SIZE: u32 = 10;

/// Paths, sizes and policies shared by the batch jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub diigo_dump_path: PathBuf,
    pub nc_dump_path: PathBuf,
    pub diigo_batch_size: u32,
    pub nc_batch_size: u32,
    pub documented_batch_size: u32,
    pub folder_names: FolderNames,
    pub retry: RetryPolicy,
}

impl JobSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            diigo_dump_path: platform::expand_home(&config.diigo_dump_path),
            nc_dump_path: platform::expand_home(&config.nc_dump_path),
            diigo_batch_size: config.diigo_batch_size,
            nc_batch_size: config.nc_batch_size,
            documented_batch_size: DOCUMENTED_PAGE_SIZE,
            folder_names: config.folders.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Reconcile every exported record into Nextcloud.
    pub recreate: bool,
    /// Delete exported pages from Diigo.
    pub delete: bool,
    /// Generate descriptions for recreated bookmarks.
    pub use_llm: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub pages: usize,
    pub exported: usize,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    /// Records the destination failed to take.
    pub failed: usize,
    pub deleted: usize,
    /// URLs still on Diigo after their single delete gave up.
    pub undeleted: Vec<String>,
}

impl ExportReport {
    pub fn count(&mut self, applied: &Applied) {
        match applied {
            Applied::Created(_) => self.created += 1,
            Applied::Merged(_) => self.merged += 1,
            Applied::Skipped(_) => self.skipped += 1,
        }
    }

    /// Records a URL left on Diigo. A URL that fails on several re-reads is kept once.
    pub fn mark_undeleted(&mut self, url: &str) {
        if !self.undeleted.iter().any(|u| u == url) {
            self.undeleted.push(url.to_string());
        }
    }
}

/// Counts the items of a page not seen on an earlier read. Pages are re-read
/// after a partial delete, so the same item can be listed again.
fn count_new(seen: &mut HashSet<(String, String)>, items: &[SourceItem]) -> usize {
    items
        .iter()
        .filter(|i| seen.insert((i.url.clone(), i.title.clone())))
        .count()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrivatizeReport {
    pub pages: usize,
    pub changed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub written: usize,
    pub failed: usize,
}

/// Cursor for the next listing call: unchanged after deletions, else one step on.
pub fn next_cursor(cursor: u32, step: u32, deleted: usize) -> u32 {
    if deleted > 0 {
        cursor
    } else {
        cursor + step
    }
}

/// Runs `op`; on `AuthExpired` forces a new session once and runs it again.
pub fn with_reauth<T>(
    source: &mut dyn SourceClientTrait,
    mut op: impl FnMut(&mut dyn SourceClientTrait) -> Result<T, SourceError>,
) -> Result<T, SourceError> {
    match op(&mut *source) {
        Err(SourceError::AuthExpired) => {
            tracing::warn!("Diigo session expired, re-authenticating");
            source.reauthenticate(true)?;
            op(&mut *source)
        }
        other => other,
    }
}

/// Destination errors that end the whole job instead of one record.
fn is_fatal(e: &DestinationError) -> bool {
    matches!(e, DestinationError::Forbidden | DestinationError::AuthMissing(_))
}

/// Runs the Diigo-side batch jobs.
pub struct BatchOrchestrator<'a> {
    source: &'a mut dyn SourceClientTrait,
    store: &'a dyn CsvStoreTrait,
    sleeper: &'a dyn Sleeper,
    progress: &'a mut dyn ProgressSink,
    settings: JobSettings,
    destination: Option<&'a mut dyn DestinationClientTrait>,
    summarizer: Option<&'a mut dyn SummarizerTrait>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        source: &'a mut dyn SourceClientTrait,
        store: &'a dyn CsvStoreTrait,
        sleeper: &'a dyn Sleeper,
        progress: &'a mut dyn ProgressSink,
        settings: JobSettings,
    ) -> Self {
        Self {
            source,
            store,
            sleeper,
            progress,
            settings,
            destination: None,
            summarizer: None,
        }
    }

    pub fn with_destination(mut self, destination: &'a mut dyn DestinationClientTrait) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_summarizer(mut self, summarizer: &'a mut dyn SummarizerTrait) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Exports Diigo to the CSV dump, optionally recreating the bookmarks in
    /// Nextcloud and deleting them from Diigo.
    pub fn export_delete(&mut self, options: ExportOptions) -> Result<ExportReport, SyncError> {
        let reconciler = if options.recreate {
            let destination = self.destination.as_deref_mut().ok_or_else(|| {
                ConfigError::InvalidValue("recreating bookmarks needs a Nextcloud connection".to_string())
            })?;
            Some(Reconciler::new(FolderIds::resolve(destination, &self.settings.folder_names)?))
        } else {
            None
        };
        if options.use_llm && self.summarizer.is_none() {
            return Err(ConfigError::InvalidValue("description generation needs a summarizer".to_string()).into());
        }

        let dump_path = self.settings.diigo_dump_path.clone();
        self.store.backup(&dump_path)?;
        tracing::info!(
            batch_size = self.settings.diigo_batch_size,
            recreate = options.recreate,
            delete = options.delete,
            use_llm = options.use_llm,
            "starting Diigo export"
        );

        let mut report = ExportReport::default();
        let mut seen = HashSet::new();
        let mut page = 0;
        loop {
            self.progress.push(Marker::Reading);
            let items = self.list_page(page)?;
            if items.is_empty() {
                break;
            }
            report.pages += 1;

            self.progress.mark(Marker::Dumping);
            self.store.append(&dump_path, RecordBatch::from_source_items(&items))?;
            report.exported += count_new(&mut seen, &items);

            if let Some(reconciler) = &reconciler {
                self.recreate_page(reconciler, &items, options.use_llm, &mut report)?;
            }

            let deleted = if options.delete {
                self.delete_page(&items, &mut report)?
            } else {
                0
            };
            report.deleted += deleted;
            page = next_cursor(page, 1, deleted);
            self.progress.mark(Marker::Done);
        }
        self.progress.finish();
        tracing::info!(
            exported = report.exported,
            created = report.created,
            merged = report.merged,
            deleted = report.deleted,
            "Diigo export finished"
        );
        Ok(report)
    }

    /// Sets every Diigo item to private, bulk first, one at a time if refused.
    pub fn privatize(&mut self) -> Result<PrivatizeReport, SyncError> {
        let mut report = PrivatizeReport::default();
        let mut page = 0;
        loop {
            self.progress.push(Marker::Reading);
            let items = self.list_page(page)?;
            if items.is_empty() {
                break;
            }
            report.pages += 1;

            let ids: Vec<LinkId> = items.iter().filter_map(|i| i.link_id).collect();
            let sleeper = self.sleeper;
            let cooldown = self.settings.retry.cooldown;
            let source = &mut *self.source;
            let bulk = retry_until_settled(sleeper, cooldown, SourceError::is_transient, || {
                with_reauth(&mut *source, |s| s.set_visibility(&ids, Visibility::Private))
            });
            match bulk {
                Ok(()) => report.changed += ids.len(),
                Err(SourceError::Forbidden) => {
                    tracing::debug!(page, "bulk visibility change refused, updating one at a time");
                    for item in &items {
                        self.progress.mark(Marker::Changing);
                        let update = ItemUpdate::make_private(item);
                        match with_reauth(&mut *self.source, |s| s.update_item(&update)) {
                            Ok(()) => {
                                report.changed += 1;
                                self.progress.mark(Marker::Reading);
                            }
                            Err(e) => {
                                tracing::warn!(url = %item.url, error = %e, "could not make item private");
                                report.failed += 1;
                            }
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
            self.progress.mark(Marker::Done);
            page += 1;
        }
        self.progress.finish();
        tracing::info!(changed = report.changed, failed = report.failed, "privatize finished");
        Ok(report)
    }

    /// Export and delete through the documented API only. Slow: every delete is
    /// a separate rate-limited call.
    pub fn export_delete_documented(&mut self) -> Result<ExportReport, SyncError> {
        let dump_path = self.settings.diigo_dump_path.clone();
        self.store.backup(&dump_path)?;
        let step = self.settings.documented_batch_size;
        let mut report = ExportReport::default();
        let mut seen = HashSet::new();
        let mut start = 0;
        loop {
            self.progress.push(Marker::Reading);
            let sleeper = self.sleeper;
            let cooldown = self.settings.retry.cooldown;
            let source = &mut *self.source;
            let items = retry_until_settled(sleeper, cooldown, SourceError::is_transient, || {
                source.list_documented(start, step)
            })?;
            if items.is_empty() {
                break;
            }
            report.pages += 1;

            self.progress.mark(Marker::Dumping);
            self.store.append(&dump_path, RecordBatch::from_source_items(&items))?;
            report.exported += count_new(&mut seen, &items);

            self.progress.mark(Marker::Removing);
            let deleted = self.delete_each(&items, &mut report);
            report.deleted += deleted;
            start = next_cursor(start, step, deleted);
            self.progress.mark(Marker::Done);
        }
        self.progress.finish();
        tracing::info!(exported = report.exported, deleted = report.deleted, "documented export finished");
        Ok(report)
    }

    /// Writes every record of a Diigo-schema CSV to Diigo.
    pub fn upload_csv(&mut self, path: &Path) -> Result<UploadReport, SyncError> {
        let records = self.store.load(path)?.to_records();
        let mut report = UploadReport::default();
        for record in &records {
            self.progress.push(Marker::Changing);
            let write = BookmarkWrite::from_record(record);
            let sleeper = self.sleeper;
            let retry = self.settings.retry.clone();
            let source = &mut *self.source;
            let result = retry_bounded(
                sleeper,
                retry.single_retry_delay,
                retry.single_retry_attempts,
                SourceError::is_transient,
                || source.write_one(&write),
            );
            match result {
                Ok(()) => {
                    report.written += 1;
                    self.progress.mark(Marker::Done);
                }
                Err(SourceError::AuthMissing(what)) => return Err(SourceError::AuthMissing(what).into()),
                Err(e) => {
                    tracing::warn!(url = %record.url, error = %e, "could not write bookmark");
                    report.failed += 1;
                }
            }
        }
        self.progress.finish();
        Ok(report)
    }

    fn list_page(&mut self, page: u32) -> Result<Vec<SourceItem>, SourceError> {
        let size = self.settings.diigo_batch_size;
        let sleeper = self.sleeper;
        let cooldown = self.settings.retry.cooldown;
        let source = &mut *self.source;
        retry_until_settled(sleeper, cooldown, SourceError::is_transient, || {
            with_reauth(&mut *source, |s| s.list_page(page, size, SortKey::CreatedAt))
        })
    }

    fn recreate_page(
        &mut self,
        reconciler: &Reconciler,
        items: &[SourceItem],
        use_llm: bool,
        report: &mut ExportReport,
    ) -> Result<(), SyncError> {
        let Some(destination) = self.destination.as_deref_mut() else {
            return Ok(());
        };
        for item in items {
            self.progress.mark(Marker::Checking);
            let record = record_from_source_item(item);
            let summarizer = if use_llm {
                self.progress.mark(Marker::Reflecting);
                self.summarizer.as_deref_mut()
            } else {
                None
            };
            match reconciler.process(destination, summarizer, &record) {
                Ok(applied) => report.count(&applied),
                Err(e) if is_fatal(&e) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(url = %record.url, error = %e, "could not reconcile bookmark");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Deletes a page: bulk first, per record if the bulk call is refused.
    /// Returns the number of records deleted.
    fn delete_page(&mut self, items: &[SourceItem], report: &mut ExportReport) -> Result<usize, SyncError> {
        self.progress.mark(Marker::Removing);
        let ids: Vec<LinkId> = items.iter().filter_map(|i| i.link_id).collect();
        let bulk = if ids.len() == items.len() {
            let sleeper = self.sleeper;
            let cooldown = self.settings.retry.cooldown;
            let source = &mut *self.source;
            retry_until_settled(sleeper, cooldown, SourceError::is_transient, || {
                with_reauth(&mut *source, |s| s.delete_many(&ids))
            })
        } else {
            // Items without a link id cannot go through the bulk endpoint
            Err(SourceError::Forbidden)
        };
        match bulk {
            Ok(()) => Ok(items.len()),
            Err(SourceError::Forbidden) => {
                tracing::warn!(count = items.len(), "bulk delete refused, deleting one at a time");
                Ok(self.delete_each(items, report))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes records one by one with the bounded retry. Failures are skipped.
    fn delete_each(&mut self, items: &[SourceItem], report: &mut ExportReport) -> usize {
        let retry = self.settings.retry.clone();
        let sleeper = self.sleeper;
        let mut deleted = 0;
        for item in items {
            let source = &mut *self.source;
            let result = retry_bounded(
                sleeper,
                retry.single_retry_delay,
                retry.single_retry_attempts,
                SourceError::is_transient,
                || source.delete_one(item),
            );
            match result {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(url = %item.url, title = %item.title, error = %e, "could not delete, skipping");
                    report.mark_undeleted(&item.url);
                }
            }
            sleeper.sleep(retry.delete_pause);
        }
        deleted
    }
}
