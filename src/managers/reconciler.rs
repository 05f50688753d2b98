//! Reconciliation Engine.
//!
//! Decides, per source record, whether Nextcloud gets a new bookmark, an update
//! of an existing one, or nothing. The decision itself (`decide`) is pure; the
//! `Reconciler` adds the destination lookup, optional description generation and
//! the final write.

use crate::services::destination_client::DestinationClientTrait;
use crate::services::normalizer::{dedup_tags, import_description};
use crate::services::summarizer::SummarizerTrait;
use crate::types::bookmark::{BookmarkFields, BookmarkRecord, DestinationBookmark, FolderId, RemoteId};
use crate::types::config::FolderNames;
use crate::types::description::{fill_placeholder, merge_description};
use crate::types::errors::{DestinationError, SummarizeError};

/// Ids of the folders imported bookmarks are filed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderIds {
    pub diigo: FolderId,
    pub unread: FolderId,
    pub private: FolderId,
    pub unreachable: FolderId,
}

impl FolderIds {
    /// Looks up each folder by name, creating missing ones.
    pub fn resolve(
        destination: &mut dyn DestinationClientTrait,
        names: &FolderNames,
    ) -> Result<Self, DestinationError> {
        Ok(Self {
            diigo: destination.get_or_create_folder(&names.diigo)?,
            unread: destination.get_or_create_folder(&names.unread)?,
            private: destination.get_or_create_folder(&names.private)?,
            unreachable: destination.get_or_create_folder(&names.unreachable)?,
        })
    }
}

/// What to do with one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Create(BookmarkFields),
    Merge(RemoteId, BookmarkFields),
    Skip(String),
}

impl ReconcileOutcome {
    pub fn fields_mut(&mut self) -> Option<&mut BookmarkFields> {
        match self {
            ReconcileOutcome::Create(fields) | ReconcileOutcome::Merge(_, fields) => Some(fields),
            ReconcileOutcome::Skip(_) => None,
        }
    }
}

/// Result of applying an outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Created(RemoteId),
    Merged(RemoteId),
    Skipped(String),
}

/// Folders for a record: always the origin folder, plus unread and private as flagged.
pub fn assign_folders(record: &BookmarkRecord, folders: &FolderIds) -> Vec<FolderId> {
    let mut assigned = vec![folders.diigo];
    if record.unread {
        assigned.push(folders.unread);
    }
    // Diigo reports private items with private == false
    if record.is_private_on_source() {
        assigned.push(folders.private);
    }
    assigned
}

/// Title of the merged bookmark: the source title wins only if its description
/// is strictly longer than the stored one.
pub fn merged_title(record: &BookmarkRecord, existing: &DestinationBookmark) -> String {
    if record.description.chars().count() > existing.description.chars().count() {
        record.title.clone()
    } else {
        existing.title.clone()
    }
}

fn union_folders(existing: &[FolderId], added: &[FolderId]) -> Vec<FolderId> {
    let mut out = existing.to_vec();
    for f in added {
        if !out.contains(f) {
            out.push(*f);
        }
    }
    out
}

/// Pure reconciliation of one record against the bookmarks Nextcloud holds for its URL.
pub fn decide(
    record: &BookmarkRecord,
    matches: &[DestinationBookmark],
    folders: &FolderIds,
) -> ReconcileOutcome {
    let description = import_description(record);
    let assigned = assign_folders(record, folders);

    let Some(target) = matches.first() else {
        return ReconcileOutcome::Create(BookmarkFields {
            url: record.url.clone(),
            title: record.title.clone(),
            description,
            tags: dedup_tags(&record.tags),
            folders: assigned,
        });
    };

    if matches.iter().any(|m| m.title == record.title) {
        return ReconcileOutcome::Skip("already present".to_string());
    }

    let tags: Vec<String> = record.tags.iter().chain(target.tags.iter()).cloned().collect();
    ReconcileOutcome::Merge(
        target.id,
        BookmarkFields {
            url: record.url.clone(),
            title: merged_title(record, target),
            description: merge_description(&description, &target.description),
            tags: dedup_tags(&tags),
            folders: union_folders(&target.folders, &assigned),
        },
    )
}

/// Runs reconciliation against a live destination.
#[derive(Debug, Clone)]
pub struct Reconciler {
    folders: FolderIds,
    scope: Option<FolderId>,
}

impl Reconciler {
    /// Lookups are scoped to the origin folder.
    pub fn new(folders: FolderIds) -> Self {
        Self {
            folders,
            scope: Some(folders.diigo),
        }
    }

    /// Looks up across all folders instead of the origin folder only.
    pub fn unscoped(folders: FolderIds) -> Self {
        Self { folders, scope: None }
    }

    pub fn folders(&self) -> &FolderIds {
        &self.folders
    }

    pub fn reconcile(
        &self,
        destination: &mut dyn DestinationClientTrait,
        record: &BookmarkRecord,
    ) -> Result<ReconcileOutcome, DestinationError> {
        let matches = destination.find_by_url(&record.url, self.scope)?;
        if matches.len() > 1 {
            tracing::debug!(url = %record.url, count = matches.len(), "several bookmarks share this URL");
        }
        Ok(decide(record, &matches, &self.folders))
    }

    /// Fills the generated-description placeholder. An unreachable page files
    /// the bookmark into the unreachable folder and keeps the placeholder.
    pub fn augment(
        &self,
        mut outcome: ReconcileOutcome,
        record: &BookmarkRecord,
        summarizer: &mut dyn SummarizerTrait,
    ) -> ReconcileOutcome {
        let unreachable = self.folders.unreachable;
        let Some(fields) = outcome.fields_mut() else {
            return outcome;
        };
        match summarizer.summarize(&record.url, &record.description) {
            Ok(generated) => fields.description = fill_placeholder(&fields.description, &generated),
            Err(SummarizeError::Unreachable(status)) => {
                tracing::info!(url = %record.url, status = ?status, "page unreachable");
                if !fields.folders.contains(&unreachable) {
                    fields.folders.push(unreachable);
                }
            }
            Err(e) => tracing::warn!(url = %record.url, error = %e, "description generation failed"),
        }
        outcome
    }

    pub fn apply(
        &self,
        destination: &mut dyn DestinationClientTrait,
        outcome: &ReconcileOutcome,
    ) -> Result<Applied, DestinationError> {
        match outcome {
            ReconcileOutcome::Create(fields) => destination.create(fields).map(Applied::Created),
            ReconcileOutcome::Merge(id, fields) => destination.update(*id, fields).map(Applied::Merged),
            ReconcileOutcome::Skip(reason) => Ok(Applied::Skipped(reason.clone())),
        }
    }

    /// Reconciles, optionally augments, and applies one record.
    pub fn process(
        &self,
        destination: &mut dyn DestinationClientTrait,
        summarizer: Option<&mut (dyn SummarizerTrait + '_)>,
        record: &BookmarkRecord,
    ) -> Result<Applied, DestinationError> {
        let mut outcome = self.reconcile(destination, record)?;
        if let Some(summarizer) = summarizer {
            outcome = self.augment(outcome, record, summarizer);
        }
        let applied = self.apply(destination, &outcome)?;
        tracing::debug!(url = %record.url, result = ?applied, "reconciled");
        Ok(applied)
    }
}
