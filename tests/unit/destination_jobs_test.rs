//! Tests for the Nextcloud-side jobs: dump, CSV upload and the description pass.

use std::collections::HashMap;

use ncdbookmarks::managers::batch_orchestrator::JobSettings;
use ncdbookmarks::managers::csv_store::{CsvStore, CsvStoreTrait, RecordBatch};
use ncdbookmarks::managers::destination_jobs::{
    improve_bookmark, DestinationJobs, ImproveAction, ImproveReport,
};
use ncdbookmarks::services::destination_client::DestinationClientTrait;
use ncdbookmarks::services::progress::RecordedProgress;
use ncdbookmarks::services::retry::RetryPolicy;
use ncdbookmarks::services::summarizer::SummarizerTrait;
use ncdbookmarks::types::bookmark::{
    BookmarkFields, DestinationBookmark, FolderId, FolderRef, RecordKind, RemoteId, SourceItem,
};
use ncdbookmarks::types::config::FolderNames;
use ncdbookmarks::types::description::{compose_description, LLM_PLACEHOLDER};
use ncdbookmarks::types::errors::{CsvStoreError, DestinationError, SummarizeError, SyncError};
use tempfile::TempDir;

#[derive(Default)]
struct FakeNextcloud {
    bookmarks: Vec<DestinationBookmark>,
    folders: Vec<FolderRef>,
    updates: Vec<(RemoteId, BookmarkFields)>,
}

impl DestinationClientTrait for FakeNextcloud {
    fn find_by_url(
        &mut self,
        url: &str,
        folder: Option<FolderId>,
    ) -> Result<Vec<DestinationBookmark>, DestinationError> {
        Ok(self
            .bookmarks
            .iter()
            .filter(|b| b.url == url && folder.map_or(true, |f| b.folders.contains(&f)))
            .cloned()
            .collect())
    }

    fn create(&mut self, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        let id = self.bookmarks.len() as RemoteId + 1;
        self.bookmarks.push(DestinationBookmark {
            id,
            url: fields.url.clone(),
            title: fields.title.clone(),
            description: fields.description.clone(),
            tags: fields.tags.clone(),
            folders: fields.folders.clone(),
            ..Default::default()
        });
        Ok(id)
    }

    fn update(&mut self, id: RemoteId, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        self.updates.push((id, fields.clone()));
        Ok(id)
    }

    fn list_page(&mut self, page: u32, limit: u32) -> Result<Vec<DestinationBookmark>, DestinationError> {
        Ok(self
            .bookmarks
            .iter()
            .skip((page * limit) as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn list_folders(&mut self) -> Result<Vec<FolderRef>, DestinationError> {
        Ok(self.folders.clone())
    }

    fn create_folder(&mut self, title: &str) -> Result<FolderId, DestinationError> {
        let id = 70 + self.folders.len() as FolderId;
        self.folders.push(FolderRef {
            id,
            title: title.to_string(),
            children: Vec::new(),
        });
        Ok(id)
    }
}

/// Answers per URL; unknown URLs get a model error.
#[derive(Default)]
struct ScriptedSummarizer {
    answers: HashMap<String, Result<String, SummarizeError>>,
    asked: Vec<String>,
}

impl SummarizerTrait for ScriptedSummarizer {
    fn summarize(&mut self, url: &str, _existing: &str) -> Result<String, SummarizeError> {
        self.asked.push(url.to_string());
        self.answers
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(SummarizeError::ModelError("no answer".to_string())))
    }
}

fn settings(dir: &TempDir) -> JobSettings {
    JobSettings {
        diigo_dump_path: dir.path().join("diigo_dump.csv"),
        nc_dump_path: dir.path().join("nc_dump.csv"),
        diigo_batch_size: 2,
        nc_batch_size: 2,
        documented_batch_size: 10,
        folder_names: FolderNames::default(),
        retry: RetryPolicy::immediate(1),
    }
}

fn bookmark(id: RemoteId, url: &str, description: &str) -> DestinationBookmark {
    DestinationBookmark {
        id,
        url: url.to_string(),
        title: format!("Bookmark {}", id),
        description: description.to_string(),
        tags: vec!["t".to_string()],
        folders: vec![1],
        ..Default::default()
    }
}

#[test]
fn dump_pages_through_every_bookmark() {
    let dir = TempDir::new().unwrap();
    let mut nextcloud = FakeNextcloud::default();
    for i in 1..=5 {
        nextcloud.bookmarks.push(bookmark(i, &format!("http://nc/{}", i), ""));
    }
    let store = CsvStore::new();
    let mut progress = RecordedProgress::default();
    let path = dir.path().join("nc_dump.csv");

    let total = DestinationJobs::new(&mut nextcloud, &store, &mut progress, settings(&dir))
        .dump(&path)
        .unwrap();

    assert_eq!(total, 5);
    let dumped = store.load(&path).unwrap();
    assert_eq!(dumped.kind(), RecordKind::Destination);
    assert_eq!(dumped.len(), 5);
    assert_eq!(progress.symbols(), ".*.*.*");
}

#[test]
fn upload_reconciles_each_row() {
    let dir = TempDir::new().unwrap();
    let store = CsvStore::new();
    let path = dir.path().join("diigo.csv");
    let items = vec![SourceItem::new("http://a", "A"), SourceItem::new("http://b", "B")];
    store.append(&path, RecordBatch::from_source_items(&items)).unwrap();

    let mut nextcloud = FakeNextcloud::default();
    let mut progress = RecordedProgress::default();
    let report = DestinationJobs::new(&mut nextcloud, &store, &mut progress, settings(&dir))
        .upload(&path)
        .unwrap();

    assert_eq!(report.exported, 2);
    assert_eq!(report.created, 2);
    assert_eq!(nextcloud.bookmarks.len(), 2);
    assert_eq!(nextcloud.folders.len(), 4);
}

#[test]
fn upload_rejects_csv_without_source_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.csv");
    std::fs::write(&path, "title,url\nA,http://a\n").unwrap();
    let store = CsvStore::new();
    let mut nextcloud = FakeNextcloud::default();
    let mut progress = RecordedProgress::default();

    let result = DestinationJobs::new(&mut nextcloud, &store, &mut progress, settings(&dir)).upload(&path);

    match result {
        Err(SyncError::Store(CsvStoreError::SchemaMismatch(missing))) => {
            assert!(missing.contains(&"comments".to_string()));
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert!(nextcloud.bookmarks.is_empty());
}

#[test]
fn improve_bookmark_actions() {
    let pending = bookmark(1, "http://ok", &compose_description("t", "2020", ""));
    let mut summarizer = ScriptedSummarizer::default();
    summarizer
        .answers
        .insert("http://ok".to_string(), Ok("Zusammenfassung".to_string()));
    summarizer
        .answers
        .insert("http://gone".to_string(), Err(SummarizeError::Unreachable(Some(410))));

    match improve_bookmark(&pending, &mut summarizer, 9) {
        ImproveAction::Update(fields) => {
            assert!(fields.description.contains("Zusammenfassung"));
            assert!(!fields.description.contains(LLM_PLACEHOLDER));
            assert_eq!(fields.folders, vec![1]);
        }
        other => panic!("expected Update, got {:?}", other),
    }

    let gone = bookmark(2, "http://gone", "");
    match improve_bookmark(&gone, &mut summarizer, 9) {
        ImproveAction::MarkUnreachable(fields) => {
            assert_eq!(fields.folders, vec![1, 9]);
            assert!(fields.description.ends_with("# LLM_DESCRIPTION\n###LLM###\n"));
        }
        other => panic!("expected MarkUnreachable, got {:?}", other),
    }

    let done = bookmark(3, "http://done", "x\n\n# LLM_DESCRIPTION\nfertig\n");
    assert_eq!(improve_bookmark(&done, &mut summarizer, 9), ImproveAction::Keep);
    assert!(!summarizer.asked.contains(&"http://done".to_string()));

    let broken = bookmark(4, "http://unknown", "");
    assert!(matches!(
        improve_bookmark(&broken, &mut summarizer, 9),
        ImproveAction::Retry(_)
    ));
}

#[test]
fn improve_descriptions_updates_pending_bookmarks() {
    let dir = TempDir::new().unwrap();
    let mut nextcloud = FakeNextcloud::default();
    nextcloud.bookmarks.push(bookmark(1, "http://ok", "native text"));
    nextcloud.bookmarks.push(bookmark(2, "http://gone", ""));
    nextcloud
        .bookmarks
        .push(bookmark(3, "http://done", "# LLM_DESCRIPTION\nfertig\n"));
    nextcloud.bookmarks.push(bookmark(4, "http://unknown", ""));

    let mut summarizer = ScriptedSummarizer::default();
    summarizer
        .answers
        .insert("http://ok".to_string(), Ok("Zusammenfassung".to_string()));
    summarizer
        .answers
        .insert("http://gone".to_string(), Err(SummarizeError::Unreachable(None)));

    let store = CsvStore::new();
    let mut progress = RecordedProgress::default();
    let report = DestinationJobs::new(&mut nextcloud, &store, &mut progress, settings(&dir))
        .with_summarizer(&mut summarizer)
        .improve_descriptions()
        .unwrap();

    assert_eq!(
        report,
        ImproveReport {
            checked: 4,
            generated: 1,
            unreachable: 1,
            failed: 1,
        }
    );
    let unreachable_folder = nextcloud.folders.iter().find(|f| f.title == "Abgelaufen").unwrap().id;
    assert_eq!(nextcloud.updates.len(), 2);
    assert_eq!(nextcloud.updates[0].0, 1);
    assert!(nextcloud.updates[0]
        .1
        .description
        .starts_with("native text\n\n# LLM_DESCRIPTION\nZusammenfassung"));
    assert_eq!(nextcloud.updates[1].0, 2);
    assert!(nextcloud.updates[1].1.folders.contains(&unreachable_folder));
}

#[test]
fn improve_descriptions_needs_a_summarizer() {
    let dir = TempDir::new().unwrap();
    let mut nextcloud = FakeNextcloud::default();
    let store = CsvStore::new();
    let mut progress = RecordedProgress::default();

    let result = DestinationJobs::new(&mut nextcloud, &store, &mut progress, settings(&dir))
        .improve_descriptions();
    assert!(matches!(result, Err(SyncError::Config(_))));
}
