//! Tests for the Reconciliation Engine: the pure decision and the full
//! lookup/augment/apply cycle against an in-memory Nextcloud.

use ncdbookmarks::managers::reconciler::{
    assign_folders, decide, merged_title, Applied, FolderIds, ReconcileOutcome, Reconciler,
};
use ncdbookmarks::services::destination_client::DestinationClientTrait;
use ncdbookmarks::services::summarizer::SummarizerTrait;
use ncdbookmarks::types::bookmark::{
    BookmarkFields, BookmarkRecord, DestinationBookmark, FolderId, FolderRef, RemoteId,
};
use ncdbookmarks::types::config::FolderNames;
use ncdbookmarks::types::description::{LLM_PLACEHOLDER, PREVIOUS_HEADER};
use ncdbookmarks::types::errors::{DestinationError, SummarizeError};
use rstest::rstest;

const FOLDERS: FolderIds = FolderIds {
    diigo: 10,
    unread: 20,
    private: 30,
    unreachable: 40,
};

/// In-memory Nextcloud.
#[derive(Default)]
struct MemoryDestination {
    bookmarks: Vec<DestinationBookmark>,
    folders: Vec<FolderRef>,
    next_id: i64,
    lookups: Vec<(String, Option<FolderId>)>,
}

impl DestinationClientTrait for MemoryDestination {
    fn find_by_url(
        &mut self,
        url: &str,
        folder: Option<FolderId>,
    ) -> Result<Vec<DestinationBookmark>, DestinationError> {
        self.lookups.push((url.to_string(), folder));
        Ok(self
            .bookmarks
            .iter()
            .filter(|b| b.url == url && folder.map_or(true, |f| b.folders.contains(&f)))
            .cloned()
            .collect())
    }

    fn create(&mut self, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        self.next_id += 1;
        self.bookmarks.push(DestinationBookmark {
            id: self.next_id,
            url: fields.url.clone(),
            title: fields.title.clone(),
            description: fields.description.clone(),
            tags: fields.tags.clone(),
            folders: fields.folders.clone(),
            ..Default::default()
        });
        Ok(self.next_id)
    }

    fn update(&mut self, id: RemoteId, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        let bookmark = self
            .bookmarks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| DestinationError::NotFound(id.to_string()))?;
        bookmark.title = fields.title.clone();
        bookmark.description = fields.description.clone();
        bookmark.tags = fields.tags.clone();
        bookmark.folders = fields.folders.clone();
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
        let id = 100 + self.folders.len() as FolderId;
        self.folders.push(FolderRef {
            id,
            title: title.to_string(),
            children: Vec::new(),
        });
        Ok(id)
    }
}

struct FixedSummarizer(Result<String, SummarizeError>);

impl SummarizerTrait for FixedSummarizer {
    fn summarize(&mut self, _url: &str, _existing: &str) -> Result<String, SummarizeError> {
        self.0.clone()
    }
}

fn record(url: &str, title: &str, description: &str) -> BookmarkRecord {
    let mut r = BookmarkRecord::new(url, title);
    r.description = description.to_string();
    r
}

fn stored(id: RemoteId, url: &str, title: &str, description: &str) -> DestinationBookmark {
    DestinationBookmark {
        id,
        url: url.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        tags: vec!["old".to_string()],
        folders: vec![FOLDERS.diigo, 99],
        ..Default::default()
    }
}

#[test]
fn no_match_creates() {
    let r = record("http://x", "X", "");
    match decide(&r, &[], &FOLDERS) {
        ReconcileOutcome::Create(fields) => {
            assert_eq!(fields.url, "http://x");
            assert_eq!(fields.title, "X");
            assert_eq!(fields.folders, vec![FOLDERS.diigo]);
            assert!(fields.description.contains(LLM_PLACEHOLDER));
        }
        other => panic!("expected Create, got {:?}", other),
    }
}

#[test]
fn same_title_skips() {
    let r = record("http://x", "X", "");
    let matches = vec![stored(1, "http://x", "Other", ""), stored(2, "http://x", "X", "")];
    assert_eq!(
        decide(&r, &matches, &FOLDERS),
        ReconcileOutcome::Skip("already present".to_string())
    );
}

#[test]
fn different_title_with_longer_existing_keeps_existing_title() {
    let r = record("http://x", "New", "short");
    let existing = stored(7, "http://x", "Existing", "a much longer stored description");

    let ReconcileOutcome::Merge(id, fields) = decide(&r, &[existing.clone()], &FOLDERS) else {
        panic!("expected Merge");
    };
    assert_eq!(id, 7);
    assert_eq!(fields.title, "Existing");
    assert!(fields.description.starts_with(&existing.description));
    assert!(fields.description.contains(PREVIOUS_HEADER));
    assert!(fields.description.ends_with("# ANNOTATIONS\n\n"));
}

#[rstest]
#[case("longer source text", "short", "Source")]
#[case("same", "same", "Existing")]
#[case("", "", "Existing")]
fn merged_title_prefers_longer_description(
    #[case] source_desc: &str,
    #[case] existing_desc: &str,
    #[case] expected: &str,
) {
    let r = record("http://x", "Source", source_desc);
    let existing = stored(1, "http://x", "Existing", existing_desc);
    assert_eq!(merged_title(&r, &existing), expected);
}

#[test]
fn merge_unions_tags_and_folders() {
    let mut r = record("http://x", "New", "");
    r.tags = vec!["old".to_string(), "fresh".to_string(), "fresh".to_string()];
    r.unread = true;
    let existing = stored(3, "http://x", "Existing", "");

    let ReconcileOutcome::Merge(_, fields) = decide(&r, &[existing], &FOLDERS) else {
        panic!("expected Merge");
    };
    assert_eq!(fields.tags, vec!["old", "fresh"]);
    assert_eq!(fields.folders, vec![FOLDERS.diigo, 99, FOLDERS.unread]);
}

#[rstest]
#[case(false, true, vec![10])]
#[case(true, true, vec![10, 20])]
#[case(false, false, vec![10, 30])]
#[case(true, false, vec![10, 20, 30])]
fn folder_assignment_follows_flags(
    #[case] unread: bool,
    #[case] private_flag: bool,
    #[case] expected: Vec<FolderId>,
) {
    let mut r = record("http://x", "X", "");
    r.unread = unread;
    r.private = private_flag;
    assert_eq!(assign_folders(&r, &FOLDERS), expected);
}

#[test]
fn process_creates_then_skips_on_second_run() {
    let mut dest = MemoryDestination::default();
    let reconciler = Reconciler::new(FOLDERS);
    let r = record("http://x", "X", "note");

    let first = reconciler.process(&mut dest, None, &r).unwrap();
    assert_eq!(first, Applied::Created(1));
    let second = reconciler.process(&mut dest, None, &r).unwrap();
    assert!(matches!(second, Applied::Skipped(_)));

    assert_eq!(dest.bookmarks.len(), 1);
    assert_eq!(dest.lookups[0], ("http://x".to_string(), Some(FOLDERS.diigo)));
}

#[test]
fn unscoped_lookup_sees_all_folders() {
    let mut dest = MemoryDestination::default();
    dest.bookmarks.push(DestinationBookmark {
        id: 5,
        url: "http://x".to_string(),
        title: "X".to_string(),
        folders: vec![77],
        ..Default::default()
    });
    let r = record("http://x", "X", "");

    let scoped = Reconciler::new(FOLDERS).process(&mut dest, None, &r).unwrap();
    assert!(matches!(scoped, Applied::Created(_)));

    let mut dest2 = MemoryDestination::default();
    dest2.bookmarks.push(dest.bookmarks[0].clone());
    let unscoped = Reconciler::unscoped(FOLDERS).process(&mut dest2, None, &r).unwrap();
    assert!(matches!(unscoped, Applied::Skipped(_)));
}

#[test]
fn augment_fills_generated_description() {
    let mut dest = MemoryDestination::default();
    let mut summarizer = FixedSummarizer(Ok("Eine Zusammenfassung".to_string()));
    let r = record("http://x", "X", "");

    Reconciler::new(FOLDERS)
        .process(&mut dest, Some(&mut summarizer), &r)
        .unwrap();
    let created = &dest.bookmarks[0];
    assert!(created.description.contains("# LLM_DESCRIPTION\nEine Zusammenfassung\n"));
    assert!(!created.description.contains(LLM_PLACEHOLDER));
}

#[test]
fn augment_unreachable_files_into_folder_and_keeps_placeholder() {
    let mut dest = MemoryDestination::default();
    let mut summarizer = FixedSummarizer(Err(SummarizeError::Unreachable(Some(404))));
    let r = record("http://gone", "Gone", "");

    Reconciler::new(FOLDERS)
        .process(&mut dest, Some(&mut summarizer), &r)
        .unwrap();
    let created = &dest.bookmarks[0];
    assert!(created.folders.contains(&FOLDERS.unreachable));
    assert!(created.description.contains(LLM_PLACEHOLDER));
}

#[test]
fn augment_model_error_keeps_placeholder_only() {
    let mut dest = MemoryDestination::default();
    let mut summarizer = FixedSummarizer(Err(SummarizeError::ModelError("down".to_string())));
    let r = record("http://x", "X", "");

    Reconciler::new(FOLDERS)
        .process(&mut dest, Some(&mut summarizer), &r)
        .unwrap();
    let created = &dest.bookmarks[0];
    assert_eq!(created.folders, vec![FOLDERS.diigo]);
    assert!(created.description.contains(LLM_PLACEHOLDER));
}

#[test]
fn folder_ids_resolve_reuses_and_creates() {
    let mut dest = MemoryDestination::default();
    dest.folders.push(FolderRef {
        id: 5,
        title: "DIIGO".to_string(),
        children: Vec::new(),
    });
    dest.folders.push(FolderRef {
        id: 6,
        title: "DIIGO".to_string(),
        children: Vec::new(),
    });

    let ids = FolderIds::resolve(&mut dest, &FolderNames::default()).unwrap();
    assert_eq!(ids.diigo, 5);
    assert_eq!(dest.folders.len(), 5);

    let again = FolderIds::resolve(&mut dest, &FolderNames::default()).unwrap();
    assert_eq!(again, ids);
    assert_eq!(dest.folders.len(), 5);
}
