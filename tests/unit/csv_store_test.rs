//! Integration-level tests for the CsvStore against a temporary directory.

use ncdbookmarks::managers::csv_store::{CsvStore, CsvStoreTrait, RecordBatch};
use ncdbookmarks::types::bookmark::{BookmarkRecord, RecordKind, SourceItem};
use ncdbookmarks::types::errors::CsvStoreError;
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

fn source_batch(rows: &[(&str, &str, &str)]) -> RecordBatch {
    let items: Vec<SourceItem> = rows
        .iter()
        .map(|(url, title, desc)| {
            let mut item = SourceItem::new(url, title);
            item.description = desc.to_string();
            item
        })
        .collect();
    RecordBatch::from_source_items(&items)
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = CsvStore::new();
    let err = store.load(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, CsvStoreError::NotFound(_)));
}

#[test]
fn append_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/deeper/dump.csv");
    let store = CsvStore::new();

    let stored = store.append(&path, source_batch(&[("http://a", "A", "")])).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(path.exists());
    assert_eq!(store.load(&path).unwrap().len(), 1);
}

#[test]
fn append_replaces_rows_with_the_same_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();

    store
        .append(&path, source_batch(&[("http://a", "A", "old"), ("http://b", "B", "")]))
        .unwrap();
    store.append(&path, source_batch(&[("http://a", "A", "new")])).unwrap();

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    let records = loaded.to_records();
    let a = records.iter().find(|r| r.url == "http://a").unwrap();
    assert_eq!(a.description, "new");
}

#[test]
fn same_url_different_title_is_kept_twice() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();

    let stored = store
        .append(&path, source_batch(&[("http://a", "A", ""), ("http://a", "Other", "")]))
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn append_rejects_batch_missing_required_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();

    let mut batch = RecordBatch::new(["title", "url", "tags", "description"]);
    batch.push_row(vec!["A".into(), "http://a".into(), "".into(), "".into()]);

    match store.append(&path, batch) {
        Err(CsvStoreError::SchemaMismatch(missing)) => {
            assert_eq!(missing, vec!["comments", "annotations", "created_at"]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert!(!path.exists(), "a rejected batch must not create the file");
}

#[test]
fn desc_alias_is_renamed_before_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();

    let mut batch = RecordBatch::new([
        "title",
        "url",
        "tags",
        "desc",
        "comments",
        "annotations",
        "created_at",
    ]);
    batch.push_row(vec![
        "A".into(),
        "http://a".into(),
        "x".into(),
        "from alias".into(),
        "".into(),
        "".into(),
        "2020".into(),
    ]);

    let stored = store.append(&path, batch).unwrap();
    assert_eq!(stored.get(0, "description"), Some("from alias"));
}

#[test]
fn backup_moves_file_to_first_free_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.csv");
    std::fs::write(&path, "title,url\n").unwrap();
    std::fs::write(dir.path().join("a.csv.0.bak"), "old backup").unwrap();

    let store = CsvStore::new();
    let backup = store.backup(&path).unwrap();

    assert_eq!(backup, Some(dir.path().join("a.csv.1.bak")));
    assert!(!path.exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.csv.0.bak")).unwrap(),
        "old backup"
    );
}

#[test]
fn backup_of_missing_file_does_nothing() {
    let dir = TempDir::new().unwrap();
    let store = CsvStore::new();
    assert_eq!(store.backup(&dir.path().join("none.csv")).unwrap(), None);
}

#[test]
fn destination_records_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nc.csv");
    let store = CsvStore::new();

    let mut record = BookmarkRecord::new("http://x", "X");
    record.tags = vec!["a".to_string(), "b c".to_string(), "rust, tokio".to_string()];
    record.folders = vec![3, 7];
    record.remote_id = Some(11);
    store
        .append(&path, RecordBatch::from_records(&[record.clone()], RecordKind::Destination))
        .unwrap();

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded.kind(), RecordKind::Destination);
    let back = &loaded.to_records()[0];
    assert_eq!(back.tags, record.tags);
    assert_eq!(back.folders, record.folders);
    assert_eq!(back.remote_id, Some(11));
}

#[test]
fn inspect_marks_required_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();
    store.append(&path, source_batch(&[("http://a", "A", "")])).unwrap();

    let summary = store.inspect(&path).unwrap();
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.kind, RecordKind::Source);
    assert!(summary.missing.is_empty());
    assert!(summary.columns.contains(&("url".to_string(), true)));
    assert!(summary.columns.contains(&("link_id".to_string(), false)));
}

#[test]
fn unknown_item_fields_survive_the_dump() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.csv");
    let store = CsvStore::new();

    let mut first = SourceItem::new("http://a", "A");
    first.extra.insert("updated_at".to_string(), json!("2023/01/02 10:00:00 +0000"));
    first.extra.insert("shared".to_string(), json!("yes"));
    first.extra.insert("users".to_string(), json!(3));
    let mut second = SourceItem::new("http://b", "B");
    second.extra.insert("folders".to_string(), json!(["reading"]));
    store
        .append(&path, RecordBatch::from_source_items(&[first, second]))
        .unwrap();

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded.kind(), RecordKind::Source);
    assert_eq!(loaded.get(0, "updated_at"), Some("2023/01/02 10:00:00 +0000"));
    assert_eq!(loaded.get(0, "shared"), Some("yes"));
    assert_eq!(loaded.get(0, "users"), Some("3"));
    assert_eq!(loaded.get(1, "updated_at"), Some(""));
    assert_eq!(loaded.get(1, "diigo_folders"), Some(r#"["reading"]"#));
}

#[rstest]
#[case("unread,private", "True,False", true, false)]
#[case("unread,private", "false,TRUE", false, true)]
#[case("unread,private", "1,0", true, false)]
#[case("readed,private", "False,False", true, false)]
#[case("readed,private", "True,True", false, true)]
#[case("readed,private", ",", false, true)]
fn flags_from_older_dumps(
    #[case] flag_columns: &str,
    #[case] flag_values: &str,
    #[case] unread: bool,
    #[case] private: bool,
) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.csv");
    std::fs::write(
        &path,
        format!(
            "title,url,tags,description,comments,annotations,created_at,{}\nA,http://a,,,,,,{}\n",
            flag_columns, flag_values
        ),
    )
    .unwrap();

    let record = &CsvStore::new().load(&path).unwrap().to_records()[0];
    assert_eq!(record.unread, unread);
    assert_eq!(record.private, private);
    assert_eq!(record.is_private_on_source(), !private);
}

#[test]
fn destination_lists_from_older_dumps() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nc_legacy.csv");
    std::fs::write(
        &path,
        "id,title,url,description,tags,folders\n4,X,http://x,,\"['a', 'b c']\",\"[3, 7]\"\n5,Y,http://y,,\"a,b\",3\n",
    )
    .unwrap();

    let records = CsvStore::new().load(&path).unwrap().to_records();
    assert_eq!(records[0].tags, vec!["a", "b c"]);
    assert_eq!(records[0].folders, vec![3, 7]);
    assert_eq!(records[1].tags, vec!["a", "b"]);
    assert_eq!(records[1].folders, vec![3]);
}
