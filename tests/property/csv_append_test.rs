//! Property-based tests for CSV Store appends.
//!
//! Appending the same batch twice stores the same rows as appending it once,
//! and the stored file never holds two rows with the same `(url, title)`.

use std::collections::HashSet;

use ncdbookmarks::managers::csv_store::{CsvStore, CsvStoreTrait, RecordBatch};
use ncdbookmarks::types::bookmark::SourceItem;
use proptest::prelude::*;
use tempfile::TempDir;

fn arb_item() -> impl Strategy<Value = SourceItem> {
    ("[a-d]{1,2}", "[A-D]{1,2}", "[a-z ,]{0,12}", "[a-z ]{0,12}").prop_map(|(path, title, tags, desc)| {
        let mut item = SourceItem::new(&format!("http://host/{}", path), &title);
        item.tags = tags;
        item.description = desc;
        item
    })
}

fn keys(batch: &RecordBatch) -> Vec<(String, String)> {
    (0..batch.len())
        .map(|i| {
            (
                batch.get(i, "url").unwrap_or("").to_string(),
                batch.get(i, "title").unwrap_or("").to_string(),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn append_is_idempotent(items in prop::collection::vec(arb_item(), 1..12)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.csv");
        let store = CsvStore::new();
        let batch = RecordBatch::from_source_items(&items);

        let once = store.append(&path, batch.clone()).unwrap();
        let twice = store.append(&path, batch).unwrap();

        prop_assert_eq!(once.rows(), twice.rows());
        let loaded = store.load(&path).unwrap();
        prop_assert_eq!(loaded.rows(), once.rows());
    }

    #[test]
    fn stored_keys_are_unique(items in prop::collection::vec(arb_item(), 1..16)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.csv");
        let store = CsvStore::new();

        let stored = store.append(&path, RecordBatch::from_source_items(&items)).unwrap();
        let stored_keys = keys(&stored);
        let unique: HashSet<_> = stored_keys.iter().cloned().collect();
        prop_assert_eq!(unique.len(), stored_keys.len());

        let input_keys: HashSet<(String, String)> =
            items.iter().map(|i| (i.url.clone(), i.title.clone())).collect();
        prop_assert_eq!(unique, input_keys);
    }
}
