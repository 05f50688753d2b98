//! Property-based tests for backup naming.
//!
//! A backup always takes the smallest free index and never touches existing
//! backups.

use ncdbookmarks::managers::csv_store::{CsvStore, CsvStoreTrait};
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn backup_after_existing_zero_takes_one() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.csv");
    std::fs::write(&path, "current").unwrap();
    std::fs::write(dir.path().join("a.csv.0.bak"), "zero").unwrap();

    let backup = CsvStore::new().backup(&path).unwrap();

    assert_eq!(backup, Some(dir.path().join("a.csv.1.bak")));
    assert_eq!(std::fs::read_to_string(dir.path().join("a.csv.1.bak")).unwrap(), "current");
    assert_eq!(std::fs::read_to_string(dir.path().join("a.csv.0.bak")).unwrap(), "zero");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn backup_takes_smallest_free_index(taken in prop::collection::btree_set(0u32..8, 0..6)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "current").unwrap();
        for i in &taken {
            std::fs::write(dir.path().join(format!("a.csv.{}.bak", i)), format!("backup {}", i)).unwrap();
        }
        let expected = (0u32..).find(|i| !taken.contains(i)).unwrap();

        let backup = CsvStore::new().backup(&path).unwrap();

        prop_assert_eq!(backup, Some(dir.path().join(format!("a.csv.{}.bak", expected))));
        prop_assert!(!path.exists());
        for i in &taken {
            let content = std::fs::read_to_string(dir.path().join(format!("a.csv.{}.bak", i))).unwrap();
            prop_assert_eq!(content, format!("backup {}", i));
        }
    }

    #[test]
    fn repeated_backups_count_up(runs in 1usize..5) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.csv");
        let store = CsvStore::new();
        for i in 0..runs {
            std::fs::write(&path, format!("run {}", i)).unwrap();
            let backup = store.backup(&path).unwrap();
            prop_assert_eq!(backup, Some(dir.path().join(format!("dump.csv.{}.bak", i))));
        }
    }
}
