//! CSV Store.
//!
//! Append-only mirror of bookmark batches. Every append loads the existing file,
//! unions it with the new batch, drops `(url, title)` duplicates keeping the last
//! occurrence and rewrites the whole file. Existing dumps are moved to numbered
//! backups before a new run overwrites them.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::services::normalizer::{
    annotations_to_highlights, comments_to_text, normalize_tags,
};
use crate::types::bookmark::{BookmarkRecord, RecordKind, SourceItem};
use crate::types::errors::CsvStoreError;

/// Column written by one upstream export tool instead of `description`.
pub const DESCRIPTION_ALIAS: &str = "desc";

const SOURCE_COLUMNS: [&str; 10] = [
    "title",
    "url",
    "tags",
    "description",
    "comments",
    "annotations",
    "created_at",
    "link_id",
    "unread",
    "private",
];

const DESTINATION_COLUMNS: [&str; 6] = ["id", "title", "url", "description", "tags", "folders"];

/// A table of bookmark rows with named columns. Extra columns are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordBatch {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordBatch {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::detect(&self.columns)
    }

    /// Renames a column. Does nothing if `from` is absent or `to` already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if self.column_index(to).is_some() {
            return;
        }
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    /// Required columns for this batch's kind that are not present.
    pub fn missing_columns(&self) -> Vec<String> {
        self.kind()
            .required_fields()
            .iter()
            .filter(|f| self.column_index(f).is_none())
            .map(|f| f.to_string())
            .collect()
    }

    /// Builds a Diigo-schema batch from raw interaction API items. Fields the
    /// item carries beyond the fixed columns become extra columns.
    pub fn from_source_items(items: &[SourceItem]) -> Self {
        let extra_keys: BTreeSet<&str> = items
            .iter()
            .flat_map(|i| i.extra.keys().map(String::as_str))
            .collect();
        let columns = SOURCE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(extra_keys.iter().map(|k| extra_column_name(k)));
        let mut batch = Self::new(columns);
        for item in items {
            let mut row = vec![
                item.title.clone(),
                item.url.clone(),
                item.tags.clone(),
                item.description.clone(),
                comments_to_text(&item.comments),
                annotations_to_highlights(&item.annotations),
                item.created_at.clone(),
                item.link_id.map(|id| id.to_string()).unwrap_or_default(),
                (!item.readed).to_string(),
                item.private.to_string(),
            ];
            row.extend(
                extra_keys
                    .iter()
                    .map(|k| item.extra.get(*k).map(cell_text).unwrap_or_default()),
            );
            batch.push_row(row);
        }
        batch
    }

    /// Builds a batch from normalized records in the given schema.
    pub fn from_records(records: &[BookmarkRecord], kind: RecordKind) -> Self {
        match kind {
            RecordKind::Source => {
                let mut batch = Self::new(SOURCE_COLUMNS);
                for r in records {
                    batch.push_row(vec![
                        r.title.clone(),
                        r.url.clone(),
                        r.tags.join(","),
                        r.description.clone(),
                        r.comments.clone(),
                        r.annotations.clone(),
                        r.created_at.clone().unwrap_or_default(),
                        r.source_id.map(|id| id.to_string()).unwrap_or_default(),
                        r.unread.to_string(),
                        r.private.to_string(),
                    ]);
                }
                batch
            }
            RecordKind::Destination => {
                let mut batch = Self::new(DESTINATION_COLUMNS);
                for r in records {
                    batch.push_row(vec![
                        r.remote_id.map(|id| id.to_string()).unwrap_or_default(),
                        r.title.clone(),
                        r.url.clone(),
                        r.description.clone(),
                        serde_json::to_string(&r.tags).unwrap_or_default(),
                        r.folders
                            .iter()
                            .map(|f| f.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                    ]);
                }
                batch
            }
        }
    }

    /// Converts rows back into records. Missing columns read as empty.
    pub fn to_records(&self) -> Vec<BookmarkRecord> {
        let kind = self.kind();
        (0..self.rows.len())
            .map(|i| {
                let field = |name: &str| self.get(i, name).unwrap_or("").to_string();
                let tags = match kind {
                    RecordKind::Source => normalize_tags(&field("tags")),
                    RecordKind::Destination => parse_list(&field("tags")),
                };
                let created_at = field("created_at");
                BookmarkRecord {
                    url: field("url"),
                    title: field("title"),
                    description: field("description"),
                    tags,
                    folders: parse_list(&field("folders"))
                        .iter()
                        .filter_map(|f| f.parse().ok())
                        .collect(),
                    created_at: if created_at.is_empty() { None } else { Some(created_at) },
                    remote_id: field("id").trim().parse().ok(),
                    source_id: field("link_id").trim().parse().ok(),
                    annotations: field("annotations"),
                    comments: field("comments"),
                    // Older dumps carry Diigo's raw `readed` instead of `unread`
                    unread: parse_flag(&field("unread"))
                        .or_else(|| parse_flag(&field("readed")).map(|readed| !readed))
                        .unwrap_or(false),
                    private: parse_flag(&field("private")).unwrap_or(true),
                }
            })
            .collect()
    }

    /// Appends `other` below `self`, widening the column set as needed.
    fn union(mut self, other: RecordBatch) -> RecordBatch {
        for col in &other.columns {
            if self.column_index(col).is_none() {
                self.columns.push(col.clone());
            }
        }
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        for row in other.rows {
            let mut mapped = vec![String::new(); width];
            for (value, &idx) in row.into_iter().zip(mapping.iter()) {
                mapped[idx] = value;
            }
            self.rows.push(mapped);
        }
        self
    }

    /// Drops rows whose `(url, title)` appears again later.
    fn dedup_keep_last(&mut self) {
        let (Some(url_idx), Some(title_idx)) = (self.column_index("url"), self.column_index("title"))
        else {
            return;
        };
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut kept: Vec<Vec<String>> = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..).rev() {
            if seen.insert((row[url_idx].clone(), row[title_idx].clone())) {
                kept.push(row);
            }
        }
        kept.reverse();
        self.rows = kept;
    }
}

/// Column for an extra item field. Names that would read as Nextcloud columns
/// get a `diigo_` prefix so the batch keeps the Diigo schema.
fn extra_column_name(key: &str) -> String {
    if DESTINATION_COLUMNS.contains(&key) && !SOURCE_COLUMNS.contains(&key) {
        format!("diigo_{}", key)
    } else {
        key.to_string()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads a boolean cell: `true`/`false` in any case, `1`/`0`, `yes`/`no`.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Reads a list cell. Accepts a JSON array, a bracketed list with quoted
/// items (`['a', 'b']`) and plain comma-separated text.
fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if let Ok(items) = serde_json::from_str::<Vec<Value>>(value) {
        return items.iter().map(cell_text).filter(|t| !t.is_empty()).collect();
    }
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|t| t.trim().trim_matches(&['\'', '"'][..]).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Short description of a CSV file for the `inspect` command.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvSummary {
    pub rows: usize,
    pub kind: RecordKind,
    /// Column name and whether the schema requires it.
    pub columns: Vec<(String, bool)>,
    pub missing: Vec<String>,
}

/// Trait defining CSV mirror operations.
pub trait CsvStoreTrait {
    fn load(&self, path: &Path) -> Result<RecordBatch, CsvStoreError>;
    fn append(&self, path: &Path, batch: RecordBatch) -> Result<RecordBatch, CsvStoreError>;
    fn backup(&self, path: &Path) -> Result<Option<PathBuf>, CsvStoreError>;
    fn inspect(&self, path: &Path) -> Result<CsvSummary, CsvStoreError>;
}

/// File-backed CSV store.
#[derive(Debug, Default, Clone)]
pub struct CsvStore;

impl CsvStore {
    pub fn new() -> Self {
        Self
    }

    /// Returns `path.N.bak` for the smallest N not yet taken.
    pub fn next_backup_path(path: &Path) -> PathBuf {
        let base = path.to_string_lossy().to_string();
        let mut i = 0u32;
        loop {
            let candidate = PathBuf::from(format!("{}.{}.bak", base, i));
            if !candidate.exists() {
                return candidate;
            }
            i += 1;
        }
    }

    fn write(path: &Path, batch: &RecordBatch) -> Result<(), CsvStoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CsvStoreError::Io(format!("Failed to create directory {}: {}", parent.display(), e))
                })?;
            }
        }

        // Write next to the target and rename, so a failed write leaves the old file intact
        let tmp = PathBuf::from(format!("{}.tmp", path.to_string_lossy()));
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .map_err(|e| CsvStoreError::Csv(e.to_string()))?;
            writer
                .write_record(&batch.columns)
                .map_err(|e| CsvStoreError::Csv(e.to_string()))?;
            for row in &batch.rows {
                writer
                    .write_record(row)
                    .map_err(|e| CsvStoreError::Csv(e.to_string()))?;
            }
            writer.flush().map_err(|e| CsvStoreError::Io(e.to_string()))?;
        }
        fs::rename(&tmp, path).map_err(|e| CsvStoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl CsvStoreTrait for CsvStore {
    fn load(&self, path: &Path) -> Result<RecordBatch, CsvStoreError> {
        if !path.exists() {
            return Err(CsvStoreError::NotFound(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| CsvStoreError::Csv(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| CsvStoreError::Csv(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut batch = RecordBatch::new(headers);
        for record in reader.records() {
            let record = record.map_err(|e| CsvStoreError::Csv(e.to_string()))?;
            batch.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(batch)
    }

    fn append(&self, path: &Path, mut batch: RecordBatch) -> Result<RecordBatch, CsvStoreError> {
        batch.rename_column(DESCRIPTION_ALIAS, "description");
        let missing = batch.missing_columns();
        if !missing.is_empty() {
            tracing::error!(
                path = %path.display(),
                missing = ?missing,
                columns = ?batch.columns(),
                "batch does not match the CSV schema"
            );
            return Err(CsvStoreError::SchemaMismatch(missing));
        }

        let existing = match self.load(path) {
            Ok(existing) => existing,
            Err(CsvStoreError::NotFound(_)) => RecordBatch::new(batch.columns().to_vec()),
            Err(e) => return Err(e),
        };
        let mut merged = existing.union(batch);
        merged.dedup_keep_last();
        Self::write(path, &merged)?;
        tracing::debug!(path = %path.display(), rows = merged.len(), "CSV store updated");
        Ok(merged)
    }

    fn backup(&self, path: &Path) -> Result<Option<PathBuf>, CsvStoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let backup = Self::next_backup_path(path);
        fs::rename(path, &backup).map_err(|e| CsvStoreError::Io(e.to_string()))?;
        tracing::info!(from = %path.display(), to = %backup.display(), "moved CSV to backup");
        Ok(Some(backup))
    }

    fn inspect(&self, path: &Path) -> Result<CsvSummary, CsvStoreError> {
        let batch = self.load(path)?;
        let kind = batch.kind();
        let required = kind.required_fields();
        Ok(CsvSummary {
            rows: batch.len(),
            kind,
            columns: batch
                .columns()
                .iter()
                .map(|c| (c.clone(), required.contains(&c.as_str())))
                .collect(),
            missing: batch.missing_columns(),
        })
    }
}
