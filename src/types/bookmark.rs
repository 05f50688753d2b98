use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Nextcloud bookmark id.
pub type RemoteId = i64;

/// Nextcloud folder id. `-1` is the root folder.
pub type FolderId = i64;

/// Diigo interaction API item id.
pub type LinkId = u64;

/// Columns every Diigo-style CSV must carry.
pub const SOURCE_FIELDS: [&str; 7] = [
    "title",
    "url",
    "tags",
    "description",
    "comments",
    "annotations",
    "created_at",
];

/// Columns every Nextcloud-style CSV must carry.
pub const DESTINATION_FIELDS: [&str; 5] = ["title", "url", "description", "tags", "folders"];

/// Which service a batch of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Source,
    Destination,
}

impl RecordKind {
    /// Detects the schema from a header row: a `folders` column marks a destination dump.
    pub fn detect<S: AsRef<str>>(columns: &[S]) -> Self {
        if columns.iter().any(|c| c.as_ref() == "folders") {
            RecordKind::Destination
        } else {
            RecordKind::Source
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Source => &SOURCE_FIELDS,
            RecordKind::Destination => &DESTINATION_FIELDS,
        }
    }
}

/// Canonical in-memory bookmark. `(url, title)` identifies it inside a CSV store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Destination-only.
    pub folders: Vec<FolderId>,
    /// Source-only. Nextcloud assigns its own timestamps and ignores this.
    pub created_at: Option<String>,
    pub remote_id: Option<RemoteId>,
    pub source_id: Option<LinkId>,
    /// Concatenated highlight contents.
    pub annotations: String,
    pub comments: String,
    pub unread: bool,
    /// Diigo's raw `private` flag. Diigo reports `false` for items that ARE private;
    /// the inversion is upstream behaviour and is kept as-is.
    pub private: bool,
}

impl BookmarkRecord {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            private: true,
            ..Default::default()
        }
    }

    /// The `(url, title)` dedup key.
    pub fn key(&self) -> (&str, &str) {
        (&self.url, &self.title)
    }

    /// True if the item is private on Diigo (raw flag is `false`).
    pub fn is_private_on_source(&self) -> bool {
        !self.private
    }
}

/// A highlight or sticky note attached to a Diigo item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Raw item as returned by Diigo (`load_user_items` or the documented `bookmarks` call).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    #[serde(default, deserialize_with = "lenient_link_id")]
    pub link_id: Option<LinkId>,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, alias = "desc", deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: String,
    #[serde(default)]
    pub comments: Value,
    #[serde(default, deserialize_with = "lenient_annotations")]
    pub annotations: Vec<Annotation>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub readed: bool,
    /// Diigo's raw flag; `false` means the item is private.
    #[serde(default = "default_private", deserialize_with = "lenient_flag")]
    pub private: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_private() -> bool {
    true
}

impl SourceItem {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            link_id: None,
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
            tags: String::new(),
            comments: Value::Null,
            annotations: Vec::new(),
            created_at: String::new(),
            readed: false,
            private: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Bookmark as stored by Nextcloud Bookmarks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationBookmark {
    #[serde(default)]
    pub id: RemoteId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folders: Vec<FolderId>,
    /// Fields this client does not model (added, lastmodified, clickcount, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Writable subset of a Nextcloud bookmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkFields {
    pub url: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub folders: Vec<FolderId>,
}

/// A Nextcloud folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: FolderId,
    pub title: String,
    #[serde(default)]
    pub children: Vec<FolderRef>,
}

/// Diigo visibility modes accepted by `convert_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn mode(&self) -> u8 {
        match self {
            Visibility::Public => 1,
            Visibility::Private => 2,
        }
    }
}

/// Sort orders accepted by the interaction API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Updated,
    CreatedAt,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Updated => "updated",
            SortKey::CreatedAt => "created_at",
        }
    }
}

// --- lenient field decoding; Diigo is inconsistent about JSON types ---

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_link_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<LinkId>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_tags<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    })
}

fn lenient_annotations<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Annotation>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Annotation {
                    content: s,
                    extra: BTreeMap::new(),
                },
                other => serde_json::from_value(other).unwrap_or_default(),
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![Annotation {
            content: s,
            extra: BTreeMap::new(),
        }],
        _ => Vec::new(),
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true" | "yes"),
        _ => false,
    })
}
