//! Record normalization.
//!
//! Turns raw Diigo and Nextcloud payloads into `BookmarkRecord`s and applies the
//! tag and description rules shared by every import path.

use serde_json::Value;

use crate::types::bookmark::{Annotation, BookmarkRecord, DestinationBookmark, SourceItem};
use crate::types::description::{compose_description, DescriptionBlock};

/// Splits a comma-separated tag string into normalized tags.
///
/// Each tag is trimmed, lowercased and has `_` replaced by a space. Empty input
/// yields a single empty tag; existing CSV dumps contain that value and later
/// merges depend on it.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase().replace('_', " "))
        .collect()
}

/// Concatenates annotation contents in order, without separators.
pub fn annotations_to_highlights(annotations: &[Annotation]) -> String {
    annotations.iter().map(|a| a.content.as_str()).collect()
}

/// Flattens Diigo's `comments` field. Empty lists become an empty string.
pub fn comments_to_text(comments: &Value) -> String {
    match comments {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|c| match c {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .get("content")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Removes duplicate tags, keeping first occurrences.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for t in tags {
        if !out.contains(t) {
            out.push(t.clone());
        }
    }
    out
}

/// Counts tags over a batch, most frequent first. Ties keep first-seen order.
pub fn tag_frequencies(records: &[BookmarkRecord]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for tag in records.iter().flat_map(|r| r.tags.iter()) {
        match counts.iter_mut().find(|(t, _)| t == tag) {
            Some((_, n)) => *n += 1,
            None => counts.push((tag.clone(), 1)),
        }
    }
    // stable sort keeps first-seen order for equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Normalizes a raw Diigo item.
pub fn record_from_source_item(item: &SourceItem) -> BookmarkRecord {
    BookmarkRecord {
        url: item.url.clone(),
        title: item.title.clone(),
        description: item.description.clone(),
        tags: normalize_tags(&item.tags),
        folders: Vec::new(),
        created_at: Some(item.created_at.clone()),
        remote_id: None,
        source_id: item.link_id,
        annotations: annotations_to_highlights(&item.annotations),
        comments: comments_to_text(&item.comments),
        unread: !item.readed,
        private: item.private,
    }
}

/// Normalizes a Nextcloud bookmark.
pub fn record_from_destination(bookmark: &DestinationBookmark) -> BookmarkRecord {
    BookmarkRecord {
        url: bookmark.url.clone(),
        title: bookmark.title.clone(),
        description: bookmark.description.clone(),
        tags: bookmark.tags.clone(),
        folders: bookmark.folders.clone(),
        created_at: None,
        remote_id: Some(bookmark.id),
        source_id: None,
        annotations: String::new(),
        comments: String::new(),
        unread: false,
        private: true,
    }
}

/// Description to send to Nextcloud for an imported record.
///
/// Descriptions composed by an earlier run pass through unchanged so repeated
/// imports do not nest blocks.
pub fn import_description(record: &BookmarkRecord) -> String {
    if DescriptionBlock::is_composed(&record.description) {
        return record.description.clone();
    }
    compose_description(
        &record.description,
        record.created_at.as_deref().unwrap_or(""),
        &record.annotations,
    )
}
