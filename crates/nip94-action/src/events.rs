use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};

pub const KIND_FILE_METADATA: u16 = 1063;

pub const TAG_URL: &str = "url";
pub const TAG_MIME_TYPE: &str = "m";
pub const TAG_HASH: &str = "x";
pub const TAG_ORIGINAL_HASH: &str = "ox";
pub const TAG_SIZE: &str = "size";
pub const TAG_DIMENSIONS: &str = "dim";
pub const TAG_FILENAME: &str = "filename";

/// Tag names owned by the metadata schema; custom tags may not reuse them.
pub const RESERVED_TAG_NAMES: [&str; 7] = [
    TAG_URL,
    TAG_MIME_TYPE,
    TAG_HASH,
    TAG_ORIGINAL_HASH,
    TAG_SIZE,
    TAG_DIMENSIONS,
    TAG_FILENAME,
];

static LAST_CREATED_AT: AtomicU64 = AtomicU64::new(0);

/// Normalized file description produced by input validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub url: String,
    pub mime_type: String,
    pub file_hash: String,
    pub original_hash: Option<String>,
    pub size: Option<u64>,
    pub dimensions: Option<String>,
    pub filename: Option<String>,
    pub content: String,
    pub extra_tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrTag {
    pub name: String,
    pub values: Vec<String>,
}

impl NostrTag {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, vec![value.into()])
    }

    pub fn to_sdk_tag(&self) -> Result<Tag, nostr_sdk::nostr::event::tag::Error> {
        let mut parts = Vec::with_capacity(1 + self.values.len());
        parts.push(self.name.clone());
        parts.extend(self.values.clone());
        Tag::parse(parts)
    }

    pub fn from_sdk_tag(tag: &Tag) -> Self {
        let parts = tag.clone().to_vec();
        let name = parts.first().cloned().unwrap_or_default();
        let values = parts.into_iter().skip(1).collect();
        Self { name, values }
    }
}

/// An unsigned kind 1063 record. Signing consumes a reference and yields a
/// separate [`crate::SignedEvent`]; this value is never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEvent {
    pub kind: u16,
    pub created_at: u64,
    pub tags: Vec<NostrTag>,
    pub content: String,
}

impl MetadataEvent {
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        tag_value(&self.tags, name)
    }
}

/// Assemble the metadata event for `file`.
///
/// Tag order is part of the signed payload: `url`, `m`, `x`, then `ox`,
/// `size`, `dim`, `filename` when present, then custom tags.
pub fn build_metadata_event(file: &FileMetadata) -> MetadataEvent {
    build_metadata_event_at(file, next_created_at())
}

pub fn build_metadata_event_at(file: &FileMetadata, created_at: u64) -> MetadataEvent {
    let mut tags = vec![
        NostrTag::single(TAG_URL, &file.url),
        NostrTag::single(TAG_MIME_TYPE, &file.mime_type),
        NostrTag::single(TAG_HASH, &file.file_hash),
    ];

    if let Some(original_hash) = &file.original_hash {
        tags.push(NostrTag::single(TAG_ORIGINAL_HASH, original_hash));
    }
    if let Some(size) = file.size {
        tags.push(NostrTag::single(TAG_SIZE, size.to_string()));
    }
    if let Some(dimensions) = &file.dimensions {
        tags.push(NostrTag::single(TAG_DIMENSIONS, dimensions));
    }
    if let Some(filename) = &file.filename {
        tags.push(NostrTag::single(TAG_FILENAME, filename));
    }

    for (name, value) in &file.extra_tags {
        tags.push(NostrTag::single(name, value));
    }

    MetadataEvent {
        kind: KIND_FILE_METADATA,
        created_at,
        tags,
        content: file.content.clone(),
    }
}

pub fn tag_value<'a>(tags: &'a [NostrTag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.name == name)
        .and_then(|tag| tag.values.first().map(|s| s.as_str()))
}

/// First value of the `name` tag on a relay-delivered event.
pub fn event_tag_value<'a>(event: &'a Event, name: &str) -> Option<&'a str> {
    event
        .tags
        .iter()
        .map(|tag| tag.as_slice())
        .find(|parts| parts.first().map(String::as_str) == Some(name))
        .and_then(|parts| parts.get(1).map(String::as_str))
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Wall-clock seconds, never lower than a value previously handed out by
/// this process.
fn next_created_at() -> u64 {
    let now = unix_timestamp();
    let previous = LAST_CREATED_AT.fetch_max(now, Ordering::SeqCst);
    previous.max(now)
}
