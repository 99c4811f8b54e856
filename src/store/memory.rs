//! In-memory [`ObjectStore`] with S3-style delimiter and pagination semantics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use super::{ByteStream, ObjectStore};
use crate::error::{RemoteError, RemoteErrorKind};
use crate::types::{FileDescriptor, ListingPage};

/// Default number of entries (files plus common prefixes) per page
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Size of the chunks a fetched body is split into
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
struct MemoryObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

enum Entry {
    Prefix(String),
    File(FileDescriptor),
}

/// Sorted in-memory object store
///
/// Listing follows ListObjectsV2: keys are returned in lexicographic order,
/// keys containing the delimiter after the prefix are rolled up into common
/// prefixes, and each page holds at most `page_size` entries counting both
/// files and common prefixes. Continuation tokens are opaque offsets.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    objects: BTreeMap<String, MemoryObject>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the maximum number of entries returned per page (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add an object, builder style
    pub fn with_object(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, data);
        self
    }

    /// Add or replace an object
    pub fn insert(&mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.insert(
            key.into(),
            MemoryObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All keys in lexicographic order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    fn entries(&self, prefix: &str, delimiter: Option<&str>) -> Vec<Entry> {
        let mut entries = Vec::new();
        for (key, object) in self
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            let rest = &key[prefix.len()..];
            let rolled_up = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| &key[..prefix.len() + idx + d.len()]));

            match rolled_up {
                Some(common) => {
                    // Keys sharing a common prefix are contiguous in sort order
                    if !matches!(entries.last(), Some(Entry::Prefix(last)) if last == common) {
                        entries.push(Entry::Prefix(common.to_string()));
                    }
                }
                None => entries.push(Entry::File(FileDescriptor {
                    last_modified: Some(object.last_modified),
                    ..FileDescriptor::new(key.clone(), object.data.len() as u64)
                })),
            }
        }
        entries
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list_children(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError> {
        let start = match continuation_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                RemoteError::new(
                    RemoteErrorKind::InvalidRequest,
                    format!("invalid continuation token {token:?}"),
                )
            })?,
        };

        let entries = self.entries(prefix, delimiter);
        let total = entries.len();
        let end = start.saturating_add(self.page_size).min(total);

        let mut page = ListingPage::default();
        for entry in entries.into_iter().take(end).skip(start) {
            match entry {
                Entry::Prefix(p) => page.prefixes.push(p),
                Entry::File(f) => page.files.push(f),
            }
        }
        if end < total {
            page.continuation_token = Some(end.to_string());
        }
        Ok(page)
    }

    async fn fetch(&self, key: &str) -> Result<ByteStream, RemoteError> {
        let object = self
            .objects
            .get(key)
            .ok_or_else(|| RemoteError::not_found(format!("no such key: {key}")))?;

        let chunks: Vec<Result<Vec<u8>, RemoteError>> = object
            .data
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}
