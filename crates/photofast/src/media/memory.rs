//! In-memory collaborator implementations.
//!
//! Back the core with plain maps instead of a platform media store.
//! Used by the test suites and by embedding hosts that index media
//! themselves.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::warn;

use crate::error::MediaError;

use super::compressor::{CompressionOutcome, Compressor};
use super::facts::ItemFacts;
use super::index::MediaIndex;
use super::item::MediaItem;
use super::marker::{CompressionMarker, MarkerStore};

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("In-memory media lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("In-memory media lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Media index backed by a map of item facts.
#[derive(Default)]
pub struct InMemoryIndex {
    items: RwLock<HashMap<String, ItemFacts>>,
    /// Files known to exist in library directories, keyed as
    /// (directory name, file name), both lowercased.
    directory_files: RwLock<HashSet<(String, String)>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item. The MIME type is guessed from the display name
    /// when the facts do not carry one, and the screenshot flag falls
    /// back to the filename heuristic.
    pub fn add(&self, item: &MediaItem, mut facts: ItemFacts) {
        if let Some(name) = &facts.display_name {
            if facts.mime_type.is_none() {
                facts.mime_type = mime_guess::from_path(name).first().map(|m| m.to_string());
            }
            if !facts.screenshot {
                facts.screenshot = crate::decision::paths::is_screenshot_name(name);
            }
        }
        write_lock(&self.items).insert(item.key().to_string(), facts);
    }

    /// Applies a mutation to a registered item's facts.
    pub fn update<F: FnOnce(&mut ItemFacts)>(&self, item: &MediaItem, apply: F) {
        if let Some(facts) = write_lock(&self.items).get_mut(item.key()) {
            apply(facts);
        }
    }

    pub fn remove(&self, item: &MediaItem) {
        write_lock(&self.items).remove(item.key());
    }

    /// Marks a file as present in a library directory.
    pub fn add_directory_file(&self, directory_name: &str, file_name: &str) {
        write_lock(&self.directory_files).insert((
            directory_name.to_ascii_lowercase(),
            file_name.to_ascii_lowercase(),
        ));
    }

    fn facts(&self, item: &MediaItem) -> Result<ItemFacts, MediaError> {
        read_lock(&self.items)
            .get(item.key())
            .cloned()
            .ok_or_else(|| MediaError::NotFound(item.key().to_string()))
    }
}

#[async_trait]
impl MediaIndex for InMemoryIndex {
    async fn exists(&self, item: &MediaItem) -> Result<bool, MediaError> {
        Ok(read_lock(&self.items)
            .get(item.key())
            .map(|f| f.exists)
            .unwrap_or(false))
    }

    async fn display_name(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
        Ok(self.facts(item)?.display_name)
    }

    async fn path(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
        Ok(self.facts(item)?.path)
    }

    async fn mime_type(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
        Ok(self.facts(item)?.mime_type)
    }

    async fn size(&self, item: &MediaItem) -> Result<u64, MediaError> {
        Ok(self.facts(item)?.size)
    }

    async fn modified_at_ms(&self, item: &MediaItem) -> Result<Option<i64>, MediaError> {
        Ok(self.facts(item)?.modified_at_ms)
    }

    async fn is_pending(&self, item: &MediaItem) -> Result<bool, MediaError> {
        Ok(self.facts(item)?.pending)
    }

    async fn is_screenshot(&self, item: &MediaItem) -> Result<bool, MediaError> {
        Ok(self.facts(item)?.screenshot)
    }

    async fn prefetch(
        &self,
        items: &[MediaItem],
    ) -> Result<HashMap<MediaItem, ItemFacts>, MediaError> {
        let known = read_lock(&self.items);
        let mut resolved = HashMap::with_capacity(items.len());
        for item in items {
            let facts = known.get(item.key()).cloned().unwrap_or_default();
            resolved.insert(item.clone(), facts);
        }
        Ok(resolved)
    }

    async fn contains_file(
        &self,
        directory_name: &str,
        file_name: &str,
    ) -> Result<bool, MediaError> {
        Ok(read_lock(&self.directory_files).contains(&(
            directory_name.to_ascii_lowercase(),
            file_name.to_ascii_lowercase(),
        )))
    }
}

/// Marker store backed by a map keyed on item keys.
#[derive(Default)]
pub struct InMemoryMarkerStore {
    markers: RwLock<HashMap<String, CompressionMarker>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a marker directly, bypassing the write path.
    pub fn set_marker(&self, item: &MediaItem, marker: CompressionMarker) {
        write_lock(&self.markers).insert(item.key().to_string(), marker);
    }

    pub fn marker(&self, item: &MediaItem) -> Option<CompressionMarker> {
        read_lock(&self.markers).get(item.key()).copied()
    }
}

#[async_trait]
impl MarkerStore for InMemoryMarkerStore {
    async fn read_marker(&self, item: &MediaItem) -> Result<CompressionMarker, MediaError> {
        Ok(self.marker(item).unwrap_or_else(CompressionMarker::absent))
    }

    async fn write_marker(&self, item: &MediaItem, quality: u8) -> Result<bool, MediaError> {
        let marker = CompressionMarker::new(quality, Utc::now().timestamp_millis());
        write_lock(&self.markers).insert(item.key().to_string(), marker);
        Ok(true)
    }
}

/// Compression executor that shrinks items by a fixed ratio.
pub struct StubCompressor {
    index: Arc<InMemoryIndex>,
    /// Output size as a percentage of the input size.
    ratio_percent: u8,
    failing: RwLock<HashSet<String>>,
    declining: RwLock<HashSet<String>>,
}

impl StubCompressor {
    pub fn new(index: Arc<InMemoryIndex>, ratio_percent: u8) -> Self {
        Self {
            index,
            ratio_percent,
            failing: RwLock::new(HashSet::new()),
            declining: RwLock::new(HashSet::new()),
        }
    }

    /// Makes compression of the given item fail with an error.
    pub fn fail_for(&self, item: &MediaItem) {
        write_lock(&self.failing).insert(item.key().to_string());
    }

    /// Makes the executor decline the given item (no output written).
    pub fn decline_for(&self, item: &MediaItem) {
        write_lock(&self.declining).insert(item.key().to_string());
    }
}

#[async_trait]
impl Compressor for StubCompressor {
    async fn compress(
        &self,
        item: &MediaItem,
        _quality: u8,
    ) -> Result<Option<CompressionOutcome>, MediaError> {
        if read_lock(&self.failing).contains(item.key()) {
            return Err(MediaError::CompressionFailed {
                item: item.key().to_string(),
                reason: "injected failure".to_string(),
            });
        }
        if read_lock(&self.declining).contains(item.key()) {
            return Ok(None);
        }

        let input_size = self.index.facts(item)?.size;
        let output = MediaItem::new(format!("{}#compressed", item.key()));
        let output_size = input_size * u64::from(self.ratio_percent) / 100;
        Ok(Some(CompressionOutcome {
            output,
            output_size,
        }))
    }
}
