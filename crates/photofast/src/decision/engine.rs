//! The ordered check battery deciding whether an item needs compression.

use std::sync::Arc;

use log::{debug, warn};

use crate::cache::MetadataCache;
use crate::config::{PolicyConfig, SaveMode, SettingsStore};
use crate::error::MediaError;
use crate::media::{CompressionMarker, MarkerStore, MediaIndex, MediaItem};

use super::outcome::{DecisionResult, SkipReason};
use super::paths;

/// Evaluates items against the compression policy.
///
/// `evaluate` is a pure function of the item, the flag and the current
/// collaborator state; its only side effect is populating the metadata
/// cache. Checks run in a fixed order and the first failing check wins.
pub struct DecisionEngine {
    index: Arc<dyn MediaIndex>,
    markers: Arc<dyn MarkerStore>,
    settings: Arc<SettingsStore>,
    cache: Arc<MetadataCache>,
    policy: PolicyConfig,
}

impl DecisionEngine {
    pub fn new(
        index: Arc<dyn MediaIndex>,
        markers: Arc<dyn MarkerStore>,
        settings: Arc<SettingsStore>,
        cache: Arc<MetadataCache>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            index,
            markers,
            settings,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Decides whether the item needs a compression run.
    ///
    /// `force` overrides the global auto-compression toggle, nothing
    /// else. Collaborator errors degrade to "proceed": a transient I/O
    /// error must never permanently suppress compression of a real
    /// candidate.
    pub async fn evaluate(&self, item: &MediaItem, force: bool) -> DecisionResult {
        match self.run_checks(item, force).await {
            Ok(result) => {
                debug!(
                    "Decision for {}: proceed={} reason={}",
                    item, result.proceed, result.reason
                );
                result
            }
            Err(e) => {
                warn!("Decision checks failed for {}, proceeding anyway: {}", item, e);
                let mut result = DecisionResult::proceed();
                result.error = Some(e.to_string());
                result
            }
        }
    }

    async fn run_checks(
        &self,
        item: &MediaItem,
        force: bool,
    ) -> Result<DecisionResult, MediaError> {
        // Existence: the item must still resolve to readable content.
        if !self.index.exists(item).await? {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        // A renamed-original backup artifact is never a candidate.
        let name = self.index.display_name(item).await?.unwrap_or_default();
        if paths::is_backup_artifact_name(&name, &self.policy.backup_name_marker) {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        let settings = self.settings.snapshot();
        if !settings.auto_compress_enabled && !force {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        if !settings.include_screenshots && self.index.is_screenshot(item).await? {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        let path = self.index.path(item).await?.unwrap_or_default();
        if paths::is_in_app_directory(&path, &self.policy.app_directory_name) {
            return Ok(DecisionResult::skip(SkipReason::InAppDirectory));
        }

        // Source app may still be writing the file. Our own outputs carry
        // the compressed suffix and are past that point by construction.
        if self.index.is_pending(item).await?
            && !paths::is_compressed_artifact_name(&name, &self.policy.compressed_suffix)
        {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        let mime = self.index.mime_type(item).await?;
        if !self.policy.is_supported_mime(mime.as_deref()) {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        let size = self.index.size(item).await?;
        if size < self.policy.min_file_size || size > self.policy.max_file_size {
            return Ok(DecisionResult::skip(SkipReason::BasicCheckFailed));
        }

        // Messenger photos skip the re-encode but the worker still runs
        // so the marker gets stamped; hence proceed stays true.
        if settings.ignore_messenger_photos
            && paths::is_messenger_path(&path, &self.policy.messenger_folders)
        {
            let mut result = DecisionResult::proceed();
            result.reason = SkipReason::MessengerPhoto;
            return Ok(result);
        }

        if settings.save_mode != SaveMode::Replace {
            let output_name =
                paths::compressed_file_name(&name, &self.policy.compressed_suffix, false);
            if self
                .index
                .contains_file(&self.policy.app_directory_name, &output_name)
                .await?
            {
                return Ok(DecisionResult::skip(SkipReason::CompressedVersionExists));
            }
        }

        let modified_at_ms = self.index.modified_at_ms(item).await?;
        let marker = self.lookup_marker(item, modified_at_ms).await?;
        if marker.present && self.marker_still_fresh(&marker, modified_at_ms) {
            let mut result = DecisionResult::skip(SkipReason::AlreadyCompressed);
            result.has_marker = true;
            result.marker_quality = marker.quality;
            result.marker_timestamp_ms = marker.timestamp_ms;
            result.item_modified_at_ms = modified_at_ms;
            return Ok(result);
        }

        if size < self.policy.optimum_file_size {
            let mut result = DecisionResult::skip(SkipReason::AlreadySmall);
            result.item_modified_at_ms = modified_at_ms;
            return Ok(result);
        }

        let mut result = DecisionResult::proceed();
        result.has_marker = marker.present;
        result.marker_quality = marker.quality;
        result.marker_timestamp_ms = marker.timestamp_ms;
        result.item_modified_at_ms = modified_at_ms;
        Ok(result)
    }

    /// A marked item counts as already compressed unless it was modified
    /// more than the tolerance after the marker was written. The
    /// tolerance absorbs the gap between marker write and the OS
    /// timestamp update.
    fn marker_still_fresh(&self, marker: &CompressionMarker, modified_at_ms: Option<i64>) -> bool {
        let Some(modified_at_ms) = modified_at_ms else {
            // No modification timestamp available: treat as unmodified.
            return true;
        };
        let delta_ms = modified_at_ms - marker.timestamp_ms;
        delta_ms <= (self.policy.marker_time_tolerance_secs as i64) * 1000
    }

    async fn lookup_marker(
        &self,
        item: &MediaItem,
        modified_at_ms: Option<i64>,
    ) -> Result<CompressionMarker, MediaError> {
        let cache_stamp = modified_at_ms.unwrap_or(0);
        if let Some(marker) = self.cache.get(item.key(), cache_stamp) {
            return Ok(marker);
        }
        let marker = self.markers.read_marker(item).await?;
        self.cache.put(item.key(), marker, cache_stamp);
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::media::{InMemoryIndex, InMemoryMarkerStore, ItemFacts};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const HOUR_MS: i64 = 3600 * 1000;
    const MODIFIED_AT: i64 = 1_700_000_000_000;

    struct Fixture {
        index: Arc<InMemoryIndex>,
        markers: Arc<InMemoryMarkerStore>,
        settings: Arc<SettingsStore>,
        cache: Arc<MetadataCache>,
        engine: DecisionEngine,
    }

    fn fixture() -> Fixture {
        fixture_with(Settings::default(), PolicyConfig::default())
    }

    fn fixture_with(settings: Settings, policy: PolicyConfig) -> Fixture {
        let index = Arc::new(InMemoryIndex::new());
        let markers = Arc::new(InMemoryMarkerStore::new());
        let settings = Arc::new(SettingsStore::new(settings));
        let cache = Arc::new(MetadataCache::new(policy.cache_capacity));
        let engine = DecisionEngine::new(
            Arc::clone(&index) as Arc<dyn MediaIndex>,
            Arc::clone(&markers) as Arc<dyn MarkerStore>,
            Arc::clone(&settings),
            Arc::clone(&cache),
            policy,
        );
        Fixture {
            index,
            markers,
            settings,
            cache,
            engine,
        }
    }

    fn camera_photo(name: &str, size: u64) -> ItemFacts {
        ItemFacts {
            exists: true,
            display_name: Some(name.to_string()),
            path: Some(format!("/storage/emulated/0/DCIM/Camera/{}", name)),
            size,
            modified_at_ms: Some(MODIFIED_AT),
            ..Default::default()
        }
    }

    fn add_photo(fx: &Fixture, key: &str, name: &str, size: u64) -> MediaItem {
        let item = MediaItem::from(key);
        fx.index.add(&item, camera_photo(name, size));
        item
    }

    #[tokio::test]
    async fn test_unmarked_in_bounds_item_proceeds() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
        assert_eq!(result.reason, SkipReason::None);
        assert!(!result.has_marker);
        assert_eq!(result.item_modified_at_ms, Some(MODIFIED_AT));
        assert!(result.requires_compression());
    }

    #[tokio::test]
    async fn test_missing_item_fails_basic_check() {
        let fx = fixture();
        let item = MediaItem::from("gone");

        let result = fx.engine.evaluate(&item, false).await;
        assert!(!result.proceed);
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);
    }

    #[tokio::test]
    async fn test_backup_artifact_name_is_rejected() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001_original.jpg", 2_000_000);

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);
    }

    #[tokio::test]
    async fn test_disabled_auto_compression_requires_force() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);

        let mut settings = fx.settings.snapshot();
        settings.auto_compress_enabled = false;
        fx.settings.update(settings);

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);

        let forced = fx.engine.evaluate(&item, true).await;
        assert!(forced.proceed);
        assert_eq!(forced.reason, SkipReason::None);
    }

    #[tokio::test]
    async fn test_screenshot_excluded_by_default() {
        let fx = fixture();
        let item = add_photo(&fx, "shot", "Screenshot_1.png", 2_000_000);
        fx.index.update(&item, |f| f.screenshot = true);

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);

        let mut settings = fx.settings.snapshot();
        settings.include_screenshots = true;
        fx.settings.update(settings);

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
    }

    #[tokio::test]
    async fn test_item_in_app_directory_is_skipped() {
        let fx = fixture();
        let item = MediaItem::from("own-output");
        fx.index.add(
            &item,
            ItemFacts {
                path: Some("/storage/Pictures/PhotoFast/IMG_1_compressed.jpg".to_string()),
                ..camera_photo("IMG_1_compressed.jpg", 2_000_000)
            },
        );

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::InAppDirectory);
    }

    #[tokio::test]
    async fn test_documents_path_not_treated_as_app_directory() {
        let fx = fixture();
        let item = MediaItem::from("docs");
        fx.index.add(
            &item,
            ItemFacts {
                path: Some("/storage/Documents/PhotoFast/IMG_1.jpg".to_string()),
                ..camera_photo("IMG_1.jpg", 2_000_000)
            },
        );

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
    }

    #[tokio::test]
    async fn test_pending_item_is_skipped_unless_own_artifact() {
        let fx = fixture();
        let pending = add_photo(&fx, "pending", "IMG_0002.jpg", 2_000_000);
        fx.index.update(&pending, |f| f.pending = true);

        let result = fx.engine.evaluate(&pending, false).await;
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);

        let artifact = add_photo(&fx, "artifact", "IMG_0002_compressed.jpg", 2_000_000);
        fx.index.update(&artifact, |f| f.pending = true);

        let result = fx.engine.evaluate(&artifact, false).await;
        // Clears the pending guard, then proceeds through the rest.
        assert!(result.proceed);
    }

    #[tokio::test]
    async fn test_unsupported_mime_is_rejected() {
        let fx = fixture();
        let item = add_photo(&fx, "gif", "animation.gif", 2_000_000);

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::BasicCheckFailed);
    }

    #[tokio::test]
    async fn test_size_band_limits() {
        let fx = fixture();
        let tiny = add_photo(&fx, "tiny", "IMG_tiny.jpg", 1_000);
        let huge = add_photo(&fx, "huge", "IMG_huge.jpg", 200 * 1024 * 1024);

        assert_eq!(
            fx.engine.evaluate(&tiny, false).await.reason,
            SkipReason::BasicCheckFailed
        );
        assert_eq!(
            fx.engine.evaluate(&huge, false).await.reason,
            SkipReason::BasicCheckFailed
        );
    }

    #[tokio::test]
    async fn test_messenger_photo_two_level_signal() {
        let fx = fixture();
        let item = MediaItem::from("wa");
        fx.index.add(
            &item,
            ItemFacts {
                path: Some("/storage/WhatsApp/Media/IMG_1.jpg".to_string()),
                ..camera_photo("IMG_1.jpg", 2_000_000)
            },
        );

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
        assert_eq!(result.reason, SkipReason::MessengerPhoto);
        assert!(!result.requires_compression());
    }

    #[tokio::test]
    async fn test_messenger_photo_compressed_when_not_ignored() {
        let fx = fixture();
        let item = MediaItem::from("wa");
        fx.index.add(
            &item,
            ItemFacts {
                path: Some("/storage/WhatsApp/Media/IMG_1.jpg".to_string()),
                ..camera_photo("IMG_1.jpg", 2_000_000)
            },
        );

        let mut settings = fx.settings.snapshot();
        settings.ignore_messenger_photos = false;
        fx.settings.update(settings);

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
        assert_eq!(result.reason, SkipReason::None);
        assert!(result.requires_compression());
    }

    #[tokio::test]
    async fn test_existing_compressed_sibling_is_skipped() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        fx.index
            .add_directory_file("PhotoFast", "IMG_0001_compressed.jpg");

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::CompressedVersionExists);
    }

    #[tokio::test]
    async fn test_replace_mode_ignores_sibling() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        fx.index
            .add_directory_file("PhotoFast", "IMG_0001_compressed.jpg");

        let mut settings = fx.settings.snapshot();
        settings.save_mode = SaveMode::Replace;
        fx.settings.update(settings);

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
    }

    #[tokio::test]
    async fn test_marker_after_modification_skips() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        fx.markers
            .set_marker(&item, CompressionMarker::new(80, MODIFIED_AT + HOUR_MS));

        let result = fx.engine.evaluate(&item, false).await;
        assert!(!result.proceed);
        assert_eq!(result.reason, SkipReason::AlreadyCompressed);
        assert!(result.has_marker);
        assert_eq!(result.marker_quality, 80);
    }

    #[tokio::test]
    async fn test_marker_within_tolerance_skips() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        // Modified 15s after the marker write: timestamp noise, not a
        // real edit.
        fx.markers
            .set_marker(&item, CompressionMarker::new(80, MODIFIED_AT - 15_000));

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::AlreadyCompressed);
    }

    #[tokio::test]
    async fn test_marker_long_before_modification_proceeds() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        fx.markers
            .set_marker(&item, CompressionMarker::new(80, MODIFIED_AT - HOUR_MS));

        let result = fx.engine.evaluate(&item, false).await;
        assert!(result.proceed);
        assert_eq!(result.reason, SkipReason::None);
        assert!(result.has_marker);
    }

    #[tokio::test]
    async fn test_marker_without_modification_timestamp_skips() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);
        fx.index.update(&item, |f| f.modified_at_ms = None);
        fx.markers
            .set_marker(&item, CompressionMarker::new(80, MODIFIED_AT - HOUR_MS));

        let result = fx.engine.evaluate(&item, false).await;
        assert_eq!(result.reason, SkipReason::AlreadyCompressed);
    }

    #[tokio::test]
    async fn test_small_file_already_small() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 100 * 1024);

        let result = fx.engine.evaluate(&item, false).await;
        assert!(!result.proceed);
        assert_eq!(result.reason, SkipReason::AlreadySmall);
    }

    #[tokio::test]
    async fn test_evaluate_is_idempotent() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);

        let first = fx.engine.evaluate(&item, false).await;
        let second = fx.engine.evaluate(&item, false).await;
        assert_eq!(first.proceed, second.proceed);
        assert_eq!(first.reason, second.reason);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_marker_lookup_uses_cache() {
        let fx = fixture();
        let item = add_photo(&fx, "item-1", "IMG_0001.jpg", 2_000_000);

        fx.engine.evaluate(&item, false).await;
        assert_eq!(fx.cache.stats().hits, 0);

        fx.engine.evaluate(&item, false).await;
        assert_eq!(fx.cache.stats().hits, 1);

        // A modification invalidates the entry; the next evaluate is a
        // miss again.
        fx.index
            .update(&item, |f| f.modified_at_ms = Some(MODIFIED_AT + HOUR_MS));
        fx.engine.evaluate(&item, false).await;
        assert_eq!(fx.cache.stats().hits, 1);
        assert_eq!(fx.cache.stats().misses, 2);
    }

    struct BrokenIndex;

    #[async_trait]
    impl MediaIndex for BrokenIndex {
        async fn exists(&self, _item: &MediaItem) -> Result<bool, MediaError> {
            Ok(true)
        }
        async fn display_name(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn path(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn mime_type(&self, item: &MediaItem) -> Result<Option<String>, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn size(&self, item: &MediaItem) -> Result<u64, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn modified_at_ms(&self, item: &MediaItem) -> Result<Option<i64>, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn is_pending(&self, item: &MediaItem) -> Result<bool, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn is_screenshot(&self, item: &MediaItem) -> Result<bool, MediaError> {
            Err(MediaError::Attributes {
                item: item.key().to_string(),
                reason: "index offline".to_string(),
            })
        }
        async fn prefetch(
            &self,
            _items: &[MediaItem],
        ) -> Result<HashMap<MediaItem, ItemFacts>, MediaError> {
            Ok(HashMap::new())
        }
        async fn contains_file(
            &self,
            _directory_name: &str,
            _file_name: &str,
        ) -> Result<bool, MediaError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_collaborator_error_fails_open() {
        let markers = Arc::new(InMemoryMarkerStore::new());
        let policy = PolicyConfig::default();
        let engine = DecisionEngine::new(
            Arc::new(BrokenIndex),
            markers as Arc<dyn MarkerStore>,
            Arc::new(SettingsStore::default()),
            Arc::new(MetadataCache::new(16)),
            policy,
        );

        let result = engine.evaluate(&MediaItem::from("item-1"), false).await;
        assert!(result.proceed);
        assert_eq!(result.reason, SkipReason::None);
        assert!(result.error.is_some());
    }
}
