//! Shared builders for the end-to-end tests.

use std::sync::Arc;

use photofast::{
    BatchReport, CompressionPipeline, Compressor, InMemoryIndex, InMemoryMarkerStore, ItemFacts,
    MarkerStore, MediaIndex, MediaItem, PolicyConfig, ReportBroadcaster, Settings, SettingsStore,
    StubCompressor,
};
use tokio::sync::broadcast::Receiver;

pub struct Harness {
    pub index: Arc<InMemoryIndex>,
    pub markers: Arc<InMemoryMarkerStore>,
    pub compressor: Arc<StubCompressor>,
    pub settings: Arc<SettingsStore>,
    pub pipeline: CompressionPipeline,
    pub reports: Receiver<BatchReport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Settings::default(), PolicyConfig::default())
    }

    pub fn with(settings: Settings, policy: PolicyConfig) -> Self {
        let index = Arc::new(InMemoryIndex::new());
        let markers = Arc::new(InMemoryMarkerStore::new());
        let compressor = Arc::new(StubCompressor::new(Arc::clone(&index), 60));
        let settings = Arc::new(SettingsStore::new(settings));
        let broadcaster = ReportBroadcaster::new(64);
        let reports = broadcaster.subscribe();

        let pipeline = CompressionPipeline::new(
            Arc::clone(&index) as Arc<dyn MediaIndex>,
            Arc::clone(&markers) as Arc<dyn MarkerStore>,
            Arc::clone(&compressor) as Arc<dyn Compressor>,
            Arc::new(broadcaster),
            Arc::clone(&settings),
            policy,
        );

        Self {
            index,
            markers,
            compressor,
            settings,
            pipeline,
            reports,
        }
    }
}

pub const MODIFIED_AT: i64 = 1_700_000_000_000;

pub struct PhotoBuilder {
    key: String,
    facts: ItemFacts,
}

impl PhotoBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            facts: ItemFacts {
                exists: true,
                display_name: Some(format!("IMG_{}.jpg", key)),
                path: Some(format!("/storage/emulated/0/DCIM/Camera/IMG_{}.jpg", key)),
                size: 2_000_000,
                modified_at_ms: Some(MODIFIED_AT),
                ..Default::default()
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.facts.display_name = Some(name.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.facts.path = Some(path.to_string());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.facts.size = size;
        self
    }

    pub fn modified_at(mut self, modified_at_ms: i64) -> Self {
        self.facts.modified_at_ms = Some(modified_at_ms);
        self
    }

    pub fn screenshot(mut self) -> Self {
        self.facts.screenshot = true;
        self
    }

    pub fn register(self, harness: &Harness) -> MediaItem {
        let item = MediaItem::new(self.key);
        harness.index.add(&item, self.facts);
        item
    }
}
