pub mod batch;
pub mod cache;
pub mod config;
pub mod decision;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod util;

pub use batch::{
    BatchAggregator, BatchReport, CompressionRecord, ReportBroadcaster, ReportSink, ReportSummary,
};
pub use cache::{CacheStats, MetadataCache};
pub use config::{
    load_config, load_config_from_str, Config, PolicyConfig, SaveMode, Settings, SettingsStore,
};
pub use decision::{DecisionEngine, DecisionResult, SkipReason};
pub use dedup::{DedupTracker, LeaseGuard};
pub use error::{BatchError, ConfigError, MediaError, PhotofastError, Result};
pub use media::{
    CompressionMarker, CompressionOutcome, Compressor, InMemoryIndex, InMemoryMarkerStore,
    ItemFacts, MarkerStore, MediaIndex, MediaItem, StubCompressor,
};
pub use pipeline::CompressionPipeline;
