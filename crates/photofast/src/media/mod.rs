//! Abstract services the core consumes from the surrounding app.

pub mod compressor;
pub mod facts;
pub mod index;
pub mod item;
pub mod marker;
pub mod memory;

pub use compressor::{CompressionOutcome, Compressor};
pub use facts::ItemFacts;
pub use index::MediaIndex;
pub use item::MediaItem;
pub use marker::{CompressionMarker, MarkerStore, MARKER_PREFIX};
pub use memory::{InMemoryIndex, InMemoryMarkerStore, StubCompressor};
