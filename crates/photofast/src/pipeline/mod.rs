pub mod runner;

pub use runner::CompressionPipeline;
