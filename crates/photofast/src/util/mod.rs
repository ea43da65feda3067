pub mod fmt;

pub use fmt::{format_duration, format_size};
