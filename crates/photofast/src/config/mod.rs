pub mod loader;
pub mod schema;
pub mod store;

pub use loader::{load_config, load_config_from_str};
pub use schema::{Config, PolicyConfig, SaveMode, Settings};
pub use store::SettingsStore;
