//! Live settings access shared across concurrent tasks.

use std::sync::RwLock;

use log::warn;

use super::schema::{SaveMode, Settings};

/// Holds the current user settings behind a lock so the host can swap
/// them at runtime while decision evaluations are in flight.
///
/// Persistence lives with the host; this is only the in-process view.
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        let guard = match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Settings lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    /// Replaces the current settings.
    pub fn update(&self, settings: Settings) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Settings lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = settings;
    }

    pub fn auto_compress_enabled(&self) -> bool {
        self.snapshot().auto_compress_enabled
    }

    pub fn quality(&self) -> u8 {
        self.snapshot().quality
    }

    pub fn include_screenshots(&self) -> bool {
        self.snapshot().include_screenshots
    }

    pub fn ignore_messenger_photos(&self) -> bool {
        self.snapshot().ignore_messenger_photos
    }

    pub fn save_mode(&self) -> SaveMode {
        self.snapshot().save_mode
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_returns_current_values() {
        let store = SettingsStore::default();
        assert!(store.auto_compress_enabled());
        assert_eq!(store.quality(), 80);
    }

    #[test]
    fn test_update_replaces_settings() {
        let store = SettingsStore::default();

        let mut settings = store.snapshot();
        settings.auto_compress_enabled = false;
        settings.quality = 55;
        store.update(settings);

        assert!(!store.auto_compress_enabled());
        assert_eq!(store.quality(), 55);
    }
}
