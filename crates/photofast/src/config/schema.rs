use serde::{Deserialize, Serialize};

/// Where compressed output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Overwrite the original in place.
    Replace,
    /// Write the compressed copy into the app output directory.
    SeparateOutput,
}

/// User-facing toggles, normally backed by the host's settings storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Whether newly detected photos are compressed automatically.
    #[serde(default = "default_true")]
    pub auto_compress_enabled: bool,
    /// JPEG quality handed to the compression executor (1-100).
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Whether screenshots are eligible for compression.
    #[serde(default)]
    pub include_screenshots: bool,
    /// Whether photos inside messenger app folders are left untouched.
    #[serde(default = "default_true")]
    pub ignore_messenger_photos: bool,
    #[serde(default = "default_save_mode")]
    pub save_mode: SaveMode,
    /// Upper bound on concurrently processed items in multi-select runs.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_true() -> bool {
    true
}

fn default_quality() -> u8 {
    80
}

fn default_save_mode() -> SaveMode {
    SaveMode::SeparateOutput
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_compress_enabled: true,
            quality: default_quality(),
            include_screenshots: false,
            ignore_messenger_photos: true,
            save_mode: default_save_mode(),
            worker_count: default_worker_count(),
        }
    }
}

/// Thresholds and timeouts for the decision and batching layer.
///
/// Nothing in here changes the shape of the algorithms; every value can be
/// overridden from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Files below this size are considered already optimal.
    #[serde(default = "default_optimum_file_size")]
    pub optimum_file_size: u64,
    /// Smallest file size worth looking at.
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
    /// Largest file size worth looking at.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Gap between marker write and the OS timestamp update that still
    /// counts as "unmodified since compression".
    #[serde(default = "default_marker_tolerance")]
    pub marker_time_tolerance_secs: u64,
    /// Dedup lease lifetime; leases older than this are reclaimable.
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_secs: u64,
    /// Safety timeout for batches with a known expected count.
    #[serde(default = "default_bounded_batch_timeout")]
    pub bounded_batch_timeout_secs: u64,
    /// Inactivity window for open-ended batches.
    #[serde(default = "default_open_batch_window")]
    pub open_batch_window_secs: u64,
    /// Live-batch count above which old batches are pruned.
    #[serde(default = "default_max_live_batches")]
    pub max_live_batches: usize,
    /// Age past which an unfinalized batch counts as abandoned.
    #[serde(default = "default_batch_max_age")]
    pub batch_max_age_secs: u64,
    /// Maximum number of marker entries kept in the metadata cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Name of the app's own output directory inside the photo library.
    #[serde(default = "default_app_directory")]
    pub app_directory_name: String,
    /// Suffix appended to compressed file names outside replace mode.
    #[serde(default = "default_compressed_suffix")]
    pub compressed_suffix: String,
    /// Name fragment identifying a renamed-original backup artifact.
    #[serde(default = "default_backup_name_marker")]
    pub backup_name_marker: String,
    /// Path fragments identifying messenger app media folders.
    #[serde(default = "default_messenger_folders")]
    pub messenger_folders: Vec<String>,
    /// MIME types accepted for compression.
    #[serde(default = "default_supported_mime_types")]
    pub supported_mime_types: Vec<String>,
}

fn default_optimum_file_size() -> u64 {
    500 * 1024
}

fn default_min_file_size() -> u64 {
    10 * 1024
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_marker_tolerance() -> u64 {
    20
}

fn default_lease_timeout() -> u64 {
    5 * 60
}

fn default_bounded_batch_timeout() -> u64 {
    30
}

fn default_open_batch_window() -> u64 {
    8
}

fn default_max_live_batches() -> usize {
    50
}

fn default_batch_max_age() -> u64 {
    5 * 60
}

fn default_cache_capacity() -> u64 {
    1024
}

fn default_app_directory() -> String {
    "PhotoFast".to_string()
}

fn default_compressed_suffix() -> String {
    "_compressed".to_string()
}

fn default_backup_name_marker() -> String {
    "_original".to_string()
}

fn default_messenger_folders() -> Vec<String> {
    [
        "/whatsapp/",
        "/telegram/",
        "/viber/",
        "/messenger/",
        "/messages/",
        "pictures/messages",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_supported_mime_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/heic"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            optimum_file_size: default_optimum_file_size(),
            min_file_size: default_min_file_size(),
            max_file_size: default_max_file_size(),
            marker_time_tolerance_secs: default_marker_tolerance(),
            lease_timeout_secs: default_lease_timeout(),
            bounded_batch_timeout_secs: default_bounded_batch_timeout(),
            open_batch_window_secs: default_open_batch_window(),
            max_live_batches: default_max_live_batches(),
            batch_max_age_secs: default_batch_max_age(),
            cache_capacity: default_cache_capacity(),
            app_directory_name: default_app_directory(),
            compressed_suffix: default_compressed_suffix(),
            backup_name_marker: default_backup_name_marker(),
            messenger_folders: default_messenger_folders(),
            supported_mime_types: default_supported_mime_types(),
        }
    }
}

impl PolicyConfig {
    /// Returns true if the MIME type is accepted for compression.
    pub fn is_supported_mime(&self, mime: Option<&str>) -> bool {
        match mime {
            Some(m) => {
                let m = m.to_ascii_lowercase();
                self.supported_mime_types.iter().any(|s| s == &m)
            }
            None => false,
        }
    }
}

/// Top-level configuration file schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub policy: PolicyConfig,
}
