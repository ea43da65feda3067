use std::path::Path;

use log::info;

use crate::error::ConfigError;

use super::schema::{Config, SaveMode};

/// Loads configuration from a JSON file, applying defaults for absent keys.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let config = load_config_from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parses configuration from a JSON string.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let fail = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.settings.quality == 0 || config.settings.quality > 100 {
        return fail("settings.quality must be between 1 and 100");
    }
    if config.settings.worker_count == 0 {
        return fail("settings.workerCount must be at least 1");
    }
    if config.policy.min_file_size > config.policy.max_file_size {
        return fail("policy.minFileSize must not exceed policy.maxFileSize");
    }
    if config.policy.open_batch_window_secs == 0 {
        return fail("policy.openBatchWindowSecs must be at least 1");
    }
    if config.policy.bounded_batch_timeout_secs == 0 {
        return fail("policy.boundedBatchTimeoutSecs must be at least 1");
    }
    if config.policy.lease_timeout_secs == 0 {
        return fail("policy.leaseTimeoutSecs must be at least 1");
    }
    if config.policy.max_live_batches == 0 {
        return fail("policy.maxLiveBatches must be at least 1");
    }
    if config.policy.app_directory_name.trim().is_empty() {
        return fail("policy.appDirectoryName must not be empty");
    }
    if config.settings.save_mode == SaveMode::SeparateOutput
        && config.policy.compressed_suffix.trim().is_empty()
    {
        return fail("policy.compressedSuffix must not be empty in separate_output mode");
    }

    Ok(())
}
