/**
 * ============================================================================
 * MANAGER CONFIGURATION MODULE
 * ============================================================================
 *
 * PURPOSE: Configuration schema, persistence, and validation
 *
 * STORAGE: Configuration stored as JSON in app data directory
 * FILE PATH: {data_dir}/dev-services-manager/config.json
 *
 * FUNCTIONALITY:
 * - Define configuration schema with production defaults
 * - Validate configuration values
 * - Load configuration from disk
 * - Save configuration atomically
 *
 * ============================================================================
 */

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "dev-services-manager";
const CONFIG_FILE_NAME: &str = "config.json";

/// Overrides the data directory, mostly for portable installs and tests.
pub const DATA_DIR_ENV: &str = "DEVSVC_DATA_DIR";

/**
 * Runtime tunables for the service management core
 * Everything time-related is stored in whole units to keep the JSON readable
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    // How long a submitted administrator password stays usable
    pub credential_ttl_seconds: u64,

    // Hard limit for every OS command
    pub command_timeout_seconds: u64,

    // How long to wait for a state transition to show up after a command
    pub verify_grace_ms: u64,

    // Re-probe interval inside the grace period
    pub verify_poll_ms: u64,

    // Concurrent control operations across different services
    pub max_parallel_operations: usize,

    // Concurrent status probes in one refresh
    pub probe_concurrency: usize,

    // Background status refresh interval
    pub refresh_interval_seconds: u64,

    // Per-subscriber event buffer before the oldest events are dropped
    pub event_capacity: usize,

    // Command records kept for the diagnostics view
    pub diagnostics_capacity: usize,

    // Log lines returned when the caller does not ask for a number
    pub default_log_lines: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            credential_ttl_seconds: 300,
            command_timeout_seconds: 30,
            verify_grace_ms: 3000,
            verify_poll_ms: 250,
            max_parallel_operations: 4,
            probe_concurrency: 8,
            refresh_interval_seconds: 30,
            event_capacity: 256,
            diagnostics_capacity: 200,
            default_log_lines: 50,
        }
    }
}

impl ManagerConfig {
    /**
     * Validate configuration values
     * Returns Ok(()) if valid, Err(ServiceError::Config) naming the first bad field
     */
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, message: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(ServiceError::Config(message.to_string()))
            }
        }

        check(
            (30..=3600).contains(&self.credential_ttl_seconds),
            "credential_ttl_seconds must be between 30 and 3600",
        )?;
        check(
            (1..=600).contains(&self.command_timeout_seconds),
            "command_timeout_seconds must be between 1 and 600",
        )?;
        check(self.verify_grace_ms <= 60_000, "verify_grace_ms must be 60000 or less")?;
        check(
            (10..=10_000).contains(&self.verify_poll_ms),
            "verify_poll_ms must be between 10 and 10000",
        )?;
        check(
            (1..=64).contains(&self.max_parallel_operations),
            "max_parallel_operations must be between 1 and 64",
        )?;
        check(
            (1..=64).contains(&self.probe_concurrency),
            "probe_concurrency must be between 1 and 64",
        )?;
        check(
            (5..=3600).contains(&self.refresh_interval_seconds),
            "refresh_interval_seconds must be between 5 and 3600",
        )?;
        check(
            (16..=65_536).contains(&self.event_capacity),
            "event_capacity must be between 16 and 65536",
        )?;
        check(
            (1..=10_000).contains(&self.diagnostics_capacity),
            "diagnostics_capacity must be between 1 and 10000",
        )?;
        check(
            (1..=1000).contains(&self.default_log_lines),
            "default_log_lines must be between 1 and 1000",
        )?;

        Ok(())
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_seconds)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn verify_grace(&self) -> Duration {
        Duration::from_millis(self.verify_grace_ms)
    }

    pub fn verify_poll(&self) -> Duration {
        Duration::from_millis(self.verify_poll_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

/**
 * Resolve the app data directory
 * DEVSVC_DATA_DIR wins, then the platform data dir, then the working directory
 */
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/**
 * Get path to configuration file
 * Returns {data_dir}/config.json
 */
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/**
 * Load configuration from disk
 * Returns default configuration if the file doesn't exist
 */
pub fn load_config(data_dir: &Path) -> Result<ManagerConfig> {
    let path = config_path(data_dir);

    if !path.exists() {
        log::info!("Manager config not found at {}, using defaults", path.display());
        return Ok(ManagerConfig::default());
    }

    let json_str = fs::read_to_string(&path)
        .map_err(|e| ServiceError::Config(format!("Failed to read config file: {}", e)))?;

    let config: ManagerConfig = serde_json::from_str(&json_str)
        .map_err(|e| ServiceError::Config(format!("Failed to parse config JSON: {}", e)))?;

    config.validate()?;

    log::info!("Loaded manager config from {}", path.display());
    Ok(config)
}

/**
 * Save configuration to disk atomically
 * Uses temporary file + rename to prevent corruption
 */
pub fn save_config(data_dir: &Path, config: &ManagerConfig) -> Result<()> {
    config.validate()?;

    fs::create_dir_all(data_dir)
        .map_err(|e| ServiceError::Config(format!("Failed to create config directory: {}", e)))?;

    let path = config_path(data_dir);
    let json_str = serde_json::to_string_pretty(config)?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json_str)
        .map_err(|e| ServiceError::Config(format!("Failed to write temporary config file: {}", e)))?;

    fs::rename(&temp_path, &path)
        .map_err(|e| ServiceError::Config(format!("Failed to save config file: {}", e)))?;

    log::info!("Saved manager config to {}", path.display());
    Ok(())
}
