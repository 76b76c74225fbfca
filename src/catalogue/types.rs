/**
 * ============================================================================
 * CATALOGUE TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Rows persisted by the catalogue store
 *
 * TYPES DEFINED:
 * - TrackedService: A service the operator opted into managing
 * - ServiceConfigEntry: Per-service key/value setting
 * - ConfigValueType: Declared type of a config value
 *
 * ============================================================================
 */

use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/**
 * A service explicitly opted into monitoring and management
 * `name` is the canonical allow-list name and is unique in the store
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedService {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub category: String,
    pub enabled: bool,
    pub auto_start: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigValueType {
    String,
    Number,
    Boolean,
    Json,
}

impl ConfigValueType {
    /**
     * Check that a raw value parses as the declared type
     */
    pub fn check(&self, value: &str) -> Result<()> {
        let ok = match self {
            ConfigValueType::String => true,
            ConfigValueType::Number => value.trim().parse::<f64>().is_ok(),
            ConfigValueType::Boolean => matches!(value.trim(), "true" | "false"),
            ConfigValueType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        };

        if ok {
            Ok(())
        } else {
            Err(ServiceError::Config(format!(
                "value '{}' is not a valid {:?}",
                value, self
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfigEntry {
    pub service_name: String,
    pub config_key: String,
    pub config_value: String,
    pub config_type: ConfigValueType,
    pub updated_at: DateTime<Utc>,
}
