/**
 * ============================================================================
 * CATALOGUE STORE MODULE
 * ============================================================================
 *
 * PURPOSE: Durable registry of tracked services and their settings
 *
 * STORAGE STRUCTURE:
 * {data_dir}/
 * └── tracked_services.json  ({next_id, services[], configs[]})
 *
 * STORE BEHAVIOR:
 * - Services listed in creation order
 * - Every mutation runs against a copy; the copy is written (temp file +
 *   rename) and only then becomes the live state
 * - Every successful mutation publishes DatabaseUpdated
 * - Corrupt files are moved aside and the store starts empty
 *
 * ============================================================================
 */

use crate::catalogue::allowlist::{self, KnownService};
use crate::catalogue::types::{ConfigValueType, ServiceConfigEntry, TrackedService};
use crate::error::{Result, ServiceError};
use crate::events::{CatalogueOperation, EventBus, ServiceEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const CATALOGUE_FILE_NAME: &str = "tracked_services.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogueDocument {
    next_id: i64,
    services: Vec<TrackedService>,
    #[serde(default)]
    configs: Vec<ServiceConfigEntry>,
}

impl Default for CatalogueDocument {
    fn default() -> Self {
        Self {
            next_id: 1,
            services: Vec::new(),
            configs: Vec::new(),
        }
    }
}

impl CatalogueDocument {
    fn position(&self, name: &str) -> Option<usize> {
        self.services.iter().position(|s| s.name == name)
    }

    fn require(&mut self, name: &str) -> Result<&mut TrackedService> {
        self.services
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }
}

pub struct CatalogueStore {
    path: Option<PathBuf>,
    state: Mutex<CatalogueDocument>,
    bus: EventBus,
}

impl CatalogueStore {
    /**
     * Open (or create) the catalogue file inside data_dir
     */
    pub fn open(data_dir: &Path, bus: EventBus) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| ServiceError::Storage(format!("Failed to create data directory: {}", e)))?;

        let path = data_dir.join(CATALOGUE_FILE_NAME);
        let document = if path.exists() {
            match Self::load_document(&path) {
                Ok(document) => {
                    log::info!(
                        "Loaded catalogue with {} tracked services from {}",
                        document.services.len(),
                        path.display()
                    );
                    document
                }
                Err(e) => {
                    log::warn!("Failed to load catalogue, starting empty: {}", e);
                    Self::quarantine(&path);
                    CatalogueDocument::default()
                }
            }
        } else {
            log::info!("No existing catalogue at {}, starting empty", path.display());
            CatalogueDocument::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(document),
            bus,
        })
    }

    /**
     * Store without a backing file, used by tests and ephemeral shells
     */
    pub fn in_memory(bus: EventBus) -> Self {
        Self {
            path: None,
            state: Mutex::new(CatalogueDocument::default()),
            bus,
        }
    }

    fn load_document(path: &Path) -> Result<CatalogueDocument> {
        let json_str = fs::read_to_string(path)
            .map_err(|e| ServiceError::Storage(format!("Failed to read catalogue file: {}", e)))?;

        let mut document: CatalogueDocument = serde_json::from_str(&json_str)?;

        // Entries for services that left the allow-list are not manageable anymore
        document.services.retain(|s| {
            let known = allowlist::is_known(&s.name);
            if !known {
                log::warn!("Dropping tracked service '{}' that is no longer allow-listed", s.name);
            }
            known
        });
        let names: Vec<String> = document.services.iter().map(|s| s.name.clone()).collect();
        document.configs.retain(|c| names.contains(&c.service_name));

        let max_id = document.services.iter().map(|s| s.id).max().unwrap_or(0);
        document.next_id = document.next_id.max(max_id + 1);

        Ok(document)
    }

    fn quarantine(path: &Path) {
        let aside = path.with_extension("json.corrupt");
        if let Err(e) = fs::rename(path, &aside) {
            log::error!("Failed to move corrupt catalogue aside: {}", e);
        } else {
            log::warn!("Moved corrupt catalogue to {}", aside.display());
        }
    }

    /**
     * Write document to disk atomically
     */
    fn persist(&self, document: &CatalogueDocument) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json_str = serde_json::to_string_pretty(document)?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, json_str)
            .map_err(|e| ServiceError::Storage(format!("Failed to write temp catalogue: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| ServiceError::Storage(format!("Failed to save catalogue: {}", e)))?;

        Ok(())
    }

    /**
     * Apply a mutation transactionally and announce it
     */
    fn mutate<T>(
        &self,
        operation: CatalogueOperation,
        name: &str,
        apply: impl FnOnce(&mut CatalogueDocument) -> Result<T>,
    ) -> Result<T> {
        let value = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let mut draft = state.clone();
            let value = apply(&mut draft)?;
            self.persist(&draft)?;
            *state = draft;
            value
        };

        self.bus.publish(ServiceEvent::database_updated(operation, name));
        Ok(value)
    }

    /**
     * Canonical allow-list entry for a canonical or unit name
     */
    fn known(name: &str) -> Result<&'static KnownService> {
        allowlist::resolve(name).ok_or_else(|| ServiceError::InvalidService(name.to_string()))
    }

    /**
     * Start tracking an allow-listed service
     */
    pub fn add(
        &self,
        name: &str,
        display_name: &str,
        category: &str,
        description: Option<&str>,
    ) -> Result<TrackedService> {
        let known = Self::known(name)?;

        log::info!("Adding service to tracking: {} ({})", display_name, known.name);

        let service = self.mutate(CatalogueOperation::Add, known.name, |doc| {
            if doc.position(known.name).is_some() {
                return Err(ServiceError::DuplicateTracking(known.name.to_string()));
            }

            let now = Utc::now();
            let service = TrackedService {
                id: doc.next_id,
                name: known.name.to_string(),
                display_name: display_name.to_string(),
                description: description.map(str::to_string),
                category: category.to_string(),
                enabled: true,
                auto_start: false,
                created_at: now,
                updated_at: now,
            };
            doc.next_id += 1;
            doc.services.push(service.clone());
            Ok(service)
        })?;

        log::info!("Service added to tracking with ID: {}", service.id);
        Ok(service)
    }

    /**
     * Stop tracking a service, dropping its config entries too
     */
    pub fn remove(&self, name: &str) -> Result<()> {
        let name = Self::known(name)?.name;
        log::info!("Removing service from tracking: {}", name);

        self.mutate(CatalogueOperation::Remove, name, |doc| {
            let index = doc
                .position(name)
                .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
            doc.services.remove(index);
            doc.configs.retain(|c| c.service_name != name);
            Ok(())
        })
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<TrackedService> {
        let name = Self::known(name)?.name;
        log::info!("Updating service enabled status: {} -> {}", name, enabled);

        self.mutate(CatalogueOperation::SetEnabled, name, |doc| {
            let service = doc.require(name)?;
            service.enabled = enabled;
            service.updated_at = Utc::now();
            Ok(service.clone())
        })
    }

    /**
     * Insert or replace one config entry for a tracked service
     */
    pub fn set_config(
        &self,
        name: &str,
        key: &str,
        value: &str,
        value_type: ConfigValueType,
    ) -> Result<ServiceConfigEntry> {
        if key.trim().is_empty() {
            return Err(ServiceError::Config("config key must not be empty".to_string()));
        }
        value_type.check(value)?;
        let name = Self::known(name)?.name;

        self.mutate(CatalogueOperation::SetConfig, name, |doc| {
            doc.require(name)?;

            let entry = ServiceConfigEntry {
                service_name: name.to_string(),
                config_key: key.to_string(),
                config_value: value.to_string(),
                config_type: value_type,
                updated_at: Utc::now(),
            };

            match doc
                .configs
                .iter_mut()
                .find(|c| c.service_name == name && c.config_key == key)
            {
                Some(existing) => *existing = entry.clone(),
                None => doc.configs.push(entry.clone()),
            }
            Ok(entry)
        })
    }

    pub fn configs(&self, name: &str) -> Result<Vec<ServiceConfigEntry>> {
        let name = Self::known(name)?.name;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.position(name).is_none() {
            return Err(ServiceError::NotFound(name.to_string()));
        }
        Ok(state
            .configs
            .iter()
            .filter(|c| c.service_name == name)
            .cloned()
            .collect())
    }

    /**
     * All tracked services in creation order
     */
    pub fn list(&self) -> Vec<TrackedService> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).services.clone()
    }

    pub fn get(&self, name: &str) -> Option<TrackedService> {
        let name = allowlist::resolve(name)?.name;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.services.iter().find(|s| s.name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
