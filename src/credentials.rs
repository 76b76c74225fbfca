/**
 * ============================================================================
 * CREDENTIAL CACHE MODULE
 * ============================================================================
 *
 * PURPOSE: Hold the operator's administrator password for a bounded window
 *
 * RULES:
 * - Memory only; never written to disk, logs, or the event bus
 * - Secret zeroized when the credential is dropped (SecretString)
 * - Each store() bumps a generation so a rejection of an old credential
 *   never clears a newer one
 *
 * ============================================================================
 */

use crate::coordinator::types::PendingAction;
use crate::error::{Result, ServiceError};
use secrecy::SecretString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/**
 * A live elevated credential
 * Cloning shares the secret; the last clone dropped zeroizes it
 */
#[derive(Clone)]
pub struct Credential {
    secret: Arc<SecretString>,
    acquired_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl Credential {
    pub fn secret(&self) -> &Arc<SecretString> {
        &self.secret
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }

    pub fn expires_in(&self) -> Duration {
        self.ttl.saturating_sub(self.acquired_at.elapsed())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in())
            .field("generation", &self.generation)
            .finish()
    }
}

pub struct CredentialCache {
    slot: Mutex<Option<Credential>>,
    default_ttl: Duration,
    generations: AtomicU64,
}

impl CredentialCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            default_ttl,
            generations: AtomicU64::new(0),
        }
    }

    /**
     * Live credential, or AuthenticationRequired carrying the action to resume
     * An expired credential is cleared on the way out
     */
    pub fn get_or_prompt(&self, pending: &PendingAction) -> Result<Credential> {
        self.current()
            .ok_or_else(|| ServiceError::AuthenticationRequired(pending.clone()))
    }

    fn current(&self) -> Option<Credential> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(credential) if !credential.is_expired() => Some(credential.clone()),
            Some(credential) => {
                log::info!("Cached credential (generation {}) expired", credential.generation);
                *slot = None;
                None
            }
            None => None,
        }
    }

    /**
     * Replace the cached credential and restart its expiry
     * Returns the new generation
     */
    pub fn store(&self, secret: SecretString, ttl: Option<Duration>) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let credential = Credential {
            secret: Arc::new(secret),
            acquired_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
            generation,
        };

        log::info!(
            "Stored administrator credential (generation {}, ttl {}s)",
            generation,
            credential.ttl.as_secs()
        );
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential);
        generation
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            log::info!("Cleared cached credential");
        }
    }

    /**
     * Clear only if the cached credential is still the given generation
     * Returns true when something was cleared
     */
    pub fn invalidate_generation(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(credential) if credential.generation == generation => {
                *slot = None;
                log::warn!("Invalidated rejected credential (generation {})", generation);
                true
            }
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.current().is_some()
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.current().map(|c| c.expires_in())
    }
}
