use crate::status::types::{ServiceState, ServiceStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/**
 * Changes found when a fresh probe round is compared with the last-known map
 */
#[derive(Debug, Default, PartialEq)]
pub struct LedgerDiff {
    pub changed: Vec<(String, ServiceState, ServiceState)>,
    pub added: Vec<(String, ServiceState)>,
    pub removed: Vec<String>,
}

impl LedgerDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/**
 * Last-known state per service, shared by the coordinator and the monitor
 * so a transition announced by one is not announced again by the other
 */
#[derive(Default)]
pub struct StatusLedger {
    states: Mutex<HashMap<String, ServiceState>>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous state, if any.
    pub fn record(&self, name: &str, state: ServiceState) -> Option<ServiceState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), state)
    }

    pub fn get(&self, name: &str) -> Option<ServiceState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn forget(&self, name: &str) -> Option<ServiceState> {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).remove(name)
    }

    /**
     * Replace the map with a probe round and report what moved
     * Names in `untouched` were not probed this round and keep their entry
     */
    pub fn reconcile(
        &self,
        current: &BTreeMap<String, ServiceStatus>,
        untouched: &HashSet<String>,
    ) -> LedgerDiff {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let mut diff = LedgerDiff::default();

        for (name, status) in current {
            match states.insert(name.clone(), status.state) {
                Some(old) if old != status.state => {
                    diff.changed.push((name.clone(), old, status.state))
                }
                Some(_) => {}
                None => diff.added.push((name.clone(), status.state)),
            }
        }

        let mut vanished: Vec<String> = states
            .keys()
            .filter(|name| !current.contains_key(*name) && !untouched.contains(*name))
            .cloned()
            .collect();
        vanished.sort();
        for name in &vanished {
            states.remove(name);
        }
        diff.removed = vanished;

        diff
    }
}
