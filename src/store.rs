//! Persisted per-probe quality state.
//!
//! The whole mapping lives in one JSON file and is rewritten atomically on
//! every update (temp sibling, then rename). Loading is deliberately
//! forgiving: an absent, empty, or corrupt file starts the run with an empty
//! mapping and a warning, never an error. Losing state only costs the skip
//! optimization for one cycle.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, VigilError};
use crate::models::{ProbeState, Quality};

pub struct StateStore {
    path: PathBuf,
    states: RwLock<HashMap<String, ProbeState>>,
}

impl StateStore {
    /// Open the store at `path`, loading any existing mapping.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let states = load_states(&path);
        StateStore {
            path,
            states: RwLock::new(states),
        }
    }

    /// Last persisted record for a probe, if any
    pub fn get(&self, name: &str) -> Option<ProbeState> {
        self.states.read().get(name).cloned()
    }

    /// Cloned copy of the full mapping
    pub fn snapshot(&self) -> HashMap<String, ProbeState> {
        self.states.read().clone()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Insert-or-replace one probe's record and persist the whole mapping.
    ///
    /// The lock is held across the file write so concurrent updates cannot
    /// rename a stale snapshot over a newer one.
    pub fn update(&self, name: &str, state: ProbeState) -> Result<()> {
        let mut guard = self.states.write();
        guard.insert(name.to_string(), state);
        write_states(&self.path, &guard)
    }

    /// Persist the current mapping without modifying it.
    pub fn persist(&self) -> Result<()> {
        let guard = self.states.read();
        write_states(&self.path, &guard)
    }

    /// Skip law: only a fresh tolerable record suppresses a probe. Optimal,
    /// unusable, missing, or expired records all mean the probe must run.
    pub fn should_skip(&self, name: &str, now: DateTime<Utc>, window: Duration) -> bool {
        match self.get(name) {
            Some(state) if state.quality == Quality::Tolerable => {
                state.elapsed_since_check(now) < window
            }
            _ => false,
        }
    }
}

fn load_states(path: &Path) -> HashMap<String, ProbeState> {
    if !path.exists() {
        debug!("No state file at {}, starting empty", path.display());
        return HashMap::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read state file {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    if raw.trim().is_empty() {
        return HashMap::new();
    }

    match serde_json::from_str(&raw) {
        Ok(states) => states,
        Err(e) => {
            warn!(
                "State file {} is corrupt ({}), starting empty",
                path.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Write the mapping to a temp sibling and rename it over the target.
fn write_states(path: &Path, states: &HashMap<String, ProbeState>) -> Result<()> {
    let json = serde_json::to_string_pretty(states)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            VigilError::StatePersist(format!("create {}: {}", parent.display(), e))
        })?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)
        .map_err(|e| VigilError::StatePersist(format!("write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| VigilError::StatePersist(format!("rename to {}: {}", path.display(), e)))?;

    debug!("State persisted to {}", path.display());
    Ok(())
}
