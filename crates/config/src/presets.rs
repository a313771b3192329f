//! Named view presets.
//!
//! A preset is a frozen copy of the live preferences plus whatever grid state
//! the widget had written to storage at save time. The whole collection lives
//! under one storage key as a JSON array and is rewritten after every
//! mutation; a failed write leaves the in-memory collection unchanged.
//!
//! Order is insertion order. There is no sorting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::GridState;
use crate::keys;
use crate::preferences::PreferenceSet;
use crate::store::{StoreError, StoreHandle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub prefs: PreferenceSet,
    #[serde(flatten)]
    pub grid: GridState,
}

/// Error type for preset operations. `Display` output is suitable for showing
/// to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetError {
    /// Name was empty after trimming
    EmptyName,
    /// Another preset already uses this name (case-insensitive)
    DuplicateName(String),
    /// No preset with this id
    NotFound(String),
    /// The stored collection could not be parsed
    Corrupt(String),
    /// Writing the collection failed
    Store(StoreError),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Please enter a name for your profile"),
            Self::DuplicateName(name) => write!(f, "A profile named \"{name}\" already exists"),
            Self::NotFound(id) => write!(f, "No profile with id {id}"),
            Self::Corrupt(msg) => write!(f, "Saved profiles are unreadable: {msg}"),
            Self::Store(err) => write!(f, "Failed to save profiles: {err}"),
        }
    }
}

impl std::error::Error for PresetError {}

impl From<StoreError> for PresetError {
    fn from(err: StoreError) -> Self {
        PresetError::Store(err)
    }
}

#[derive(Debug)]
pub struct PresetRepository {
    presets: Vec<Preset>,
    store: StoreHandle,
    /// Highest numeric id handed out or loaded
    last_id: i64,
}

impl PresetRepository {
    /// An empty repository. Nothing is written until the first mutation.
    pub fn empty(store: StoreHandle) -> Self {
        Self {
            presets: Vec::new(),
            store,
            last_id: 0,
        }
    }

    /// Load the collection from storage. A missing key is an empty collection.
    pub fn load(store: StoreHandle) -> Result<Self, PresetError> {
        let presets: Vec<Preset> = match store.get(keys::SAVED_PRESETS) {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|e| PresetError::Corrupt(e.to_string()))?
            }
            _ => Vec::new(),
        };
        let last_id = presets
            .iter()
            .filter_map(|p| p.id.parse::<i64>().ok())
            // An id at the ceiling leaves nothing to count up from
            .filter(|&id| id < i64::MAX)
            .max()
            .unwrap_or(0);
        Ok(Self {
            presets,
            store,
            last_id,
        })
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn first(&self) -> Option<&Preset> {
        self.presets.first()
    }

    /// Case-insensitive exact name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Preset> {
        let wanted = name.trim().to_lowercase();
        self.presets.iter().find(|p| p.name.to_lowercase() == wanted)
    }

    /// Presets whose name contains `filter` (case-insensitive), in insertion order.
    /// The filter is matched as typed, surrounding spaces included. An empty
    /// filter matches everything.
    pub fn list(&self, filter: Option<&str>) -> Vec<&Preset> {
        match filter.filter(|f| !f.is_empty()) {
            Some(f) => {
                let needle = f.to_lowercase();
                self.presets
                    .iter()
                    .filter(|p| p.name.to_lowercase().contains(&needle))
                    .collect()
            }
            None => self.presets.iter().collect(),
        }
    }

    /// Snapshot `prefs` and `grid` under a new name. Returns the new id.
    pub fn create(
        &mut self,
        name: &str,
        prefs: &PreferenceSet,
        grid: GridState,
    ) -> Result<String, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        if self.find_by_name(name).is_some() {
            return Err(PresetError::DuplicateName(name.to_string()));
        }

        let id = self.next_id();
        let preset = Preset {
            id: id.to_string(),
            name: name.to_string(),
            prefs: prefs.clone(),
            grid,
        };

        let mut next = self.presets.clone();
        next.push(preset);
        self.commit(next)?;
        self.last_id = id;

        log::info!("Saved new preset {} ({})", name, id);
        Ok(id.to_string())
    }

    /// Overwrite a preset with the current live values, keeping its id.
    ///
    /// The name only changes when `new_name` is non-blank. Renaming onto a
    /// different preset's name is rejected; the preset's own name in another
    /// case is fine.
    pub fn update(
        &mut self,
        id: &str,
        prefs: &PreferenceSet,
        grid: GridState,
        new_name: Option<&str>,
    ) -> Result<&Preset, PresetError> {
        let idx = self
            .position(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        let new_name = new_name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = new_name {
            if let Some(other) = self.find_by_name(name) {
                if other.id != id {
                    return Err(PresetError::DuplicateName(name.to_string()));
                }
            }
        }

        let mut next = self.presets.clone();
        let preset = &mut next[idx];
        if let Some(name) = new_name {
            preset.name = name.to_string();
        }
        preset.prefs = prefs.clone();
        preset.grid = grid;
        self.commit(next)?;

        log::info!("Updated preset {}", id);
        Ok(&self.presets[idx])
    }

    /// Remove one preset and return it
    pub fn delete(&mut self, id: &str) -> Result<Preset, PresetError> {
        let idx = self
            .position(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        let mut next = self.presets.clone();
        let removed = next.remove(idx);
        self.commit(next)?;

        log::info!("Deleted preset {}", id);
        Ok(removed)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.presets.iter().position(|p| p.id == id)
    }

    /// Creation timestamp in ms, bumped to stay strictly increasing
    fn next_id(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        now.max(self.last_id.saturating_add(1))
    }

    fn commit(&mut self, next: Vec<Preset>) -> Result<(), PresetError> {
        let json = serde_json::to_string(&next).map_err(|e| PresetError::Corrupt(e.to_string()))?;
        self.store.set(keys::SAVED_PRESETS, &json)?;
        self.presets = next;
        Ok(())
    }
}
