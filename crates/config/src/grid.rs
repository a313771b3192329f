// Grid widget state
// Column layout, filters and sort order are opaque JSON owned by the widget.
// This crate only captures them from storage and writes them back verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys;
use crate::preferences::PreferenceSet;
use crate::store::{StoreError, StoreHandle};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_model: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_model: Option<Value>,
}

impl GridState {
    /// Read the widget's last-known state from storage.
    /// Missing or malformed entries are treated as absent.
    pub fn capture(store: &StoreHandle) -> Self {
        Self {
            column_state: read_json(store, keys::COLUMN_STATE),
            filter_model: read_json(store, keys::FILTER_MODEL),
            sort_model: read_json(store, keys::SORT_MODEL),
        }
    }

    /// Write present fields back to their keys. Absent fields leave the keys untouched.
    /// Returns the keys that were written.
    pub fn write_to(&self, store: &StoreHandle) -> Result<Vec<&'static str>, StoreError> {
        let mut written = Vec::new();
        for (key, value) in self.entries() {
            if let Some(value) = value {
                store.set(key, &value.to_string())?;
                written.push(key);
            }
        }
        Ok(written)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }

    fn entries(&self) -> [(&'static str, Option<&Value>); 3] {
        [
            (keys::COLUMN_STATE, self.column_state.as_ref()),
            (keys::FILTER_MODEL, self.filter_model.as_ref()),
            (keys::SORT_MODEL, self.sort_model.as_ref()),
        ]
    }
}

fn read_json(store: &StoreHandle, key: &str) -> Option<Value> {
    let raw = store.get(key)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring malformed grid state in {}: {}", key, e);
            None
        }
    }
}

/// Error reported by a live grid widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The widget exists but has not finished mounting
    NotReady,
    /// The widget rejected part of the state
    Rejected(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::NotReady => write!(f, "grid widget is not ready"),
            GridError::Rejected(msg) => write!(f, "grid widget rejected state: {}", msg),
        }
    }
}

impl std::error::Error for GridError {}

/// Live handle to a grid widget.
///
/// When one is attached, restoring a preset hands it the state directly
/// instead of relying on the widget to re-read storage.
pub trait GridAdapter {
    fn apply_state(&mut self, state: &GridState, prefs: &PreferenceSet) -> Result<(), GridError>;
}
