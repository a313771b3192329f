//! Durable storage keys.
//!
//! These names are shared with the grid widget, which reads the `ag-grid-*`
//! keys itself when it mounts or receives `preset-loaded`. Renaming any of
//! them breaks compatibility with collections already on disk.

pub const SPACING: &str = "theme-spacing";
pub const FONT_SIZE: &str = "theme-font-size";
pub const FONT_FAMILY: &str = "theme-font-family";
pub const ACCENT_COLOR: &str = "theme-accent-color";
pub const DARK_MODE: &str = "dark-mode";
pub const THEME_ID: &str = "theme-id";

/// The full preset collection, one JSON array
pub const SAVED_PRESETS: &str = "grid-saved-settings";

pub const COLUMN_STATE: &str = "ag-grid-column-state";
pub const FILTER_MODEL: &str = "ag-grid-filter-model";
pub const SORT_MODEL: &str = "ag-grid-sort-model";

/// Last selected preset id (best-effort)
pub const SELECTED_PROFILE: &str = "selected-profile-id";

/// Scalar preference keys, in the order they are re-persisted on restore
pub const SCALAR_KEYS: [&str; 5] = [SPACING, FONT_SIZE, FONT_FAMILY, ACCENT_COLOR, DARK_MODE];

/// Grid widget keys
pub const GRID_KEYS: [&str; 3] = [COLUMN_STATE, FILTER_MODEL, SORT_MODEL];
