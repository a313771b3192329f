// Display preferences and named view presets for the data grid

pub mod events;
pub mod grid;
pub mod keys;
pub mod preferences;
pub mod presets;
pub mod restore;
pub mod settings;
pub mod store;

pub use events::{Dispatch, Event, EventBus, EventKind, SubscriptionId};
pub use grid::{GridAdapter, GridError, GridState};
pub use preferences::{
    BaseTheme, PreferenceField, PreferenceSet, PreferenceStore, PreferenceUpdate, ThemeMode,
};
pub use presets::{Preset, PresetError, PresetRepository};
pub use restore::{
    DeleteConfirmation, RestoreError, RestoreOptions, RestoreReport, ViewError, ViewManager,
};
pub use settings::{Settings, SettingsError};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreHandle};
