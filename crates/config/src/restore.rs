//! View manager and the apply/restore pipeline.
//!
//! Restoring a preset runs strictly in this order:
//!
//! 1. look the preset up (a miss is `RestoreError::NotFound`)
//! 2. copy its scalars into the live preferences
//! 3. set the light/dark marker to the preset's value
//! 4. re-persist every scalar key
//! 5. write any captured grid state back to the grid keys, verbatim
//! 6. flush the store
//! 7. hand the state to the attached grid adapter, if any
//! 8. publish `preset-loaded` exactly once
//!
//! Step 8 never runs before step 6 has returned. Without an adapter the
//! widget is expected to re-read the grid keys when it sees the event.
//!
//! The preset id itself is only remembered in memory; `selected-profile-id`
//! is written by explicit selection, not by restore.

use std::fmt;
use std::time::Duration;

use crate::events::{Dispatch, Event, EventBus};
use crate::grid::{GridAdapter, GridError, GridState};
use crate::keys;
use crate::preferences::PreferenceStore;
use crate::presets::{Preset, PresetError, PresetRepository};
use crate::settings::Settings;
use crate::store::{StoreError, StoreHandle};

/// Knobs for the view manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreOptions {
    /// Wait this long before publishing `preset-loaded`, for widgets that
    /// mount after the restore starts. Zero publishes immediately.
    pub mount_delay: Duration,
    /// Dark mode to use when no explicit choice is stored
    pub system_prefers_dark: bool,
}

impl From<&Settings> for RestoreOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            mount_delay: Duration::from_millis(settings.mount_delay_ms),
            system_prefers_dark: settings.prefer_dark_when_unset,
        }
    }
}

/// What a successful restore did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub preset_id: String,
    /// Grid keys rewritten from the preset (absent fields are skipped)
    pub grid_keys_written: Vec<&'static str>,
    /// True when the state was handed to a live grid adapter
    pub applied_to_grid: bool,
    /// Delivery of the `preset-loaded` event
    pub dispatch: Dispatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// No preset with this id
    NotFound(String),
    /// Writing preferences or grid state failed; nothing was published
    Store(StoreError),
    /// Storage was updated and `preset-loaded` published, but the live
    /// grid rejected the state
    Grid(GridError),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "No profile with id {id}"),
            Self::Store(err) => write!(f, "Failed to apply profile: {err}"),
            Self::Grid(err) => write!(f, "Profile applied, but {err}"),
        }
    }
}

impl std::error::Error for RestoreError {}

impl From<StoreError> for RestoreError {
    fn from(err: StoreError) -> Self {
        RestoreError::Store(err)
    }
}

/// Errors from save/update/delete/select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    Preset(PresetError),
    /// Operation needs a current preset and none is selected
    NoSelection,
    /// Delete was requested without confirmation; nothing changed
    ConfirmationRequired(String),
    Store(StoreError),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset(err) => write!(f, "{err}"),
            Self::NoSelection => write!(f, "No profile is selected"),
            Self::ConfirmationRequired(id) => {
                write!(f, "Deleting profile {id} requires confirmation")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ViewError {}

impl From<PresetError> for ViewError {
    fn from(err: PresetError) -> Self {
        match err {
            PresetError::Store(e) => ViewError::Store(e),
            other => ViewError::Preset(other),
        }
    }
}

impl From<StoreError> for ViewError {
    fn from(err: StoreError) -> Self {
        ViewError::Store(err)
    }
}

/// Two-step delete: the first request only arms the confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteConfirmation {
    Pending,
    Confirmed,
}

/// Owns the live preferences, the preset collection and the current selection.
pub struct ViewManager {
    prefs: PreferenceStore,
    presets: PresetRepository,
    store: StoreHandle,
    bus: EventBus,
    current: Option<String>,
    grid: Option<Box<dyn GridAdapter>>,
    options: RestoreOptions,
}

impl ViewManager {
    /// Load preferences and presets from `store`.
    /// An unreadable preset collection is logged and replaced by an empty one.
    pub fn open(store: StoreHandle, bus: EventBus, options: RestoreOptions) -> Self {
        let prefs = PreferenceStore::load(store.clone(), bus.clone(), options.system_prefers_dark);
        let presets = match PresetRepository::load(store.clone()) {
            Ok(repo) => repo,
            Err(e) => {
                log::error!("{}; starting with no saved profiles", e);
                PresetRepository::empty(store.clone())
            }
        };
        let current = store
            .get(keys::SELECTED_PROFILE)
            .filter(|id| presets.get(id).is_some());

        Self {
            prefs,
            presets,
            store,
            bus,
            current,
            grid: None,
            options,
        }
    }

    pub fn prefs(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn prefs_mut(&mut self) -> &mut PreferenceStore {
        &mut self.prefs
    }

    pub fn presets(&self) -> &PresetRepository {
        &self.presets
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn options(&self) -> RestoreOptions {
        self.options
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Preset> {
        self.current.as_deref().and_then(|id| self.presets.get(id))
    }

    /// Attach a live grid widget. Restores will call it directly.
    pub fn attach_grid(&mut self, adapter: Box<dyn GridAdapter>) {
        self.grid = Some(adapter);
    }

    pub fn detach_grid(&mut self) -> Option<Box<dyn GridAdapter>> {
        self.grid.take()
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// Save the live configuration as a new preset and make it current.
    pub fn save_preset(&mut self, name: &str) -> Result<String, ViewError> {
        let grid = GridState::capture(&self.store);
        let id = self.presets.create(name, self.prefs.prefs(), grid)?;
        self.current = Some(id.clone());
        self.bus.publish(&Event::PresetLoaded);
        Ok(id)
    }

    /// Overwrite a preset with the live configuration.
    pub fn update_preset(&mut self, id: &str, new_name: Option<&str>) -> Result<(), ViewError> {
        let grid = GridState::capture(&self.store);
        self.presets.update(id, self.prefs.prefs(), grid, new_name)?;
        self.bus.publish(&Event::PresetUpdated);
        Ok(())
    }

    pub fn update_current(&mut self, new_name: Option<&str>) -> Result<(), ViewError> {
        let id = self.current.clone().ok_or(ViewError::NoSelection)?;
        self.update_preset(&id, new_name)
    }

    /// Delete a preset. Returns the selection afterwards.
    ///
    /// When the deleted preset was current, the first remaining preset (or
    /// none) becomes current and `profile-changed` is published.
    pub fn delete_preset(
        &mut self,
        id: &str,
        confirm: DeleteConfirmation,
    ) -> Result<Option<String>, ViewError> {
        if self.presets.get(id).is_none() {
            return Err(PresetError::NotFound(id.to_string()).into());
        }
        if confirm == DeleteConfirmation::Pending {
            return Err(ViewError::ConfirmationRequired(id.to_string()));
        }

        self.presets.delete(id)?;

        if self.current.as_deref() == Some(id) {
            let fallback = self.presets.first().map(|p| p.id.clone());
            match &fallback {
                Some(next) => self.store.set(keys::SELECTED_PROFILE, next)?,
                None => self.store.remove(keys::SELECTED_PROFILE)?,
            }
            log::info!("Current profile deleted, now {:?}", fallback);
            self.current = fallback.clone();
            self.bus.publish(&Event::ProfileChanged {
                profile_id: fallback,
            });
        }
        Ok(self.current.clone())
    }

    /// Make `id` the selected profile and remember it across restarts.
    pub fn select(&mut self, id: &str) -> Result<(), ViewError> {
        if self.presets.get(id).is_none() {
            return Err(PresetError::NotFound(id.to_string()).into());
        }
        self.store.set(keys::SELECTED_PROFILE, id)?;
        self.current = Some(id.to_string());
        self.bus.publish(&Event::ProfileChanged {
            profile_id: Some(id.to_string()),
        });
        Ok(())
    }

    /// Make a preset the effective configuration.
    pub async fn restore(&mut self, id: &str) -> Result<RestoreReport, RestoreError> {
        let preset = self
            .presets
            .get(id)
            .cloned()
            .ok_or_else(|| RestoreError::NotFound(id.to_string()))?;
        log::debug!("Restoring preset {} ({})", preset.name, preset.id);

        self.prefs.apply_values(&preset.prefs)?;
        let grid_keys_written = preset.grid.write_to(&self.store)?;
        self.store.flush()?;

        let grid_result = match self.grid.as_mut() {
            Some(adapter) => Some(adapter.apply_state(&preset.grid, &preset.prefs)),
            None => None,
        };

        if self.options.mount_delay.is_zero() {
            smol::future::yield_now().await;
        } else {
            smol::Timer::after(self.options.mount_delay).await;
        }

        self.current = Some(preset.id.clone());
        let dispatch = self.bus.publish(&Event::PresetLoaded);

        match grid_result {
            Some(Err(e)) => {
                log::warn!("Grid rejected preset {}: {}", preset.id, e);
                Err(RestoreError::Grid(e))
            }
            other => Ok(RestoreReport {
                preset_id: preset.id,
                grid_keys_written,
                applied_to_grid: other.is_some(),
                dispatch,
            }),
        }
    }

    /// `restore` for synchronous callers
    pub fn restore_blocking(&mut self, id: &str) -> Result<RestoreReport, RestoreError> {
        smol::block_on(self.restore(id))
    }

    /// Restore and log any failure instead of returning it
    pub fn try_restore(&mut self, id: &str) -> Option<RestoreReport> {
        match self.restore_blocking(id) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("Could not load profile {}: {}", id, e);
                None
            }
        }
    }
}

impl fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewManager")
            .field("prefs", self.prefs.prefs())
            .field("presets", &self.presets.len())
            .field("current", &self.current)
            .field("grid", &self.grid.as_ref().map(|_| "..."))
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::preferences::{PreferenceField, PreferenceSet, PreferenceUpdate, ThemeMode};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Instant;

    fn manager() -> (ViewManager, StoreHandle, EventBus) {
        let store = StoreHandle::memory();
        let bus = EventBus::new();
        let vm = ViewManager::open(store.clone(), bus.clone(), RestoreOptions::default());
        (vm, store, bus)
    }

    fn count_events(bus: &EventBus, kind: EventKind) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        bus.subscribe(kind, move |_| c.set(c.get() + 1));
        count
    }

    fn set(vm: &mut ViewManager, update: PreferenceUpdate) {
        vm.prefs_mut().update(update).unwrap();
    }

    #[test]
    fn test_compact_scenario() {
        let (mut vm, store, _) = manager();
        set(&mut vm, PreferenceUpdate::Spacing(8));
        set(&mut vm, PreferenceUpdate::FontSize(12));
        set(&mut vm, PreferenceUpdate::DarkMode(false));
        let id = vm.save_preset("Compact").unwrap();

        set(&mut vm, PreferenceUpdate::Spacing(20));
        assert_eq!(store.get("theme-spacing").as_deref(), Some("20"));

        vm.restore_blocking(&id).unwrap();
        assert_eq!(vm.prefs().prefs().spacing, 8);
        assert_eq!(store.get("theme-spacing").as_deref(), Some("8"));
    }

    #[test]
    fn test_duplicate_name_scenario() {
        let (mut vm, _, _) = manager();
        vm.save_preset("Default").unwrap();
        let err = vm.save_preset("default").unwrap_err();
        assert_eq!(
            err,
            ViewError::Preset(PresetError::DuplicateName("default".into()))
        );
        assert_eq!(vm.presets().len(), 1);
    }

    #[test]
    fn test_round_trip_restores_exact_state() {
        let (mut vm, store, _) = manager();
        let captured = PreferenceSet {
            spacing: 6,
            font_size: 14,
            font_family: "Inter".into(),
            accent_color: "#dc2626".into(),
            is_dark_mode: true,
        };
        vm.prefs_mut().apply_values(&captured).unwrap();
        let id = vm.save_preset("Night").unwrap();

        set(&mut vm, PreferenceUpdate::Spacing(16));
        set(&mut vm, PreferenceUpdate::FontFamily("Roboto".into()));
        vm.prefs_mut().toggle_dark_mode().unwrap();

        vm.restore_blocking(&id).unwrap();
        assert_eq!(vm.prefs().prefs(), &captured);
        assert_eq!(vm.prefs().mode_marker(), ThemeMode::Dark);
        for field in PreferenceField::ALL {
            assert_eq!(store.get(field.key()), Some(captured.value_of(field)));
        }
    }

    #[test]
    fn test_restore_publishes_preset_loaded_once() {
        let (mut vm, _, bus) = manager();
        let id = vm.save_preset("Compact").unwrap();
        let loaded = count_events(&bus, EventKind::PresetLoaded);

        let report = vm.restore_blocking(&id).unwrap();
        assert_eq!(loaded.get(), 1);
        assert_eq!(report.dispatch.delivered, 1);
        assert!(!report.applied_to_grid);

        vm.restore_blocking(&id).unwrap();
        assert_eq!(loaded.get(), 2);
    }

    #[test]
    fn test_storage_written_before_event() {
        let (mut vm, store, bus) = manager();
        store
            .set("ag-grid-sort-model", r#"[{"colId":"price","sort":"asc"}]"#)
            .unwrap();
        set(&mut vm, PreferenceUpdate::Spacing(4));
        let id = vm.save_preset("Tight").unwrap();
        set(&mut vm, PreferenceUpdate::Spacing(30));
        store.remove("ag-grid-sort-model").unwrap();

        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let reader = store.clone();
        bus.subscribe(EventKind::PresetLoaded, move |_| {
            *s.borrow_mut() = Some((
                reader.get("theme-spacing"),
                reader.get("ag-grid-sort-model"),
            ));
        });

        let report = vm.restore_blocking(&id).unwrap();
        assert_eq!(report.grid_keys_written, vec!["ag-grid-sort-model"]);
        let (spacing, sort) = seen.borrow().clone().unwrap();
        assert_eq!(spacing.as_deref(), Some("4"));
        assert_eq!(sort.as_deref(), Some(r#"[{"colId":"price","sort":"asc"}]"#));
    }

    #[test]
    fn test_absent_grid_state_leaves_keys_alone() {
        let (mut vm, store, _) = manager();
        let id = vm.save_preset("Plain").unwrap();
        store.set("ag-grid-column-state", r#"[{"colId":"make"}]"#).unwrap();

        let report = vm.restore_blocking(&id).unwrap();
        assert!(report.grid_keys_written.is_empty());
        assert_eq!(
            store.get("ag-grid-column-state").as_deref(),
            Some(r#"[{"colId":"make"}]"#)
        );
    }

    #[test]
    fn test_restore_unknown_id() {
        let (mut vm, _, bus) = manager();
        let loaded = count_events(&bus, EventKind::PresetLoaded);
        assert_eq!(
            vm.restore_blocking("nope"),
            Err(RestoreError::NotFound("nope".into()))
        );
        assert!(vm.try_restore("nope").is_none());
        assert_eq!(loaded.get(), 0);
    }

    #[test]
    fn test_restore_applies_marker_without_flip() {
        let (mut vm, _, _) = manager();
        set(&mut vm, PreferenceUpdate::DarkMode(true));
        let id = vm.save_preset("Dark").unwrap();

        // Restoring twice must not toggle back
        vm.restore_blocking(&id).unwrap();
        vm.restore_blocking(&id).unwrap();
        assert!(vm.prefs().is_dark_mode());
        assert_eq!(vm.prefs().mode_marker(), ThemeMode::Dark);
    }

    #[test]
    fn test_restore_honours_mount_delay() {
        let store = StoreHandle::memory();
        let options = RestoreOptions {
            mount_delay: Duration::from_millis(30),
            ..Default::default()
        };
        let mut vm = ViewManager::open(store, EventBus::new(), options);
        let id = vm.save_preset("Delayed").unwrap();

        let start = Instant::now();
        vm.restore_blocking(&id).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    struct RecordingGrid {
        applied: Rc<RefCell<Vec<GridState>>>,
        fail: bool,
    }

    impl GridAdapter for RecordingGrid {
        fn apply_state(&mut self, state: &GridState, _prefs: &PreferenceSet) -> Result<(), GridError> {
            self.applied.borrow_mut().push(state.clone());
            if self.fail {
                Err(GridError::NotReady)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_attached_grid_receives_state_directly() {
        let (mut vm, store, bus) = manager();
        store.set("ag-grid-filter-model", r#"{"make":{"type":"equals"}}"#).unwrap();
        let id = vm.save_preset("Filtered").unwrap();

        let applied = Rc::new(RefCell::new(Vec::new()));
        vm.attach_grid(Box::new(RecordingGrid {
            applied: Rc::clone(&applied),
            fail: false,
        }));
        let loaded = count_events(&bus, EventKind::PresetLoaded);

        let report = vm.restore_blocking(&id).unwrap();
        assert!(report.applied_to_grid);
        assert_eq!(loaded.get(), 1);
        assert_eq!(
            applied.borrow()[0].filter_model,
            Some(json!({"make": {"type": "equals"}}))
        );
    }

    #[test]
    fn test_grid_failure_still_publishes() {
        let (mut vm, _, bus) = manager();
        let id = vm.save_preset("Any").unwrap();
        vm.attach_grid(Box::new(RecordingGrid {
            applied: Rc::new(RefCell::new(Vec::new())),
            fail: true,
        }));
        let loaded = count_events(&bus, EventKind::PresetLoaded);

        assert_eq!(
            vm.restore_blocking(&id),
            Err(RestoreError::Grid(GridError::NotReady))
        );
        assert_eq!(loaded.get(), 1);
        assert_eq!(vm.current_id(), Some(id.as_str()));
    }

    #[test]
    fn test_update_preset_uses_current_live_values() {
        let (mut vm, _, bus) = manager();
        let id = vm.save_preset("Working").unwrap();
        let updated = count_events(&bus, EventKind::PresetUpdated);

        set(&mut vm, PreferenceUpdate::FontSize(18));
        vm.update_current(None).unwrap();

        let preset = vm.presets().get(&id).unwrap();
        assert_eq!(preset.id, id);
        assert_eq!(preset.name, "Working");
        assert_eq!(preset.prefs.font_size, 18);
        assert_eq!(updated.get(), 1);
    }

    #[test]
    fn test_update_current_without_selection() {
        let (mut vm, _, _) = manager();
        assert_eq!(vm.update_current(None), Err(ViewError::NoSelection));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (mut vm, _, _) = manager();
        let id = vm.save_preset("Keep").unwrap();
        assert_eq!(
            vm.delete_preset(&id, DeleteConfirmation::Pending),
            Err(ViewError::ConfirmationRequired(id.clone()))
        );
        assert_eq!(vm.presets().len(), 1);
    }

    #[test]
    fn test_delete_current_falls_back_to_first() {
        let (mut vm, store, bus) = manager();
        let first = vm.save_preset("First").unwrap();
        let second = vm.save_preset("Second").unwrap();
        vm.select(&second).unwrap();

        let changes = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&changes);
        bus.subscribe(EventKind::ProfileChanged, move |e| c.borrow_mut().push(e.clone()));

        let now = vm.delete_preset(&second, DeleteConfirmation::Confirmed).unwrap();
        assert_eq!(now.as_deref(), Some(first.as_str()));
        assert_eq!(store.get("selected-profile-id"), Some(first.clone()));
        assert_eq!(
            *changes.borrow(),
            vec![Event::ProfileChanged {
                profile_id: Some(first.clone())
            }]
        );

        let now = vm.delete_preset(&first, DeleteConfirmation::Confirmed).unwrap();
        assert_eq!(now, None);
        assert!(vm.current().is_none());
        assert!(store.get("selected-profile-id").is_none());
    }

    #[test]
    fn test_delete_other_keeps_selection() {
        let (mut vm, _, _) = manager();
        let a = vm.save_preset("A").unwrap();
        let b = vm.save_preset("B").unwrap();
        vm.select(&a).unwrap();
        let now = vm.delete_preset(&b, DeleteConfirmation::Confirmed).unwrap();
        assert_eq!(now, Some(a));
    }

    #[test]
    fn test_selection_survives_reopen() {
        let store = StoreHandle::memory();
        let id = {
            let mut vm = ViewManager::open(store.clone(), EventBus::new(), RestoreOptions::default());
            let id = vm.save_preset("Persisted").unwrap();
            vm.select(&id).unwrap();
            id
        };
        let vm = ViewManager::open(store, EventBus::new(), RestoreOptions::default());
        assert_eq!(vm.current_id(), Some(id.as_str()));
        assert_eq!(vm.presets().len(), 1);
    }

    #[test]
    fn test_stale_selection_ignored_on_open() {
        let store = StoreHandle::new(MemoryStore::with_entries([("selected-profile-id", "gone")]));
        let vm = ViewManager::open(store, EventBus::new(), RestoreOptions::default());
        assert!(vm.current_id().is_none());
    }

    #[test]
    fn test_corrupt_collection_opens_empty() {
        let store = StoreHandle::new(MemoryStore::with_entries([("grid-saved-settings", "{oops")]));
        let mut vm = ViewManager::open(store.clone(), EventBus::new(), RestoreOptions::default());
        assert!(vm.presets().is_empty());

        vm.save_preset("Fresh").unwrap();
        let raw = store.get("grid-saved-settings").unwrap();
        assert!(raw.starts_with('['));
    }
}
