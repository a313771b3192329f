// Live display preferences
// Each field is mirrored to its own storage key on every change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventBus};
use crate::keys;
use crate::store::{StoreError, StoreHandle};

pub const DEFAULT_SPACING: u32 = 8;
pub const DEFAULT_FONT_SIZE: u32 = 13;
pub const DEFAULT_FONT_FAMILY: &str = "JetBrains Mono";
pub const DEFAULT_ACCENT_COLOR: &str = "#2563eb";

/// The working display configuration.
/// Field names serialize in camelCase to match collections written by the web front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSet {
    /// Pixel unit driving row/header height and cell padding
    pub spacing: u32,
    pub font_size: u32,
    pub font_family: String,
    /// Hex color, e.g. "#2563eb"
    pub accent_color: String,
    pub is_dark_mode: bool,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            is_dark_mode: false,
        }
    }
}

impl PreferenceSet {
    /// Stored representation of one field
    pub fn value_of(&self, field: PreferenceField) -> String {
        match field {
            PreferenceField::Spacing => self.spacing.to_string(),
            PreferenceField::FontSize => self.font_size.to_string(),
            PreferenceField::FontFamily => self.font_family.clone(),
            PreferenceField::AccentColor => self.accent_color.clone(),
            PreferenceField::DarkMode => self.is_dark_mode.to_string(),
        }
    }

    pub fn mode(&self) -> ThemeMode {
        ThemeMode::from_dark(self.is_dark_mode)
    }
}

/// Document-level light/dark marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn from_dark(is_dark: bool) -> Self {
        if is_dark {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, ThemeMode::Dark)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

/// Base visual theme of the grid widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseTheme {
    #[default]
    Quartz,
    Alpine,
    Balham,
    Material,
}

impl BaseTheme {
    pub const ALL: [BaseTheme; 4] = [
        BaseTheme::Quartz,
        BaseTheme::Alpine,
        BaseTheme::Balham,
        BaseTheme::Material,
    ];

    pub fn id(self) -> &'static str {
        match self {
            BaseTheme::Quartz => "quartz",
            BaseTheme::Alpine => "alpine",
            BaseTheme::Balham => "balham",
            BaseTheme::Material => "material",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BaseTheme::Quartz => "Quartz",
            BaseTheme::Alpine => "Alpine",
            BaseTheme::Balham => "Balham",
            BaseTheme::Material => "Material",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

/// A single preference field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceField {
    Spacing,
    FontSize,
    FontFamily,
    AccentColor,
    DarkMode,
}

impl PreferenceField {
    pub const ALL: [PreferenceField; 5] = [
        PreferenceField::Spacing,
        PreferenceField::FontSize,
        PreferenceField::FontFamily,
        PreferenceField::AccentColor,
        PreferenceField::DarkMode,
    ];

    /// Storage key this field is mirrored to
    pub fn key(self) -> &'static str {
        match self {
            PreferenceField::Spacing => keys::SPACING,
            PreferenceField::FontSize => keys::FONT_SIZE,
            PreferenceField::FontFamily => keys::FONT_FAMILY,
            PreferenceField::AccentColor => keys::ACCENT_COLOR,
            PreferenceField::DarkMode => keys::DARK_MODE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PreferenceField::Spacing => "spacing",
            PreferenceField::FontSize => "font-size",
            PreferenceField::FontFamily => "font-family",
            PreferenceField::AccentColor => "accent-color",
            PreferenceField::DarkMode => "dark-mode",
        }
    }
}

impl fmt::Display for PreferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreferenceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|f| f.name()).collect();
                format!("unknown field '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// A typed change to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceUpdate {
    Spacing(u32),
    FontSize(u32),
    FontFamily(String),
    AccentColor(String),
    DarkMode(bool),
}

impl PreferenceUpdate {
    pub fn field(&self) -> PreferenceField {
        match self {
            PreferenceUpdate::Spacing(_) => PreferenceField::Spacing,
            PreferenceUpdate::FontSize(_) => PreferenceField::FontSize,
            PreferenceUpdate::FontFamily(_) => PreferenceField::FontFamily,
            PreferenceUpdate::AccentColor(_) => PreferenceField::AccentColor,
            PreferenceUpdate::DarkMode(_) => PreferenceField::DarkMode,
        }
    }

    /// Parse a textual value for `field`. Only the type is checked; range
    /// limits belong to whatever control produced the value.
    pub fn parse(field: PreferenceField, value: &str) -> Result<Self, String> {
        let value = value.trim();
        match field {
            PreferenceField::Spacing => value
                .parse()
                .map(PreferenceUpdate::Spacing)
                .map_err(|_| format!("spacing must be a whole number, got '{}'", value)),
            PreferenceField::FontSize => value
                .parse()
                .map(PreferenceUpdate::FontSize)
                .map_err(|_| format!("font size must be a whole number, got '{}'", value)),
            PreferenceField::FontFamily => Ok(PreferenceUpdate::FontFamily(value.to_string())),
            PreferenceField::AccentColor => Ok(PreferenceUpdate::AccentColor(value.to_string())),
            PreferenceField::DarkMode => value
                .parse()
                .map(PreferenceUpdate::DarkMode)
                .map_err(|_| format!("dark mode must be true or false, got '{}'", value)),
        }
    }
}

/// Holds the single active PreferenceSet and keeps it in sync with storage.
#[derive(Debug)]
pub struct PreferenceStore {
    prefs: PreferenceSet,
    base_theme: BaseTheme,
    mode_marker: ThemeMode,
    store: StoreHandle,
    bus: EventBus,
}

impl PreferenceStore {
    /// Load live preferences from storage, falling back to defaults.
    ///
    /// When no explicit dark-mode value is stored, `system_prefers_dark` decides.
    pub fn load(store: StoreHandle, bus: EventBus, system_prefers_dark: bool) -> Self {
        let defaults = PreferenceSet::default();
        let prefs = PreferenceSet {
            spacing: read_parsed(&store, keys::SPACING).unwrap_or(defaults.spacing),
            font_size: read_parsed(&store, keys::FONT_SIZE).unwrap_or(defaults.font_size),
            font_family: store
                .get(keys::FONT_FAMILY)
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.font_family),
            accent_color: store
                .get(keys::ACCENT_COLOR)
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.accent_color),
            is_dark_mode: read_dark_mode(&store, system_prefers_dark),
        };

        let base_theme = match store.get(keys::THEME_ID) {
            Some(id) => BaseTheme::from_id(&id).unwrap_or_else(|| {
                log::warn!("Unknown theme id '{}', using {}", id, BaseTheme::default().id());
                BaseTheme::default()
            }),
            None => BaseTheme::default(),
        };

        let mode_marker = prefs.mode();
        log::debug!("Loaded preferences: {:?} (mode {})", prefs, mode_marker.as_str());

        Self {
            prefs,
            base_theme,
            mode_marker,
            store,
            bus,
        }
    }

    pub fn prefs(&self) -> &PreferenceSet {
        &self.prefs
    }

    pub fn base_theme(&self) -> BaseTheme {
        self.base_theme
    }

    /// Current document-level light/dark marker
    pub fn mode_marker(&self) -> ThemeMode {
        self.mode_marker
    }

    pub fn is_dark_mode(&self) -> bool {
        self.prefs.is_dark_mode
    }

    /// Set one field and mirror it to storage. Does not notify listeners.
    pub fn update(&mut self, update: PreferenceUpdate) -> Result<(), StoreError> {
        let field = update.field();
        let mut next = self.prefs.clone();
        match update {
            PreferenceUpdate::Spacing(v) => next.spacing = v,
            PreferenceUpdate::FontSize(v) => next.font_size = v,
            PreferenceUpdate::FontFamily(v) => next.font_family = v,
            PreferenceUpdate::AccentColor(v) => next.accent_color = v,
            PreferenceUpdate::DarkMode(v) => next.is_dark_mode = v,
        }
        self.store.set(field.key(), &next.value_of(field))?;
        self.prefs = next;
        if field == PreferenceField::DarkMode {
            self.apply_mode_marker();
        }
        Ok(())
    }

    /// Flip dark mode, persist it, and broadcast `theme-changed`.
    pub fn toggle_dark_mode(&mut self) -> Result<bool, StoreError> {
        let dark = !self.prefs.is_dark_mode;
        self.update(PreferenceUpdate::DarkMode(dark))?;
        self.bus.publish(&Event::ThemeChanged { is_dark_mode: dark });
        Ok(dark)
    }

    pub fn set_base_theme(&mut self, theme: BaseTheme) -> Result<(), StoreError> {
        self.store.set(keys::THEME_ID, theme.id())?;
        self.base_theme = theme;
        Ok(())
    }

    /// True while no explicit dark-mode choice is stored
    pub fn follows_system(&self) -> bool {
        !self.store.contains(keys::DARK_MODE)
    }

    /// React to an OS light/dark change. Ignored once the user has chosen
    /// a mode explicitly. Returns whether the live mode changed.
    pub fn system_theme_changed(&mut self, prefers_dark: bool) -> bool {
        if !self.follows_system() || self.prefs.is_dark_mode == prefers_dark {
            return false;
        }
        self.prefs.is_dark_mode = prefers_dark;
        self.apply_mode_marker();
        self.bus.publish(&Event::ThemeChanged {
            is_dark_mode: prefers_dark,
        });
        true
    }

    /// Replace every scalar with `values` and re-persist all of them.
    /// The mode marker follows the new value rather than flipping.
    pub fn apply_values(&mut self, values: &PreferenceSet) -> Result<(), StoreError> {
        self.prefs = values.clone();
        self.apply_mode_marker();
        self.persist_all()
    }

    /// Write every scalar to its key
    pub fn persist_all(&self) -> Result<(), StoreError> {
        for field in PreferenceField::ALL {
            self.store.set(field.key(), &self.prefs.value_of(field))?;
        }
        Ok(())
    }

    fn apply_mode_marker(&mut self) {
        let mode = self.prefs.mode();
        if self.mode_marker != mode {
            log::debug!("Mode marker: {} -> {}", self.mode_marker.as_str(), mode.as_str());
        }
        self.mode_marker = mode;
    }
}

/// Any stored value other than "true" is an explicit light choice. Only an
/// absent key defers to the system.
fn read_dark_mode(store: &StoreHandle, system_prefers_dark: bool) -> bool {
    match store.get(keys::DARK_MODE) {
        Some(raw) => {
            let raw = raw.trim();
            if raw != "true" && raw != "false" {
                log::warn!("Treating malformed {} value {:?} as light", keys::DARK_MODE, raw);
            }
            raw == "true"
        }
        None => system_prefers_dark,
    }
}

fn read_parsed<T: FromStr>(store: &StoreHandle, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring malformed value for {}: {:?}", key, raw);
            None
        }
    }
}
