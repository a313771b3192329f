// gridview CLI - headless host for display preferences and saved views
// Drives the same storage keys and events the grid widget uses.

mod exit_codes;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use gridview_config::{
    keys, BaseTheme, DeleteConfirmation, EventBus, FileStore, GridState, PreferenceField,
    PreferenceUpdate, Preset, PresetError, RestoreError, RestoreOptions, Settings, StoreError,
    StoreHandle, ViewError, ViewManager,
};

use exit_codes::{
    preset_exit_code, restore_exit_code, view_exit_code, EXIT_ERROR, EXIT_NOT_FOUND, EXIT_STORE,
    EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "gridview")]
#[command(about = "Display preferences and saved views for the data grid")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Storage file (default: from settings, else ~/.config/gridview/storage.json)
    #[arg(long, global = true, env = "GRIDVIEW_STORE")]
    store: Option<PathBuf>,

    /// Settings file (default: ~/.config/gridview/settings.toml)
    #[arg(long, global = true, env = "GRIDVIEW_SETTINGS")]
    settings: Option<PathBuf>,

    /// Print every published event to stderr
    #[arg(long, global = true)]
    trace_events: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show live preferences and the current profile
    Show {
        /// Output a single JSON object
        #[arg(long)]
        json: bool,
    },

    /// Change one preference
    #[command(after_help = "\
Fields: spacing, font-size, font-family, accent-color, dark-mode, theme

Examples:
  gridview set spacing 12
  gridview set accent-color '#dc2626'
  gridview set theme alpine")]
    Set {
        /// Field name
        field: String,

        /// New value
        value: String,
    },

    /// Flip between light and dark mode
    ToggleDark,

    /// Manage saved profiles
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Inspect or write the grid widget's stored state
    Grid {
        #[command(subcommand)]
        command: GridCommands,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// List saved profiles in creation order
    List {
        /// Only names containing this text (case-insensitive)
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Save the live configuration as a new profile
    Save {
        name: String,
    },

    /// Overwrite a profile with the live configuration
    Update {
        /// Profile id or name (default: current profile)
        target: Option<String>,

        /// Rename the profile
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a profile
    Delete {
        /// Profile id or name
        target: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Apply a profile
    Load {
        /// Profile id or name
        target: String,
    },

    /// Mark a profile as selected without applying it
    Select {
        /// Profile id or name
        target: String,
    },
}

#[derive(Subcommand)]
enum GridCommands {
    /// Show stored column, filter and sort state
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Write grid state as the widget would
    Set {
        /// Column state JSON
        #[arg(long, value_name = "JSON")]
        columns: Option<String>,

        /// Filter model JSON
        #[arg(long, value_name = "JSON")]
        filter: Option<String>,

        /// Sort model JSON
        #[arg(long, value_name = "JSON")]
        sort: Option<String>,
    },

    /// Remove all stored grid state
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings_path = cli.settings.clone().unwrap_or_else(Settings::config_path);
    let settings = Settings::load_from(&settings_path).map_err(|e| {
        CliError::args(e.to_string())
            .with_hint(format!("fix or remove {}", settings_path.display()))
    })?;
    init_logging(&settings);

    let Some(command) = cli.command else {
        eprintln!("Usage: gridview <command> [options]");
        eprintln!("       gridview --help for more information");
        return Ok(());
    };

    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| settings.effective_store_path());
    let store = FileStore::open(&store_path).map_err(CliError::store)?;
    log::debug!("Using storage file {}", store_path.display());

    let bus = EventBus::new();
    if cli.trace_events {
        bus.subscribe_all(|event| eprintln!("event: {}", event));
    }
    let mut vm = ViewManager::open(StoreHandle::new(store), bus, RestoreOptions::from(&settings));

    match command {
        Commands::Show { json } => cmd_show(&vm, json),
        Commands::Set { field, value } => cmd_set(&mut vm, &field, &value),
        Commands::ToggleDark => cmd_toggle_dark(&mut vm),
        Commands::Preset { command } => match command {
            PresetCommands::List { filter, json } => cmd_preset_list(&vm, filter.as_deref(), json),
            PresetCommands::Save { name } => cmd_preset_save(&mut vm, &name),
            PresetCommands::Update { target, name } => {
                cmd_preset_update(&mut vm, target.as_deref(), name.as_deref())
            }
            PresetCommands::Delete { target, yes } => cmd_preset_delete(&mut vm, &target, yes),
            PresetCommands::Load { target } => cmd_preset_load(&mut vm, &target),
            PresetCommands::Select { target } => cmd_preset_select(&mut vm, &target),
        },
        Commands::Grid { command } => match command {
            GridCommands::Show { json } => cmd_grid_show(vm.store(), json),
            GridCommands::Set {
                columns,
                filter,
                sort,
            } => cmd_grid_set(vm.store(), columns, filter, sort),
            GridCommands::Clear => cmd_grid_clear(vm.store()),
        },
    }
}

fn init_logging(settings: &Settings) {
    let env = env_logger::Env::default().default_filter_or(settings.log_level.as_str());
    // Keep any logger a host already installed
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        Self { code: EXIT_STORE, message: err.to_string(), hint: None }
    }

    pub fn view(err: ViewError) -> Self {
        let hint = match &err {
            ViewError::NoSelection => Some("pass a profile id or name, or select one first".to_string()),
            _ => None,
        };
        Self { code: view_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn preset(err: PresetError) -> Self {
        Self { code: preset_exit_code(&err), message: err.to_string(), hint: None }
    }

    pub fn restore(err: RestoreError) -> Self {
        Self { code: restore_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Accept either a profile id or its (case-insensitive) name
fn resolve_preset(vm: &ViewManager, target: &str) -> Result<String, CliError> {
    let presets = vm.presets();
    presets
        .get(target)
        .or_else(|| presets.find_by_name(target))
        .map(|p| p.id.clone())
        .ok_or_else(|| {
            CliError::preset(PresetError::NotFound(target.to_string()))
                .with_hint("run `gridview preset list` to see saved profiles")
        })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", out);
    Ok(())
}

fn preset_summary(p: &Preset) -> String {
    format!(
        "spacing {}, font {} {}px, accent {}, {}",
        p.prefs.spacing,
        p.prefs.font_family,
        p.prefs.font_size,
        p.prefs.accent_color,
        if p.prefs.is_dark_mode { "dark" } else { "light" }
    )
}

// ============================================================================
// show / set / toggle-dark
// ============================================================================

fn cmd_show(vm: &ViewManager, json: bool) -> Result<(), CliError> {
    let prefs = vm.prefs();
    if json {
        let current = vm.current().map(|p| json!({ "id": p.id, "name": p.name }));
        return print_json(&json!({
            "preferences": prefs.prefs(),
            "theme": prefs.base_theme().id(),
            "mode": prefs.mode_marker().as_str(),
            "followsSystem": prefs.follows_system(),
            "currentProfile": current,
            "profiles": vm.presets().len(),
        }));
    }

    let p = prefs.prefs();
    println!("spacing:       {}", p.spacing);
    println!("font-size:     {}", p.font_size);
    println!("font-family:   {}", p.font_family);
    println!("accent-color:  {}", p.accent_color);
    println!(
        "dark-mode:     {}{}",
        p.is_dark_mode,
        if prefs.follows_system() { " (system)" } else { "" }
    );
    println!("theme:         {}", prefs.base_theme().label());
    match vm.current() {
        Some(current) => println!("profile:       {} ({})", current.name, current.id),
        None => println!("profile:       (none)"),
    }
    Ok(())
}

fn cmd_set(vm: &mut ViewManager, field: &str, value: &str) -> Result<(), CliError> {
    if field == "theme" {
        let theme = BaseTheme::from_id(value.trim()).ok_or_else(|| {
            let ids: Vec<&str> = BaseTheme::ALL.iter().map(|t| t.id()).collect();
            CliError::args(format!("unknown theme '{}' (expected one of: {})", value, ids.join(", ")))
        })?;
        vm.prefs_mut().set_base_theme(theme).map_err(CliError::store)?;
        println!("theme = {}", theme.id());
        return Ok(());
    }

    let field = field
        .parse::<PreferenceField>()
        .map_err(|e| CliError::args(e).with_hint("use `theme` to change the base theme"))?;
    let update = PreferenceUpdate::parse(field, value).map_err(CliError::args)?;
    vm.prefs_mut().update(update).map_err(CliError::store)?;
    println!("{} = {}", field, vm.prefs().prefs().value_of(field));
    Ok(())
}

fn cmd_toggle_dark(vm: &mut ViewManager) -> Result<(), CliError> {
    let dark = vm.prefs_mut().toggle_dark_mode().map_err(CliError::store)?;
    println!("{} mode", if dark { "dark" } else { "light" });
    Ok(())
}

// ============================================================================
// preset
// ============================================================================

fn cmd_preset_list(vm: &ViewManager, filter: Option<&str>, json: bool) -> Result<(), CliError> {
    let presets = vm.presets().list(filter);
    if json {
        let value = serde_json::to_value(&presets).map_err(|e| CliError::io(e.to_string()))?;
        return print_json(&value);
    }

    let current = vm.current_id();
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for p in presets {
        let marker = if Some(p.id.as_str()) == current { "*" } else { " " };
        writeln!(handle, "{} {}  {}  ({})", marker, p.id, p.name, preset_summary(p))
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

fn cmd_preset_save(vm: &mut ViewManager, name: &str) -> Result<(), CliError> {
    let id = vm.save_preset(name).map_err(CliError::view)?;
    println!("{}", id);
    Ok(())
}

fn cmd_preset_update(
    vm: &mut ViewManager,
    target: Option<&str>,
    new_name: Option<&str>,
) -> Result<(), CliError> {
    match target {
        Some(target) => {
            let id = resolve_preset(vm, target)?;
            vm.update_preset(&id, new_name).map_err(CliError::view)?;
        }
        None => vm.update_current(new_name).map_err(CliError::view)?,
    }
    if let Some(current) = vm.current() {
        log::info!("Current profile is {}", current.name);
    }
    println!("updated");
    Ok(())
}

fn cmd_preset_delete(vm: &mut ViewManager, target: &str, yes: bool) -> Result<(), CliError> {
    let id = resolve_preset(vm, target)?;

    if !yes {
        let name = vm
            .presets()
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        if !confirm(&format!("Delete profile \"{}\"? [y/N] ", name))? {
            return Err(CliError::args("aborted"));
        }
    }

    let now = vm
        .delete_preset(&id, DeleteConfirmation::Confirmed)
        .map_err(CliError::view)?;
    match now.and_then(|id| vm.presets().get(&id).map(|p| p.name.clone())) {
        Some(name) => println!("deleted; current profile is now {}", name),
        None => println!("deleted"),
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    eprint!("{}", prompt);
    io::stderr().flush().map_err(|e| CliError::io(e.to_string()))?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| CliError::io(e.to_string()))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn cmd_preset_load(vm: &mut ViewManager, target: &str) -> Result<(), CliError> {
    let id = resolve_preset(vm, target)?;
    let report = vm.restore_blocking(&id).map_err(CliError::restore)?;
    let preset = vm
        .presets()
        .get(&report.preset_id)
        .ok_or_else(|| CliError {
            code: EXIT_NOT_FOUND,
            message: format!("profile {} vanished during load", report.preset_id),
            hint: None,
        })?;
    println!("loaded {} ({})", preset.name, preset_summary(preset));
    if !report.grid_keys_written.is_empty() {
        println!("grid state: {}", report.grid_keys_written.join(", "));
    }
    Ok(())
}

fn cmd_preset_select(vm: &mut ViewManager, target: &str) -> Result<(), CliError> {
    let id = resolve_preset(vm, target)?;
    vm.select(&id).map_err(CliError::view)?;
    println!("selected {}", id);
    Ok(())
}

// ============================================================================
// grid
// ============================================================================

fn cmd_grid_show(store: &StoreHandle, json: bool) -> Result<(), CliError> {
    let state = GridState::capture(store);
    if json {
        let value = serde_json::to_value(&state).map_err(|e| CliError::io(e.to_string()))?;
        return print_json(&value);
    }
    for key in keys::GRID_KEYS {
        println!("{}: {}", key, store.get(key).unwrap_or_else(|| "(none)".to_string()));
    }
    Ok(())
}

fn cmd_grid_set(
    store: &StoreHandle,
    columns: Option<String>,
    filter: Option<String>,
    sort: Option<String>,
) -> Result<(), CliError> {
    if columns.is_none() && filter.is_none() && sort.is_none() {
        return Err(CliError::args("nothing to set")
            .with_hint("pass --columns, --filter and/or --sort"));
    }

    let parse = |flag: &str, raw: Option<String>| -> Result<Option<Value>, CliError> {
        raw.map(|s| {
            serde_json::from_str::<Value>(&s)
                .map_err(|e| CliError::args(format!("--{} is not valid JSON: {}", flag, e)))
        })
        .transpose()
    };
    let state = GridState {
        column_state: parse("columns", columns)?,
        filter_model: parse("filter", filter)?,
        sort_model: parse("sort", sort)?,
    };
    let written = state.write_to(store).map_err(CliError::store)?;
    println!("wrote {}", written.join(", "));
    Ok(())
}

fn cmd_grid_clear(store: &StoreHandle) -> Result<(), CliError> {
    for key in keys::GRID_KEYS {
        store.remove(key).map_err(CliError::store)?;
    }
    println!("cleared");
    Ok(())
}
