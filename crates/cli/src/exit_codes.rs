//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, bad value)    |
//! | 3-9     | profiles         | Saved view / storage codes               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant error mapping below

use gridview_config::{PresetError, RestoreError, ViewError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable values, declined confirmation.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Profiles (3-9)
// =============================================================================

/// No profile matches the given id or name.
pub const EXIT_NOT_FOUND: u8 = 3;

/// Profile name is empty or already taken.
pub const EXIT_INVALID_NAME: u8 = 4;

/// Storage file could not be read or written.
pub const EXIT_STORE: u8 = 5;

/// Storage was updated but the grid widget rejected the state.
pub const EXIT_GRID: u8 = 6;

// =============================================================================
// Error mapping
// =============================================================================

pub fn preset_exit_code(err: &PresetError) -> u8 {
    match err {
        PresetError::EmptyName | PresetError::DuplicateName(_) => EXIT_INVALID_NAME,
        PresetError::NotFound(_) => EXIT_NOT_FOUND,
        PresetError::Corrupt(_) | PresetError::Store(_) => EXIT_STORE,
    }
}

pub fn view_exit_code(err: &ViewError) -> u8 {
    match err {
        ViewError::Preset(e) => preset_exit_code(e),
        ViewError::NoSelection => EXIT_NOT_FOUND,
        ViewError::ConfirmationRequired(_) => EXIT_USAGE,
        ViewError::Store(_) => EXIT_STORE,
    }
}

pub fn restore_exit_code(err: &RestoreError) -> u8 {
    match err {
        RestoreError::NotFound(_) => EXIT_NOT_FOUND,
        RestoreError::Store(_) => EXIT_STORE,
        RestoreError::Grid(_) => EXIT_GRID,
    }
}
