//! Path resolution for confab configuration directories.
//!
//! CONFAB_HOME resolution order:
//! 1. CONFAB_HOME environment variable (if set)
//! 2. ~/.config/confab (default)

use std::path::PathBuf;

/// Returns the confab home directory.
///
/// Checks CONFAB_HOME env var first, falls back to ~/.config/confab
pub fn confab_home() -> PathBuf {
    if let Ok(home) = std::env::var("CONFAB_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .map(|h| h.join(".config").join("confab"))
        .expect("Could not determine home directory")
}

/// Returns the path to the config.toml file.
pub fn config_path() -> PathBuf {
    confab_home().join("config.toml")
}
