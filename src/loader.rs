//! Config file discovery and loading.
//!
//! Handles finding the config file across different platforms and loading it.
//! The search order is:
//!
//! 1. `$ITERMCTL_CONFIG` (explicit file path)
//! 2. `$XDG_CONFIG_HOME/itermctl/config.toml`
//! 3. `~/.config/itermctl/config.toml`
//! 4. Platform default (e.g., `~/Library/Application Support` on macOS)
//!
//! Loading is explicit: nothing watches the file, and `config reload` simply
//! runs the same load-and-validate path again.

use crate::config::Config;
use crate::error::{CtlError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "ITERMCTL_CONFIG";

const STARTER_CONFIG: &str = r#"# itermctl configuration

[settings]
alias_depth = 10
timeout_secs = 10

[profiles]
# dev = [
#     { cd = "~/src/app" },
#     { split = "vertical" },
#     { pane1 = "npm run dev" },
#     { pane2 = "cargo watch -x run" },
# ]

[aliases]
# deploy = 'session run "deploy.sh" --all'
"#;

/// Determine the config file path.
///
/// Checks locations in order of preference:
/// 1. `$ITERMCTL_CONFIG` (used as-is, even if the file is missing)
/// 2. `$XDG_CONFIG_HOME/itermctl/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/itermctl/config.toml`
/// 4. Platform default via `dirs::config_dir()`
///
/// If no existing config is found, returns `~/.config/itermctl/config.toml`
/// as the default location for new configs.
///
/// # Errors
///
/// Returns [`CtlError::NoConfigDir`] if the home directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        if !explicit.is_empty() {
            return Ok(PathBuf::from(explicit));
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg).join("itermctl").join("config.toml");
        if path.exists() {
            return Ok(path);
        }
    }

    let home = dirs::home_dir();
    if let Some(ref home) = home {
        let path = home.join(".config").join("itermctl").join("config.toml");
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("itermctl").join("config.toml");
        if path.exists() {
            return Ok(path);
        }
    }

    home.map(|h| h.join(".config").join("itermctl").join("config.toml"))
        .ok_or(CtlError::NoConfigDir)
}

/// Load and parse a config file from the given path.
///
/// # Errors
///
/// - [`CtlError::ConfigNotFound`] if the file doesn't exist
/// - [`CtlError::IoError`] if reading fails
/// - [`CtlError::ParseError`] / [`CtlError::InvalidConfig`] if the contents are bad
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(CtlError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config = Config::from_str(&contents)?;
    debug!(
        path = %path.display(),
        profiles = config.profiles.len(),
        aliases = config.aliases.len(),
        "loaded config"
    );
    Ok(config)
}

/// Load config, treating a missing file as an empty config.
///
/// Most commands never touch profiles or aliases, so a missing file must not
/// stop them. A file that exists but is invalid is still an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    match load_config(path) {
        Err(CtlError::ConfigNotFound(_)) => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
        other => other,
    }
}

/// Write a starter config at `path` unless one already exists.
///
/// Returns `true` if a file was written.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, STARTER_CONFIG)?;
    Ok(true)
}
