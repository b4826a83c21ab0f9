//! Configuration types for itermctl.
//!
//! This module defines the data structures that map to the TOML configuration format.
//! The config has three top-level tables, all optional:
//!
//! - `settings` tunes alias recursion and transport timeouts
//! - `profiles` maps a profile name to an ordered list of steps
//! - `aliases` maps an alias name to one or more command lines
//!
//! # Config Format
//!
//! ```toml
//! [settings]
//! alias_depth = 10
//! timeout_secs = 10
//!
//! [profiles]
//! dev = [
//!     { cd = "~/src/app" },
//!     { split = "vertical" },
//!     { pane1 = "npm run dev" },
//!     { pane2 = "cargo watch -x run" },
//! ]
//!
//! [aliases]
//! deploy = 'session run "deploy.sh" --all'
//! morning = ["load dev", "app activate"]
//! nightly = { run = ["tests", "deploy"], continue_on_error = true }
//! ```

use crate::error::{CtlError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Default cap on nested alias expansion.
pub const DEFAULT_ALIAS_DEPTH: usize = 10;

/// Default timeout for a single transport call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Top-level command names an alias may not shadow.
pub const RESERVED_NAMES: &[&str] = &[
    "app", "window", "tab", "session", "profile", "broadcast", "monitor", "config", "ls", "load",
    "send", "run", "split", "vsplit", "clear", "help",
];

/// Command field that accepts either a single string or array of strings.
///
/// This allows flexible config syntax:
/// ```toml
/// deploy = "session run deploy.sh"
/// # or
/// morning = ["load dev", "app activate"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Cmd {
    /// A single command line.
    Single(String),
    /// Multiple command lines executed in sequence.
    Multiple(Vec<String>),
}

impl Cmd {
    /// Convert to a `Vec<String>`, normalizing both variants.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Cmd::Single(s) => vec![s.clone()],
            Cmd::Multiple(v) => v.clone(),
        }
    }
}

/// Tunables under `[settings]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Maximum alias nesting depth.
    pub alias_depth: usize,
    /// Per-call transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alias_depth: DEFAULT_ALIAS_DEPTH,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// One step of a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `cd = "path"`: change directory in the current pane.
    ChangeDirectory(String),
    /// `command = "text"`: run text in the current pane.
    Command(String),
    /// `split = "vertical" | "horizontal" | "CxR"`. Parsed when the step runs.
    Split(String),
    /// `paneN = "text"`: run text in the N-th pane (1-based).
    PaneCommand(usize, String),
}

impl Step {
    /// Build a step from its single-key TOML table.
    fn from_entry(key: &str, value: String) -> std::result::Result<Self, String> {
        match key {
            "cd" => Ok(Step::ChangeDirectory(value)),
            "command" => Ok(Step::Command(value)),
            "split" => Ok(Step::Split(value)),
            _ => {
                let index = key
                    .strip_prefix("pane")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| format!("unknown step key '{}'", key))?;
                if index == 0 {
                    return Err("pane indices start at 1".into());
                }
                Ok(Step::PaneCommand(index, value))
            }
        }
    }
}

/// A named, ordered automation script.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Profile name as written in config.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

/// A named shortcut for one or more command lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Literal command lines, possibly naming other aliases.
    pub commands: Vec<String>,
    /// Keep running remaining lines after a failure.
    pub continue_on_error: bool,
}

impl Alias {
    /// An alias that stops at the first failure.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            continue_on_error: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAlias {
    Plain(Cmd),
    Detailed {
        run: Cmd,
        #[serde(default)]
        continue_on_error: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    settings: Settings,
    profiles: HashMap<String, Vec<BTreeMap<String, String>>>,
    aliases: HashMap<String, RawAlias>,
}

/// Top-level configuration structure.
///
/// Parsed from `~/.config/itermctl/config.toml` (or XDG equivalent).
/// An immutable snapshot: built once per invocation and passed by reference.
#[derive(Debug, Default, Clone)]
pub struct Config {
    /// Tunables.
    pub settings: Settings,
    /// Automation profiles by name.
    pub profiles: HashMap<String, Profile>,
    /// Aliases by name.
    pub aliases: HashMap<String, Alias>,
}

impl Config {
    /// Parse and validate config from a TOML string.
    ///
    /// # Errors
    ///
    /// - [`CtlError::ParseError`] if the TOML is malformed or has unknown tables
    /// - [`CtlError::InvalidConfig`] if a step or alias is not well formed
    pub fn from_str(toml_str: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(toml_str)?;

        if raw.settings.alias_depth == 0 {
            return Err(CtlError::InvalidConfig(
                "settings.alias_depth must be at least 1".into(),
            ));
        }
        if raw.settings.timeout_secs == 0 {
            return Err(CtlError::InvalidConfig(
                "settings.timeout_secs must be at least 1".into(),
            ));
        }

        let mut config = Config {
            settings: raw.settings,
            ..Config::default()
        };

        for (name, raw_steps) in raw.profiles {
            let mut steps = Vec::with_capacity(raw_steps.len());
            for (i, entry) in raw_steps.into_iter().enumerate() {
                if entry.len() != 1 {
                    return Err(CtlError::InvalidConfig(format!(
                        "profile '{}' step {}: expected exactly one key, found {}",
                        name,
                        i + 1,
                        entry.len()
                    )));
                }
                let Some((key, value)) = entry.into_iter().next() else {
                    continue;
                };
                let step = Step::from_entry(&key, value).map_err(|reason| {
                    CtlError::InvalidConfig(format!("profile '{}' step {}: {}", name, i + 1, reason))
                })?;
                steps.push(step);
            }
            config.profiles.insert(name.clone(), Profile { name, steps });
        }

        for (name, raw_alias) in raw.aliases {
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(CtlError::InvalidConfig(format!(
                    "alias '{}' shadows a built-in command",
                    name
                )));
            }
            let alias = match raw_alias {
                RawAlias::Plain(cmd) => Alias::new(cmd.to_vec()),
                RawAlias::Detailed {
                    run,
                    continue_on_error,
                } => Alias {
                    commands: run.to_vec(),
                    continue_on_error,
                },
            };
            if alias.commands.iter().all(|c| c.trim().is_empty()) {
                return Err(CtlError::InvalidConfig(format!(
                    "alias '{}' has no commands",
                    name
                )));
            }
            config.aliases.insert(name, alias);
        }

        Ok(config)
    }

    /// Look up a profile by name.
    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Look up an alias by name.
    pub fn get_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }

    /// List all profile names, sorted alphabetically.
    pub fn list_profiles(&self) -> Vec<String> {
        let mut result: Vec<_> = self.profiles.keys().cloned().collect();
        result.sort();
        result
    }

    /// List all alias names, sorted alphabetically.
    pub fn list_aliases(&self) -> Vec<String> {
        let mut result: Vec<_> = self.aliases.keys().cloned().collect();
        result.sort();
        result
    }
}
