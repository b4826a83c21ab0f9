//! # itermctl
//!
//! Script iTerm2 windows, tabs and panes from the command line.
//!
//! itermctl drives a running iTerm2 through its automation interface. Commands
//! act on the focused window, tab or session unless one is named explicitly.
//! Profiles describe a pane layout plus the commands to run in it, and aliases
//! bundle several command lines under one name.
//!
//! ## Quick Example
//!
//! ```toml
//! # ~/.config/itermctl/config.toml
//!
//! [profiles]
//! dev = [
//!     { cd = "~/src/app" },
//!     { split = "vertical" },
//!     { pane1 = "nvim ." },
//!     { pane2 = "cargo watch -x test" },
//! ]
//!
//! [aliases]
//! deploy = "session run \"deploy.sh\" --all"
//! morning = ["load dev --new-tab", "deploy"]
//! ```
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line argument parsing with clap
//! - [`dispatch`]: Routes parsed commands, runs aliases
//! - [`target`]: Resolves window, tab and session targets
//! - [`alias`]: Alias expansion with cycle and depth checks
//! - [`profile`]: Executes profile steps and tracks pane bindings
//! - [`monitor`]: Polls a session's screen or variables for changes
//! - [`client`]: The automation interface and the data it returns
//! - [`iterm`]: iTerm2 implementation of the automation interface
//! - [`config`]: TOML configuration parsing and data structures
//! - [`loader`]: Config file discovery and loading
//! - [`output`]: Plain and JSON output
//! - [`error`]: Error types

pub mod alias;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod iterm;
pub mod loader;
pub mod monitor;
pub mod output;
pub mod profile;
pub mod target;

pub use client::AutomationClient;
pub use config::{Alias, Config, Profile, Step};
pub use error::{CtlError, Result};
