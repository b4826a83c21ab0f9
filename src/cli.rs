//! Command-line interface for itermctl.
//!
//! Parses arguments using clap and provides the [`Cli`] struct containing
//! all user-specified options.

use crate::monitor::DEFAULT_INTERVAL_MS;
use crate::target::TargetSpec;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for itermctl.
///
/// # Examples
///
/// ```bash
/// # Split the current pane side by side
/// itermctl vsplit
///
/// # Run a command in a specific session
/// itermctl --session 0C3F5B1A-9E2D-4F6B-8A7C-1D2E3F4A5B6C run "make test"
///
/// # Run a profile from config in a fresh tab
/// itermctl load dev --new-tab
///
/// # Run an alias
/// itermctl deploy
/// ```
#[derive(Parser, Debug)]
#[command(name = "itermctl")]
#[command(version)]
#[command(about = "Script iTerm2 windows, tabs and panes from the command line")]
#[command(long_about = "itermctl drives iTerm2 through its automation interface.\n\n\
    Commands act on the focused window, tab or session unless --window, --tab or\n\
    --session names one. Profiles and aliases from the config file turn whole\n\
    layouts into a single command.")]
pub struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Target window ID (default: current window).
    #[arg(long, global = true, value_name = "ID")]
    pub window: Option<String>,

    /// Target tab ID (default: current tab).
    #[arg(long, global = true, value_name = "ID")]
    pub tab: Option<String>,

    /// Target session ID (default: current session).
    ///
    /// Accepts a bare UUID or an `ITERM_SESSION_ID` value such as `w0t0p0:UUID`.
    /// `active` means the focused session; `all` makes `send`/`run` reach
    /// every session.
    #[arg(short, long, global = true, value_name = "ID")]
    pub session: Option<String>,

    /// Skip local confirmation prompts.
    ///
    /// iTerm2 may still show its own confirmation dialog.
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Explicit targets given with `--window`, `--tab` and `--session`.
    pub fn target(&self) -> TargetSpec {
        TargetSpec {
            window: self.window.clone(),
            tab: self.tab.clone(),
            session: self.session.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Control the iTerm2 application.
    #[command(subcommand)]
    App(AppCommand),
    /// Manage windows.
    #[command(subcommand)]
    Window(WindowCommand),
    /// Manage tabs.
    #[command(subcommand)]
    Tab(TabCommand),
    /// Manage sessions (panes).
    #[command(subcommand)]
    Session(SessionCommand),
    /// Apply iTerm2 visual profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Send input to several sessions at once.
    #[command(subcommand)]
    Broadcast(BroadcastCommand),
    /// Watch a session's screen or variables.
    #[command(subcommand)]
    Monitor(MonitorCommand),
    /// Inspect the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List sessions (same as `session list`).
    Ls,
    /// Run a profile from the config file.
    Load(LoadArgs),
    /// Send text without a newline (same as `session send`).
    Send(SendArgs),
    /// Run a command (same as `session run`).
    Run(SendArgs),
    /// Split the current pane horizontally.
    Split(SplitArgs),
    /// Split the current pane vertically.
    Vsplit(SplitArgs),
    /// Clear the screen (same as `session clear`).
    Clear,
    /// Run an alias from the config file.
    #[command(external_subcommand)]
    Alias(Vec<String>),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Bring iTerm2 to the front.
    Activate,
    /// Hide iTerm2.
    Hide,
    /// Quit iTerm2.
    Quit,
    /// Show the iTerm2 version.
    Version,
    /// Show the focused window, tab and session.
    Focus,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum WindowCommand {
    /// List windows.
    List,
    /// Open a new window.
    New {
        /// iTerm2 profile for the new window.
        #[arg(long)]
        profile: Option<String>,
        /// Command to run in the new window.
        #[arg(long)]
        command: Option<String>,
    },
    /// Close the target window.
    Close,
    /// Focus the target window.
    Focus,
    /// Move the target window to screen coordinates.
    Move {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    /// Resize the target window (pixels).
    Resize { width: u32, height: u32 },
    /// Enter or leave full screen.
    Fullscreen {
        #[arg(value_enum, default_value_t = FullscreenMode::Toggle)]
        mode: FullscreenMode,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenMode {
    On,
    Off,
    Toggle,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TabCommand {
    /// List tabs (only those of `--window` when given).
    List,
    /// Open a new tab in the target window.
    New {
        /// iTerm2 profile for the new tab.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Close the target tab.
    Close,
    /// Focus the target tab.
    Focus,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// List sessions (only those of `--tab` or `--window` when given).
    List,
    /// Split the target session.
    Split(SplitArgs),
    /// Send text without a newline.
    Send(SendArgs),
    /// Send text followed by a newline.
    Run(SendArgs),
    /// Print the visible screen contents.
    Read {
        /// Only print the last N lines.
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Clear the screen.
    Clear,
    /// Close the target session.
    Close,
    /// Focus the target session.
    Focus,
    /// Print a session variable.
    GetVar { name: String },
    /// Set a session variable (user variables need the `user.` prefix).
    SetVar { name: String, value: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProfileCommand {
    /// Switch the target session to an iTerm2 profile.
    Apply { name: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum BroadcastCommand {
    /// Send text without a newline to every session in scope.
    Send {
        text: String,
        #[arg(long, value_enum, default_value_t = Scope::Tab)]
        scope: Scope,
    },
    /// Run a command in every session in scope.
    Run {
        command: String,
        #[arg(long, value_enum, default_value_t = Scope::Tab)]
        scope: Scope,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MonitorCommand {
    /// Print the screen, or keep printing it as it changes.
    Output {
        /// Keep polling until interrupted.
        #[arg(long)]
        follow: bool,
        /// Only print lines matching this regex.
        #[arg(short, long)]
        pattern: Option<String>,
        /// Milliseconds between polls when following.
        #[arg(long, value_name = "MS", default_value_t = DEFAULT_INTERVAL_MS)]
        interval: u64,
    },
    /// Print a session variable and every change to it until interrupted.
    Variable {
        name: String,
        /// Milliseconds between polls.
        #[arg(long, value_name = "MS", default_value_t = DEFAULT_INTERVAL_MS)]
        interval: u64,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Print the config file location.
    Path,
    /// Re-read and validate the config file.
    Reload,
    /// List profiles and aliases.
    List,
    /// Write a starter config if none exists.
    Init,
}

/// Which sessions a broadcast reaches.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every session in the target tab.
    Tab,
    /// Every session in the target window.
    Window,
    /// Every session in every window.
    All,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SendArgs {
    /// Text to send.
    pub text: String,
    /// Send to every session instead of the target one.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SplitArgs {
    /// Put the new pane beside the current one.
    #[arg(short, long)]
    pub vertical: bool,
    /// iTerm2 profile for the new pane.
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LoadArgs {
    /// Profile name from the config file.
    pub name: String,
    /// Run in a new tab of the target window.
    #[arg(long, conflicts_with = "new_window")]
    pub new_tab: bool,
    /// Run in a new window.
    #[arg(long)]
    pub new_window: bool,
}
