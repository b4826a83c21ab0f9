//! Command routing.
//!
//! Every parsed [`Command`] goes through [`dispatch`]. Alias commands expand
//! to command lines which are parsed with the same [`Cli`] definition and
//! dispatched one at a time and in order. Expansion flattens nested aliases,
//! so an alias line never dispatches another alias.

use crate::alias;
use crate::cli::{
    AppCommand, BroadcastCommand, Cli, Command, ConfigCommand, FullscreenMode, LoadArgs,
    MonitorCommand, ProfileCommand, Scope, SendArgs, SessionCommand, SplitArgs, TabCommand,
    WindowCommand,
};
use crate::client::{AutomationClient, SessionInfo};
use crate::config::Config;
use crate::error::{CtlError, Result};
use crate::loader;
use crate::output::Output;
use crate::monitor::{self, Poll, ScreenWatcher};
use crate::profile;
use crate::target::{self, TargetSpec};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Form feed; clears the screen in most shells.
const CLEAR_SCREEN: &str = "\x0c";

/// Asks the user to confirm a destructive action.
pub type ConfirmFn = fn(&str) -> Result<bool>;

/// Everything a command needs besides its own arguments.
pub struct Context<'a> {
    pub client: &'a dyn AutomationClient,
    pub config: &'a Config,
    pub config_path: PathBuf,
    pub target: TargetSpec,
    pub output: Output,
    pub force: bool,
    pub confirm: ConfirmFn,
}

impl<'a> Context<'a> {
    pub fn new(
        client: &'a dyn AutomationClient,
        config: &'a Config,
        config_path: PathBuf,
        cli: &Cli,
    ) -> Self {
        Self {
            client,
            config,
            config_path,
            target: cli.target(),
            output: Output::new(cli.json),
            force: cli.force,
            confirm: confirm_stdin,
        }
    }

    /// Context for one line of an alias: flags on the line win, everything
    /// else is inherited.
    fn for_line(&self, line: &Cli) -> Context<'a> {
        if line.config.is_some() {
            warn!("--config inside an alias line is ignored");
        }
        Context {
            client: self.client,
            config: self.config,
            config_path: self.config_path.clone(),
            target: TargetSpec {
                window: line.window.clone().or_else(|| self.target.window.clone()),
                tab: line.tab.clone().or_else(|| self.target.tab.clone()),
                session: line.session.clone().or_else(|| self.target.session.clone()),
            },
            output: Output::new(line.json || self.output.json),
            force: line.force || self.force,
            confirm: self.confirm,
        }
    }

    /// Ask before a destructive action unless `--force` was given.
    fn confirm(&self, prompt: &str) -> Result<()> {
        if self.force {
            return Ok(());
        }
        if (self.confirm)(prompt)? {
            Ok(())
        } else {
            Err(CtlError::Aborted(prompt.to_string()))
        }
    }

    fn session(&self) -> Result<String> {
        target::resolve_session(self.client, &self.target)
    }

    fn tab(&self) -> Result<String> {
        target::resolve_tab(self.client, &self.target)
    }

    fn window(&self) -> Result<String> {
        target::resolve_window(self.client, &self.target)
    }
}

/// Prompt on the terminal. Without a terminal there is nobody to ask, so the
/// action is refused.
pub fn confirm_stdin(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(CtlError::Aborted(format!(
            "{} (no terminal to confirm; pass --force)",
            prompt
        )));
    }
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Run one command.
pub fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    debug!(?command, "dispatch");
    match command {
        Command::App(cmd) => app(ctx, cmd),
        Command::Window(cmd) => window(ctx, cmd),
        Command::Tab(cmd) => tab(ctx, cmd),
        Command::Session(cmd) => session(ctx, cmd),
        Command::Profile(cmd) => visual_profile(ctx, cmd),
        Command::Broadcast(cmd) => broadcast(ctx, cmd),
        Command::Monitor(cmd) => watch(ctx, cmd),
        Command::Config(cmd) => config(ctx, cmd),
        Command::Ls => session(ctx, SessionCommand::List),
        Command::Load(args) => load(ctx, args),
        Command::Send(args) => session(ctx, SessionCommand::Send(args)),
        Command::Run(args) => session(ctx, SessionCommand::Run(args)),
        Command::Split(args) => session(ctx, SessionCommand::Split(args)),
        Command::Vsplit(args) => session(
            ctx,
            SessionCommand::Split(SplitArgs {
                vertical: true,
                ..args
            }),
        ),
        Command::Clear => session(ctx, SessionCommand::Clear),
        Command::Alias(args) => run_alias(ctx, &args),
    }
}

fn app(ctx: &Context, cmd: AppCommand) -> Result<()> {
    let client = ctx.client;
    match cmd {
        AppCommand::Activate => {
            client.activate_app()?;
            ctx.output.message("iTerm2 activated");
        }
        AppCommand::Hide => {
            client.hide_app()?;
            ctx.output.message("iTerm2 hidden");
        }
        AppCommand::Quit => {
            ctx.confirm("Quit iTerm2?")?;
            client.quit_app()?;
            ctx.output.message("iTerm2 quit command sent");
        }
        AppCommand::Version => {
            let version = client.version()?;
            if ctx.output.json {
                ctx.output.value("version", &version);
            } else {
                ctx.output.message(&format!("iTerm2 version: {}", version));
            }
        }
        AppCommand::Focus => ctx.output.focus(&client.focus()?),
    }
    Ok(())
}

fn window(ctx: &Context, cmd: WindowCommand) -> Result<()> {
    let client = ctx.client;
    match cmd {
        WindowCommand::List => ctx.output.windows(&client.list_windows()?),
        WindowCommand::New { profile, command } => {
            let created = client.create_window(profile.as_deref())?;
            let id = created.window.ok_or_else(|| {
                CtlError::RejectedByApplication("Failed to create window".into())
            })?;
            if let (Some(command), Some(session)) = (command, &created.session) {
                client.send_text(session, &command, true)?;
            }
            info!(window = %id, "created window");
            ctx.output.value("window", &id);
        }
        WindowCommand::Close => {
            let id = ctx.window()?;
            ctx.confirm(&format!("Close window {}?", id))?;
            client.close_window(&id, ctx.force)?;
            ctx.output.message("Window closed");
        }
        WindowCommand::Focus => {
            let id = ctx.window()?;
            client.focus_window(&id)?;
            ctx.output.message(&format!("Focused window {}", id));
        }
        WindowCommand::Move { x, y } => {
            let id = ctx.window()?;
            client.move_window(&id, x, y)?;
            ctx.output.message(&format!("Moved window {} to ({}, {})", id, x, y));
        }
        WindowCommand::Fullscreen { mode } => {
            let id = ctx.window()?;
            let current = client.is_fullscreen(&id)?;
            let wanted = match mode {
                FullscreenMode::On => true,
                FullscreenMode::Off => false,
                FullscreenMode::Toggle => !current,
            };
            let state = if wanted { "enabled" } else { "disabled" };
            if wanted == current {
                ctx.output.message(&format!("Fullscreen already {}", state));
            } else {
                client.set_fullscreen(&id, wanted)?;
                ctx.output.message(&format!("Fullscreen {}", state));
            }
        }
        WindowCommand::Resize { width, height } => {
            let id = ctx.window()?;
            client.resize_window(&id, width, height)?;
            ctx.output
                .message(&format!("Resized window {} to {}x{}", id, width, height));
        }
    }
    Ok(())
}

fn tab(ctx: &Context, cmd: TabCommand) -> Result<()> {
    let client = ctx.client;
    match cmd {
        TabCommand::List => {
            let window = match (&ctx.target.window, &ctx.target.tab, &ctx.target.session) {
                (None, None, None) => None,
                _ => Some(ctx.window()?),
            };
            ctx.output.tabs(&client.list_tabs(window.as_deref())?);
        }
        TabCommand::New { profile } => {
            let window = ctx.window()?;
            let created = client.create_tab(&window, profile.as_deref())?;
            info!(tab = %created.id, "created tab");
            ctx.output.value("tab", &created.id);
        }
        TabCommand::Close => {
            let id = ctx.tab()?;
            ctx.confirm(&format!("Close tab {}?", id))?;
            client.close_tab(&id, ctx.force)?;
            ctx.output.message("Tab closed");
        }
        TabCommand::Focus => {
            let id = ctx.tab()?;
            client.focus_tab(&id)?;
            ctx.output.message(&format!("Focused tab {}", id));
        }
    }
    Ok(())
}

/// Sessions in the tab or window named on the command line, or all of them.
fn scoped_sessions(ctx: &Context) -> Result<Vec<SessionInfo>> {
    let t = &ctx.target;
    if t.all_sessions() {
        return ctx.client.list_sessions(None);
    }
    if t.tab.is_some() || t.session.is_some() {
        let tab = ctx.tab()?;
        return ctx.client.list_sessions(Some(&tab));
    }
    if t.window.is_some() {
        return window_sessions(ctx, &ctx.window()?);
    }
    ctx.client.list_sessions(None)
}

fn window_sessions(ctx: &Context, window: &str) -> Result<Vec<SessionInfo>> {
    let tabs: Vec<String> = ctx
        .client
        .list_tabs(Some(window))?
        .into_iter()
        .map(|t| t.id)
        .collect();
    Ok(ctx
        .client
        .list_sessions(None)?
        .into_iter()
        .filter(|s| tabs.contains(&s.tab_id))
        .collect())
}

fn send(ctx: &Context, args: SendArgs, newline: bool) -> Result<()> {
    if args.all || ctx.target.all_sessions() {
        let sessions = ctx.client.list_sessions(None)?;
        for s in &sessions {
            ctx.client.send_text(&s.id, &args.text, newline)?;
        }
        debug!(count = sessions.len(), "sent to all sessions");
        return Ok(());
    }
    let id = ctx.session()?;
    ctx.client.send_text(&id, &args.text, newline)
}

fn session(ctx: &Context, cmd: SessionCommand) -> Result<()> {
    let client = ctx.client;
    match cmd {
        SessionCommand::List => ctx.output.sessions(&scoped_sessions(ctx)?),
        SessionCommand::Split(args) => {
            let id = ctx.session()?;
            let new_id = client.split_session(&id, args.vertical, args.profile.as_deref())?;
            ctx.output.value("session", &new_id);
        }
        SessionCommand::Send(args) => send(ctx, args, false)?,
        SessionCommand::Run(args) => send(ctx, args, true)?,
        SessionCommand::Read { lines } => {
            let id = ctx.session()?;
            let screen = client.read_screen(&id)?;
            let text = match lines {
                Some(n) => {
                    let all: Vec<&str> = screen.lines().collect();
                    all[all.len().saturating_sub(n)..].join("\n")
                }
                None => screen,
            };
            ctx.output.value("contents", &text);
        }
        SessionCommand::Clear => {
            let id = ctx.session()?;
            client.send_text(&id, CLEAR_SCREEN, false)?;
        }
        SessionCommand::Close => {
            let id = ctx.session()?;
            ctx.confirm(&format!("Close session {}?", id))?;
            client.close_session(&id, ctx.force)?;
            ctx.output.message("Session closed");
        }
        SessionCommand::Focus => {
            let id = ctx.session()?;
            client.focus_session(&id)?;
            ctx.output.message(&format!("Focused session {}", id));
        }
        SessionCommand::GetVar { name } => {
            let id = ctx.session()?;
            let value = client.get_variable(&id, &name)?.unwrap_or_default();
            ctx.output.value(&name, &value);
        }
        SessionCommand::SetVar { name, value } => {
            let id = ctx.session()?;
            client.set_variable(&id, &name, &value)?;
            ctx.output.message(&format!("Set {} = {}", name, value));
        }
    }
    Ok(())
}

fn visual_profile(ctx: &Context, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Apply { name } => {
            let id = ctx.session()?;
            ctx.client.apply_profile(&id, &name)?;
            ctx.output
                .message(&format!("Applied profile '{}' to session", name));
        }
    }
    Ok(())
}

fn broadcast(ctx: &Context, cmd: BroadcastCommand) -> Result<()> {
    let (text, scope, newline) = match cmd {
        BroadcastCommand::Send { text, scope } => (text, scope, false),
        BroadcastCommand::Run { command, scope } => (command, scope, true),
    };
    let sessions = match scope {
        Scope::Tab => ctx.client.list_sessions(Some(&ctx.tab()?))?,
        Scope::Window => window_sessions(ctx, &ctx.window()?)?,
        Scope::All => ctx.client.list_sessions(None)?,
    };
    if sessions.is_empty() {
        return Err(CtlError::NoCurrentTarget("session"));
    }
    for s in &sessions {
        ctx.client.send_text(&s.id, &text, newline)?;
    }
    ctx.output
        .message(&format!("Sent to {} sessions", sessions.len()));
    Ok(())
}

fn config(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    let path = &ctx.config_path;
    match cmd {
        ConfigCommand::Path => ctx.output.value("path", &path.display().to_string()),
        ConfigCommand::Reload => {
            let fresh = loader::load_config(path)?;
            ctx.output.message(&format!(
                "Config OK: {} profiles, {} aliases ({})",
                fresh.profiles.len(),
                fresh.aliases.len(),
                path.display()
            ));
        }
        ConfigCommand::List => ctx.output.listing(&[
            ("Profiles", ctx.config.list_profiles()),
            ("Aliases", ctx.config.list_aliases()),
        ]),
        ConfigCommand::Init => {
            if loader::init_config(path)? {
                ctx.output
                    .message(&format!("Wrote starter config to {}", path.display()));
            } else {
                ctx.output
                    .message(&format!("Config already exists at {}", path.display()));
            }
        }
    }
    Ok(())
}

fn load(ctx: &Context, args: LoadArgs) -> Result<()> {
    // Fail before creating anything.
    if ctx.config.get_profile(&args.name).is_none() {
        return Err(CtlError::UnknownProfile(args.name));
    }

    let tab = if args.new_window {
        let created = ctx.client.create_window(None)?;
        created.tab.ok_or_else(|| {
            CtlError::RejectedByApplication("new window reported no tab".into())
        })?
    } else if args.new_tab {
        let window = ctx.window()?;
        ctx.client.create_tab(&window, None)?.id
    } else {
        ctx.tab()?
    };

    let result = profile::run(&args.name, ctx.config, ctx.client, &tab)?;
    let summary = result.into_result(&args.name)?;
    ctx.output.run_summary(&summary);
    Ok(())
}

fn watch(ctx: &Context, cmd: MonitorCommand) -> Result<()> {
    let session = ctx.session()?;
    let mut emit = |line: &str| println!("{}", line);
    match cmd {
        MonitorCommand::Output {
            follow: false,
            pattern,
            ..
        } => {
            let pattern = monitor::compile_pattern(pattern.as_deref())?;
            let screen = ctx.client.read_screen(&session)?;
            let lines = monitor::filter_lines(&screen, pattern.as_ref());
            ctx.output.value("contents", &lines.join("\n"));
        }
        MonitorCommand::Output {
            follow: true,
            pattern,
            interval,
        } => {
            let mut watcher = ScreenWatcher::new(monitor::compile_pattern(pattern.as_deref())?);
            eprintln!("Monitoring output from session {}... (Ctrl+C to stop)", session);
            monitor::follow_screen(
                ctx.client,
                &session,
                &mut watcher,
                &Poll::forever(interval),
                &mut emit,
            )?;
        }
        MonitorCommand::Variable { name, interval } => {
            eprintln!("Monitoring session variable '{}'... (Ctrl+C to stop)", name);
            monitor::follow_variable(
                ctx.client,
                &session,
                &name,
                &Poll::forever(interval),
                &mut emit,
            )?;
        }
    }
    Ok(())
}

fn run_alias(ctx: &Context, args: &[String]) -> Result<()> {
    let Some((name, extra)) = args.split_first() else {
        return Err(CtlError::Usage("missing command".into()));
    };
    if !extra.is_empty() {
        return Err(CtlError::InvalidAlias {
            alias: name.clone(),
            reason: "aliases do not take arguments".into(),
        });
    }

    // Expansion parses every line, so a typo or a cycle stops the alias
    // before anything runs.
    let lines = alias::expand_in(ctx.config, name)?;
    let continue_on_error = ctx
        .config
        .get_alias(name)
        .is_some_and(|a| a.continue_on_error);
    let parsed = lines
        .iter()
        .map(|line| alias::parse_command_line(name, line))
        .collect::<Result<Vec<_>>>()?;

    info!(alias = %name, lines = parsed.len(), "running alias");
    let mut failed = 0;
    for (line, cli) in lines.iter().zip(parsed) {
        let child = ctx.for_line(&cli);
        if let Err(e) = dispatch(&child, cli.command) {
            if !continue_on_error {
                return Err(e);
            }
            error!(alias = %name, line = %line, error = %e, "alias command failed");
            eprintln!("Error: {}: {}", line, e);
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(CtlError::AliasFailed {
            alias: name.clone(),
            failed,
            total: lines.len(),
        });
    }
    Ok(())
}
