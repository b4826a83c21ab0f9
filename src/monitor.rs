//! Watching a session by polling.
//!
//! The scripting interface has no change notifications, so `monitor`
//! commands re-read the screen or a variable at a fixed interval and report
//! what changed. Following runs until the process is interrupted.

use crate::client::AutomationClient;
use crate::error::Result;
use regex::Regex;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default delay between polls, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// How often to poll, and for how long.
#[derive(Debug, Clone, Copy)]
pub struct Poll {
    pub interval: Duration,
    /// Stop after this many polls. `None` polls forever.
    pub limit: Option<usize>,
}

impl Poll {
    pub fn forever(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            limit: None,
        }
    }
}

/// Compile a `--pattern` argument.
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    Ok(pattern.map(Regex::new).transpose()?)
}

/// Lines of `screen` matching `pattern`, or every line without one.
pub fn filter_lines<'s>(screen: &'s str, pattern: Option<&Regex>) -> Vec<&'s str> {
    screen
        .lines()
        .filter(|line| pattern.is_none_or(|re| re.is_match(line)))
        .collect()
}

/// Remembers the last screen so only changes are reported.
#[derive(Debug)]
pub struct ScreenWatcher {
    pattern: Option<Regex>,
    last: Option<String>,
}

impl ScreenWatcher {
    pub fn new(pattern: Option<Regex>) -> Self {
        Self {
            pattern,
            last: None,
        }
    }

    /// Lines to print for a freshly read screen. Nothing when the screen has
    /// not changed or is blank.
    pub fn update(&mut self, screen: &str) -> Vec<String> {
        if self.last.as_deref() == Some(screen) {
            return Vec::new();
        }
        self.last = Some(screen.to_string());
        match &self.pattern {
            Some(re) => filter_lines(screen, Some(re))
                .into_iter()
                .map(String::from)
                .collect(),
            None if screen.trim().is_empty() => Vec::new(),
            None => vec![screen.to_string()],
        }
    }
}

/// Remembers the last value of a variable.
#[derive(Debug, Default)]
pub struct VariableWatcher {
    last: Option<Option<String>>,
}

impl VariableWatcher {
    /// Message for a freshly read value: the current value on the first
    /// read, then one message per change.
    pub fn update(&mut self, value: Option<String>) -> Option<String> {
        let shown = value.as_deref().unwrap_or("(unset)").to_string();
        let message = match &self.last {
            None => Some(format!("Current value: {}", shown)),
            Some(prev) if *prev != value => Some(format!("Changed to: {}", shown)),
            Some(_) => None,
        };
        self.last = Some(value);
        message
    }
}

fn poll_loop(poll: &Poll, mut tick: impl FnMut() -> Result<()>) -> Result<()> {
    let mut polls = 0;
    loop {
        if poll.limit.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
        tick()?;
        polls += 1;
        if !poll.interval.is_zero() {
            thread::sleep(poll.interval);
        }
    }
}

/// Print screen changes of `session` until the poll limit (if any).
pub fn follow_screen(
    client: &dyn AutomationClient,
    session: &str,
    watcher: &mut ScreenWatcher,
    poll: &Poll,
    emit: &mut dyn FnMut(&str),
) -> Result<()> {
    debug!(session, interval = ?poll.interval, "following screen");
    poll_loop(poll, || {
        for line in watcher.update(&client.read_screen(session)?) {
            emit(&line);
        }
        Ok(())
    })
}

/// Print changes of variable `name` in `session` until the poll limit (if any).
pub fn follow_variable(
    client: &dyn AutomationClient,
    session: &str,
    name: &str,
    poll: &Poll,
    emit: &mut dyn FnMut(&str),
) -> Result<()> {
    debug!(session, name, "following variable");
    let mut watcher = VariableWatcher::default();
    poll_loop(poll, || {
        if let Some(message) = watcher.update(client.get_variable(session, name)?) {
            emit(&message);
        }
        Ok(())
    })
}
