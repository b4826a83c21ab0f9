//! iTerm2 transport.
//!
//! Talks to iTerm2 through its AppleScript dictionary by running `osascript`,
//! one process per call. Profile switching uses iTerm2's proprietary
//! `SetProfile` escape sequence written to the session's tty, since the
//! scripting dictionary cannot change a live session's profile.
//!
//! # IDs
//!
//! - Windows use iTerm2's numeric window `id`.
//! - Sessions use the session `unique ID` (a UUID).
//! - Tabs have no scripting ID, so they are addressed as `<window>:<n>`,
//!   where `n` is the tab's 1-based position in its window. Closing an
//!   earlier tab shifts the positions of the ones after it.

use crate::client::{AutomationClient, Focus, SessionInfo, TabInfo, WindowInfo};
use crate::error::{CtlError, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument};

/// Marker a script returns when the addressed entity does not exist.
const NOT_FOUND: &str = "ERR:NOTFOUND";
/// Marker a script returns when iTerm2 is not running.
const NOT_RUNNING: &str = "ERR:NOTRUNNING";

const PRELUDE: &str = r#"set sep to character id 9
set nl to character id 10
if application "iTerm2" is not running then return "ERR:NOTRUNNING"
"#;

/// iTerm2 automation client using AppleScript.
#[derive(Debug, Clone)]
pub struct ITermClient {
    timeout: Duration,
}

impl ITermClient {
    /// Create a client whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a script body after the shared prelude.
    fn run(&self, body: &str) -> Result<String> {
        let output = self.run_applescript(&format!("{}{}", PRELUDE, body))?;
        if output == NOT_RUNNING {
            return Err(CtlError::TransportDisconnected(
                "iTerm2 is not running".into(),
            ));
        }
        Ok(output)
    }

    /// Execute an AppleScript and return its stdout without the newline
    /// `osascript` appends.
    #[instrument(skip(self, script))]
    fn run_applescript(&self, script: &str) -> Result<String> {
        debug!("executing AppleScript");
        let mut child = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!("failed to spawn osascript: {}", e);
                CtlError::TransportDisconnected(format!("failed to run osascript: {}", e))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                error!(timeout = ?self.timeout, "osascript timed out");
                return Err(CtlError::TransportTimeout(self.timeout.as_secs()));
            }
            thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            error!("AppleScript failed: {}", stderr.trim());
            return Err(classify_failure(&stderr));
        }
        Ok(strip_result_newline(&stdout).to_string())
    }

    /// Run `body` inside `tell` blocks addressing session `id`.
    fn with_session(&self, id: &str, body: &str) -> Result<String> {
        let script = format!(
            r#"tell application "iTerm2"
    repeat with w in windows
        repeat with t in tabs of w
            repeat with s in sessions of t
                if (unique ID of s) is "{id}" then
                    tell s
                        {body}
                    end tell
                    return "OK"
                end if
            end repeat
        end repeat
    end repeat
    return "{NOT_FOUND}"
end tell"#,
            id = escape(id),
            body = body,
        );
        not_found_as(self.run(&script)?, "session", id)
    }

    /// Run `body` inside a `tell` block addressing window `id`.
    fn with_window(&self, id: &str, body: &str) -> Result<String> {
        let window = parse_window_id(id)?;
        let script = format!(
            r#"tell application "iTerm2"
    if not (exists window id {window}) then return "{NOT_FOUND}"
    set w to window id {window}
    tell w
        {body}
    end tell
    return "OK"
end tell"#
        );
        not_found_as(self.run(&script)?, "window", id)
    }

    /// Run `body` inside a `tell` block addressing tab `id`.
    fn with_tab(&self, id: &str, body: &str) -> Result<String> {
        let (window, index) = parse_tab_id(id)?;
        let script = format!(
            r#"tell application "iTerm2"
    if not (exists window id {window}) then return "{NOT_FOUND}"
    set w to window id {window}
    if (count of tabs of w) < {index} then return "{NOT_FOUND}"
    set t to tab {index} of w
    tell t
        {body}
    end tell
    return "OK"
end tell"#
        );
        not_found_as(self.run(&script)?, "tab", id)
    }
}

impl Default for ITermClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Drop the single line ending `osascript` adds after the result. Leading
/// whitespace and blank lines belong to the result.
fn strip_result_newline(stdout: &str) -> &str {
    let s = stdout.strip_suffix('\n').unwrap_or(stdout);
    s.strip_suffix('\r').unwrap_or(s)
}

/// Map an `osascript` error message onto the transport error kinds.
fn classify_failure(stderr: &str) -> CtlError {
    let message = stderr.trim().to_string();
    if message.contains("(-600)") || message.contains("(-609)") {
        CtlError::TransportDisconnected(message)
    } else if message.contains("(-1743)") {
        CtlError::RejectedByApplication(
            "not authorized to send Apple events to iTerm2 (check Privacy & Security > Automation)"
                .into(),
        )
    } else {
        CtlError::RejectedByApplication(message)
    }
}

fn not_found_as(output: String, kind: &'static str, id: &str) -> Result<String> {
    if output == NOT_FOUND {
        Err(CtlError::EntityNotFound {
            kind,
            id: id.to_string(),
        })
    } else {
        Ok(output)
    }
}

/// Escape a value for use inside an AppleScript string literal.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_window_id(id: &str) -> Result<u64> {
    id.parse().map_err(|_| CtlError::EntityNotFound {
        kind: "window",
        id: id.to_string(),
    })
}

/// Split a `<window>:<n>` tab ID.
fn parse_tab_id(id: &str) -> Result<(u64, usize)> {
    let not_found = || CtlError::EntityNotFound {
        kind: "tab",
        id: id.to_string(),
    };
    let (window, index) = id.split_once(':').ok_or_else(not_found)?;
    let window = window.parse().map_err(|_| not_found())?;
    let index: usize = index.parse().map_err(|_| not_found())?;
    if index == 0 {
        return Err(not_found());
    }
    Ok((window, index))
}

fn tab_id(window: &str, index: &str) -> String {
    format!("{}:{}", window, index)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn profile_clause(profile: Option<&str>) -> String {
    match profile {
        Some(p) => format!("with profile \"{}\"", escape(p)),
        None => "with default profile".into(),
    }
}

fn parse_windows(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let [id, tabs, current] = fields.as_slice() else {
                return None;
            };
            Some(WindowInfo {
                id: id.to_string(),
                tabs: tabs.parse().unwrap_or(0),
                current_tab: match *current {
                    "0" | "" => None,
                    n => Some(tab_id(id, n)),
                },
            })
        })
        .collect()
}

fn parse_tabs(output: &str) -> Vec<TabInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let [window, index, sessions, current] = fields.as_slice() else {
                return None;
            };
            Some(TabInfo {
                id: tab_id(window, index),
                window_id: window.to_string(),
                sessions: sessions.parse().unwrap_or(0),
                current_session: non_empty(current),
            })
        })
        .collect()
}

fn parse_sessions(output: &str) -> Vec<SessionInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.splitn(7, '\t').collect();
            let [window, index, id, tty, rows, cols, name] = fields.as_slice() else {
                return None;
            };
            Some(SessionInfo {
                id: id.to_string(),
                tab_id: tab_id(window, index),
                name: name.to_string(),
                tty: tty.to_string(),
                rows: rows.parse().unwrap_or(0),
                cols: cols.parse().unwrap_or(0),
            })
        })
        .collect()
}

fn parse_focus(output: &str) -> Focus {
    let fields: Vec<&str> = output.split('\t').collect();
    match fields.as_slice() {
        [window, tab, session] if !window.is_empty() => Focus {
            window: Some(window.to_string()),
            tab: match *tab {
                "0" | "" => None,
                n => Some(tab_id(window, n)),
            },
            session: non_empty(session),
        },
        _ => Focus::default(),
    }
}

/// Reply to `create window`: all three IDs must be present.
fn parse_created_window(output: &str) -> Result<Focus> {
    let focus = parse_focus(output);
    if focus.window.is_none() || focus.session.is_none() {
        return Err(CtlError::RejectedByApplication(format!(
            "Failed to create window (unexpected reply: {:?})",
            output
        )));
    }
    Ok(focus)
}

/// Escape sequence that switches the session reading it to profile `name`.
fn set_profile_sequence(name: &str) -> String {
    format!("\x1b]1337;SetProfile={}\x07", name)
}

impl AutomationClient for ITermClient {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let output = self.run(
            r#"tell application "iTerm2"
    set out to ""
    repeat with w in windows
        set wid to (id of w) as string
        set curSid to ""
        try
            set curSid to unique ID of current session of current tab of w
        end try
        set ti to 0
        set i to 0
        repeat with t in tabs of w
            set i to i + 1
            try
                if (unique ID of current session of t) is curSid then set ti to i
            end try
        end repeat
        set out to out & wid & sep & (count of tabs of w) & sep & ti & nl
    end repeat
    return out
end tell"#,
        )?;
        Ok(parse_windows(&output))
    }

    fn list_tabs(&self, window: Option<&str>) -> Result<Vec<TabInfo>> {
        let output = self.run(
            r#"tell application "iTerm2"
    set out to ""
    repeat with w in windows
        set wid to (id of w) as string
        set i to 0
        repeat with t in tabs of w
            set i to i + 1
            set cur to ""
            try
                set cur to unique ID of current session of t
            end try
            set out to out & wid & sep & i & sep & (count of sessions of t) & sep & cur & nl
        end repeat
    end repeat
    return out
end tell"#,
        )?;
        let tabs = parse_tabs(&output);
        Ok(match window {
            Some(w) => tabs.into_iter().filter(|t| t.window_id == w).collect(),
            None => tabs,
        })
    }

    fn list_sessions(&self, tab: Option<&str>) -> Result<Vec<SessionInfo>> {
        let output = self.run(
            r#"tell application "iTerm2"
    set out to ""
    repeat with w in windows
        set wid to (id of w) as string
        set i to 0
        repeat with t in tabs of w
            set i to i + 1
            repeat with s in sessions of t
                set out to out & wid & sep & i & sep & (unique ID of s) & sep & (tty of s) & sep & (rows of s) & sep & (columns of s) & sep & (name of s) & nl
            end repeat
        end repeat
    end repeat
    return out
end tell"#,
        )?;
        let sessions = parse_sessions(&output);
        Ok(match tab {
            Some(t) => sessions.into_iter().filter(|s| s.tab_id == t).collect(),
            None => sessions,
        })
    }

    fn focus(&self) -> Result<Focus> {
        let output = self.run(
            r#"tell application "iTerm2"
    if (count of windows) is 0 then return ""
    set w to current window
    if w is missing value then return ""
    set wid to (id of w) as string
    set sid to ""
    try
        set sid to unique ID of current session of current tab of w
    end try
    set ti to 0
    set i to 0
    repeat with t in tabs of w
        set i to i + 1
        try
            if (unique ID of current session of t) is sid then set ti to i
        end try
    end repeat
    return wid & sep & ti & sep & sid
end tell"#,
        )?;
        Ok(parse_focus(&output))
    }

    #[instrument(skip(self))]
    fn create_window(&self, profile: Option<&str>) -> Result<Focus> {
        let output = self.run(&format!(
            r#"tell application "iTerm2"
    set w to (create window {})
    set wid to (id of w) as string
    return wid & sep & "1" & sep & (unique ID of current session of current tab of w)
end tell"#,
            profile_clause(profile)
        ))?;
        parse_created_window(&output)
    }

    #[instrument(skip(self))]
    fn create_tab(&self, window: &str, profile: Option<&str>) -> Result<TabInfo> {
        let output = self.with_window(
            window,
            &format!(
                r#"set nt to (create tab {})
        set sid to unique ID of current session of nt
        set i to 0
        repeat with t in tabs
            set i to i + 1
            if (unique ID of current session of t) is sid then return (i as string) & sep & sid
        end repeat"#,
                profile_clause(profile)
            ),
        )?;
        let (index, session) = output.split_once('\t').ok_or_else(|| {
            CtlError::RejectedByApplication(format!("unexpected reply to create tab: {}", output))
        })?;
        Ok(TabInfo {
            id: tab_id(window, index),
            window_id: window.to_string(),
            sessions: 1,
            current_session: Some(session.to_string()),
        })
    }

    #[instrument(skip(self))]
    fn split_session(
        &self,
        session: &str,
        vertical: bool,
        profile: Option<&str>,
    ) -> Result<String> {
        let direction = if vertical { "vertically" } else { "horizontally" };
        let output = self.with_session(
            session,
            &format!(
                "set ns to (split {} {})\n                        return unique ID of ns",
                direction,
                profile_clause(profile)
            ),
        )?;
        if output == "OK" || output.is_empty() {
            return Err(CtlError::RejectedByApplication(
                "split did not return a new session".into(),
            ));
        }
        Ok(output)
    }

    fn move_window(&self, window: &str, x: i32, y: i32) -> Result<()> {
        self.with_window(
            window,
            &format!(
                r#"set b to bounds
        set bounds to {{{x}, {y}, {x} + ((item 3 of b) - (item 1 of b)), {y} + ((item 4 of b) - (item 2 of b))}}"#
            ),
        )?;
        Ok(())
    }

    fn resize_window(&self, window: &str, width: u32, height: u32) -> Result<()> {
        self.with_window(
            window,
            &format!(
                r#"set b to bounds
        set bounds to {{item 1 of b, item 2 of b, (item 1 of b) + {width}, (item 2 of b) + {height}}}"#
            ),
        )?;
        Ok(())
    }

    fn focus_window(&self, window: &str) -> Result<()> {
        self.with_window(window, "select")?;
        Ok(())
    }

    fn is_fullscreen(&self, window: &str) -> Result<bool> {
        self.with_window(window, "select")?;
        let output = self.run(
            r#"tell application "System Events" to tell process "iTerm2"
    return value of attribute "AXFullScreen" of front window
end tell"#,
        )?;
        Ok(output.trim() == "true")
    }

    #[instrument(skip(self))]
    fn set_fullscreen(&self, window: &str, on: bool) -> Result<()> {
        self.with_window(window, "select")?;
        self.run(&format!(
            r#"tell application "System Events" to tell process "iTerm2"
    set value of attribute "AXFullScreen" of front window to {}
end tell"#,
            on
        ))?;
        Ok(())
    }

    fn focus_tab(&self, tab: &str) -> Result<()> {
        self.with_tab(tab, "select")?;
        Ok(())
    }

    fn focus_session(&self, session: &str) -> Result<()> {
        self.with_session(session, "select")?;
        Ok(())
    }

    #[instrument(skip(self, text))]
    fn send_text(&self, session: &str, text: &str, newline: bool) -> Result<()> {
        self.with_session(
            session,
            &format!("write text \"{}\" newline {}", escape(text), newline),
        )?;
        Ok(())
    }

    fn read_screen(&self, session: &str) -> Result<String> {
        self.with_session(session, "return (text of s)")
    }

    fn get_variable(&self, session: &str, name: &str) -> Result<Option<String>> {
        let output = self.with_session(
            session,
            &format!(
                r#"set v to (variable named "{}")
                        if v is missing value then return "ERR:UNSET"
                        return "V:" & v"#,
                escape(name)
            ),
        )?;
        Ok(output.strip_prefix("V:").map(String::from))
    }

    fn set_variable(&self, session: &str, name: &str, value: &str) -> Result<()> {
        self.with_session(
            session,
            &format!(
                "set variable named \"{}\" to \"{}\"",
                escape(name),
                escape(value)
            ),
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn apply_profile(&self, session: &str, name: &str) -> Result<()> {
        let tty = self.with_session(session, "return tty")?;
        if !tty.starts_with("/dev/") {
            return Err(CtlError::RejectedByApplication(format!(
                "session '{}' has no tty",
                session
            )));
        }
        let mut device = std::fs::OpenOptions::new()
            .write(true)
            .open(&tty)
            .map_err(|e| CtlError::RejectedByApplication(format!("cannot open {}: {}", tty, e)))?;
        device.write_all(set_profile_sequence(name).as_bytes())?;
        debug!(tty = %tty, profile = name, "sent SetProfile");
        Ok(())
    }

    fn close_window(&self, window: &str, force: bool) -> Result<()> {
        debug!(window, force, "closing window");
        self.with_window(window, "close")?;
        Ok(())
    }

    fn close_tab(&self, tab: &str, force: bool) -> Result<()> {
        debug!(tab, force, "closing tab");
        self.with_tab(tab, "close")?;
        Ok(())
    }

    fn close_session(&self, session: &str, force: bool) -> Result<()> {
        debug!(session, force, "closing session");
        self.with_session(session, "close")?;
        Ok(())
    }

    fn activate_app(&self) -> Result<()> {
        self.run_applescript(r#"tell application "iTerm2" to activate"#)?;
        Ok(())
    }

    fn hide_app(&self) -> Result<()> {
        self.run(
            r#"tell application "System Events" to set visible of process "iTerm2" to false"#,
        )?;
        Ok(())
    }

    fn quit_app(&self) -> Result<()> {
        self.run(r#"tell application "iTerm2" to quit"#)?;
        Ok(())
    }

    fn version(&self) -> Result<String> {
        self.run(r#"tell application "iTerm2" to return version"#)
    }
}
