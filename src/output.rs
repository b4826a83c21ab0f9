//! Plain and JSON output.

use crate::client::{Focus, SessionInfo, TabInfo, WindowInfo};
use crate::profile::RunSummary;
use serde::Serialize;
use serde_json::json;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Error: cannot encode output: {}", e),
        }
    }

    /// A one-line confirmation such as "Window closed".
    pub fn message(&self, text: &str) {
        if self.json {
            self.print_json(&json!({ "message": text }));
        } else {
            println!("{}", text);
        }
    }

    /// A single named value.
    pub fn value(&self, key: &str, value: &str) {
        if self.json {
            self.print_json(&json!({ key: value }));
        } else {
            println!("{}", value);
        }
    }

    pub fn windows(&self, windows: &[WindowInfo]) {
        if self.json {
            return self.print_json(windows);
        }
        println!("{:<12} {:>5}  CURRENT TAB", "WINDOW", "TABS");
        for w in windows {
            println!(
                "{:<12} {:>5}  {}",
                w.id,
                w.tabs,
                w.current_tab.as_deref().unwrap_or("-")
            );
        }
    }

    pub fn tabs(&self, tabs: &[TabInfo]) {
        if self.json {
            return self.print_json(tabs);
        }
        println!("{:<12} {:<12} {:>8}  CURRENT SESSION", "TAB", "WINDOW", "SESSIONS");
        for t in tabs {
            println!(
                "{:<12} {:<12} {:>8}  {}",
                t.id,
                t.window_id,
                t.sessions,
                t.current_session.as_deref().unwrap_or("-")
            );
        }
    }

    pub fn sessions(&self, sessions: &[SessionInfo]) {
        if self.json {
            return self.print_json(sessions);
        }
        println!("{:<36}  {:<10} {:>9}  NAME", "SESSION", "TAB", "SIZE");
        for s in sessions {
            println!(
                "{:<36}  {:<10} {:>9}  {}",
                s.id,
                s.tab_id,
                format!("{}x{}", s.cols, s.rows),
                s.name
            );
        }
    }

    pub fn focus(&self, focus: &Focus) {
        if self.json {
            return self.print_json(focus);
        }
        match &focus.window {
            Some(w) => println!("Current window: {}", w),
            None => return println!("No current window"),
        }
        match &focus.tab {
            Some(t) => println!("Current tab: {}", t),
            None => return println!("No current tab"),
        }
        match &focus.session {
            Some(s) => println!("Current session: {}", s),
            None => println!("No current session"),
        }
    }

    pub fn run_summary(&self, summary: &RunSummary) {
        if self.json {
            return self.print_json(summary);
        }
        println!(
            "Profile '{}' completed: {} steps, {} panes",
            summary.profile,
            summary.steps_run,
            summary.panes.len()
        );
        for (i, session) in summary.panes.iter().enumerate() {
            println!("  pane{} = {}", i + 1, session);
        }
    }

    /// Names grouped under headings, e.g. profiles and aliases.
    pub fn listing(&self, sections: &[(&str, Vec<String>)]) {
        if self.json {
            let map: serde_json::Map<String, serde_json::Value> = sections
                .iter()
                .map(|(title, names)| (title.to_lowercase(), json!(names)))
                .collect();
            return self.print_json(&map);
        }
        let mut first = true;
        for (title, names) in sections {
            if names.is_empty() {
                continue;
            }
            if !first {
                println!();
            }
            first = false;
            println!("{}:", title);
            for name in names {
                println!("  {}", name);
            }
        }
    }
}
