//! The automation boundary.
//!
//! [`AutomationClient`] is everything the rest of the crate needs from the
//! host application. Every call is one blocking round-trip; implementations
//! must map their failures onto the transport variants of
//! [`CtlError`](crate::error::CtlError) (`TransportTimeout`,
//! `TransportDisconnected`, `RejectedByApplication`, `EntityNotFound`).

use crate::error::Result;
use serde::Serialize;

/// A window as reported by the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowInfo {
    pub id: String,
    pub tabs: usize,
    pub current_tab: Option<String>,
}

/// A tab as reported by the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabInfo {
    pub id: String,
    pub window_id: String,
    pub sessions: usize,
    pub current_session: Option<String>,
}

/// A session (pane) as reported by the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub tab_id: String,
    pub name: String,
    pub tty: String,
    pub rows: u32,
    pub cols: u32,
}

/// What currently has focus. Read fresh for every command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Focus {
    pub window: Option<String>,
    pub tab: Option<String>,
    pub session: Option<String>,
}

/// Operations the host application exposes for scripting.
pub trait AutomationClient {
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;
    /// Tabs of one window, or of every window when `window` is `None`.
    fn list_tabs(&self, window: Option<&str>) -> Result<Vec<TabInfo>>;
    /// Sessions of one tab, or of every tab when `tab` is `None`.
    fn list_sessions(&self, tab: Option<&str>) -> Result<Vec<SessionInfo>>;
    fn focus(&self) -> Result<Focus>;

    /// Create a window and return the new window's focus triple.
    fn create_window(&self, profile: Option<&str>) -> Result<Focus>;
    /// Create a tab in `window` and return it.
    fn create_tab(&self, window: &str, profile: Option<&str>) -> Result<TabInfo>;
    /// Split `session` and return the new session's ID.
    ///
    /// `vertical` puts the new pane beside the old one.
    fn split_session(&self, session: &str, vertical: bool, profile: Option<&str>)
    -> Result<String>;

    fn move_window(&self, window: &str, x: i32, y: i32) -> Result<()>;
    fn resize_window(&self, window: &str, width: u32, height: u32) -> Result<()>;
    fn focus_window(&self, window: &str) -> Result<()>;
    fn is_fullscreen(&self, window: &str) -> Result<bool>;
    fn set_fullscreen(&self, window: &str, on: bool) -> Result<()>;
    fn focus_tab(&self, tab: &str) -> Result<()>;
    fn focus_session(&self, session: &str) -> Result<()>;

    /// Type `text` into `session`, pressing return afterwards when `newline`.
    fn send_text(&self, session: &str, text: &str, newline: bool) -> Result<()>;
    fn read_screen(&self, session: &str) -> Result<String>;
    fn get_variable(&self, session: &str, name: &str) -> Result<Option<String>>;
    fn set_variable(&self, session: &str, name: &str, value: &str) -> Result<()>;
    /// Switch `session` to the host's visual profile `name`.
    fn apply_profile(&self, session: &str, name: &str) -> Result<()>;

    fn close_window(&self, window: &str, force: bool) -> Result<()>;
    fn close_tab(&self, tab: &str, force: bool) -> Result<()>;
    fn close_session(&self, session: &str, force: bool) -> Result<()>;

    fn activate_app(&self) -> Result<()>;
    fn hide_app(&self) -> Result<()>;
    fn quit_app(&self) -> Result<()>;
    fn version(&self) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory application used by unit tests.

    use super::*;
    use crate::error::CtlError;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// A recorded mutating call.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        CreateWindow(Option<String>),
        CreateTab(String),
        Split { session: String, vertical: bool },
        Send { session: String, text: String },
        Apply { session: String, profile: String },
        Close(String),
        SetVar { session: String, name: String },
        Focus(String),
        Move(String),
        Resize(String),
        Fullscreen { window: String, on: bool },
    }

    #[derive(Debug, Default)]
    struct State {
        /// window id -> tab ids
        windows: Vec<(String, Vec<String>)>,
        /// tab id -> session ids
        tabs: HashMap<String, Vec<String>>,
        focus: Focus,
        next_id: usize,
        calls: Vec<Call>,
        vars: HashMap<(String, String), String>,
        /// Fail the n-th `send_text` call (1-based).
        fail_send_at: Option<usize>,
        sends: usize,
        fail_create: bool,
        fullscreen: Vec<String>,
        /// Screens returned by successive `read_screen` calls; the last one sticks.
        screens: VecDeque<String>,
    }

    /// Fake host with one window, one tab and one focused session.
    #[derive(Debug)]
    pub struct FakeClient {
        state: RefCell<State>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            let mut state = State::default();
            state.windows.push(("w1".into(), vec!["t1".into()]));
            state.tabs.insert("t1".into(), vec!["s1".into()]);
            state.focus = Focus {
                window: Some("w1".into()),
                tab: Some("t1".into()),
                session: Some("s1".into()),
            };
            Self {
                state: RefCell::new(state),
            }
        }

        /// Fake host with no windows at all.
        pub fn empty() -> Self {
            Self {
                state: RefCell::new(State::default()),
            }
        }

        /// Make window and tab creation fail the way iTerm2 does when it
        /// refuses the request.
        pub fn fail_create(&self) {
            self.state.borrow_mut().fail_create = true;
        }

        pub fn push_screen(&self, screen: &str) {
            self.state.borrow_mut().screens.push_back(screen.to_string());
        }

        pub fn fail_send_at(&self, n: usize) {
            self.state.borrow_mut().fail_send_at = Some(n);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.borrow().calls.clone()
        }

        pub fn sends(&self) -> Vec<(String, String)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send { session, text } => Some((session, text)),
                    _ => None,
                })
                .collect()
        }

        pub fn sessions_in(&self, tab: &str) -> Vec<String> {
            self.state.borrow().tabs.get(tab).cloned().unwrap_or_default()
        }

        fn next_id(&self, prefix: &str) -> String {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            format!("{}{}", prefix, state.next_id + 1)
        }

        fn tab_of(&self, session: &str) -> Option<String> {
            let state = self.state.borrow();
            state
                .tabs
                .iter()
                .find(|(_, sessions)| sessions.iter().any(|s| s == session))
                .map(|(tab, _)| tab.clone())
        }

        fn window_of(&self, tab: &str) -> Option<String> {
            let state = self.state.borrow();
            state
                .windows
                .iter()
                .find(|(_, tabs)| tabs.iter().any(|t| t == tab))
                .map(|(w, _)| w.clone())
        }

        fn require_session(&self, session: &str) -> Result<()> {
            self.tab_of(session)
                .map(|_| ())
                .ok_or_else(|| CtlError::EntityNotFound {
                    kind: "session",
                    id: session.to_string(),
                })
        }

        fn require_window(&self, window: &str) -> Result<()> {
            let known = self.state.borrow().windows.iter().any(|(w, _)| w == window);
            if known {
                Ok(())
            } else {
                Err(CtlError::EntityNotFound {
                    kind: "window",
                    id: window.to_string(),
                })
            }
        }

        fn record(&self, call: Call) {
            self.state.borrow_mut().calls.push(call);
        }
    }

    impl AutomationClient for FakeClient {
        fn list_windows(&self) -> Result<Vec<WindowInfo>> {
            let state = self.state.borrow();
            Ok(state
                .windows
                .iter()
                .map(|(id, tabs)| WindowInfo {
                    id: id.clone(),
                    tabs: tabs.len(),
                    current_tab: match &state.focus.window {
                        Some(w) if w == id => state.focus.tab.clone(),
                        _ => tabs.first().cloned(),
                    },
                })
                .collect())
        }

        fn list_tabs(&self, window: Option<&str>) -> Result<Vec<TabInfo>> {
            let state = self.state.borrow();
            Ok(state
                .windows
                .iter()
                .filter(|(w, _)| window.is_none_or(|want| want == w))
                .flat_map(|(w, tabs)| {
                    tabs.iter().map(|t| {
                        let sessions = state.tabs.get(t).cloned().unwrap_or_default();
                        TabInfo {
                            id: t.clone(),
                            window_id: w.clone(),
                            sessions: sessions.len(),
                            current_session: match &state.focus.tab {
                                Some(ft) if ft == t => state.focus.session.clone(),
                                _ => sessions.first().cloned(),
                            },
                        }
                    })
                })
                .collect())
        }

        fn list_sessions(&self, tab: Option<&str>) -> Result<Vec<SessionInfo>> {
            let state = self.state.borrow();
            let mut result = Vec::new();
            for (_, tabs) in &state.windows {
                for t in tabs {
                    if tab.is_some_and(|want| want != t) {
                        continue;
                    }
                    for s in state.tabs.get(t).into_iter().flatten() {
                        result.push(SessionInfo {
                            id: s.clone(),
                            tab_id: t.clone(),
                            name: format!("shell {}", s),
                            tty: format!("/dev/ttys-{}", s),
                            rows: 24,
                            cols: 80,
                        });
                    }
                }
            }
            Ok(result)
        }

        fn focus(&self) -> Result<Focus> {
            Ok(self.state.borrow().focus.clone())
        }

        fn create_window(&self, profile: Option<&str>) -> Result<Focus> {
            if self.state.borrow().fail_create {
                return Err(CtlError::RejectedByApplication(
                    "Failed to create window".into(),
                ));
            }
            let w = self.next_id("w");
            let t = self.next_id("t");
            let s = self.next_id("s");
            {
                let mut state = self.state.borrow_mut();
                state.windows.push((w.clone(), vec![t.clone()]));
                state.tabs.insert(t.clone(), vec![s.clone()]);
            }
            self.record(Call::CreateWindow(profile.map(String::from)));
            Ok(Focus {
                window: Some(w),
                tab: Some(t),
                session: Some(s),
            })
        }

        fn create_tab(&self, window: &str, _profile: Option<&str>) -> Result<TabInfo> {
            self.require_window(window)?;
            if self.state.borrow().fail_create {
                return Err(CtlError::RejectedByApplication("Failed to create tab".into()));
            }
            let t = self.next_id("t");
            let s = self.next_id("s");
            {
                let mut state = self.state.borrow_mut();
                if let Some((_, tabs)) = state.windows.iter_mut().find(|(w, _)| w == window) {
                    tabs.push(t.clone());
                }
                state.tabs.insert(t.clone(), vec![s.clone()]);
            }
            self.record(Call::CreateTab(window.to_string()));
            Ok(TabInfo {
                id: t,
                window_id: window.to_string(),
                sessions: 1,
                current_session: Some(s),
            })
        }

        fn split_session(
            &self,
            session: &str,
            vertical: bool,
            _profile: Option<&str>,
        ) -> Result<String> {
            let tab = self.tab_of(session).ok_or_else(|| CtlError::EntityNotFound {
                kind: "session",
                id: session.to_string(),
            })?;
            let new_id = self.next_id("s");
            {
                let mut state = self.state.borrow_mut();
                if let Some(sessions) = state.tabs.get_mut(&tab) {
                    sessions.push(new_id.clone());
                }
            }
            self.record(Call::Split {
                session: session.to_string(),
                vertical,
            });
            Ok(new_id)
        }

        fn move_window(&self, window: &str, _x: i32, _y: i32) -> Result<()> {
            self.require_window(window)?;
            self.record(Call::Move(window.to_string()));
            Ok(())
        }

        fn resize_window(&self, window: &str, _width: u32, _height: u32) -> Result<()> {
            self.require_window(window)?;
            self.record(Call::Resize(window.to_string()));
            Ok(())
        }

        fn focus_window(&self, window: &str) -> Result<()> {
            self.require_window(window)?;
            self.record(Call::Focus(window.to_string()));
            Ok(())
        }

        fn is_fullscreen(&self, window: &str) -> Result<bool> {
            self.require_window(window)?;
            Ok(self.state.borrow().fullscreen.iter().any(|w| w == window))
        }

        fn set_fullscreen(&self, window: &str, on: bool) -> Result<()> {
            self.require_window(window)?;
            {
                let mut state = self.state.borrow_mut();
                state.fullscreen.retain(|w| w != window);
                if on {
                    state.fullscreen.push(window.to_string());
                }
            }
            self.record(Call::Fullscreen {
                window: window.to_string(),
                on,
            });
            Ok(())
        }

        fn focus_tab(&self, tab: &str) -> Result<()> {
            self.window_of(tab).ok_or_else(|| CtlError::EntityNotFound {
                kind: "tab",
                id: tab.to_string(),
            })?;
            self.record(Call::Focus(tab.to_string()));
            Ok(())
        }

        fn focus_session(&self, session: &str) -> Result<()> {
            self.require_session(session)?;
            self.record(Call::Focus(session.to_string()));
            Ok(())
        }

        fn send_text(&self, session: &str, text: &str, newline: bool) -> Result<()> {
            self.require_session(session)?;
            {
                let mut state = self.state.borrow_mut();
                state.sends += 1;
                if state.fail_send_at == Some(state.sends) {
                    return Err(CtlError::TransportTimeout(10));
                }
            }
            let mut text = text.to_string();
            if newline {
                text.push('\n');
            }
            self.record(Call::Send {
                session: session.to_string(),
                text,
            });
            Ok(())
        }

        fn read_screen(&self, session: &str) -> Result<String> {
            self.require_session(session)?;
            let mut state = self.state.borrow_mut();
            let screen = if state.screens.len() > 1 {
                state.screens.pop_front()
            } else {
                state.screens.front().cloned()
            };
            Ok(screen.unwrap_or_else(|| "line one\nerror: two\nline three".into()))
        }

        fn get_variable(&self, session: &str, name: &str) -> Result<Option<String>> {
            self.require_session(session)?;
            Ok(self
                .state
                .borrow()
                .vars
                .get(&(session.to_string(), name.to_string()))
                .cloned())
        }

        fn set_variable(&self, session: &str, name: &str, value: &str) -> Result<()> {
            self.require_session(session)?;
            self.state
                .borrow_mut()
                .vars
                .insert((session.to_string(), name.to_string()), value.to_string());
            self.record(Call::SetVar {
                session: session.to_string(),
                name: name.to_string(),
            });
            Ok(())
        }

        fn apply_profile(&self, session: &str, name: &str) -> Result<()> {
            self.require_session(session)?;
            self.record(Call::Apply {
                session: session.to_string(),
                profile: name.to_string(),
            });
            Ok(())
        }

        fn close_window(&self, window: &str, _force: bool) -> Result<()> {
            self.require_window(window)?;
            self.state.borrow_mut().windows.retain(|(w, _)| w != window);
            self.record(Call::Close(window.to_string()));
            Ok(())
        }

        fn close_tab(&self, tab: &str, _force: bool) -> Result<()> {
            self.window_of(tab).ok_or_else(|| CtlError::EntityNotFound {
                kind: "tab",
                id: tab.to_string(),
            })?;
            {
                let mut state = self.state.borrow_mut();
                for (_, tabs) in state.windows.iter_mut() {
                    tabs.retain(|t| t != tab);
                }
                state.tabs.remove(tab);
            }
            self.record(Call::Close(tab.to_string()));
            Ok(())
        }

        fn close_session(&self, session: &str, _force: bool) -> Result<()> {
            self.require_session(session)?;
            for sessions in self.state.borrow_mut().tabs.values_mut() {
                sessions.retain(|s| s != session);
            }
            self.record(Call::Close(session.to_string()));
            Ok(())
        }

        fn activate_app(&self) -> Result<()> {
            Ok(())
        }

        fn hide_app(&self) -> Result<()> {
            Ok(())
        }

        fn quit_app(&self) -> Result<()> {
            Ok(())
        }

        fn version(&self) -> Result<String> {
            Ok("3.5.0".into())
        }
    }
}
